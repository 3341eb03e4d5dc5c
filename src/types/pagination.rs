use handle_errors::Error;
use std::collections::HashMap;

/// Largest page a client may request in one go.
pub const MAX_LIMIT: i64 = 100;

/// Pagination struct which is getting extracted
/// from query params
#[derive(Default, Debug, PartialEq, Eq)]
pub struct Pagination {
    /// The maximum number of items to return, `None` lets the database return all rows
    pub limit: Option<i64>,
    /// The number of items to skip before the first one returned
    pub offset: i64,
}

/// Extract query parameters from a listing route
/// # Example query
/// GET requests to this route can have a pagination attached so we just
/// return the questions we need
/// `/questions?tab=newest&limit=10&offset=20`
/// # Example usage
/// ```rust
/// use std::collections::HashMap;
/// use forum::types::pagination::extract_pagination;
///
/// let mut query = HashMap::new();
/// query.insert("limit".to_string(), "10".to_string());
/// query.insert("offset".to_string(), "20".to_string());
/// let p = extract_pagination(&query).unwrap();
/// assert_eq!(p.limit, Some(10));
/// assert_eq!(p.offset, 20);
/// ```
pub fn extract_pagination(params: &HashMap<String, String>) -> Result<Pagination, Error> {
    let limit = params
        .get("limit")
        .map(|limit| limit.parse::<u32>())
        .transpose()
        .map_err(Error::ParseError)?
        .map(|limit| i64::from(limit).min(MAX_LIMIT));

    let offset = params
        .get("offset")
        .map(|offset| offset.parse::<u32>())
        .transpose()
        .map_err(Error::ParseError)?
        .map(i64::from)
        .unwrap_or(0);

    Ok(Pagination { limit, offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn no_parameters_means_everything() {
        let p = extract_pagination(&params(&[("tab", "popular")])).unwrap();
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn limit_is_capped() {
        let p = extract_pagination(&params(&[("limit", "5000")])).unwrap();
        assert_eq!(p.limit, Some(MAX_LIMIT));
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = extract_pagination(&params(&[("limit", "ten")])).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));

        let err = extract_pagination(&params(&[("offset", "-1")])).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
