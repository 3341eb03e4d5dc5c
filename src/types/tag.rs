use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

pub const TAG_MAX_LEN: usize = 50;

#[derive(Serialize, Debug, Clone)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub description: String,
    pub created_on: DateTime<Utc>,
    /// Number of questions carrying the tag
    pub question_count: i64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub i32);

/// Splits a free-text tag field into tag names.
///
/// Names are separated by commas or whitespace, a leading `#` is dropped and
/// duplicates are removed case-insensitively, keeping the first spelling.
pub fn parse_tag_names(input: &str) -> Result<Vec<String>, Vec<String>> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut errors = Vec::new();

    for raw in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let name = raw.trim().trim_start_matches('#');
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > TAG_MAX_LEN {
            errors.push(format!(
                "Tag \"{}\" is longer than {} characters.",
                name, TAG_MAX_LEN
            ));
            continue;
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.+".contains(c))
        {
            errors.push(format!(
                "Tag \"{}\" may contain only letters, digits and -/_/./+.",
                name
            ));
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            names.push(name.to_string());
        }
    }

    if errors.is_empty() {
        Ok(names)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_commas_and_spaces() {
        let names = parse_tag_names("rust, warp  sqlx,,postgres").unwrap();
        assert_eq!(names, vec!["rust", "warp", "sqlx", "postgres"]);
    }

    #[test]
    fn dedups_case_insensitively_keeping_first_spelling() {
        let names = parse_tag_names("Rust #rust RUST tokio").unwrap();
        assert_eq!(names, vec!["Rust", "tokio"]);
    }

    #[test]
    fn blank_input_has_no_tags() {
        assert!(parse_tag_names("  , ,").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_names() {
        let long = "x".repeat(TAG_MAX_LEN + 1);
        let errors = parse_tag_names(&format!("ok {} c/c++", long)).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("longer than"));
        assert!(errors[1].contains("c/c++"));
    }
}
