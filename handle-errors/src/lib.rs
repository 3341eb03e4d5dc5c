use argon2::Error as ArgonError;
use askama::Template;
use warp::{
    Rejection, Reply,
    filters::{body::BodyDeserializeError, cors::CorsForbidden},
    http::{StatusCode, Uri},
    reject::Reject,
};

use tracing::{Level, event, instrument};

#[derive(Debug)]
pub enum Error {
    ParseError(std::num::ParseIntError),
    /// User input broke one or more rules; every message is shown to the user.
    Validation(Vec<String>),
    WrongPassword,
    UnknownUser,
    CannotDecryptToken,
    CannotEncryptToken,
    /// The route needs a signed-in user and the request carried no valid session.
    Unauthenticated,
    /// The signed-in user is not the author of the resource being changed.
    Forbidden,
    /// Name of the kind of resource that was not found.
    NotFound(&'static str),
    ArgonLibraryError(ArgonError),
    DatabaseQueryError(sqlx::Error),
    MigrationError(sqlx::migrate::MigrateError),
    TemplateError(askama::Error),
    ConfigError(config::ConfigError),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(vec![message.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::ParseError(_) | Error::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::WrongPassword
            | Error::UnknownUser
            | Error::CannotDecryptToken
            | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DatabaseQueryError(e) if is_unique_violation(e) => StatusCode::BAD_REQUEST,
            Error::CannotEncryptToken
            | Error::ArgonLibraryError(_)
            | Error::DatabaseQueryError(_)
            | Error::MigrationError(_)
            | Error::TemplateError(_)
            | Error::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseError(err) => {
                write!(f, "Cannot parse parameter: {}", err)
            }
            Error::Validation(messages) => {
                write!(f, "{}", messages.join(" "))
            }
            Error::WrongPassword => {
                write!(f, "The password you entered is incorrect.")
            }
            Error::UnknownUser => {
                write!(f, "The username you entered isn't connected to an account.")
            }
            Error::CannotDecryptToken => {
                write!(f, "Cannot decrypt session token")
            }
            Error::CannotEncryptToken => {
                write!(f, "Cannot issue session token")
            }
            Error::Unauthenticated => {
                write!(f, "You need to log in first")
            }
            Error::Forbidden => {
                write!(f, "No permission to change the underlying resource")
            }
            Error::NotFound(kind) => {
                write!(f, "{} not found", kind)
            }
            Error::ArgonLibraryError(_) => {
                write!(f, "Cannot verify password")
            }
            Error::DatabaseQueryError(_) => {
                write!(f, "Cannot update, invalid data.")
            }
            Error::MigrationError(err) => {
                write!(f, "Cannot migrate database: {}", err)
            }
            Error::TemplateError(err) => {
                write!(f, "Cannot render page: {}", err)
            }
            Error::ConfigError(err) => {
                write!(f, "Invalid configuration: {}", err)
            }
        }
    }
}

impl Reject for Error {}

const DUPLICATE_KEY: &str = "23505";

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(err) => err.code().as_deref() == Some(DUPLICATE_KEY),
        _ => false,
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage<'a> {
    status: u16,
    reason: &'a str,
    messages: Vec<String>,
}

pub fn error_page(status: StatusCode, messages: Vec<String>) -> warp::reply::Response {
    let page = ErrorPage {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Error"),
        messages,
    };
    match page.render() {
        Ok(body) => warp::reply::with_status(warp::reply::html(body), status).into_response(),
        Err(e) => {
            event!(Level::ERROR, "Cannot render error page: {}", e);
            warp::reply::with_status(status.to_string(), status).into_response()
        }
    }
}

#[instrument]
pub async fn return_error(r: Rejection) -> Result<warp::reply::Response, Rejection> {
    if let Some(error) = r.find::<Error>() {
        match error {
            Error::Unauthenticated => {
                event!(Level::INFO, "Redirecting anonymous user to login");
                Ok(warp::redirect::see_other(Uri::from_static("/accounts/login")).into_response())
            }
            Error::DatabaseQueryError(e) if is_unique_violation(e) => {
                event!(Level::WARN, "Unique constraint violated: {:?}", e);
                Ok(error_page(
                    StatusCode::BAD_REQUEST,
                    vec!["This entry already exists.".to_string()],
                ))
            }
            Error::DatabaseQueryError(e) => {
                event!(Level::ERROR, "Database query error: {:?}", e);
                Ok(error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Cannot update data".to_string()],
                ))
            }
            Error::Validation(messages) => {
                event!(Level::INFO, "Rejected invalid input: {:?}", messages);
                Ok(error_page(StatusCode::BAD_REQUEST, messages.clone()))
            }
            Error::Forbidden => {
                event!(Level::WARN, "Not matching account id");
                Ok(error_page(error.status(), vec![error.to_string()]))
            }
            e if e.status() == StatusCode::INTERNAL_SERVER_ERROR => {
                event!(Level::ERROR, "{}", e);
                Ok(error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec!["Internal Server Error".to_string()],
                ))
            }
            e => {
                event!(Level::INFO, "{}", e);
                Ok(error_page(e.status(), vec![e.to_string()]))
            }
        }
    } else if let Some(error) = r.find::<CorsForbidden>() {
        event!(Level::ERROR, "CORS forbidden error: {}", error);
        Ok(error_page(StatusCode::FORBIDDEN, vec![error.to_string()]))
    } else if let Some(error) = r.find::<BodyDeserializeError>() {
        event!(Level::ERROR, "Cannot deserialize request body: {}", error);
        Ok(error_page(StatusCode::BAD_REQUEST, vec![error.to_string()]))
    } else {
        event!(Level::WARN, "Requested route was not found");
        Ok(error_page(
            StatusCode::NOT_FOUND,
            vec!["Page not found".to_string()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_resource_renders_not_found_page() {
        let res = return_error(warp::reject::custom(Error::NotFound("Question")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn foreign_author_renders_forbidden_page() {
        let res = return_error(warp::reject::custom(Error::Forbidden))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn anonymous_user_is_sent_to_login() {
        let res = return_error(warp::reject::custom(Error::Unauthenticated))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/accounts/login");
    }

    #[tokio::test]
    async fn validation_messages_are_shown() {
        let res = return_error(warp::reject::custom(Error::Validation(vec![
            "Title is required.".to_string(),
        ])))
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_renders_not_found_page() {
        let res = return_error(warp::reject::not_found()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_errors_map_to_unauthorized() {
        assert_eq!(Error::WrongPassword.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::UnknownUser.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::validation("Title is required.").status(), StatusCode::BAD_REQUEST);
    }
}
