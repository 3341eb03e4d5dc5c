use argon2::{self, Config};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::prelude::*;
use rand::Rng;
use std::future;
use tracing::{Level, event, instrument};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use handle_errors::Error;

use crate::store::Store;
use crate::types::account::{
    Account, Credentials, NewAccount, PasswordChange, Session, validate_password,
};
use crate::views::{
    ConfirmDeletePage, LoginPage, SettingsPage, SignupPage, form_errors, redirect_to, render,
    render_with_status,
};

pub const SESSION_COOKIE: &str = "session";

const LOCAL_TOKEN_PREFIX: &str = "v2.local.";
/// 24-byte nonce followed by the 16-byte Poly1305 tag
const MIN_LOCAL_PAYLOAD: usize = 40;

/// What the auth filters and login handlers need to issue and check sessions.
#[derive(Clone)]
pub struct SessionSettings {
    /// 32-byte PASETO v2 local key
    pub key: Vec<u8>,
    pub lifetime_hours: i64,
    pub secure_cookie: bool,
}

pub fn hash_password(password: &[u8]) -> Result<String, Error> {
    let salt = rand::thread_rng().r#gen::<[u8; 32]>();
    let config = Config::default();
    argon2::hash_encoded(password, &salt, &config).map_err(Error::ArgonLibraryError)
}

pub fn verify_password(hash: &str, password: &[u8]) -> Result<bool, argon2::Error> {
    argon2::verify_encoded(hash, password)
}

pub fn issue_token(account: &Account, settings: &SessionSettings) -> Result<String, Error> {
    let current_date_time = Utc::now();
    let dt = current_date_time + chrono::Duration::hours(settings.lifetime_hours);

    paseto::tokens::PasetoBuilder::new()
        .set_encryption_key(&settings.key)
        .set_expiration(&dt)
        .set_not_before(&current_date_time)
        .set_claim("account_id", serde_json::json!(account.id))
        .set_claim("username", serde_json::json!(account.username))
        .build()
        .map_err(|e| {
            event!(Level::ERROR, "Cannot build session token: {:?}", e);
            Error::CannotEncryptToken
        })
}

/// `v2.local.<payload>[.<footer>]` with a payload long enough to hold nonce and tag.
fn is_local_token(token: &str) -> bool {
    let Some(rest) = token.strip_prefix(LOCAL_TOKEN_PREFIX) else {
        return false;
    };
    let payload = rest.split('.').next().unwrap_or_default();
    URL_SAFE_NO_PAD
        .decode(payload)
        .map(|bytes| bytes.len() >= MIN_LOCAL_PAYLOAD)
        .unwrap_or(false)
}

pub fn verify_token(token: &str, key: &[u8]) -> Result<Session, Error> {
    if !is_local_token(token) {
        return Err(Error::CannotDecryptToken);
    }
    let token = paseto::tokens::validate_local_token(
        token,
        None,
        key,
        &paseto::tokens::TimeBackend::Chrono,
    )
    .map_err(|_| Error::CannotDecryptToken)?;

    serde_json::from_value::<Session>(token).map_err(|_| Error::CannotDecryptToken)
}

/// The session carried by the cookie, if its token checks out.
fn cookie_session(
    settings: SessionSettings,
) -> impl Filter<Extract = (Option<Session>,), Error = Rejection> + Clone {
    warp::cookie::optional(SESSION_COOKIE).and_then(move |token: Option<String>| {
        let session = token.and_then(|token| match verify_token(&token, &settings.key) {
            Ok(session) => Some(session),
            Err(_) => {
                event!(Level::INFO, "Ignoring invalid session cookie");
                None
            }
        });
        future::ready(Ok::<_, Rejection>(session))
    })
}

/// Drops sessions whose account has since been deleted.
async fn live_session(session: Option<Session>, store: Store) -> Result<Option<Session>, Rejection> {
    let Some(session) = session else {
        return Ok(None);
    };
    match store.get_account(session.account_id).await {
        Ok(_) => Ok(Some(session)),
        Err(Error::NotFound(_)) => {
            event!(
                Level::INFO,
                account_id = session.account_id.0,
                "Ignoring session of a deleted account"
            );
            Ok(None)
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// The session of the request, if it carries a valid one for an existing account.
pub fn optional_session(
    settings: SessionSettings,
    store: Store,
) -> impl Filter<Extract = (Option<Session>,), Error = Rejection> + Clone {
    cookie_session(settings)
        .and(warp::any().map(move || store.clone()))
        .and_then(live_session)
}

/// Requires a signed-in user; anyone else is sent to the login page.
pub fn auth(
    settings: SessionSettings,
    store: Store,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    optional_session(settings, store).and_then(|session: Option<Session>| {
        future::ready(session.ok_or_else(|| warp::reject::custom(Error::Unauthenticated)))
    })
}

fn session_cookie(token: &str, settings: &SessionSettings) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        token,
        settings.lifetime_hours * 3600
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_cookie(settings: &SessionSettings) -> String {
    session_cookie("", &SessionSettings {
        lifetime_hours: 0,
        ..settings.clone()
    })
}

fn with_cookie(response: Response, cookie: String) -> Response {
    warp::reply::with_header(response, "set-cookie", cookie).into_response()
}

fn ensure_owner(session: &Session, username: &str) -> Result<(), Error> {
    if session.username.eq_ignore_ascii_case(username) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

pub async fn signup_form(session: Option<Session>) -> Result<Response, Rejection> {
    if session.is_some() {
        return Ok(redirect_to("/"));
    }
    Ok(render(&SignupPage {
        session,
        username: String::new(),
        errors: Vec::new(),
    })?)
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn register(
    store: Store,
    settings: SessionSettings,
    form: NewAccount,
) -> Result<Response, Rejection> {
    let created = match form.validate() {
        Ok(username) => {
            let hashed_password = hash_password(form.password.as_bytes())?;
            store.add_account(&username, &hashed_password).await
        }
        Err(e) => Err(e),
    };

    match created {
        Ok(account) => {
            event!(Level::INFO, account_id = account.id.0, "account registered");
            let token = issue_token(&account, &settings)?;
            Ok(with_cookie(redirect_to("/"), session_cookie(&token, &settings)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(render_with_status(
                &SignupPage {
                    session: None,
                    username: form.username,
                    errors,
                },
                StatusCode::BAD_REQUEST,
            )?)
        }
    }
}

pub async fn login_form(session: Option<Session>) -> Result<Response, Rejection> {
    if session.is_some() {
        return Ok(redirect_to("/"));
    }
    Ok(render(&LoginPage {
        session,
        username: String::new(),
        error: String::new(),
    })?)
}

#[instrument(skip_all, fields(username = %login.username))]
pub async fn login(
    store: Store,
    settings: SessionSettings,
    login: Credentials,
) -> Result<Response, Rejection> {
    let username = login.username.trim();
    let checked = match store.get_account_by_username(username).await? {
        Some(account) => match verify_password(&account.password, login.password.as_bytes()) {
            Ok(true) => Ok(account),
            Ok(false) => Err(Error::WrongPassword),
            Err(e) => return Err(warp::reject::custom(Error::ArgonLibraryError(e))),
        },
        None => Err(Error::UnknownUser),
    };

    match checked {
        Ok(account) => {
            event!(Level::INFO, account_id = account.id.0, "logged in");
            let token = issue_token(&account, &settings)?;
            Ok(with_cookie(redirect_to("/"), session_cookie(&token, &settings)))
        }
        Err(e) => {
            event!(Level::WARN, "Failed login: {}", e);
            Ok(render_with_status(
                &LoginPage {
                    session: None,
                    username: username.to_string(),
                    error: e.to_string(),
                },
                e.status(),
            )?)
        }
    }
}

pub async fn logout(settings: SessionSettings) -> Result<Response, Rejection> {
    Ok(with_cookie(redirect_to("/"), clear_cookie(&settings)))
}

pub async fn settings_form(username: String, session: Session) -> Result<Response, Rejection> {
    ensure_owner(&session, &username)?;
    Ok(render(&SettingsPage {
        session: Some(session),
        username,
        errors: Vec::new(),
    })?)
}

#[instrument(skip_all, fields(username = %username))]
pub async fn change_password(
    username: String,
    session: Session,
    store: Store,
    settings: SessionSettings,
    form: PasswordChange,
) -> Result<Response, Rejection> {
    ensure_owner(&session, &username)?;
    let account = store.get_account(session.account_id).await?;

    let refused = |status: StatusCode, errors: Vec<String>| {
        render_with_status(
            &SettingsPage {
                session: Some(session.clone()),
                username: username.clone(),
                errors,
            },
            status,
        )
    };

    if form.current_password.is_empty() || form.new_password.is_empty() {
        return Ok(refused(
            StatusCode::BAD_REQUEST,
            vec!["Missing current or new password.".to_string()],
        )?);
    }
    match verify_password(&account.password, form.current_password.as_bytes()) {
        Ok(true) => {}
        Ok(false) => {
            event!(Level::WARN, "Wrong current password");
            return Ok(refused(
                StatusCode::UNAUTHORIZED,
                vec![Error::WrongPassword.to_string()],
            )?);
        }
        Err(e) => return Err(warp::reject::custom(Error::ArgonLibraryError(e))),
    }
    let errors = validate_password(&form.new_password);
    if !errors.is_empty() {
        return Ok(refused(StatusCode::BAD_REQUEST, errors)?);
    }

    let hashed_password = hash_password(form.new_password.as_bytes())?;
    store.update_password(account.id, &hashed_password).await?;
    event!(Level::INFO, account_id = account.id.0, "password changed");

    let token = issue_token(&account, &settings)?;
    Ok(with_cookie(
        redirect_to(format!("/users/{}", account.username)),
        session_cookie(&token, &settings),
    ))
}

pub async fn delete_account_form(username: String, session: Session) -> Result<Response, Rejection> {
    ensure_owner(&session, &username)?;
    Ok(render(&ConfirmDeletePage {
        session: Some(session),
        kind: "account",
        summary: username.clone(),
        action: format!("/delete/user/{}", username),
        cancel: format!("/users/{}", username),
    })?)
}

#[instrument(skip_all, fields(username = %username))]
pub async fn delete_account(
    username: String,
    session: Session,
    store: Store,
    settings: SessionSettings,
) -> Result<Response, Rejection> {
    ensure_owner(&session, &username)?;
    store.delete_account(session.account_id).await?;
    Ok(with_cookie(redirect_to("/"), clear_cookie(&settings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::types::account::AccountId;

    fn settings() -> SessionSettings {
        SessionSettings {
            key: "RANDOM WORDS WINTER MACINTOSH PC".as_bytes().to_vec(),
            lifetime_hours: 24,
            secure_cookie: true,
        }
    }

    fn account() -> Account {
        Account {
            id: AccountId(7),
            username: "ada".to_string(),
            password: String::new(),
            created_on: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip() {
        let settings = settings();
        let token = issue_token(&account(), &settings).unwrap();
        let session = verify_token(&token, &settings.key).unwrap();
        assert_eq!(session.account_id, AccountId(7));
        assert_eq!(session.username, "ada");
        assert!(session.exp > Utc::now());
    }

    #[test]
    fn token_with_another_key_is_rejected() {
        let token = issue_token(&account(), &settings()).unwrap();
        let other = "ANOTHER KEY OF THIRTY TWO BYTES!".as_bytes();
        assert!(matches!(
            verify_token(&token, other),
            Err(Error::CannotDecryptToken)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            verify_token("v2.local.nonsense", &settings().key),
            Err(Error::CannotDecryptToken)
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected_before_decryption() {
        let key = settings().key;
        let short = format!("v2.local.{}", URL_SAFE_NO_PAD.encode([0u8; 39]));
        let tokens = [
            "",
            "v2.local.",
            "v2.local..footer",
            "v2.public.abc",
            "v2.local.***",
            short.as_str(),
        ];
        for token in tokens {
            assert!(
                matches!(verify_token(token, &key), Err(Error::CannotDecryptToken)),
                "{:?}",
                token
            );
        }
    }

    #[test]
    fn token_shape_follows_issued_tokens() {
        let token = issue_token(&account(), &settings()).unwrap();
        assert!(is_local_token(&token));
        assert!(!is_local_token(&token.replacen("v2.local.", "v1.local.", 1)));
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password(b"Sup3r-secret").unwrap();
        assert_ne!(hash, "Sup3r-secret");
        assert!(verify_password(&hash, b"Sup3r-secret").unwrap());
        assert!(!verify_password(&hash, b"sup3r-secret").unwrap());
    }

    #[test]
    fn cookie_flags() {
        let cookie = session_cookie("abc", &settings());
        assert!(cookie.starts_with("session=abc; Path=/; Max-Age=86400"));
        assert!(cookie.contains("HttpOnly; SameSite=Lax"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = clear_cookie(&SessionSettings {
            secure_cookie: false,
            ..settings()
        });
        assert_eq!(cleared, "session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn owner_check_ignores_case() {
        let session = Session {
            exp: Utc::now(),
            account_id: AccountId(7),
            username: "Ada".to_string(),
            nbf: Utc::now(),
        };
        assert!(ensure_owner(&session, "ADA").is_ok());
        assert!(ensure_owner(&session, "ada").is_ok());
        assert!(matches!(ensure_owner(&session, "adam"), Err(Error::Forbidden)));
    }

    fn lazy_store() -> Store {
        Store::new_lazy("postgres://localhost:5432/forum").unwrap()
    }

    #[tokio::test]
    async fn anonymous_request_is_unauthenticated() {
        let result = warp::test::request()
            .filter(&auth(settings(), lazy_store()))
            .await;
        let rejection = result.err().unwrap();
        assert!(matches!(rejection.find::<Error>(), Some(Error::Unauthenticated)));
    }

    #[tokio::test]
    async fn cookie_session_is_extracted() {
        let settings = settings();
        let token = issue_token(&account(), &settings).unwrap();
        let session = warp::test::request()
            .header("cookie", format!("{}={}", SESSION_COOKIE, token))
            .filter(&cookie_session(settings))
            .await
            .unwrap();
        assert_eq!(session.unwrap().username, "ada");
    }

    #[tokio::test]
    async fn bad_cookie_means_no_session() {
        for cookie in ["session=forged", "session=v2.local.nonsense"] {
            let session = warp::test::request()
                .header("cookie", cookie)
                .filter(&optional_session(settings(), lazy_store()))
                .await
                .unwrap();
            assert!(session.is_none());
        }
    }
}
