//! Q&A forum: questions, answers, tags and votes served as HTML pages.

use serde::de::DeserializeOwned;
use warp::{Filter, Rejection, Reply, http::Method};

use handle_errors::{Error, return_error};

pub mod config;
pub mod routes;
pub mod store;
pub mod types;
pub mod views;

use crate::config::Config;
use crate::routes::authentication::{SessionSettings, auth, optional_session};
use crate::store::Store;

const FORM_LIMIT: u64 = 1024 * 64;

fn form<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

fn request_span(info: warp::trace::Info) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %info.method(),
        path = %info.path(),
        id = %uuid::Uuid::new_v4(),
    )
}

/// The whole route tree, ready to be served.
pub fn build_routes(
    store: Store,
    settings: SessionSettings,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let session = optional_session(settings.clone(), store.clone());
    let auth = auth(settings.clone(), store.clone());
    let store_filter = warp::any().map(move || store.clone());
    let settings_filter = warp::any().map(move || settings.clone());

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(&[Method::GET, Method::POST]);

    let index = warp::get()
        .and(warp::path::end())
        .and(session.clone())
        .and(store_filter.clone())
        .and_then(routes::question::index);

    let get_questions = warp::get()
        .and(warp::path("questions"))
        .and(warp::path::end())
        .and(warp::query())
        .and(session.clone())
        .and(store_filter.clone())
        .and_then(routes::question::get_questions);

    let ask_form = warp::get()
        .and(warp::path("questions"))
        .and(warp::path("ask"))
        .and(warp::path::end())
        .and(auth.clone())
        .and_then(routes::question::ask_form);

    let add_question = warp::post()
        .and(warp::path("questions"))
        .and(warp::path("ask"))
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::question::add_question);

    let get_question = warp::get()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(session.clone())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .and(store_filter.clone())
        .and_then(routes::question::get_question);

    let get_tagged_questions = warp::get()
        .and(warp::path("questions"))
        .and(warp::path("tagged"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::query())
        .and(session.clone())
        .and(store_filter.clone())
        .and_then(routes::question::get_tagged_questions);

    let edit_question_form = warp::get()
        .and(warp::path("edit"))
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::question::edit_question_form);

    let update_question = warp::post()
        .and(warp::path("edit"))
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::question::update_question);

    let delete_question_form = warp::get()
        .and(warp::path("delete"))
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::question::delete_question_form);

    let delete_question = warp::post()
        .and(warp::path("delete"))
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::question::delete_question);

    let add_answer = warp::post()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path("answers"))
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::answer::add_answer);

    let edit_answer_form = warp::get()
        .and(warp::path("edit"))
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::answer::edit_answer_form);

    let update_answer = warp::post()
        .and(warp::path("edit"))
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::answer::update_answer);

    let delete_answer_form = warp::get()
        .and(warp::path("delete"))
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::answer::delete_answer_form);

    let delete_answer = warp::post()
        .and(warp::path("delete"))
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and_then(routes::answer::delete_answer);

    let vote_question = warp::post()
        .and(warp::path("questions"))
        .and(warp::path::param::<i32>())
        .and(warp::path("vote"))
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::vote::vote_question);

    let vote_answer = warp::post()
        .and(warp::path("answers"))
        .and(warp::path::param::<i32>())
        .and(warp::path("vote"))
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(form())
        .and_then(routes::vote::vote_answer);

    let get_tags = warp::get()
        .and(warp::path("tags"))
        .and(warp::path::end())
        .and(warp::query())
        .and(session.clone())
        .and(store_filter.clone())
        .and_then(routes::tag::get_tags);

    let signup_form = warp::get()
        .and(warp::path("accounts"))
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(session.clone())
        .and_then(routes::authentication::signup_form);

    let registration = warp::post()
        .and(warp::path("accounts"))
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and(form())
        .and_then(routes::authentication::register);

    let login_form = warp::get()
        .and(warp::path("accounts"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(session.clone())
        .and_then(routes::authentication::login_form);

    let login = warp::post()
        .and(warp::path("accounts"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and(form())
        .and_then(routes::authentication::login);

    let logout = warp::post()
        .and(warp::path("accounts"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(settings_filter.clone())
        .and_then(routes::authentication::logout);

    let profile = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::query())
        .and(session.clone())
        .and(store_filter.clone())
        .and_then(routes::profile::profile);

    let settings_form = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<String>())
        .and(warp::path("settings"))
        .and(warp::path::end())
        .and(auth.clone())
        .and_then(routes::authentication::settings_form);

    let change_password = warp::post()
        .and(warp::path("users"))
        .and(warp::path::param::<String>())
        .and(warp::path("settings"))
        .and(warp::path::end())
        .and(auth.clone())
        .and(store_filter.clone())
        .and(settings_filter.clone())
        .and(form())
        .and_then(routes::authentication::change_password);

    let delete_account_form = warp::get()
        .and(warp::path("delete"))
        .and(warp::path("user"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(auth.clone())
        .and_then(routes::authentication::delete_account_form);

    let delete_account = warp::post()
        .and(warp::path("delete"))
        .and(warp::path("user"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(auth)
        .and(store_filter)
        .and(settings_filter)
        .and_then(routes::authentication::delete_account);

    let questions = index
        .or(get_questions)
        .or(ask_form)
        .or(add_question)
        .or(get_question)
        .or(get_tagged_questions)
        .or(edit_question_form)
        .or(update_question)
        .or(delete_question_form)
        .or(delete_question)
        .or(vote_question)
        .with(warp::trace(request_span));

    let answers = add_answer
        .or(edit_answer_form)
        .or(update_answer)
        .or(delete_answer_form)
        .or(delete_answer)
        .or(vote_answer)
        .with(warp::trace(request_span));

    let accounts = signup_form
        .or(registration)
        .or(login_form)
        .or(login)
        .or(logout)
        .or(profile)
        .or(settings_form)
        .or(change_password)
        .or(delete_account_form)
        .or(delete_account)
        .with(warp::trace(request_span));

    questions
        .or(answers)
        .or(accounts)
        .or(get_tags.with(warp::trace(request_span)))
        .with(cors)
        .with(warp::trace::request())
        .recover(return_error)
}

/// Connects to the database and brings the schema up to date.
pub async fn setup_store(config: &Config) -> Result<Store, Error> {
    let store = Store::new(&config.database_url, config.db_max_connections).await?;
    store.migrate().await?;
    tracing::info!("database migrated");
    Ok(store)
}

pub async fn run(config: Config, store: Store) {
    let routes = build_routes(store, config.session_settings());
    tracing::info!(port = config.port, "Q&A service started");
    warp::serve(routes).run(([127, 0, 0, 1], config.port)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    fn routes() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let store = Store::new_lazy("postgres://localhost:5432/forum").unwrap();
        build_routes(
            store,
            SessionSettings {
                key: "RANDOM WORDS WINTER MACINTOSH PC".as_bytes().to_vec(),
                lifetime_hours: 24,
                secure_cookie: false,
            },
        )
    }

    #[tokio::test]
    async fn ask_form_needs_login() {
        let res = warp::test::request()
            .method("GET")
            .path("/questions/ask")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/accounts/login");
    }

    #[tokio::test]
    async fn anonymous_vote_is_sent_to_login() {
        let res = warp::test::request()
            .method("POST")
            .path("/questions/1/vote")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("direction=up")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/accounts/login");
    }

    #[tokio::test]
    async fn login_page_renders() {
        let res = warp::test::request()
            .method("GET")
            .path("/accounts/login")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(res.body());
        assert!(body.contains("action=\"/accounts/login\""));
    }

    #[tokio::test]
    async fn logout_clears_the_cookie() {
        let res = warp::test::request()
            .method("POST")
            .path("/accounts/logout")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let cookie = res.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn malformed_session_cookie_is_ignored() {
        let res = warp::test::request()
            .method("GET")
            .path("/accounts/login")
            .header("cookie", "session=v2.local.nonsense")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(res.body());
        assert!(body.contains("action=\"/accounts/login\""));
    }

    #[tokio::test]
    async fn unknown_page_is_not_found() {
        let res = warp::test::request()
            .method("GET")
            .path("/no/such/page")
            .reply(&routes())
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
