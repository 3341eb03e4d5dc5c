//! Server-rendered pages and the reply helpers handlers use to send them.

use askama::Template;
use chrono::{DateTime, Utc};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use handle_errors::Error;

use crate::types::{
    account::Session,
    answer::{AnswerForm, AnswerView},
    listing::Activity,
    question::{Question, QuestionForm, QuestionSummary},
    tag::Tag,
};

pub fn render<T: Template>(page: &T) -> Result<Response, Error> {
    render_with_status(page, StatusCode::OK)
}

pub fn render_with_status<T: Template>(page: &T, status: StatusCode) -> Result<Response, Error> {
    let body = page.render().map_err(Error::TemplateError)?;
    Ok(warp::reply::with_status(warp::reply::html(body), status).into_response())
}

/// `303 See Other`, so the browser follows up with a GET.
pub fn redirect_to(location: impl Into<String>) -> Response {
    warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        "location",
        location.into(),
    )
    .into_response()
}

/// Splits validation messages, which a form shows inline, from every other error.
pub fn form_errors(error: Error) -> Result<Vec<String>, Rejection> {
    match error {
        Error::Validation(messages) => Ok(messages),
        e => Err(warp::reject::custom(e)),
    }
}

/// A link in the tab bar of a listing page.
#[derive(Debug, Clone)]
pub struct TabLink {
    pub name: &'static str,
    pub href: String,
    pub active: bool,
}

impl TabLink {
    pub fn bar<T: Copy + PartialEq>(
        all: &[T],
        current: T,
        name: fn(T) -> &'static str,
        base_path: &str,
    ) -> Vec<TabLink> {
        all.iter()
            .map(|&tab| TabLink {
                name: name(tab),
                href: format!("{}?tab={}", base_path, name(tab)),
                active: tab == current,
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub session: Option<Session>,
    pub questions: Vec<QuestionSummary>,
    pub tags: Vec<Tag>,
}

#[derive(Template)]
#[template(path = "questions.html")]
pub struct QuestionsPage {
    pub session: Option<Session>,
    pub heading: String,
    pub tag: Option<Tag>,
    pub tabs: Vec<TabLink>,
    pub questions: Vec<QuestionSummary>,
}

#[derive(Template)]
#[template(path = "question.html")]
pub struct QuestionPage {
    pub session: Option<Session>,
    pub question: Question,
    pub score: i64,
    pub upvoted: bool,
    pub downvoted: bool,
    pub is_author: bool,
    pub answers: Vec<AnswerView>,
    pub answer: AnswerForm,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "question_form.html")]
pub struct QuestionFormPage {
    pub session: Option<Session>,
    pub heading: &'static str,
    pub action: String,
    pub form: QuestionForm,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "answer_form.html")]
pub struct AnswerFormPage {
    pub session: Option<Session>,
    pub action: String,
    pub back: String,
    pub form: AnswerForm,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeletePage {
    pub session: Option<Session>,
    pub kind: &'static str,
    pub summary: String,
    pub action: String,
    pub cancel: String,
}

#[derive(Template)]
#[template(path = "tags.html")]
pub struct TagsPage {
    pub session: Option<Session>,
    pub tabs: Vec<TabLink>,
    pub query: String,
    pub tags: Vec<Tag>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupPage {
    pub session: Option<Session>,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub session: Option<Session>,
    pub username: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub session: Option<Session>,
    pub username: String,
    pub joined: DateTime<Utc>,
    pub is_owner: bool,
    pub tabs: Vec<TabLink>,
    pub items: Vec<Activity>,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsPage {
    pub session: Option<Session>,
    pub username: String,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::listing::QuestionTab;

    #[test]
    fn tab_bar_marks_the_current_tab() {
        let tabs = TabLink::bar(
            &QuestionTab::ALL,
            QuestionTab::Popular,
            QuestionTab::as_str,
            "/questions",
        );
        let active: Vec<_> = tabs.iter().filter(|t| t.active).map(|t| t.name).collect();
        assert_eq!(active, vec!["popular"]);
        assert_eq!(tabs[0].href, "/questions?tab=newest");
    }

    #[test]
    fn redirect_is_see_other() {
        let res = redirect_to("/questions/7");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()["location"], "/questions/7");
    }

    #[test]
    fn login_page_shows_the_error() {
        let page = LoginPage {
            session: None,
            username: "ada".to_string(),
            error: Error::WrongPassword.to_string(),
        };
        let res = render_with_status(&page, StatusCode::UNAUTHORIZED).unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = page.render().unwrap();
        assert!(body.contains("The password you entered is incorrect."));
    }

    #[test]
    fn non_validation_errors_are_rejected() {
        assert_eq!(
            form_errors(Error::validation("Your answer is empty.")).unwrap(),
            vec!["Your answer is empty."]
        );
        assert!(form_errors(Error::Forbidden).is_err());
    }
}
