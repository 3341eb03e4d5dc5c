use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{Level, event, instrument};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use handle_errors::Error;

use crate::store::Store;
use crate::types::{
    account::{Session, ensure_author},
    answer::AnswerForm,
    listing::{QuestionTab, TagTab},
    pagination::{Pagination, extract_pagination},
    question::{QuestionForm, QuestionId},
    view::{Viewer, client_address},
    vote::{Direction, VoteTarget},
};
use crate::views::{
    ConfirmDeletePage, IndexPage, QuestionFormPage, QuestionPage, QuestionsPage, TabLink,
    form_errors, redirect_to, render, render_with_status,
};

const HOME_QUESTIONS: i64 = 10;
const HOME_TAGS: i64 = 10;

#[instrument(skip(store))]
pub async fn index(session: Option<Session>, store: Store) -> Result<Response, Rejection> {
    let newest = Pagination {
        limit: Some(HOME_QUESTIONS),
        offset: 0,
    };
    let questions = store
        .get_questions(QuestionTab::Newest, None, &newest)
        .await?;
    let tags = store.get_tags(TagTab::Popular, None, Some(HOME_TAGS)).await?;

    Ok(render(&IndexPage {
        session,
        questions,
        tags,
    })?)
}

#[instrument(skip(store))]
pub async fn get_questions(
    params: HashMap<String, String>,
    session: Option<Session>,
    store: Store,
) -> Result<Response, Rejection> {
    event!(target: "forum", Level::INFO, "querying questions");
    let tab = QuestionTab::from_param(params.get("tab").map(String::as_str));
    let pagination = extract_pagination(&params)?;

    let questions = match store.get_questions(tab, None, &pagination).await {
        Ok(res) => res,
        Err(e) => return Err(warp::reject::custom(e)),
    };

    Ok(render(&QuestionsPage {
        session,
        heading: "All questions".to_string(),
        tag: None,
        tabs: TabLink::bar(&QuestionTab::ALL, tab, QuestionTab::as_str, "/questions"),
        questions,
    })?)
}

#[instrument(skip(store))]
pub async fn get_tagged_questions(
    name: String,
    params: HashMap<String, String>,
    session: Option<Session>,
    store: Store,
) -> Result<Response, Rejection> {
    let tag = store.get_tag_by_name(&name).await?;
    let tab = QuestionTab::from_param(params.get("tab").map(String::as_str));
    let pagination = extract_pagination(&params)?;
    let questions = store.get_questions(tab, Some(tag.id), &pagination).await?;

    Ok(render(&QuestionsPage {
        session,
        heading: format!("Questions tagged [{}]", tag.name),
        tabs: TabLink::bar(
            &QuestionTab::ALL,
            tab,
            QuestionTab::as_str,
            &format!("/questions/tagged/{}", tag.name),
        ),
        tag: Some(tag),
        questions,
    })?)
}

/// Everything the question page shows, with `answer` prefilled in the answer form.
pub(crate) async fn question_page(
    store: &Store,
    session: Option<Session>,
    question_id: QuestionId,
    answer: AnswerForm,
    errors: Vec<String>,
) -> Result<QuestionPage, Error> {
    let question = store.get_question(question_id).await?;
    let viewer = session.as_ref().map(|s| s.account_id);
    let target = VoteTarget::Question(question_id);

    let score = store.get_score(target).await?;
    let vote = match viewer {
        Some(account_id) => store.get_vote(account_id, target).await?,
        None => None,
    };
    let answers = store.get_answers(question_id, viewer).await?;

    Ok(QuestionPage {
        is_author: viewer == Some(question.account_id),
        upvoted: vote == Some(Direction::Up),
        downvoted: vote == Some(Direction::Down),
        session,
        question,
        score,
        answers,
        answer,
        errors,
    })
}

#[instrument(skip(store))]
pub async fn get_question(
    id: i32,
    session: Option<Session>,
    forwarded_for: Option<String>,
    remote: Option<SocketAddr>,
    store: Store,
) -> Result<Response, Rejection> {
    let question_id = QuestionId(id);
    let page = question_page(&store, session, question_id, AnswerForm::default(), Vec::new()).await?;

    let address = client_address(
        forwarded_for.as_deref(),
        remote.map(|addr| addr.ip().to_string()),
    );
    let account = page.session.as_ref().map(|s| s.account_id);
    if let Some(viewer) = Viewer::identify(account, address) {
        match store.record_view(question_id, &viewer).await {
            Ok(true) => event!(Level::DEBUG, question_id = id, "view recorded"),
            Ok(false) => {}
            Err(e) => event!(Level::WARN, question_id = id, "Cannot record view: {}", e),
        }
    }

    Ok(render(&page)?)
}

pub async fn ask_form(session: Session) -> Result<Response, Rejection> {
    Ok(render(&QuestionFormPage {
        session: Some(session),
        heading: "Ask a question",
        action: "/questions/ask".to_string(),
        form: QuestionForm::default(),
        errors: Vec::new(),
    })?)
}

#[instrument(skip(store))]
pub async fn add_question(
    session: Session,
    store: Store,
    form: QuestionForm,
) -> Result<Response, Rejection> {
    match form.validate() {
        Ok(new_question) => {
            let question_id = store.add_question(new_question, session.account_id).await?;
            Ok(redirect_to(format!("/questions/{}", question_id)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(render_with_status(
                &QuestionFormPage {
                    session: Some(session),
                    heading: "Ask a question",
                    action: "/questions/ask".to_string(),
                    form,
                    errors,
                },
                StatusCode::BAD_REQUEST,
            )?)
        }
    }
}

#[instrument(skip(store))]
pub async fn edit_question_form(
    id: i32,
    session: Session,
    store: Store,
) -> Result<Response, Rejection> {
    let question = store.get_question(QuestionId(id)).await?;
    ensure_author(question.account_id, session.account_id)?;

    Ok(render(&QuestionFormPage {
        session: Some(session),
        heading: "Edit question",
        action: format!("/edit/questions/{}", id),
        form: question.to_form(),
        errors: Vec::new(),
    })?)
}

#[instrument(skip(store))]
pub async fn update_question(
    id: i32,
    session: Session,
    store: Store,
    form: QuestionForm,
) -> Result<Response, Rejection> {
    let question_id = QuestionId(id);
    let question = store.get_question(question_id).await?;
    ensure_author(question.account_id, session.account_id)?;

    match form.validate() {
        Ok(changed) => {
            store
                .update_question(question_id, changed, session.account_id)
                .await?;
            Ok(redirect_to(format!("/questions/{}", id)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(render_with_status(
                &QuestionFormPage {
                    session: Some(session),
                    heading: "Edit question",
                    action: format!("/edit/questions/{}", id),
                    form,
                    errors,
                },
                StatusCode::BAD_REQUEST,
            )?)
        }
    }
}

#[instrument(skip(store))]
pub async fn delete_question_form(
    id: i32,
    session: Session,
    store: Store,
) -> Result<Response, Rejection> {
    let question = store.get_question(QuestionId(id)).await?;
    ensure_author(question.account_id, session.account_id)?;

    Ok(render(&ConfirmDeletePage {
        session: Some(session),
        kind: "question",
        summary: question.title,
        action: format!("/delete/questions/{}", id),
        cancel: format!("/questions/{}", id),
    })?)
}

#[instrument(skip(store))]
pub async fn delete_question(id: i32, session: Session, store: Store) -> Result<Response, Rejection> {
    match store.delete_question(QuestionId(id), session.account_id).await {
        Ok(_) => Ok(redirect_to("/questions")),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
