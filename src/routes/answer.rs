use tracing::{Level, event, instrument};
use warp::Rejection;
use warp::http::StatusCode;
use warp::reply::Response;

use crate::routes::question::question_page;
use crate::store::Store;
use crate::types::{
    account::{Session, ensure_author},
    answer::{AnswerForm, AnswerId},
    question::QuestionId,
};
use crate::views::{
    AnswerFormPage, ConfirmDeletePage, form_errors, redirect_to, render, render_with_status,
};

/// Posts an answer; an empty one re-renders the question page with the message.
#[instrument(skip(store))]
pub async fn add_answer(
    id: i32,
    session: Session,
    store: Store,
    form: AnswerForm,
) -> Result<Response, Rejection> {
    let question_id = QuestionId(id);
    match form.validate() {
        Ok(content) => {
            let answer_id = store
                .add_answer(question_id, &content, session.account_id)
                .await?;
            event!(Level::INFO, answer_id = answer_id.0, question_id = id, "answer added");
            Ok(redirect_to(format!("/questions/{}", question_id)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            let page = question_page(&store, Some(session), question_id, form, errors).await?;
            Ok(render_with_status(&page, StatusCode::BAD_REQUEST)?)
        }
    }
}

#[instrument(skip(store))]
pub async fn edit_answer_form(
    id: i32,
    session: Session,
    store: Store,
) -> Result<Response, Rejection> {
    let answer = store.get_answer(AnswerId(id)).await?;
    ensure_author(answer.account_id, session.account_id)?;

    Ok(render(&AnswerFormPage {
        session: Some(session),
        action: format!("/edit/answers/{}", id),
        back: format!("/questions/{}", answer.question_id),
        form: AnswerForm {
            content: answer.content,
        },
        errors: Vec::new(),
    })?)
}

#[instrument(skip(store))]
pub async fn update_answer(
    id: i32,
    session: Session,
    store: Store,
    form: AnswerForm,
) -> Result<Response, Rejection> {
    let answer_id = AnswerId(id);
    let answer = store.get_answer(answer_id).await?;
    ensure_author(answer.account_id, session.account_id)?;

    match form.validate() {
        Ok(content) => {
            let question_id = store
                .update_answer(answer_id, &content, session.account_id)
                .await?;
            Ok(redirect_to(format!("/questions/{}", question_id)))
        }
        Err(e) => {
            let errors = form_errors(e)?;
            Ok(render_with_status(
                &AnswerFormPage {
                    session: Some(session),
                    action: format!("/edit/answers/{}", id),
                    back: format!("/questions/{}", answer.question_id),
                    form,
                    errors,
                },
                StatusCode::BAD_REQUEST,
            )?)
        }
    }
}

#[instrument(skip(store))]
pub async fn delete_answer_form(
    id: i32,
    session: Session,
    store: Store,
) -> Result<Response, Rejection> {
    let answer = store.get_answer(AnswerId(id)).await?;
    ensure_author(answer.account_id, session.account_id)?;

    Ok(render(&ConfirmDeletePage {
        session: Some(session),
        kind: "answer",
        summary: answer.excerpt(),
        action: format!("/delete/answers/{}", id),
        cancel: format!("/questions/{}", answer.question_id),
    })?)
}

#[instrument(skip(store))]
pub async fn delete_answer(id: i32, session: Session, store: Store) -> Result<Response, Rejection> {
    match store.delete_answer(AnswerId(id), session.account_id).await {
        Ok(question_id) => Ok(redirect_to(format!("/questions/{}", question_id))),
        Err(e) => Err(warp::reject::custom(e)),
    }
}
