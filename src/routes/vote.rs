use tracing::instrument;
use warp::Rejection;
use warp::reply::Response;

use crate::store::Store;
use crate::types::{
    account::Session,
    answer::AnswerId,
    question::QuestionId,
    vote::{VoteForm, VoteTarget},
};
use crate::views::redirect_to;

#[instrument(skip(store))]
pub async fn vote_question(
    id: i32,
    session: Session,
    store: Store,
    form: VoteForm,
) -> Result<Response, Rejection> {
    let question_id = QuestionId(id);
    store
        .cast_vote(
            session.account_id,
            VoteTarget::Question(question_id),
            form.direction,
        )
        .await?;
    Ok(redirect_to(format!("/questions/{}", question_id)))
}

#[instrument(skip(store))]
pub async fn vote_answer(
    id: i32,
    session: Session,
    store: Store,
    form: VoteForm,
) -> Result<Response, Rejection> {
    let answer_id = AnswerId(id);
    store
        .cast_vote(session.account_id, VoteTarget::Answer(answer_id), form.direction)
        .await?;
    let answer = store.get_answer(answer_id).await?;
    Ok(redirect_to(format!("/questions/{}", answer.question_id)))
}
