use sqlx::Row;
use sqlx::postgres::PgRow;

use handle_errors::Error;

use super::{Store, db_error};
use crate::types::{
    account::{AccountId, ensure_author},
    answer::{Answer, AnswerId, AnswerView},
    question::QuestionId,
    vote::Direction,
};

const ANSWER_COLUMNS: &str = "an.id, an.content, an.question_id, an.account_id, \
     an.created_on, an.updated_on, a.username";

fn answer_from_row(row: &PgRow) -> Answer {
    Answer {
        id: AnswerId(row.get("id")),
        content: row.get("content"),
        question_id: QuestionId(row.get("question_id")),
        account_id: AccountId(row.get("account_id")),
        author: row.get("username"),
        created_on: row.get("created_on"),
        updated_on: row.get("updated_on"),
    }
}

impl Store {
    pub async fn add_answer(
        &self,
        question_id: QuestionId,
        content: &str,
        account_id: AccountId,
    ) -> Result<AnswerId, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;

        let question = sqlx::query("SELECT id FROM questions WHERE id = $1 FOR SHARE")
            .bind(question_id.0)
            .fetch_optional(&mut tx)
            .await
            .map_err(db_error)?;
        if question.is_none() {
            return Err(Error::NotFound("Question"));
        }

        let answer_id = sqlx::query(
            "INSERT INTO answers (content, question_id, account_id)
            VALUES ($1, $2, $3)
            RETURNING id",
        )
        .bind(content)
        .bind(question_id.0)
        .bind(account_id.0)
        .map(|row: PgRow| AnswerId(row.get("id")))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(answer_id)
    }

    pub async fn get_answer(&self, answer_id: AnswerId) -> Result<Answer, Error> {
        let sql = format!(
            "SELECT {} FROM answers an JOIN accounts a ON a.id = an.account_id WHERE an.id = $1",
            ANSWER_COLUMNS
        );

        match sqlx::query(&sql)
            .bind(answer_id.0)
            .map(|row: PgRow| answer_from_row(&row))
            .fetch_optional(&self.connection)
            .await
        {
            Ok(Some(answer)) => Ok(answer),
            Ok(None) => Err(Error::NotFound("Answer")),
            Err(error) => Err(db_error(error)),
        }
    }

    /// Answers of a question, oldest first, with scores and the viewer's own votes.
    pub async fn get_answers(
        &self,
        question_id: QuestionId,
        viewer: Option<AccountId>,
    ) -> Result<Vec<AnswerView>, Error> {
        let sql = format!(
            "SELECT {},
                (SELECT COALESCE(SUM(v.value), 0) FROM answer_votes v WHERE v.answer_id = an.id) AS score,
                (SELECT uv.value FROM answer_votes uv
                    WHERE uv.answer_id = an.id AND uv.account_id = $2) AS viewer_vote
            FROM answers an JOIN accounts a ON a.id = an.account_id
            WHERE an.question_id = $1
            ORDER BY an.created_on ASC, an.id ASC",
            ANSWER_COLUMNS
        );

        match sqlx::query(&sql)
            .bind(question_id.0)
            .bind(viewer.map(|id| id.0))
            .map(|row: PgRow| {
                let answer = answer_from_row(&row);
                AnswerView {
                    by_viewer: viewer == Some(answer.account_id),
                    score: row.get("score"),
                    viewer_vote: row
                        .get::<Option<i16>, _>("viewer_vote")
                        .and_then(Direction::from_value),
                    answer,
                }
            })
            .fetch_all(&self.connection)
            .await
        {
            Ok(answers) => Ok(answers),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn update_answer(
        &self,
        answer_id: AnswerId,
        content: &str,
        account_id: AccountId,
    ) -> Result<QuestionId, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let (author, question_id) = Store::lock_answer(&mut tx, answer_id).await?;
        ensure_author(author, account_id)?;

        sqlx::query("UPDATE answers SET content = $1, updated_on = NOW() WHERE id = $2")
            .bind(content)
            .bind(answer_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(question_id)
    }

    /// Deletes the answer and its votes. Returns the question it belonged to.
    pub async fn delete_answer(
        &self,
        answer_id: AnswerId,
        account_id: AccountId,
    ) -> Result<QuestionId, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let (author, question_id) = Store::lock_answer(&mut tx, answer_id).await?;
        ensure_author(author, account_id)?;

        sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(answer_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        tracing::event!(tracing::Level::INFO, answer_id = answer_id.0, "answer deleted");
        Ok(question_id)
    }

    async fn lock_answer(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        answer_id: AnswerId,
    ) -> Result<(AccountId, QuestionId), Error> {
        sqlx::query("SELECT account_id, question_id FROM answers WHERE id = $1 FOR UPDATE")
            .bind(answer_id.0)
            .map(|row: PgRow| {
                (
                    AccountId(row.get("account_id")),
                    QuestionId(row.get("question_id")),
                )
            })
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or(Error::NotFound("Answer"))
    }
}
