use chrono::{DateTime, Utc};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Row, Transaction};

use handle_errors::Error;

use super::{Store, db_error};
use crate::types::{
    account::{AccountId, ensure_author},
    listing::QuestionTab,
    pagination::Pagination,
    question::{NewQuestion, Question, QuestionId, QuestionSummary},
    tag::TagId,
    view::{Viewer, should_record_view},
};

const QUESTION_COLUMNS: &str = "q.id, q.title, q.content, q.account_id, q.created_on, q.updated_on, \
     a.username, \
     COALESCE((SELECT ARRAY_AGG(t.name::TEXT ORDER BY t.name) FROM question_tags qt \
     JOIN tags t ON t.id = qt.tag_id WHERE qt.question_id = q.id), '{}'::TEXT[]) AS tags";

fn question_from_row(row: PgRow) -> Question {
    Question {
        id: QuestionId(row.get("id")),
        title: row.get("title"),
        content: row.get("content"),
        tags: row.get("tags"),
        account_id: AccountId(row.get("account_id")),
        author: row.get("username"),
        created_on: row.get("created_on"),
        updated_on: row.get("updated_on"),
    }
}

impl Store {
    pub async fn get_questions(
        &self,
        tab: QuestionTab,
        tag_id: Option<TagId>,
        pagination: &Pagination,
    ) -> Result<Vec<QuestionSummary>, Error> {
        let sql = format!(
            "SELECT {},
                (SELECT COALESCE(SUM(v.value), 0) FROM question_votes v WHERE v.question_id = q.id) AS score,
                (SELECT COUNT(*) FROM answers an WHERE an.question_id = q.id) AS answer_count,
                (SELECT COUNT(*) FROM question_views w WHERE w.question_id = q.id) AS view_count
            FROM questions q JOIN accounts a ON a.id = q.account_id
            WHERE ($1::INTEGER IS NULL OR EXISTS (
                SELECT 1 FROM question_tags ft WHERE ft.question_id = q.id AND ft.tag_id = $1))
            {}
            ORDER BY {}
            LIMIT $2 OFFSET $3",
            QUESTION_COLUMNS,
            tab.condition(),
            tab.order_by()
        );

        match sqlx::query(&sql)
            .bind(tag_id.map(|id| id.0))
            .bind(pagination.limit)
            .bind(pagination.offset)
            .map(|row: PgRow| QuestionSummary {
                id: QuestionId(row.get("id")),
                title: row.get("title"),
                author: row.get("username"),
                tags: row.get("tags"),
                score: row.get("score"),
                answer_count: row.get("answer_count"),
                view_count: row.get("view_count"),
                created_on: row.get("created_on"),
            })
            .fetch_all(&self.connection)
            .await
        {
            Ok(questions) => Ok(questions),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn get_question(&self, question_id: QuestionId) -> Result<Question, Error> {
        let sql = format!(
            "SELECT {} FROM questions q JOIN accounts a ON a.id = q.account_id WHERE q.id = $1",
            QUESTION_COLUMNS
        );

        match sqlx::query(&sql)
            .bind(question_id.0)
            .map(question_from_row)
            .fetch_optional(&self.connection)
            .await
        {
            Ok(Some(question)) => Ok(question),
            Ok(None) => Err(Error::NotFound("Question")),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn add_question(
        &self,
        new_question: NewQuestion,
        account_id: AccountId,
    ) -> Result<QuestionId, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;

        let question_id = sqlx::query(
            "INSERT INTO questions (title, content, account_id)
            VALUES ($1, $2, $3)
            RETURNING id",
        )
        .bind(&new_question.title)
        .bind(&new_question.content)
        .bind(account_id.0)
        .map(|row: PgRow| QuestionId(row.get("id")))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        Store::attach_tags(&mut tx, question_id, &new_question.tags).await?;
        tx.commit().await.map_err(db_error)?;

        tracing::event!(
            tracing::Level::INFO,
            question_id = question_id.0,
            account_id = account_id.0,
            "question added"
        );
        Ok(question_id)
    }

    /// Replaces title, content and tags. Only the author may do this.
    pub async fn update_question(
        &self,
        question_id: QuestionId,
        question: NewQuestion,
        account_id: AccountId,
    ) -> Result<(), Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let author = Store::lock_question(&mut tx, question_id).await?;
        ensure_author(author, account_id)?;

        sqlx::query(
            "UPDATE questions
            SET title = $1, content = $2, updated_on = NOW()
            WHERE id = $3",
        )
        .bind(&question.title)
        .bind(&question.content)
        .bind(question_id.0)
        .execute(&mut tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM question_tags WHERE question_id = $1")
            .bind(question_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;
        Store::attach_tags(&mut tx, question_id, &question.tags).await?;

        tx.commit().await.map_err(db_error)
    }

    /// Deletes the question; answers, votes, tag links and views cascade.
    pub async fn delete_question(
        &self,
        question_id: QuestionId,
        account_id: AccountId,
    ) -> Result<(), Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let author = Store::lock_question(&mut tx, question_id).await?;
        ensure_author(author, account_id)?;

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        tracing::event!(
            tracing::Level::INFO,
            question_id = question_id.0,
            "question deleted"
        );
        Ok(())
    }

    /// Records a visit unless the same viewer was here within the view window.
    /// Records a view unless the same viewer saw the question inside the window.
    /// Concurrent visits to one question are serialized by a transaction-scoped advisory lock.
    pub async fn record_view(&self, question_id: QuestionId, viewer: &Viewer) -> Result<bool, Error> {
        let (column, account_id, address) = match viewer {
            Viewer::Account(id) => ("account_id", Some(id.0), None),
            Viewer::Address(address) => ("ip_address", None, Some(address.as_str())),
        };
        let sql = format!(
            "SELECT MAX(viewed_on) AS last_view FROM question_views
            WHERE question_id = $1 AND {} = $2",
            column
        );

        let mut tx = self.connection.begin().await.map_err(db_error)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(i64::from(question_id.0))
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        let last_view = match viewer {
            Viewer::Account(id) => sqlx::query(&sql).bind(question_id.0).bind(id.0),
            Viewer::Address(address) => sqlx::query(&sql).bind(question_id.0).bind(address.as_str()),
        }
        .map(|row: PgRow| row.get::<Option<DateTime<Utc>>, _>("last_view"))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        if !should_record_view(last_view, Utc::now()) {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO question_views (question_id, account_id, ip_address)
            VALUES ($1, $2, $3)",
        )
        .bind(question_id.0)
        .bind(account_id)
        .bind(address)
        .execute(&mut tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }

    /// Locks the question row for the rest of the transaction and returns its author.
    async fn lock_question(
        tx: &mut Transaction<'_, Postgres>,
        question_id: QuestionId,
    ) -> Result<AccountId, Error> {
        sqlx::query("SELECT account_id FROM questions WHERE id = $1 FOR UPDATE")
            .bind(question_id.0)
            .map(|row: PgRow| AccountId(row.get("account_id")))
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or(Error::NotFound("Question"))
    }
}
