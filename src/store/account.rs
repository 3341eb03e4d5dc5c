use sqlx::Row;
use sqlx::postgres::PgRow;

use handle_errors::{Error, is_unique_violation};

use super::{Store, db_error};
use crate::types::{
    account::{Account, AccountId},
    answer::excerpt,
    listing::{Activity, ActivityKind, ProfileTab},
    question::QuestionId,
};

const QUESTION_ACTIVITY: &str = "SELECT 'question' AS kind, q.id AS question_id, q.title, \
     q.content AS body, q.created_on, \
     (SELECT COALESCE(SUM(v.value), 0) FROM question_votes v WHERE v.question_id = q.id) AS score \
     FROM questions q";

const ANSWER_ACTIVITY: &str = "SELECT 'answer' AS kind, a.question_id, q.title, \
     a.content AS body, a.created_on, \
     (SELECT COALESCE(SUM(v.value), 0) FROM answer_votes v WHERE v.answer_id = a.id) AS score \
     FROM answers a JOIN questions q ON q.id = a.question_id";

/// What an account deletion removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeletedContent {
    pub questions: u64,
    pub answers: u64,
    pub votes: u64,
}

fn account_from_row(row: PgRow) -> Account {
    Account {
        id: AccountId(row.get("id")),
        username: row.get("username"),
        password: row.get("password"),
        created_on: row.get("created_on"),
    }
}

impl Store {
    /// Stores a new account. `password` must already be hashed.
    pub async fn add_account(&self, username: &str, password: &str) -> Result<Account, Error> {
        if self.get_account_by_username(username).await?.is_some() {
            return Err(Error::validation("A user with that username already exists."));
        }

        match sqlx::query(
            "INSERT INTO accounts (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_on",
        )
        .bind(username)
        .bind(password)
        .map(account_from_row)
        .fetch_one(&self.connection)
        .await
        {
            Ok(account) => Ok(account),
            // lost a race against a concurrent sign-up with the same name
            Err(error) if is_unique_violation(&error) => {
                tracing::event!(tracing::Level::WARN, username, "duplicate username");
                Err(Error::validation("A user with that username already exists."))
            }
            Err(error) => Err(db_error(error)),
        }
    }

    /// Usernames are matched case-insensitively.
    pub async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, Error> {
        match sqlx::query(
            "SELECT id, username, password, created_on
            FROM accounts WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .map(account_from_row)
        .fetch_optional(&self.connection)
        .await
        {
            Ok(account) => Ok(account),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, Error> {
        match sqlx::query("SELECT id, username, password, created_on FROM accounts WHERE id = $1")
            .bind(account_id.0)
            .map(account_from_row)
            .fetch_optional(&self.connection)
            .await
        {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(Error::NotFound("User")),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn update_password(&self, account_id: AccountId, password: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE accounts SET password = $1 WHERE id = $2")
            .bind(password)
            .bind(account_id.0)
            .execute(&self.connection)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User"));
        }
        Ok(())
    }

    /// Removes the account together with everything it authored, all or nothing.
    /// Views the account left behind stay, detached from it.
    pub async fn delete_account(&self, account_id: AccountId) -> Result<DeletedContent, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;
        let mut deleted = DeletedContent::default();

        for table in ["question_votes", "answer_votes"] {
            let sql = format!("DELETE FROM {} WHERE account_id = $1", table);
            deleted.votes += sqlx::query(&sql)
                .bind(account_id.0)
                .execute(&mut tx)
                .await
                .map_err(db_error)?
                .rows_affected();
        }

        deleted.answers = sqlx::query("DELETE FROM answers WHERE account_id = $1")
            .bind(account_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        // answers and votes left by others on these questions go with them
        deleted.questions = sqlx::query("DELETE FROM questions WHERE account_id = $1")
            .bind(account_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        let accounts = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if accounts == 0 {
            return Err(Error::NotFound("User"));
        }

        tx.commit().await.map_err(db_error)?;
        tracing::event!(
            tracing::Level::INFO,
            account_id = account_id.0,
            questions = deleted.questions,
            answers = deleted.answers,
            votes = deleted.votes,
            "account deleted"
        );
        Ok(deleted)
    }

    /// Content shown on a profile page, newest first.
    pub async fn get_activity(
        &self,
        account_id: AccountId,
        tab: ProfileTab,
    ) -> Result<Vec<Activity>, Error> {
        let voted = |value: i16| {
            format!(
                "{} WHERE EXISTS (SELECT 1 FROM question_votes uv \
                 WHERE uv.question_id = q.id AND uv.account_id = $1 AND uv.value = {value}) \
                 UNION ALL {} WHERE EXISTS (SELECT 1 FROM answer_votes uv \
                 WHERE uv.answer_id = a.id AND uv.account_id = $1 AND uv.value = {value})",
                QUESTION_ACTIVITY, ANSWER_ACTIVITY
            )
        };
        let selection = match tab {
            ProfileTab::Overview => format!(
                "{} WHERE q.account_id = $1 UNION ALL {} WHERE a.account_id = $1",
                QUESTION_ACTIVITY, ANSWER_ACTIVITY
            ),
            ProfileTab::Questions => format!("{} WHERE q.account_id = $1", QUESTION_ACTIVITY),
            ProfileTab::Answers => format!("{} WHERE a.account_id = $1", ANSWER_ACTIVITY),
            ProfileTab::Upvoted => voted(1),
            ProfileTab::Downvoted => voted(-1),
        };
        let sql = format!("{} ORDER BY created_on DESC", selection);

        match sqlx::query(&sql)
            .bind(account_id.0)
            .map(|row: PgRow| {
                let kind: String = row.get("kind");
                let body: String = row.get("body");
                Activity {
                    kind: if kind == "question" {
                        ActivityKind::Question
                    } else {
                        ActivityKind::Answer
                    },
                    question_id: QuestionId(row.get("question_id")),
                    title: row.get("title"),
                    excerpt: excerpt(&body),
                    score: row.get("score"),
                    created_on: row.get("created_on"),
                }
            })
            .fetch_all(&self.connection)
            .await
        {
            Ok(activity) => Ok(activity),
            Err(error) => Err(db_error(error)),
        }
    }
}
