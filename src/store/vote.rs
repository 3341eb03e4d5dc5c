use sqlx::Row;
use sqlx::postgres::PgRow;

use handle_errors::Error;

use super::{Store, db_error};
use crate::types::{
    account::AccountId,
    vote::{Direction, VoteChange, VoteTarget, resolve, score_delta},
};

impl Store {
    /// Applies a vote and returns the target's new score.
    ///
    /// Runs in one transaction: the voter's existing vote row is locked, the
    /// change decided by [`resolve`] is written, and the score is re-summed.
    pub async fn cast_vote(
        &self,
        account_id: AccountId,
        target: VoteTarget,
        direction: Direction,
    ) -> Result<i64, Error> {
        let mut tx = self.connection.begin().await.map_err(db_error)?;

        let exists_sql = format!("SELECT id FROM {} WHERE id = $1 FOR SHARE", target.target_table());
        let exists = sqlx::query(&exists_sql)
            .bind(target.id())
            .fetch_optional(&mut tx)
            .await
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(Error::NotFound(target.kind()));
        }

        let existing_sql = format!(
            "SELECT value FROM {} WHERE account_id = $1 AND {} = $2 FOR UPDATE",
            target.vote_table(),
            target.column()
        );
        let existing = sqlx::query(&existing_sql)
            .bind(account_id.0)
            .bind(target.id())
            .map(|row: PgRow| row.get::<i16, _>("value"))
            .fetch_optional(&mut tx)
            .await
            .map_err(db_error)?
            .and_then(Direction::from_value);

        let change = resolve(existing, direction);
        let sql = match change {
            VoteChange::Insert(_) => format!(
                "INSERT INTO {table} (account_id, {column}, value) VALUES ($1, $2, $3)
                ON CONFLICT (account_id, {column}) DO UPDATE SET value = EXCLUDED.value",
                table = target.vote_table(),
                column = target.column()
            ),
            VoteChange::Flip(_) => format!(
                "UPDATE {} SET value = $3 WHERE account_id = $1 AND {} = $2",
                target.vote_table(),
                target.column()
            ),
            VoteChange::Remove => format!(
                "DELETE FROM {} WHERE account_id = $1 AND {} = $2",
                target.vote_table(),
                target.column()
            ),
        };
        let query = sqlx::query(&sql).bind(account_id.0).bind(target.id());
        let query = match change {
            VoteChange::Insert(d) | VoteChange::Flip(d) => query.bind(d.value()),
            VoteChange::Remove => query,
        };
        query.execute(&mut tx).await.map_err(db_error)?;

        let score_sql = format!(
            "SELECT COALESCE(SUM(value), 0) AS score FROM {} WHERE {} = $1",
            target.vote_table(),
            target.column()
        );
        let score = sqlx::query(&score_sql)
            .bind(target.id())
            .map(|row: PgRow| row.get::<i64, _>("score"))
            .fetch_one(&mut tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        tracing::event!(
            tracing::Level::INFO,
            account_id = account_id.0,
            target = ?target,
            change = ?change,
            delta = score_delta(existing, change),
            score,
            "vote cast"
        );
        Ok(score)
    }

    pub async fn get_score(&self, target: VoteTarget) -> Result<i64, Error> {
        let sql = format!(
            "SELECT COALESCE(SUM(value), 0) AS score FROM {} WHERE {} = $1",
            target.vote_table(),
            target.column()
        );

        match sqlx::query(&sql)
            .bind(target.id())
            .map(|row: PgRow| row.get::<i64, _>("score"))
            .fetch_one(&self.connection)
            .await
        {
            Ok(score) => Ok(score),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn get_vote(
        &self,
        account_id: AccountId,
        target: VoteTarget,
    ) -> Result<Option<Direction>, Error> {
        let sql = format!(
            "SELECT value FROM {} WHERE account_id = $1 AND {} = $2",
            target.vote_table(),
            target.column()
        );

        match sqlx::query(&sql)
            .bind(account_id.0)
            .bind(target.id())
            .map(|row: PgRow| row.get::<i16, _>("value"))
            .fetch_optional(&self.connection)
            .await
        {
            Ok(value) => Ok(value.and_then(Direction::from_value)),
            Err(error) => Err(db_error(error)),
        }
    }

    /// Number of vote rows for the target; at most one per voter.
    pub async fn count_votes(&self, target: VoteTarget) -> Result<i64, Error> {
        let sql = format!(
            "SELECT COUNT(*) AS votes FROM {} WHERE {} = $1",
            target.vote_table(),
            target.column()
        );

        sqlx::query(&sql)
            .bind(target.id())
            .map(|row: PgRow| row.get::<i64, _>("votes"))
            .fetch_one(&self.connection)
            .await
            .map_err(db_error)
    }
}
