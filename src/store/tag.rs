use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Row, Transaction};

use handle_errors::Error;

use super::{Store, db_error};
use crate::types::{
    listing::TagTab,
    question::QuestionId,
    tag::{Tag, TagId},
};

const TAG_COLUMNS: &str = "t.id, t.name, t.description, t.created_on, \
     (SELECT COUNT(*) FROM question_tags qt WHERE qt.tag_id = t.id) AS question_count";

fn tag_from_row(row: PgRow) -> Tag {
    Tag {
        id: TagId(row.get("id")),
        name: row.get("name"),
        description: row.get("description"),
        created_on: row.get("created_on"),
        question_count: row.get("question_count"),
    }
}

impl Store {
    /// Tags sorted by `tab`, narrowed to names containing `filter` when given.
    pub async fn get_tags(
        &self,
        tab: TagTab,
        filter: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Tag>, Error> {
        let sql = format!(
            "SELECT {} FROM tags t
            WHERE ($1::TEXT IS NULL OR STRPOS(LOWER(t.name), LOWER($1)) > 0)
            ORDER BY {}
            LIMIT $2",
            TAG_COLUMNS,
            tab.order_by()
        );

        match sqlx::query(&sql)
            .bind(filter)
            .bind(limit)
            .map(tag_from_row)
            .fetch_all(&self.connection)
            .await
        {
            Ok(tags) => Ok(tags),
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Tag, Error> {
        let sql = format!(
            "SELECT {} FROM tags t WHERE LOWER(t.name) = LOWER($1)",
            TAG_COLUMNS
        );

        match sqlx::query(&sql)
            .bind(name)
            .map(tag_from_row)
            .fetch_optional(&self.connection)
            .await
        {
            Ok(Some(tag)) => Ok(tag),
            Ok(None) => Err(Error::NotFound("Tag")),
            Err(error) => Err(db_error(error)),
        }
    }

    /// Links the question to the named tags, creating the ones that don't exist yet.
    pub(super) async fn attach_tags(
        tx: &mut Transaction<'_, Postgres>,
        question_id: QuestionId,
        names: &[String],
    ) -> Result<(), Error> {
        for name in names {
            let created = sqlx::query("INSERT INTO tags (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?
                .rows_affected();
            if created > 0 {
                tracing::event!(tracing::Level::INFO, tag = name.as_str(), "tag created");
            }

            sqlx::query(
                "INSERT INTO question_tags (question_id, tag_id)
                SELECT $1, id FROM tags WHERE LOWER(name) = LOWER($2)
                ON CONFLICT DO NOTHING",
            )
            .bind(question_id.0)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }
}
