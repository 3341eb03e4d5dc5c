use sqlx::postgres::{PgPool, PgPoolOptions};

use handle_errors::Error;

mod account;
mod answer;
mod question;
mod tag;
mod vote;

pub use account::DeletedContent;

#[derive(Debug, Clone)]
pub struct Store {
    pub connection: PgPool,
}

impl Store {
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, Error> {
        let db_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| {
                tracing::event!(tracing::Level::ERROR, "Couldn't establish DB connection: {}", e);
                Error::DatabaseQueryError(e)
            })?;

        Ok(Store {
            connection: db_pool,
        })
    }

    /// Builds a store whose pool connects on first use.
    pub fn new_lazy(db_url: &str) -> Result<Self, Error> {
        let db_pool = PgPoolOptions::new()
            .connect_lazy(db_url)
            .map_err(Error::DatabaseQueryError)?;

        Ok(Store {
            connection: db_pool,
        })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!()
            .run(&self.connection)
            .await
            .map_err(Error::MigrationError)
    }
}

fn db_error(error: sqlx::Error) -> Error {
    tracing::event!(tracing::Level::ERROR, "{:?}", error);
    Error::DatabaseQueryError(error)
}
