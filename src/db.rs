use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Failures surfaced by the repositories.
///
/// Constraint violations are split out so services can turn them into
/// business errors (duplicate email, unknown supplier) instead of a 500.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let constraint = db.constraint().unwrap_or_default().to_string();
            if db.is_unique_violation() {
                return Self::UniqueViolation(constraint);
            }
            if db.is_foreign_key_violation() {
                return Self::ForeignKeyViolation(constraint);
            }
        }
        Self::Sqlx(e)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}
