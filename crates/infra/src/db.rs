//! Postgres pool, migrations, and SQLSTATE classification.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::DatabaseConfig;

/// Open a connection pool.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
}

/// Apply the embedded migrations (idempotent).
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Bound how long statements in `tx` may wait for a row lock.
///
/// Transaction-local: reverts at commit/rollback.
pub(crate) async fn set_lock_timeout(
    tx: &mut Transaction<'_, Postgres>,
    timeout: Duration,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", timeout.as_millis().max(1)))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Coarse classification of a failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SqlFailure {
    /// `23505`, with the violated constraint or index name.
    UniqueViolation(Option<String>),
    /// `23503`.
    ForeignKeyViolation,
    /// `55P03` lock_not_available, `40P01` deadlock, `40001` serialization.
    Contention,
    Other,
}

pub(crate) fn classify(err: &sqlx::Error) -> SqlFailure {
    let sqlx::Error::Database(db_err) = err else {
        return SqlFailure::Other;
    };
    match db_err.code().as_deref() {
        Some("23505") => SqlFailure::UniqueViolation(db_err.constraint().map(str::to_string)),
        Some("23503") => SqlFailure::ForeignKeyViolation,
        Some("55P03") | Some("40P01") | Some("40001") => SqlFailure::Contention,
        _ => SqlFailure::Other,
    }
}

/// Human-readable description without SQL text or bind values.
pub(crate) fn describe(operation: &str, err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => {
            format!("database error in {}: {}", operation, db_err.message())
        }
        sqlx::Error::PoolClosed => format!("connection pool closed in {}", operation),
        sqlx::Error::PoolTimedOut => format!("timed out acquiring a connection in {}", operation),
        sqlx::Error::RowNotFound => format!("unexpected row not found in {}", operation),
        _ => format!("sqlx error in {}: {}", operation, err),
    }
}
