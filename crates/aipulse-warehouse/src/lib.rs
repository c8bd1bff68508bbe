//! Dimensional warehouse layer for the aipulse pipeline.
//!
//! Converts batches of enriched mentions into star-schema writes: six
//! dimension tables (Date, Community, AIModel, Sentiment, Topic, Author)
//! reached via stable surrogate keys, plus one `fact_discussion` row per
//! mention. Dimension upserts always commit strictly before the fact rows
//! that reference them.

pub mod builder;
pub mod fallback;
pub mod keys;
pub mod pg;
pub mod rows;
pub mod sink;

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub use builder::{BatchStats, DimensionalModelBuilder};
pub use fallback::FallbackStore;
pub use keys::{Dimension, SurrogateKeys};
pub use pg::PgSink;
pub use rows::{DimensionUpsert, FactRow, StagedBatch};
pub use sink::{MemorySink, WarehouseSink};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/aipulse-warehouse/Cargo.toml; resolves to
// <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &aipulse_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// Sink temporarily unavailable; the batch is retried with back-off.
    #[error("warehouse sink unavailable: {0}")]
    SinkUnavailable(String),
    /// A Date dimension natural key that is not a valid calendar date.
    #[error("invalid date natural key: {0}")]
    InvalidDateKey(String),
    /// The sink retry ceiling was hit; the batch was persisted to the
    /// fallback store and intake must pause for operator intervention.
    #[error("sink retry ceiling hit after {attempts} attempts; batch persisted to {persisted_to}")]
    RetryCeiling {
        attempts: u32,
        persisted_to: std::path::PathBuf,
    },
    #[error("fallback store I/O error: {0}")]
    FallbackIo(#[from] std::io::Error),
    #[error("fallback batch serialization error: {0}")]
    FallbackSerde(#[from] serde_json::Error),
}

impl WarehouseError {
    /// `true` for failures worth retrying after a back-off delay.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WarehouseError::Sqlx(_) | WarehouseError::SinkUnavailable(_)
        )
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table may not exist yet on a fresh database;
    // treat absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
