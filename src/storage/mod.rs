use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::execution::lifecycle::SpreadStatus;
use crate::strategy::Spread;
use crate::types::PostgresConfig;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemorySpreadStore;
pub use postgres::PgSpreadStore;

pub type PgPool = Pool<Postgres>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("spread {0} already exists")]
    Duplicate(Uuid),

    #[error("spread {0} not found")]
    NotFound(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for spread records, keyed by `spread_guid`.
///
/// Lifecycle writes go through [`SpreadStore::compare_and_swap`] so two concurrent evaluations
/// of the same spread cannot both apply a transition.
#[async_trait]
pub trait SpreadStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the guid exists.
    async fn insert(&self, spread: &Spread) -> StoreResult<()>;

    async fn get(&self, guid: Uuid) -> StoreResult<Option<Spread>>;

    /// Full scan, oldest first.
    async fn list(&self) -> StoreResult<Vec<Spread>>;

    /// Replace the record only if its stored status still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn compare_and_swap(&self, expected: SpreadStatus, spread: &Spread)
        -> StoreResult<bool>;
}

/// Create a PostgreSQL connection pool using the provided config.
///
/// Connection establishment is performed eagerly so misconfiguration is surfaced early at
/// startup.
pub async fn create_pg_pool(cfg: &PostgresConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(15))
        .connect(&cfg.url)
        .await?;
    Ok(pool)
}
