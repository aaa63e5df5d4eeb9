use async_trait::async_trait;
use sqlx::{query, query_as, types::Json};
use tracing::debug;
use uuid::Uuid;

use super::{models::SpreadRow, PgPool, SpreadStore, StoreError, StoreResult};
use crate::execution::lifecycle::SpreadStatus;
use crate::strategy::Spread;

/// Spread records in PostgreSQL.
///
/// The expected schema (created by [`PgSpreadStore::ensure_schema`]) is:
/// ```sql
/// CREATE TABLE IF NOT EXISTS spreads (
///   spread_guid        UUID        PRIMARY KEY,
///   underlying_ticker  TEXT        NOT NULL,
///   agent_status       TEXT        NOT NULL,
///   is_processed       BOOLEAN     NOT NULL,
///   adjusted_score     DOUBLE PRECISION,
///   record             JSONB       NOT NULL,
///   created_at         TIMESTAMPTZ NOT NULL,
///   updated_at         TIMESTAMPTZ NOT NULL
/// );
/// ```
pub struct PgSpreadStore {
    pool: PgPool,
}

impl PgSpreadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        query(
            "CREATE TABLE IF NOT EXISTS spreads ( \
               spread_guid UUID PRIMARY KEY, \
               underlying_ticker TEXT NOT NULL, \
               agent_status TEXT NOT NULL, \
               is_processed BOOLEAN NOT NULL, \
               adjusted_score DOUBLE PRECISION, \
               record JSONB NOT NULL, \
               created_at TIMESTAMPTZ NOT NULL, \
               updated_at TIMESTAMPTZ NOT NULL \
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SpreadStore for PgSpreadStore {
    async fn insert(&self, spread: &Spread) -> StoreResult<()> {
        let row = SpreadRow::from(spread);
        let result = query(
            "INSERT INTO spreads \
             (spread_guid, underlying_ticker, agent_status, is_processed, adjusted_score, record, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (spread_guid) DO NOTHING",
        )
        .bind(row.spread_guid)
        .bind(row.underlying_ticker)
        .bind(row.agent_status)
        .bind(row.is_processed)
        .bind(row.adjusted_score)
        .bind(row.record)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(spread.spread_guid));
        }
        debug!(target: "storage", spread_guid = %spread.spread_guid, "spread inserted");
        Ok(())
    }

    async fn get(&self, guid: Uuid) -> StoreResult<Option<Spread>> {
        let row = query_as::<_, SpreadRow>(
            "SELECT spread_guid, underlying_ticker, agent_status, is_processed, adjusted_score, \
                    record, created_at, updated_at \
             FROM spreads WHERE spread_guid = $1",
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Spread::from))
    }

    async fn list(&self) -> StoreResult<Vec<Spread>> {
        let rows = query_as::<_, SpreadRow>(
            "SELECT spread_guid, underlying_ticker, agent_status, is_processed, adjusted_score, \
                    record, created_at, updated_at \
             FROM spreads ORDER BY created_at, spread_guid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Spread::from).collect())
    }

    async fn compare_and_swap(
        &self,
        expected: SpreadStatus,
        spread: &Spread,
    ) -> StoreResult<bool> {
        let result = query(
            "UPDATE spreads SET \
               agent_status = $3, is_processed = $4, adjusted_score = $5, record = $6, \
               updated_at = now() \
             WHERE spread_guid = $1 AND agent_status = $2",
        )
        .bind(spread.spread_guid)
        .bind(expected.as_str())
        .bind(spread.agent_status.as_str())
        .bind(spread.is_processed)
        .bind(spread.score.as_ref().map(|b| b.adjusted_score))
        .bind(Json(spread))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<(Uuid,)> =
            query_as("SELECT spread_guid FROM spreads WHERE spread_guid = $1")
                .bind(spread.spread_guid)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(spread.spread_guid)),
        }
    }
}
