use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::strategy::Spread;

/// Row model for the `spreads` table.
///
/// The full record lives in `record`; the scalar columns duplicate the fields that are
/// filtered on or guarded by conditional writes.
#[derive(Debug, Clone, FromRow)]
pub struct SpreadRow {
    pub spread_guid: Uuid,
    pub underlying_ticker: String,
    pub agent_status: String,
    pub is_processed: bool,
    pub adjusted_score: Option<f64>,
    pub record: Json<Spread>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Spread> for SpreadRow {
    fn from(s: &Spread) -> Self {
        Self {
            spread_guid: s.spread_guid,
            underlying_ticker: s.underlying_ticker.clone(),
            agent_status: s.agent_status.as_str().to_string(),
            is_processed: s.is_processed,
            adjusted_score: s.score.as_ref().map(|b| b.adjusted_score),
            record: Json(s.clone()),
            created_at: s.created_at,
            updated_at: Utc::now(),
        }
    }
}

impl From<SpreadRow> for Spread {
    fn from(row: SpreadRow) -> Self {
        row.record.0
    }
}
