use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SpreadStore, StoreError, StoreResult};
use crate::execution::lifecycle::SpreadStatus;
use crate::strategy::Spread;

/// Process-local store. The write lock makes each compare-and-swap atomic.
#[derive(Debug, Default)]
pub struct MemorySpreadStore {
    spreads: RwLock<HashMap<Uuid, Spread>>,
}

impl MemorySpreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spreads(spreads: impl IntoIterator<Item = Spread>) -> Self {
        Self {
            spreads: RwLock::new(spreads.into_iter().map(|s| (s.spread_guid, s)).collect()),
        }
    }
}

#[async_trait]
impl SpreadStore for MemorySpreadStore {
    async fn insert(&self, spread: &Spread) -> StoreResult<()> {
        let mut guard = self.spreads.write().await;
        if guard.contains_key(&spread.spread_guid) {
            return Err(StoreError::Duplicate(spread.spread_guid));
        }
        guard.insert(spread.spread_guid, spread.clone());
        Ok(())
    }

    async fn get(&self, guid: Uuid) -> StoreResult<Option<Spread>> {
        Ok(self.spreads.read().await.get(&guid).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Spread>> {
        let mut out: Vec<Spread> = self.spreads.read().await.values().cloned().collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.spread_guid.cmp(&b.spread_guid))
        });
        Ok(out)
    }

    async fn compare_and_swap(
        &self,
        expected: SpreadStatus,
        spread: &Spread,
    ) -> StoreResult<bool> {
        let mut guard = self.spreads.write().await;
        let current = guard
            .get_mut(&spread.spread_guid)
            .ok_or(StoreError::NotFound(spread.spread_guid))?;
        if current.agent_status != expected {
            return Ok(false);
        }
        *current = spread.clone();
        Ok(true)
    }
}
