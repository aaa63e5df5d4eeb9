use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::Stage;

/// Process-wide counters, reported at the end of each pass.
pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[derive(Default)]
struct MetricsInner {
    spreads_selected: AtomicU64,
    spreads_entered: AtomicU64,
    spreads_completed: AtomicU64,
    stage_failures: AtomicU64,
    last_event_ts: AtomicU64,
}

/// Lightweight metrics handle backed by atomics so it can be cloned cheaply.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl Metrics {
    fn touch(&self) {
        self.inner
            .last_event_ts
            .store(now_unix_secs(), Ordering::Relaxed);
    }

    pub fn record_selected(&self, underlying: &str, spread_guid: Uuid) {
        self.inner.spreads_selected.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "spread_selected",
            underlying = %underlying,
            spread_guid = %spread_guid,
            total_selected = self.inner.spreads_selected.load(Ordering::Relaxed),
            "spread selected"
        );
    }

    pub fn record_entered(&self, spread_guid: Uuid) {
        self.inner.spreads_entered.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "spread_entered",
            spread_guid = %spread_guid,
            total_entered = self.inner.spreads_entered.load(Ordering::Relaxed),
            "spread entered"
        );
    }

    pub fn record_completed(&self, spread_guid: Uuid) {
        self.inner.spreads_completed.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "spread_completed",
            spread_guid = %spread_guid,
            total_completed = self.inner.spreads_completed.load(Ordering::Relaxed),
            "spread completed"
        );
    }

    pub fn record_stage_failure(&self, stage: Stage, spread_guid: Option<Uuid>) {
        self.inner.stage_failures.fetch_add(1, Ordering::Relaxed);
        self.touch();

        info!(
            target: "metrics",
            event = "stage_failure",
            stage = %stage,
            spread_guid = ?spread_guid,
            total_failures = self.inner.stage_failures.load(Ordering::Relaxed),
            "stage failed"
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            spreads_selected: self.inner.spreads_selected.load(Ordering::Relaxed),
            spreads_entered: self.inner.spreads_entered.load(Ordering::Relaxed),
            spreads_completed: self.inner.spreads_completed.load(Ordering::Relaxed),
            stage_failures: self.inner.stage_failures.load(Ordering::Relaxed),
            last_event_ts: self.inner.last_event_ts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of current metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub spreads_selected: u64,
    pub spreads_entered: u64,
    pub spreads_completed: u64,
    pub stage_failures: u64,
    pub last_event_ts: u64,
}

pub fn log_metrics_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        target: "metrics",
        event = "metrics_snapshot",
        spreads_selected = snapshot.spreads_selected,
        spreads_entered = snapshot.spreads_entered,
        spreads_completed = snapshot.spreads_completed,
        stage_failures = snapshot.stage_failures,
        last_event_ts = snapshot.last_event_ts,
        "metrics snapshot"
    );
}
