use serde::Serialize;
use tracing::info;

use crate::types::{AppConfig, StoreBackend};

#[derive(Serialize)]
struct StartupLog<'a> {
    event: &'a str,
    store: &'a str,
    market_data: &'a str,
    tickers: Vec<&'a str>,
    max_parallel_evaluations: usize,
}

pub fn log_startup(cfg: &AppConfig, command: &str) {
    let store = match cfg.execution.store {
        StoreBackend::Memory => "memory",
        StoreBackend::Postgres => "postgres",
    };
    let market_data = if cfg.market_data.fixture_path.is_some() {
        "fixture"
    } else {
        "http"
    };
    let payload = StartupLog {
        event: command,
        store,
        market_data,
        tickers: cfg.watchlist.tickers.iter().map(String::as_str).collect(),
        max_parallel_evaluations: cfg.execution.max_parallel_evaluations,
    };
    info!(target: "bot", startup = serde_json::to_string(&payload).unwrap_or_default().as_str());
}
