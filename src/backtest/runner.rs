use std::fs;

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::backtest::{
    config::BacktestConfig,
    core::{run_backtest_on_cases, BacktestFixture, BacktestResult},
};

pub fn load_fixture(path: &str) -> anyhow::Result<BacktestFixture> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read backtest fixture at {path}"))?;
    let fixture: BacktestFixture = serde_json::from_str(&contents)
        .with_context(|| format!("failed to deserialize backtest fixture at {path}"))?;
    Ok(fixture)
}

/// Execute a backtest by replaying the configured fixture through the spread lifecycle.
pub async fn run_backtest(cfg: BacktestConfig) -> anyhow::Result<BacktestResult> {
    let started_at = Utc::now();
    let fixture = load_fixture(&cfg.fixture_path)?;
    info!(
        target: "backtest",
        fixture = %cfg.fixture_path,
        cases = fixture.cases.len(),
        "replaying fixture"
    );

    let result = run_backtest_on_cases(&fixture, &cfg.engine, cfg.max_bars);
    log_summary(&result, started_at.to_rfc3339());
    Ok(result)
}

#[derive(Serialize)]
struct BacktestSummary<'a> {
    event: &'a str,
    started_at: String,
    finished_at: String,
    total_trades: usize,
    winning_trades: usize,
    win_rate_pct: f64,
    total_pnl: Decimal,
    active_trades: usize,
    failed_cases: usize,
}

fn log_summary(result: &BacktestResult, started_at: String) {
    let summary = BacktestSummary {
        event: "backtest_summary",
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        total_trades: result.summary.total_trades,
        winning_trades: result.summary.winning_trades,
        win_rate_pct: result.summary.win_rate,
        total_pnl: result.summary.total_pnl,
        active_trades: result.summary.active_trades,
        failed_cases: result.failures.len(),
    };

    let payload = serde_json::to_string(&summary)
        .unwrap_or_else(|_| "{\"event\":\"backtest_summary_error\"}".to_string());
    info!(target: "backtest", "{payload}");
}
