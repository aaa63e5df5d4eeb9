use std::fs;

use anyhow::Context;
use clap::ValueEnum;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Where spread records are persisted between passes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Chain fixture file used instead of the HTTP client when set.
    #[serde(default)]
    pub fixture_path: Option<String>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    15
}

/// Selection, scoring and lifecycle knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target |delta| for the short leg.
    pub target_delta: Decimal,
    /// Fixed distance between the short and long strikes.
    pub strike_width: Decimal,
    /// Minimum quoted net premium as a fraction of the width. Unset disables the floor.
    #[serde(default)]
    pub min_premium_ratio: Option<Decimal>,
    /// Width the scoring engine treats as ideal. Derived from the underlying price when absent.
    #[serde(default)]
    pub optimal_width: Option<Decimal>,
    /// Width ratio deviation at which the width component reaches zero.
    #[serde(default = "default_width_tolerance")]
    pub width_tolerance: f64,
    /// Account risk budget in dollars used by the risk-utilization component.
    pub account_risk_budget: Decimal,
    /// Volume at which a leg's volume sub-score saturates at 100.
    #[serde(default = "default_volume_target")]
    pub volume_target: u64,
    /// Open interest at which a leg's open-interest sub-score saturates at 100.
    #[serde(default = "default_open_interest_target")]
    pub open_interest_target: u64,
    #[serde(default = "default_target_reward_ratio")]
    pub target_reward_ratio: Decimal,
    #[serde(default = "default_stop_ratio")]
    pub stop_ratio: Decimal,
    #[serde(default = "default_multiplier")]
    pub contract_multiplier: Decimal,
    #[serde(default = "default_position_size")]
    pub position_size: Decimal,
    #[serde(default = "default_exit_days")]
    pub exit_days_before_expiration: i64,
}

fn default_width_tolerance() -> f64 {
    1.0
}

fn default_volume_target() -> u64 {
    500
}

fn default_open_interest_target() -> u64 {
    1_000
}

fn default_target_reward_ratio() -> Decimal {
    dec!(0.8)
}

fn default_stop_ratio() -> Decimal {
    dec!(0.5)
}

fn default_multiplier() -> Decimal {
    dec!(100)
}

fn default_position_size() -> Decimal {
    Decimal::ONE
}

fn default_exit_days() -> i64 {
    21
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchlistConfig {
    pub tickers: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub store: StoreBackend,
    pub max_parallel_evaluations: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    pub market_data: MarketDataConfig,
    pub engine: EngineConfig,
    pub watchlist: WatchlistConfig,
    pub execution: ExecutionConfig,
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {path}"))?;
        let cfg: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to deserialize TOML config at {path}"))?;
        Ok(cfg)
    }
}
