use std::fs;

use anyhow::Context;
use serde::Deserialize;

use crate::types::EngineConfig;

/// Top-level backtest configuration loaded from TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct BacktestConfig {
    pub engine: EngineConfig,
    /// JSON file holding the cases and daily bars to replay.
    pub fixture_path: String,
    /// Stop each case after this many bars.
    #[serde(default)]
    pub max_bars: Option<usize>,
}

impl BacktestConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read backtest config file at {path}"))?;
        let cfg: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to deserialize backtest TOML at {path}"))?;
        Ok(cfg)
    }
}
