use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{ClientError, ClientResult, MarketDataSource};
use crate::strategy::{ContractSnapshot, OptionChain, UnderlyingBar};

/// Market data served from a JSON file, for offline runs and tests.
///
/// ```json
/// {
///   "chains": [{"underlying": "SPY", "expiration": "2024-04-19", "previous_close": 436.0,
///               "contracts": [{"ticker": "...", "strike": 430, "contract_type": "put",
///                              "expiration": "2024-04-19", "snapshot": {"bid": 1.5}}]}],
///   "bars": {"SPY": [{"date": "2024-03-01", "open": 1, "high": 1, "low": 1, "close": 1}]},
///   "quotes": {"O:SPY240419P00430000": {"ticker": "...", "...": "..."}}
/// }
/// ```
///
/// `quotes` override chain contracts when `contract_snapshots` is asked for a ticker.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FixtureMarketData {
    #[serde(default)]
    chains: Vec<OptionChain>,
    #[serde(default)]
    bars: HashMap<String, Vec<UnderlyingBar>>,
    #[serde(default)]
    quotes: HashMap<String, ContractSnapshot>,
}

impl FixtureMarketData {
    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> ClientResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_chain(mut self, chain: OptionChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn with_bar(mut self, underlying: &str, bar: UnderlyingBar) -> Self {
        self.bars.entry(underlying.to_string()).or_default().push(bar);
        self
    }

    pub fn with_quote(mut self, snapshot: ContractSnapshot) -> Self {
        self.quotes.insert(snapshot.ticker.clone(), snapshot);
        self
    }

    /// Expirations available for an underlying, sorted.
    pub fn expirations(&self, underlying: &str) -> Vec<NaiveDate> {
        let mut out: Vec<NaiveDate> = self
            .chains
            .iter()
            .filter(|c| c.underlying == underlying)
            .map(|c| c.expiration)
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[async_trait]
impl MarketDataSource for FixtureMarketData {
    async fn option_chain(
        &self,
        underlying: &str,
        expiration: NaiveDate,
    ) -> ClientResult<OptionChain> {
        self.chains
            .iter()
            .find(|c| c.underlying == underlying && c.expiration == expiration)
            .cloned()
            .ok_or_else(|| {
                ClientError::NotFound(format!("{underlying} chain expiring {expiration}"))
            })
    }

    async fn previous_bar(&self, underlying: &str) -> ClientResult<UnderlyingBar> {
        self.bars
            .get(underlying)
            .and_then(|bars| bars.iter().max_by_key(|b| b.date))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("previous bar for {underlying}")))
    }

    async fn contract_snapshots(
        &self,
        underlying: &str,
        tickers: &[String],
    ) -> ClientResult<Vec<ContractSnapshot>> {
        tickers
            .iter()
            .map(|ticker| {
                self.quotes
                    .get(ticker)
                    .or_else(|| {
                        self.chains
                            .iter()
                            .filter(|c| c.underlying == underlying)
                            .flat_map(|c| c.contracts.iter())
                            .find(|c| &c.ticker == ticker)
                    })
                    .cloned()
                    .ok_or_else(|| ClientError::NotFound(format!("snapshot for {ticker}")))
            })
            .collect()
    }
}
