use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub mod params;
pub mod scoring;
pub mod selector;
pub mod spread;
pub mod validator;

pub use params::{ScoringParams, SelectionParams, SpreadParams};
pub use scoring::{ComponentScore, ScoreBreakdown, ScoringEngine};
pub use selector::{LegSelection, LegSelector};
pub use spread::{Leg, Spread, TradeOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Call,
    Put,
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::Call => f.write_str("call"),
            ContractType::Put => f.write_str("put"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bullish => f.write_str("bullish"),
            Direction::Bearish => f.write_str("bearish"),
        }
    }
}

/// Whether the spread is opened for a net credit or a net debit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadStrategy {
    Credit,
    Debit,
}

impl SpreadStrategy {
    /// Contract type a vertical of this strategy uses for the given direction.
    pub fn contract_type(self, direction: Direction) -> ContractType {
        match (self, direction) {
            (SpreadStrategy::Credit, Direction::Bullish) => ContractType::Put,
            (SpreadStrategy::Credit, Direction::Bearish) => ContractType::Call,
            (SpreadStrategy::Debit, Direction::Bullish) => ContractType::Call,
            (SpreadStrategy::Debit, Direction::Bearish) => ContractType::Put,
        }
    }
}

impl fmt::Display for SpreadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadStrategy::Credit => f.write_str("credit"),
            SpreadStrategy::Debit => f.write_str("debit"),
        }
    }
}

/// Point-in-time market state of one contract. Every field may be absent in vendor data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub ask: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default)]
    pub implied_volatility: Option<Decimal>,
    #[serde(default)]
    pub delta: Option<Decimal>,
    #[serde(default)]
    pub close: Option<Decimal>,
    #[serde(default)]
    pub last_trade: Option<Decimal>,
}

/// Immutable snapshot of one option leg. A newer observation is a new value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub ticker: String,
    pub strike: Decimal,
    pub contract_type: ContractType,
    pub expiration: NaiveDate,
    #[serde(rename = "snapshot")]
    pub quote: Quote,
}

impl ContractSnapshot {
    pub fn bid(&self) -> EngineResult<Decimal> {
        self.quote.bid.ok_or_else(|| self.missing("bid"))
    }

    pub fn ask(&self) -> EngineResult<Decimal> {
        self.quote.ask.ok_or_else(|| self.missing("ask"))
    }

    pub fn delta(&self) -> EngineResult<Decimal> {
        self.quote.delta.ok_or_else(|| self.missing("delta"))
    }

    fn missing(&self, field: &'static str) -> EngineError {
        EngineError::MissingQuote {
            ticker: self.ticker.clone(),
            field,
        }
    }
}

/// The moment a pair of leg snapshots was captured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    Entry,
    ExitProfit,
    ExitLoss,
    Expiration,
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Occasion::Entry => "entry",
            Occasion::ExitProfit => "exit_profit",
            Occasion::ExitLoss => "exit_loss",
            Occasion::Expiration => "expiration",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPair {
    pub short: ContractSnapshot,
    pub long: ContractSnapshot,
}

/// Append-only history of leg snapshots keyed by occasion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotSet(BTreeMap<Occasion, SnapshotPair>);

impl SnapshotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair for an occasion. An occasion already recorded is never overwritten.
    pub fn record(&mut self, occasion: Occasion, pair: SnapshotPair) -> bool {
        if self.0.contains_key(&occasion) {
            return false;
        }
        self.0.insert(occasion, pair);
        true
    }

    pub fn get(&self, occasion: Occasion) -> Option<&SnapshotPair> {
        self.0.get(&occasion)
    }

    pub fn occasions(&self) -> impl Iterator<Item = Occasion> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Daily OHLC bar of the underlying.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl UnderlyingBar {
    pub fn prices(&self) -> [Decimal; 4] {
        [self.open, self.high, self.low, self.close]
    }
}

/// Option chain for one underlying and a single expiration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub previous_close: Decimal,
    pub contracts: Vec<ContractSnapshot>,
}

impl OptionChain {
    /// Contracts of one type at the chain's expiration, sorted by strike.
    pub fn of_type(&self, contract_type: ContractType) -> Vec<&ContractSnapshot> {
        let mut out: Vec<&ContractSnapshot> = self
            .contracts
            .iter()
            .filter(|c| c.contract_type == contract_type && c.expiration == self.expiration)
            .collect();
        out.sort_by(|a, b| a.strike.cmp(&b.strike));
        out
    }
}
