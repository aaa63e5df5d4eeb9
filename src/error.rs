use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::execution::lifecycle::SpreadStatus;
use crate::strategy::Occasion;

/// Failures of the evaluation engine for a single spread.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("no eligible contract: {0}")]
    NoEligibleContract(String),

    #[error("missing quote field `{field}` for {ticker}")]
    MissingQuote { ticker: String, field: &'static str },

    #[error("incomplete snapshot for scoring components: {0:?}")]
    IncompleteSnapshot(Vec<String>),

    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: SpreadStatus, to: SpreadStatus },

    #[error("stale snapshot: trigger was {expected} but snapshot occasion is {actual}")]
    StaleSnapshot { expected: Occasion, actual: Occasion },

    #[error("invalid spread: {0}")]
    InvalidSpread(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Processing stage a spread was in when an error surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Selection,
    EntryFill,
    Scoring,
    Monitoring,
    ExitFill,
    MarketData,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Selection => "selection",
            Stage::EntryFill => "entry_fill",
            Stage::Scoring => "scoring",
            Stage::Monitoring => "monitoring",
            Stage::ExitFill => "exit_fill",
            Stage::MarketData => "market_data",
            Stage::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

/// An error tagged with the spread and stage it belongs to, so a scheduler can retry or flag it.
#[derive(Debug, Error)]
#[error("spread {spread_guid:?} failed at {stage}: {message}")]
pub struct StageError {
    pub spread_guid: Option<Uuid>,
    pub stage: Stage,
    pub message: String,
    pub engine: Option<EngineError>,
}

impl StageError {
    pub fn engine(spread_guid: Option<Uuid>, stage: Stage, err: EngineError) -> Self {
        Self {
            spread_guid,
            stage,
            message: err.to_string(),
            engine: Some(err),
        }
    }

    pub fn other(spread_guid: Option<Uuid>, stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            spread_guid,
            stage,
            message: err.to_string(),
            engine: None,
        }
    }
}
