use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::strategy::{ContractSnapshot, OptionChain, UnderlyingBar};

pub mod fixture;
pub mod polygon;

pub use fixture::FixtureMarketData;
pub use polygon::PolygonClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Read-only market data the engine consumes. Implementations may fail transiently.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Chain of one expiration, with the underlying's previous close filled in.
    async fn option_chain(&self, underlying: &str, expiration: NaiveDate)
        -> ClientResult<OptionChain>;

    /// Most recent completed daily bar of the underlying.
    async fn previous_bar(&self, underlying: &str) -> ClientResult<UnderlyingBar>;

    /// Current snapshots for the named contracts, in the order requested.
    async fn contract_snapshots(
        &self,
        underlying: &str,
        tickers: &[String],
    ) -> ClientResult<Vec<ContractSnapshot>>;
}
