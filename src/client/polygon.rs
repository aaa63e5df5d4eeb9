//! Polygon-style REST client for option chain snapshots and daily bars.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{ClientError, ClientResult, MarketDataSource};
use crate::strategy::{ContractSnapshot, ContractType, OptionChain, Quote, UnderlyingBar};
use crate::types::MarketDataConfig;

/// Upper bound on `next_url` pages followed for one chain.
const MAX_CHAIN_PAGES: usize = 10;

pub struct PolygonClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ChainPage {
    #[serde(default)]
    results: Vec<OptionSnapshotWire>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SingleSnapshot {
    results: OptionSnapshotWire,
}

#[derive(Debug, Deserialize)]
struct OptionSnapshotWire {
    details: DetailsWire,
    #[serde(default)]
    last_quote: Option<LastQuoteWire>,
    #[serde(default)]
    day: Option<DayWire>,
    #[serde(default)]
    open_interest: Option<f64>,
    #[serde(default)]
    implied_volatility: Option<Decimal>,
    #[serde(default)]
    greeks: Option<GreeksWire>,
    #[serde(default)]
    last_trade: Option<LastTradeWire>,
}

#[derive(Debug, Deserialize)]
struct DetailsWire {
    ticker: String,
    strike_price: Decimal,
    contract_type: ContractType,
    expiration_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct LastQuoteWire {
    #[serde(default)]
    bid: Option<Decimal>,
    #[serde(default)]
    ask: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct DayWire {
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    close: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct GreeksWire {
    #[serde(default)]
    delta: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct LastTradeWire {
    #[serde(default)]
    price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggWire>,
}

#[derive(Debug, Deserialize)]
struct AggWire {
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    /// Bar start, unix milliseconds.
    t: i64,
}

impl From<OptionSnapshotWire> for ContractSnapshot {
    fn from(w: OptionSnapshotWire) -> Self {
        let (bid, ask) = w
            .last_quote
            .map(|q| (q.bid, q.ask))
            .unwrap_or((None, None));
        let (volume, close) = w
            .day
            .map(|d| (d.volume.map(|v| v as u64), d.close))
            .unwrap_or((None, None));
        Self {
            ticker: w.details.ticker,
            strike: w.details.strike_price,
            contract_type: w.details.contract_type,
            expiration: w.details.expiration_date,
            quote: Quote {
                bid,
                ask,
                volume,
                open_interest: w.open_interest.map(|oi| oi as u64),
                implied_volatility: w.implied_volatility,
                delta: w.greeks.and_then(|g| g.delta),
                close,
                last_trade: w.last_trade.and_then(|t| t.price),
            },
        }
    }
}

impl PolygonClient {
    pub fn new(config: &MarketDataConfig) -> ClientResult<Self> {
        if config.api_key.is_empty() {
            return Err(ClientError::Config(
                "market_data.api_key must be set".to_string(),
            ));
        }
        let http = Client::builder()
            .user_agent("options-spread-bot/0.1")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    fn backoff(attempt: u32) -> Duration {
        let capped = attempt.min(5);
        let millis = 500 * (1_u64 << capped);
        Duration::from_millis(millis.min(8_000))
    }

    /// GET with bounded retries on transport failures and 5xx responses.
    async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .get(url)
                .query(query)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await;

            let last = match result {
                Ok(resp) if resp.status().is_success() => {
                    let parsed = resp.json::<T>().await?;
                    return Ok(parsed);
                }
                Ok(resp) if resp.status().is_server_error() => {
                    format!("HTTP status {}", resp.status())
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ClientError::HttpStatus { status, body });
                }
                Err(err) => err.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt + 1,
                    last,
                });
            }
            attempt += 1;
            warn!(
                target: "market_data",
                url = %url,
                attempt,
                error = %last,
                "request failed; backing off"
            );
            sleep(Self::backoff(attempt)).await;
        }
    }
}

#[async_trait]
impl MarketDataSource for PolygonClient {
    async fn option_chain(
        &self,
        underlying: &str,
        expiration: NaiveDate,
    ) -> ClientResult<OptionChain> {
        let previous_close = self.previous_bar(underlying).await?.close;

        let mut url = format!("{}/v3/snapshot/options/{underlying}", self.base_url);
        let mut query = vec![
            ("expiration_date", expiration.to_string()),
            ("limit", "250".to_string()),
        ];
        let mut contracts = Vec::new();
        for _ in 0..MAX_CHAIN_PAGES {
            let page: ChainPage = self.get_json(&url, &query).await?;
            contracts.extend(page.results.into_iter().map(ContractSnapshot::from));
            match page.next_url {
                Some(next) => {
                    // `next_url` carries its own cursor query.
                    url = next;
                    query.clear();
                }
                None => break,
            }
        }

        debug!(
            target: "market_data",
            underlying,
            %expiration,
            contracts = contracts.len(),
            "option chain fetched"
        );

        Ok(OptionChain {
            underlying: underlying.to_string(),
            expiration,
            previous_close,
            contracts,
        })
    }

    async fn previous_bar(&self, underlying: &str) -> ClientResult<UnderlyingBar> {
        let url = format!("{}/v2/aggs/ticker/{underlying}/prev", self.base_url);
        let resp: AggsResponse = self
            .get_json(&url, &[("adjusted", "true".to_string())])
            .await?;
        let agg = resp
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("previous bar for {underlying}")))?;
        let date = Utc
            .timestamp_millis_opt(agg.t)
            .single()
            .map(|ts| ts.date_naive())
            .ok_or_else(|| {
                ClientError::NotFound(format!("bar timestamp {} for {underlying}", agg.t))
            })?;
        Ok(UnderlyingBar {
            date,
            open: agg.o,
            high: agg.h,
            low: agg.l,
            close: agg.c,
        })
    }

    async fn contract_snapshots(
        &self,
        underlying: &str,
        tickers: &[String],
    ) -> ClientResult<Vec<ContractSnapshot>> {
        let mut out = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let url = format!("{}/v3/snapshot/options/{underlying}/{ticker}", self.base_url);
            let resp: SingleSnapshot = self.get_json(&url, &[]).await?;
            out.push(resp.results.into());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(PolygonClient::backoff(1), Duration::from_millis(1_000));
        assert_eq!(PolygonClient::backoff(2), Duration::from_millis(2_000));
        assert_eq!(PolygonClient::backoff(9), Duration::from_millis(8_000));
    }

    #[test]
    fn maps_vendor_snapshot() {
        let json = r#"{
            "details": {"ticker": "O:SPY240419P00430000", "strike_price": 430,
                        "contract_type": "put", "expiration_date": "2024-04-19"},
            "last_quote": {"bid": 1.5, "ask": 1.6},
            "day": {"volume": 1250, "close": 1.55},
            "open_interest": 8000,
            "implied_volatility": 0.17,
            "greeks": {"delta": -0.31}
        }"#;
        let wire: OptionSnapshotWire = serde_json::from_str(json).unwrap();
        let snap = ContractSnapshot::from(wire);
        assert_eq!(snap.strike, dec!(430));
        assert_eq!(snap.quote.bid, Some(dec!(1.5)));
        assert_eq!(snap.quote.volume, Some(1250));
        assert_eq!(snap.quote.open_interest, Some(8000));
        assert_eq!(snap.quote.delta, Some(dec!(-0.31)));
        assert!(snap.quote.last_trade.is_none());
    }

    #[test]
    fn rejects_empty_api_key() {
        let cfg = MarketDataConfig {
            base_url: "https://api.polygon.io".to_string(),
            api_key: String::new(),
            max_retries: 3,
            timeout_secs: 15,
            fixture_path: None,
        };
        assert!(matches!(PolygonClient::new(&cfg), Err(ClientError::Config(_))));
    }
}
