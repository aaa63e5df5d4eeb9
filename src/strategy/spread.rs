use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::execution::{fill::simulate_entry, lifecycle::SpreadStatus};
use crate::strategy::{
    params::SpreadParams, scoring::ScoreBreakdown, selector::LegSelection, validator,
    ContractSnapshot, ContractType, Direction, Occasion, SnapshotPair, SnapshotSet,
    SpreadStrategy,
};
use crate::utils::{math::reward_and_risk, time::exit_date};

/// Open interest or volume below this adds a caution to the description.
const THIN_MARKET: u64 = 10;

/// One leg of a spread. Fill prices stay empty until the lifecycle fills the leg.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub ticker: String,
    pub strike: Decimal,
    pub contract_type: ContractType,
    pub expiration: NaiveDate,
    #[serde(default)]
    pub actual_entry_price: Option<Decimal>,
    #[serde(default)]
    pub actual_exit_price: Option<Decimal>,
}

impl From<&ContractSnapshot> for Leg {
    fn from(c: &ContractSnapshot) -> Self {
        Self {
            ticker: c.ticker.clone(),
            strike: c.strike,
            contract_type: c.contract_type,
            expiration: c.expiration,
            actual_entry_price: None,
            actual_exit_price: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Profit,
    Loss,
}

/// A vertical spread and everything the lifecycle has learned about it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub spread_guid: Uuid,
    pub underlying_ticker: String,
    pub direction: Direction,
    pub strategy: SpreadStrategy,
    pub contract_type: ContractType,
    pub distance_between_strikes: Decimal,
    pub short_leg: Leg,
    pub long_leg: Leg,

    /// Underlying prices. The entry price is the previous close at selection time.
    pub previous_close: Decimal,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub stop_price: Decimal,
    pub target_reward: Decimal,
    pub target_stop: Decimal,
    pub breakeven: Decimal,

    /// Simulated net premium at construction, per share.
    pub net_premium: Decimal,
    pub max_reward: Decimal,
    pub max_risk: Decimal,
    #[serde(default)]
    pub probability_of_profit: Option<f64>,
    #[serde(default)]
    pub score: Option<ScoreBreakdown>,

    #[serde(default)]
    pub agent_status: SpreadStatus,
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub entry_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_entry_price: Option<Decimal>,
    #[serde(default)]
    pub actual_exit_price: Option<Decimal>,
    #[serde(default)]
    pub realized_pnl: Option<Decimal>,
    #[serde(default)]
    pub trade_outcome: Option<TradeOutcome>,

    pub expiration_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub description: String,
    pub multiplier: Decimal,
    pub position_size: Decimal,
    #[serde(default)]
    pub snapshots: SnapshotSet,
    pub created_at: DateTime<Utc>,
}

impl Spread {
    /// Build a spread from selected legs, filling the entry conservatively.
    ///
    /// Width and risk figures are fixed here and never recomputed from later snapshots.
    pub fn build(
        selection: &LegSelection,
        params: &SpreadParams,
        created_at: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let short = &selection.short;
        let long = &selection.long;

        let width = (short.strike - long.strike).abs();
        if width.is_zero() {
            return Err(EngineError::InvalidSpread(format!(
                "legs {} and {} share strike {}",
                short.ticker, long.ticker, short.strike
            )));
        }

        let entry = simulate_entry(selection.strategy, &pair_of(short, long))?.net;
        if entry <= Decimal::ZERO || entry >= width {
            return Err(EngineError::InvalidSpread(format!(
                "{} entry net {entry} outside (0, {width}) for {}/{}",
                selection.strategy, short.ticker, long.ticker
            )));
        }

        let (max_reward, max_risk) =
            reward_and_risk(selection.strategy, entry, width, params.multiplier);

        let previous_close = selection.previous_close;
        let target_reward = entry * params.target_reward_ratio;
        let target_stop = entry * params.stop_ratio;
        let (target_price, stop_price) = match selection.direction {
            Direction::Bullish => (previous_close + target_reward, previous_close - target_stop),
            Direction::Bearish => (previous_close - target_reward, previous_close + target_stop),
        };
        let breakeven = match (selection.strategy, selection.direction) {
            (SpreadStrategy::Credit, Direction::Bullish) => short.strike - entry,
            (SpreadStrategy::Credit, Direction::Bearish) => short.strike + entry,
            (SpreadStrategy::Debit, Direction::Bullish) => long.strike + entry,
            (SpreadStrategy::Debit, Direction::Bearish) => long.strike - entry,
        };

        let mut snapshots = SnapshotSet::new();
        snapshots.record(Occasion::Entry, pair_of(short, long));

        let spread = Self {
            spread_guid: Uuid::new_v4(),
            underlying_ticker: selection.underlying.clone(),
            direction: selection.direction,
            strategy: selection.strategy,
            contract_type: selection.contract_type,
            distance_between_strikes: width,
            short_leg: Leg::from(short),
            long_leg: Leg::from(long),
            previous_close,
            entry_price: previous_close,
            target_price,
            stop_price,
            target_reward,
            target_stop,
            breakeven,
            net_premium: entry,
            max_reward,
            max_risk,
            probability_of_profit: None,
            score: None,
            agent_status: SpreadStatus::None,
            is_processed: false,
            entry_timestamp: None,
            exit_timestamp: None,
            actual_entry_price: None,
            actual_exit_price: None,
            realized_pnl: None,
            trade_outcome: None,
            expiration_date: selection.expiration,
            exit_date: exit_date(selection.expiration, params.exit_days_before_expiration),
            description: describe(selection, entry, width),
            multiplier: params.multiplier,
            position_size: params.position_size,
            snapshots,
            created_at,
        };

        let violations = validator::validate(&spread);
        if !violations.is_empty() {
            return Err(EngineError::InvalidSpread(violations.join("; ")));
        }
        Ok(spread)
    }

    /// Attach a score breakdown; the probability of profit mirrors its raw component.
    pub fn with_score(mut self, score: ScoreBreakdown) -> Self {
        self.probability_of_profit = score.probability_of_profit.raw;
        self.score = Some(score);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.agent_status == SpreadStatus::Completed
    }

    pub fn reward_risk_ratio(&self) -> Option<Decimal> {
        if self.max_risk.is_zero() {
            None
        } else {
            Some(self.max_reward / self.max_risk)
        }
    }

    /// Snapshot pair recorded for an occasion.
    pub fn recorded_pair(&self, occasion: Occasion) -> EngineResult<&SnapshotPair> {
        self.snapshots
            .get(occasion)
            .ok_or_else(|| EngineError::MissingQuote {
                ticker: self.short_leg.ticker.clone(),
                field: match occasion {
                    Occasion::Entry => "entry snapshot",
                    Occasion::ExitProfit => "exit_profit snapshot",
                    Occasion::ExitLoss => "exit_loss snapshot",
                    Occasion::Expiration => "expiration snapshot",
                },
            })
    }
}

fn pair_of(short: &ContractSnapshot, long: &ContractSnapshot) -> SnapshotPair {
    SnapshotPair {
        short: short.clone(),
        long: long.clone(),
    }
}

fn describe(selection: &LegSelection, entry: Decimal, width: Decimal) -> String {
    let hundred = Decimal::ONE_HUNDRED;
    let mut out = format!(
        "Sell {} {}, buy {} {}; ",
        selection.short.strike,
        selection.contract_type,
        selection.long.strike,
        selection.contract_type
    );
    match selection.strategy {
        SpreadStrategy::Credit => out.push_str(&format!(
            "max profit as fraction of the distance between strikes {:.2}%.",
            entry / width * hundred
        )),
        SpreadStrategy::Debit => out.push_str(&format!(
            "max profit as percent of the debit {:.2}%.",
            (width - entry) / entry * hundred
        )),
    }

    let legs = [&selection.short.quote, &selection.long.quote];
    if legs
        .iter()
        .any(|q| q.open_interest.unwrap_or(0) < THIN_MARKET)
    {
        out.push_str("\nOpen Interest is less than 10, careful!");
    }
    if legs.iter().any(|q| q.volume.unwrap_or(0) < THIN_MARKET) {
        out.push_str("\nVolume is less than 10, careful!");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Quote;
    use rust_decimal_macros::dec;

    fn snap(
        strike: Decimal,
        ct: ContractType,
        bid: Decimal,
        ask: Decimal,
        volume: u64,
    ) -> ContractSnapshot {
        ContractSnapshot {
            ticker: format!("O:SPY240419{ct}{strike}"),
            strike,
            contract_type: ct,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            quote: Quote {
                bid: Some(bid),
                ask: Some(ask),
                volume: Some(volume),
                open_interest: Some(1_500),
                delta: Some(dec!(-0.30)),
                ..Quote::default()
            },
        }
    }

    fn params() -> SpreadParams {
        SpreadParams {
            target_reward_ratio: dec!(0.8),
            stop_ratio: dec!(0.5),
            multiplier: dec!(100),
            position_size: Decimal::ONE,
            exit_days_before_expiration: 21,
        }
    }

    fn bull_put(short_bid: Decimal, long_ask: Decimal, volume: u64) -> LegSelection {
        LegSelection {
            underlying: "SPY".to_string(),
            direction: Direction::Bullish,
            strategy: SpreadStrategy::Credit,
            contract_type: ContractType::Put,
            previous_close: dec!(436.00),
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            short: snap(dec!(430), ContractType::Put, short_bid, short_bid + dec!(0.10), volume),
            long: snap(dec!(425), ContractType::Put, long_ask - dec!(0.10), long_ask, volume),
        }
    }

    #[test]
    fn credit_spread_construction() {
        let s = Spread::build(&bull_put(dec!(1.50), dec!(0.80), 200), &params(), Utc::now())
            .unwrap();
        assert_eq!(s.net_premium, dec!(0.70));
        assert_eq!(s.distance_between_strikes, dec!(5));
        assert_eq!(s.max_reward, dec!(70.00));
        assert_eq!(s.max_risk, dec!(430.00));
        assert_eq!(s.target_price, dec!(436.560));
        assert_eq!(s.stop_price, dec!(435.650));
        assert_eq!(s.breakeven, dec!(429.30));
        assert_eq!(s.exit_date, NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
        assert_eq!(s.agent_status, SpreadStatus::None);
        assert!(!s.is_processed);
        assert!(s.snapshots.get(Occasion::Entry).is_some());
        assert!(s.description.starts_with("Sell 430 put, buy 425 put; "));
        assert!(s.description.contains("14.00%"));
        assert!(!s.description.contains("careful"));
    }

    #[test]
    fn thin_market_is_flagged() {
        let s = Spread::build(&bull_put(dec!(1.50), dec!(0.80), 3), &params(), Utc::now())
            .unwrap();
        assert!(s.description.contains("Volume is less than 10, careful!"));
        assert!(!s.description.contains("Open Interest"));
    }

    #[test]
    fn non_positive_credit_is_rejected() {
        let err = Spread::build(&bull_put(dec!(0.80), dec!(0.80), 200), &params(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpread(_)));
    }

    #[test]
    fn credit_wider_than_strikes_is_rejected() {
        let err = Spread::build(&bull_put(dec!(6.00), dec!(0.80), 200), &params(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpread(_)));
    }

    #[test]
    fn equal_strikes_are_rejected() {
        let mut sel = bull_put(dec!(1.50), dec!(0.80), 200);
        sel.long.strike = sel.short.strike;
        let err = Spread::build(&sel, &params(), Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpread(_)));
    }

    #[test]
    fn unrecorded_occasion_is_a_missing_quote() {
        let s = Spread::build(&bull_put(dec!(1.50), dec!(0.80), 200), &params(), Utc::now())
            .unwrap();
        assert!(matches!(
            s.recorded_pair(Occasion::ExitLoss),
            Err(EngineError::MissingQuote { field: "exit_loss snapshot", .. })
        ));
    }
}
