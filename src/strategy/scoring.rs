//! Composite trade-quality score.
//!
//! Five components, each normalized to [0, 100], are combined with fixed weights. A component
//! whose inputs are missing scores 0 and the missing fields are listed on the breakdown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::strategy::{params::ScoringParams, ContractSnapshot, Occasion, Spread, SpreadStrategy};
use crate::utils::math::{optimal_width, round2, to_f64};

pub const POP_WEIGHT: f64 = 0.35;
pub const WIDTH_WEIGHT: f64 = 0.15;
pub const REWARD_RISK_WEIGHT: f64 = 0.20;
pub const RISK_UTILIZATION_WEIGHT: f64 = 0.10;
pub const LIQUIDITY_WEIGHT: f64 = 0.20;

/// One weighted contributor to the composite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Input value before normalization; absent when the inputs were missing.
    pub raw: Option<f64>,
    pub score: f64,
    pub weight: f64,
}

impl ComponentScore {
    fn new(raw: Option<f64>, score: f64, weight: f64) -> Self {
        Self {
            raw: raw.map(round2),
            score: round2(score.clamp(0.0, 100.0)),
            weight,
        }
    }

    fn missing(weight: f64) -> Self {
        Self {
            raw: None,
            score: 0.0,
            weight,
        }
    }

    pub fn contribution(&self) -> f64 {
        self.score * self.weight
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub adjusted_score: f64,
    pub probability_of_profit: ComponentScore,
    pub width: ComponentScore,
    pub reward_risk: ComponentScore,
    pub risk_utilization: ComponentScore,
    pub liquidity: ComponentScore,
    /// Quote fields that were absent, e.g. `short.delta`.
    #[serde(default)]
    pub missing: Vec<String>,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [(&'static str, &ComponentScore); 5] {
        [
            ("probability_of_profit", &self.probability_of_profit),
            ("width", &self.width),
            ("reward_risk", &self.reward_risk),
            ("risk_utilization", &self.risk_utilization),
            ("liquidity", &self.liquidity),
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// `IncompleteSnapshot` when any component had to be zeroed for missing data.
    pub fn ensure_complete(&self) -> EngineResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(EngineError::IncompleteSnapshot(self.missing.clone()))
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScoringEngine {
    params: ScoringParams,
}

impl ScoringEngine {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    /// Score a spread from its entry snapshots and construction-time figures.
    pub fn score(&self, spread: &Spread) -> ScoreBreakdown {
        let mut missing = Vec::new();
        let entry = spread.snapshots.get(Occasion::Entry);
        if entry.is_none() {
            missing.push("entry snapshot".to_string());
        }

        let pop = match entry {
            Some(pair) => {
                self.probability_of_profit(spread.strategy, &pair.short, &pair.long, &mut missing)
            }
            None => ComponentScore::missing(POP_WEIGHT),
        };
        let width = self.width(spread);
        let reward_risk = reward_risk(spread);
        let risk_utilization = self.risk_utilization(spread);
        let liquidity = match entry {
            Some(pair) => self.liquidity(&pair.short, &pair.long, &mut missing),
            None => ComponentScore::missing(LIQUIDITY_WEIGHT),
        };

        let composite = pop.contribution()
            + width.contribution()
            + reward_risk.contribution()
            + risk_utilization.contribution()
            + liquidity.contribution();

        ScoreBreakdown {
            adjusted_score: round2(composite.clamp(0.0, 100.0)),
            probability_of_profit: pop,
            width,
            reward_risk,
            risk_utilization,
            liquidity,
            missing,
        }
    }

    fn probability_of_profit(
        &self,
        strategy: SpreadStrategy,
        short: &ContractSnapshot,
        long: &ContractSnapshot,
        missing: &mut Vec<String>,
    ) -> ComponentScore {
        // Credit trades win when the short leg expires worthless; debit trades need the long
        // leg to finish in the money.
        let (leg, label) = match strategy {
            SpreadStrategy::Credit => (short, "short.delta"),
            SpreadStrategy::Debit => (long, "long.delta"),
        };
        let Some(delta) = leg.quote.delta.map(|d| to_f64(d.abs())) else {
            missing.push(label.to_string());
            return ComponentScore::missing(POP_WEIGHT);
        };
        let pop = match strategy {
            SpreadStrategy::Credit => 100.0 * (1.0 - delta),
            SpreadStrategy::Debit => 100.0 * delta,
        };
        ComponentScore::new(Some(pop), pop, POP_WEIGHT)
    }

    fn width(&self, spread: &Spread) -> ComponentScore {
        let optimal = self
            .params
            .optimal_width
            .unwrap_or_else(|| optimal_width(spread.previous_close, spread.direction));
        if optimal <= Decimal::ZERO {
            return ComponentScore::new(None, 0.0, WIDTH_WEIGHT);
        }
        let ratio = to_f64(spread.distance_between_strikes / optimal);
        let deviation = (ratio - 1.0).abs();
        let score = if self.params.width_tolerance > 0.0 {
            100.0 * (1.0 - deviation / self.params.width_tolerance).max(0.0)
        } else if deviation == 0.0 {
            100.0
        } else {
            0.0
        };
        ComponentScore::new(Some(ratio), score, WIDTH_WEIGHT)
    }

    fn risk_utilization(&self, spread: &Spread) -> ComponentScore {
        if self.params.account_risk_budget <= Decimal::ZERO {
            return ComponentScore::new(None, 0.0, RISK_UTILIZATION_WEIGHT);
        }
        let used = spread.max_risk * spread.position_size;
        let fraction = to_f64(used / self.params.account_risk_budget);
        ComponentScore::new(Some(fraction), 100.0 * (1.0 - fraction), RISK_UTILIZATION_WEIGHT)
    }

    fn liquidity(
        &self,
        short: &ContractSnapshot,
        long: &ContractSnapshot,
        missing: &mut Vec<String>,
    ) -> ComponentScore {
        let before = missing.len();
        let mut volumes = Vec::with_capacity(2);
        let mut interests = Vec::with_capacity(2);
        for (side, leg) in [("short", short), ("long", long)] {
            match leg.quote.volume {
                Some(v) => volumes.push(v),
                None => missing.push(format!("{side}.volume")),
            }
            match leg.quote.open_interest {
                Some(oi) => interests.push(oi),
                None => missing.push(format!("{side}.open_interest")),
            }
        }
        if missing.len() > before {
            return ComponentScore::missing(LIQUIDITY_WEIGHT);
        }

        let volume = average(volumes.iter().map(|v| saturate(*v, self.params.volume_target)));
        let open_interest = average(
            interests
                .iter()
                .map(|oi| saturate(*oi, self.params.open_interest_target)),
        );
        let score = (volume + open_interest) / 2.0;
        ComponentScore::new(Some(score), score, LIQUIDITY_WEIGHT)
    }
}

fn reward_risk(spread: &Spread) -> ComponentScore {
    match spread.reward_risk_ratio() {
        Some(r) if r >= Decimal::ZERO => {
            let r = to_f64(r);
            // 1:1 maps to 50 and the score approaches 100 as the ratio grows.
            ComponentScore::new(Some(r), 100.0 * r / (1.0 + r), REWARD_RISK_WEIGHT)
        }
        _ => ComponentScore::new(None, 0.0, REWARD_RISK_WEIGHT),
    }
}

/// 100 x min(1, count / target).
fn saturate(count: u64, target: u64) -> f64 {
    if target == 0 {
        return 100.0;
    }
    100.0 * (count as f64 / target as f64).min(1.0)
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{
        params::SpreadParams, ContractType, Direction, LegSelection, Quote,
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn snap(strike: Decimal, bid: Decimal, ask: Decimal, quote: Quote) -> ContractSnapshot {
        ContractSnapshot {
            ticker: format!("O:SPY240419P{strike}"),
            strike,
            contract_type: ContractType::Put,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            quote: Quote {
                bid: Some(bid),
                ask: Some(ask),
                ..quote
            },
        }
    }

    fn spread(short_quote: Quote, long_quote: Quote) -> Spread {
        let selection = LegSelection {
            underlying: "SPY".to_string(),
            direction: Direction::Bullish,
            strategy: SpreadStrategy::Credit,
            contract_type: ContractType::Put,
            previous_close: dec!(100),
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            short: snap(dec!(95), dec!(1.50), dec!(1.60), short_quote),
            long: snap(dec!(90), dec!(0.70), dec!(0.80), long_quote),
        };
        let params = SpreadParams {
            target_reward_ratio: dec!(0.8),
            stop_ratio: dec!(0.5),
            multiplier: dec!(100),
            position_size: Decimal::ONE,
            exit_days_before_expiration: 21,
        };
        Spread::build(&selection, &params, Utc::now()).unwrap()
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringParams {
            optimal_width: None,
            width_tolerance: 1.0,
            account_risk_budget: dec!(2000),
            volume_target: 500,
            open_interest_target: 1_000,
        })
    }

    fn liquid(delta: Decimal) -> Quote {
        Quote {
            delta: Some(delta),
            volume: Some(250),
            open_interest: Some(2_000),
            ..Quote::default()
        }
    }

    #[test]
    fn components_and_composite() {
        let s = spread(liquid(dec!(-0.30)), liquid(dec!(-0.20)));
        let b = engine().score(&s);

        assert!(b.is_complete());
        assert_eq!(b.probability_of_profit.score, 70.0);
        // 100 * 0.05 * 1.2 = 6 -> standard width 5, ratio 1.0
        assert_eq!(b.width.score, 100.0);
        // reward 70 / risk 430
        assert_eq!(b.reward_risk.score, 14.0);
        // risk 430 of 2000
        assert_eq!(b.risk_utilization.score, 78.5);
        // volume 50, open interest 100
        assert_eq!(b.liquidity.score, 75.0);

        let weighted: f64 = b.components().iter().map(|(_, c)| c.contribution()).sum();
        assert!((weighted - b.adjusted_score).abs() <= 0.01);
        assert!((b.adjusted_score - 65.15).abs() <= 0.01);
    }

    #[test]
    fn missing_delta_zeroes_pop_and_reports() {
        let s = spread(
            Quote {
                delta: None,
                ..liquid(dec!(0))
            },
            liquid(dec!(-0.20)),
        );
        let b = engine().score(&s);
        assert_eq!(b.probability_of_profit.score, 0.0);
        assert_eq!(b.missing, vec!["short.delta".to_string()]);
        assert_eq!(
            b.ensure_complete(),
            Err(EngineError::IncompleteSnapshot(vec!["short.delta".to_string()]))
        );
        assert!(b.liquidity.score > 0.0);
    }

    #[test]
    fn missing_volume_zeroes_liquidity() {
        let s = spread(
            liquid(dec!(-0.30)),
            Quote {
                volume: None,
                ..liquid(dec!(-0.20))
            },
        );
        let b = engine().score(&s);
        assert_eq!(b.liquidity.score, 0.0);
        assert_eq!(b.missing, vec!["long.volume".to_string()]);
    }

    #[test]
    fn scores_stay_in_range() {
        let over_budget = ScoringEngine::new(ScoringParams {
            optimal_width: Some(dec!(50)),
            width_tolerance: 0.25,
            account_risk_budget: dec!(100),
            volume_target: 0,
            open_interest_target: 0,
        });
        let s = spread(liquid(dec!(-1.40)), liquid(dec!(-0.20)));
        let b = over_budget.score(&s);
        for (name, c) in b.components() {
            assert!((0.0..=100.0).contains(&c.score), "{name} out of range: {}", c.score);
        }
        assert!((0.0..=100.0).contains(&b.adjusted_score));
        assert_eq!(b.risk_utilization.score, 0.0);
        assert_eq!(b.width.score, 0.0);
        assert_eq!(b.liquidity.score, 100.0);
    }
}
