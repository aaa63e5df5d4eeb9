//! Read-only projections of spread records for listing and reporting.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::execution::lifecycle::SpreadStatus;
use crate::strategy::{Direction, Spread, SpreadStrategy, TradeOutcome};

/// One listing row with the composite score and every contributor.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub spread_guid: Uuid,
    pub underlying_ticker: String,
    pub direction: Direction,
    pub strategy: SpreadStrategy,
    pub agent_status: SpreadStatus,
    pub short_strike: Decimal,
    pub long_strike: Decimal,
    pub expiration_date: NaiveDate,
    pub max_reward: Decimal,
    pub max_risk: Decimal,
    pub adjusted_score: Option<f64>,
    pub pop_score: Option<f64>,
    pub width_score: Option<f64>,
    pub reward_risk_score: Option<f64>,
    pub risk_utilization_score: Option<f64>,
    pub liquidity_score: Option<f64>,
    pub realized_pnl: Option<Decimal>,
}

impl From<&Spread> for DashboardRow {
    fn from(s: &Spread) -> Self {
        let score = s.score.as_ref();
        Self {
            spread_guid: s.spread_guid,
            underlying_ticker: s.underlying_ticker.clone(),
            direction: s.direction,
            strategy: s.strategy,
            agent_status: s.agent_status,
            short_strike: s.short_leg.strike,
            long_strike: s.long_leg.strike,
            expiration_date: s.expiration_date,
            max_reward: s.max_reward,
            max_risk: s.max_risk,
            adjusted_score: score.map(|b| b.adjusted_score),
            pop_score: score.map(|b| b.probability_of_profit.score),
            width_score: score.map(|b| b.width.score),
            reward_risk_score: score.map(|b| b.reward_risk.score),
            risk_utilization_score: score.map(|b| b.risk_utilization.score),
            liquidity_score: score.map(|b| b.liquidity.score),
            realized_pnl: s.realized_pnl,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardFilter {
    pub underlying: Option<String>,
    pub status: Option<SpreadStatus>,
    pub min_score: Option<f64>,
}

impl DashboardFilter {
    fn accepts(&self, row: &DashboardRow) -> bool {
        if let Some(u) = &self.underlying {
            if !row.underlying_ticker.eq_ignore_ascii_case(u) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if row.agent_status != status {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if row.adjusted_score.map_or(true, |s| s < min) {
                return false;
            }
        }
        true
    }
}

/// Filter and sort rows by score, best first. Unscored spreads sort last.
pub fn rows(spreads: &[Spread], filter: &DashboardFilter) -> Vec<DashboardRow> {
    let mut out: Vec<DashboardRow> = spreads
        .iter()
        .map(DashboardRow::from)
        .filter(|r| filter.accepts(r))
        .collect();
    out.sort_by(|a, b| match (a.adjusted_score, b.adjusted_score) {
        (Some(x), Some(y)) => y
            .partial_cmp(&x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.spread_guid.cmp(&b.spread_guid)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.spread_guid.cmp(&b.spread_guid),
    });
    out
}

/// Aggregate paper-trading results over a set of spreads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub active_trades: usize,
    pub completed_trades: usize,
}

impl PerformanceSummary {
    pub fn from_spreads<'a>(spreads: impl IntoIterator<Item = &'a Spread>) -> Self {
        let mut summary = Self::default();
        for s in spreads {
            match s.agent_status {
                SpreadStatus::Entered => summary.active_trades += 1,
                SpreadStatus::Completed => {
                    summary.completed_trades += 1;
                    summary.total_pnl += s.realized_pnl.unwrap_or_default();
                    if s.trade_outcome == Some(TradeOutcome::Profit) {
                        summary.winning_trades += 1;
                    }
                }
                SpreadStatus::None => {}
            }
        }
        summary.total_trades = summary.completed_trades;
        if summary.total_trades > 0 {
            summary.win_rate =
                summary.winning_trades as f64 / summary.total_trades as f64 * 100.0;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{
        ContractSnapshot, ContractType, LegSelection, Quote, ScoringEngine, ScoringParams,
        SpreadParams,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn leg(strike: Decimal, bid: Decimal, ask: Decimal) -> ContractSnapshot {
        ContractSnapshot {
            ticker: format!("O:QQQ240419P{strike}"),
            strike,
            contract_type: ContractType::Put,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            quote: Quote {
                bid: Some(bid),
                ask: Some(ask),
                ..Quote::default()
            },
        }
    }

    fn spread(underlying: &str, adjusted: Option<f64>) -> Spread {
        let selection = LegSelection {
            underlying: underlying.to_string(),
            direction: Direction::Bullish,
            strategy: SpreadStrategy::Credit,
            contract_type: ContractType::Put,
            previous_close: dec!(440),
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            short: leg(dec!(430), dec!(1.50), dec!(1.60)),
            long: leg(dec!(425), dec!(0.70), dec!(0.80)),
        };
        let params = SpreadParams {
            target_reward_ratio: dec!(0.8),
            stop_ratio: dec!(0.5),
            multiplier: dec!(100),
            position_size: Decimal::ONE,
            exit_days_before_expiration: 21,
        };
        let s = Spread::build(&selection, &params, Utc::now()).unwrap();
        match adjusted {
            Some(value) => {
                let mut breakdown = ScoringEngine::new(ScoringParams {
                    optimal_width: Some(dec!(5)),
                    width_tolerance: 1.0,
                    account_risk_budget: dec!(2000),
                    volume_target: 500,
                    open_interest_target: 1000,
                })
                .score(&s);
                breakdown.adjusted_score = value;
                s.with_score(breakdown)
            }
            None => s,
        }
    }

    fn completed(mut s: Spread, pnl: Decimal) -> Spread {
        s.agent_status = SpreadStatus::Completed;
        s.realized_pnl = Some(pnl);
        s.trade_outcome = Some(if pnl > Decimal::ZERO {
            TradeOutcome::Profit
        } else {
            TradeOutcome::Loss
        });
        s
    }

    #[test]
    fn rows_sort_best_first_with_unscored_last() {
        let spreads = vec![
            spread("SPY", Some(41.0)),
            spread("QQQ", None),
            spread("IWM", Some(77.5)),
        ];
        let out = rows(&spreads, &DashboardFilter::default());
        let order: Vec<&str> = out.iter().map(|r| r.underlying_ticker.as_str()).collect();
        assert_eq!(order, vec!["IWM", "SPY", "QQQ"]);
        assert_eq!(out[0].short_strike, dec!(430));
        assert!(out[0].pop_score.is_some());
        assert!(out[2].width_score.is_none());
    }

    #[test]
    fn filter_by_underlying_status_and_score() {
        let mut entered = spread("SPY", Some(80.0));
        entered.agent_status = SpreadStatus::Entered;
        let spreads = vec![entered, spread("spy", Some(50.0)), spread("QQQ", Some(90.0))];

        let by_ticker = DashboardFilter {
            underlying: Some("SPY".to_string()),
            ..DashboardFilter::default()
        };
        assert_eq!(rows(&spreads, &by_ticker).len(), 2);

        let by_status = DashboardFilter {
            status: Some(SpreadStatus::Entered),
            ..DashboardFilter::default()
        };
        assert_eq!(rows(&spreads, &by_status).len(), 1);

        let by_score = DashboardFilter {
            min_score: Some(60.0),
            ..DashboardFilter::default()
        };
        let kept = rows(&spreads, &by_score);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.adjusted_score >= Some(60.0)));
    }

    #[test]
    fn performance_counts_only_completed_trades() {
        let mut open = spread("DIA", None);
        open.agent_status = SpreadStatus::Entered;
        let spreads = vec![
            completed(spread("SPY", None), dec!(50)),
            completed(spread("IWM", None), dec!(-85)),
            completed(spread("QQQ", None), dec!(-170)),
            open,
            spread("XLF", None),
        ];

        let summary = PerformanceSummary::from_spreads(&spreads);
        assert_eq!(summary.total_trades, 3);
        assert_eq!(summary.completed_trades, 3);
        assert_eq!(summary.winning_trades, 1);
        assert_eq!(summary.active_trades, 1);
        assert_eq!(summary.total_pnl, dec!(-205));
        assert!((summary.win_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_set_has_zero_win_rate() {
        let none: Vec<Spread> = Vec::new();
        let summary = PerformanceSummary::from_spreads(&none);
        assert_eq!(summary, PerformanceSummary::default());
    }
}
