use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    execution::lifecycle::{self, Decision, SpreadStatus},
    monitoring::dashboard::PerformanceSummary,
    strategy::{
        Direction, LegSelection, Occasion, ScoringEngine, SnapshotPair, Spread, SpreadParams,
        SpreadStrategy, TradeOutcome, UnderlyingBar,
    },
    types::EngineConfig,
};

/// One spread to replay: its legs at every occasion and the day it was selected.
#[derive(Clone, Debug, Deserialize)]
pub struct BacktestCase {
    pub name: String,
    pub underlying: String,
    pub direction: Direction,
    pub strategy: SpreadStrategy,
    pub previous_close: Decimal,
    pub created: NaiveDate,
    /// Must hold an `entry` pair; exit occasions are optional.
    pub snapshots: BTreeMap<Occasion, SnapshotPair>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BacktestFixture {
    pub cases: Vec<BacktestCase>,
    #[serde(default)]
    pub bars: HashMap<String, Vec<UnderlyingBar>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BacktestTrade {
    pub case: String,
    pub spread_guid: Uuid,
    pub underlying: String,
    pub direction: Direction,
    pub strategy: SpreadStrategy,
    pub status: SpreadStatus,
    pub adjusted_score: Option<f64>,
    pub entry_net: Option<Decimal>,
    pub exit_net: Option<Decimal>,
    pub exit_occasion: Option<Occasion>,
    pub realized_pnl: Option<Decimal>,
    pub outcome: Option<TradeOutcome>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BacktestFailure {
    pub case: String,
    pub error: String,
}

#[derive(Clone, Debug)]
pub struct BacktestResult {
    pub trades: Vec<BacktestTrade>,
    pub spreads: Vec<Spread>,
    pub summary: PerformanceSummary,
    pub failures: Vec<BacktestFailure>,
}

fn at_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Build the spread a case describes, with every exit pair already recorded.
pub fn build_case_spread(
    case: &BacktestCase,
    params: &SpreadParams,
    scoring: &ScoringEngine,
) -> EngineResult<Spread> {
    let entry = case.snapshots.get(&Occasion::Entry).ok_or_else(|| {
        EngineError::MissingQuote {
            ticker: case.name.clone(),
            field: "entry snapshot",
        }
    })?;

    let selection = LegSelection {
        underlying: case.underlying.clone(),
        direction: case.direction,
        strategy: case.strategy,
        contract_type: case.strategy.contract_type(case.direction),
        previous_close: case.previous_close,
        expiration: entry.short.expiration,
        short: entry.short.clone(),
        long: entry.long.clone(),
    };

    let mut spread = Spread::build(&selection, params, at_midnight(case.created))?;
    for (occasion, pair) in &case.snapshots {
        if *occasion != Occasion::Entry {
            spread.snapshots.record(*occasion, pair.clone());
        }
    }
    let breakdown = scoring.score(&spread);
    Ok(spread.with_score(breakdown))
}

/// Walk one spread through its underlying's bars, one lifecycle step per bar.
fn replay(
    mut spread: Spread,
    bars: &[UnderlyingBar],
    created: NaiveDate,
    max_bars: Option<usize>,
) -> EngineResult<(Spread, Option<Occasion>)> {
    let mut exit_occasion = None;
    let mut steps = 0usize;

    for bar in bars.iter().filter(|b| b.date >= created) {
        if spread.is_completed() {
            break;
        }
        if let Some(limit) = max_bars {
            if steps >= limit {
                break;
            }
        }
        steps += 1;

        match lifecycle::evaluate(&spread, bar, bar.date) {
            Decision::Hold => {}
            Decision::Enter => spread = lifecycle::enter(&spread, at_midnight(bar.date))?,
            Decision::Exit(occasion) => {
                spread = lifecycle::complete(&spread, occasion, None, at_midnight(bar.date))?;
                exit_occasion = Some(occasion);
            }
        }
    }
    Ok((spread, exit_occasion))
}

/// Deterministically replay every case of a fixture through the lifecycle.
///
/// Bars are replayed in date order from each case's selection day. The result depends only
/// on the fixture and config, except for spread guids.
pub fn run_backtest_on_cases(
    fixture: &BacktestFixture,
    engine_cfg: &EngineConfig,
    max_bars: Option<usize>,
) -> BacktestResult {
    let params = SpreadParams::from(engine_cfg);
    let scoring = ScoringEngine::new(engine_cfg.into());

    let mut bars_by_underlying: HashMap<&str, Vec<UnderlyingBar>> = HashMap::new();
    for (underlying, bars) in &fixture.bars {
        let mut sorted = bars.clone();
        sorted.sort_by_key(|b| b.date);
        bars_by_underlying.insert(underlying.as_str(), sorted);
    }

    let mut trades = Vec::new();
    let mut spreads = Vec::new();
    let mut failures = Vec::new();

    for case in &fixture.cases {
        let bars = bars_by_underlying
            .get(case.underlying.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let outcome = build_case_spread(case, &params, &scoring)
            .and_then(|spread| replay(spread, bars, case.created, max_bars));
        let (spread, exit_occasion) = match outcome {
            Ok(done) => done,
            Err(err) => {
                warn!(target: "backtest", case = %case.name, error = %err, "case failed");
                failures.push(BacktestFailure {
                    case: case.name.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        debug!(
            target: "backtest",
            case = %case.name,
            status = %spread.agent_status,
            realized_pnl = ?spread.realized_pnl,
            "case replayed"
        );

        trades.push(BacktestTrade {
            case: case.name.clone(),
            spread_guid: spread.spread_guid,
            underlying: spread.underlying_ticker.clone(),
            direction: spread.direction,
            strategy: spread.strategy,
            status: spread.agent_status,
            adjusted_score: spread.score.as_ref().map(|b| b.adjusted_score),
            entry_net: spread.actual_entry_price,
            exit_net: spread.actual_exit_price,
            exit_occasion,
            realized_pnl: spread.realized_pnl,
            outcome: spread.trade_outcome,
        });
        spreads.push(spread);
    }

    let summary = PerformanceSummary::from_spreads(&spreads);
    BacktestResult {
        trades,
        spreads,
        summary,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ContractSnapshot, ContractType, Quote};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn put(ticker: &str, strike: Decimal, bid: Decimal, ask: Decimal) -> ContractSnapshot {
        ContractSnapshot {
            ticker: ticker.to_string(),
            strike,
            contract_type: ContractType::Put,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            quote: Quote {
                bid: Some(bid),
                ask: Some(ask),
                delta: Some(dec!(-0.30)),
                volume: Some(500),
                open_interest: Some(1000),
                ..Quote::default()
            },
        }
    }

    fn bar(d: u32, low: Decimal, high: Decimal) -> UnderlyingBar {
        UnderlyingBar {
            date: day(d),
            open: low,
            high,
            low,
            close: high,
        }
    }

    fn engine_cfg() -> EngineConfig {
        toml::from_str(
            r#"
            target_delta = 0.30
            strike_width = 5
            account_risk_budget = 2000
            "#,
        )
        .unwrap()
    }

    fn bull_put_case() -> BacktestCase {
        let mut snapshots = BTreeMap::new();
        snapshots.insert(
            Occasion::Entry,
            SnapshotPair {
                short: put("S", dec!(430), dec!(1.50), dec!(1.60)),
                long: put("L", dec!(425), dec!(0.70), dec!(0.80)),
            },
        );
        snapshots.insert(
            Occasion::ExitProfit,
            SnapshotPair {
                short: put("S", dec!(430), dec!(0.15), dec!(0.20)),
                long: put("L", dec!(425), dec!(0.00), dec!(0.05)),
            },
        );
        BacktestCase {
            name: "spy-bull-put".to_string(),
            underlying: "SPY".to_string(),
            direction: Direction::Bullish,
            strategy: SpreadStrategy::Credit,
            previous_close: dec!(436),
            created: day(1),
            snapshots,
        }
    }

    #[test]
    fn replays_entry_then_profit_exit() {
        let mut fixture = BacktestFixture {
            cases: vec![bull_put_case()],
            ..BacktestFixture::default()
        };
        // Bars arrive unordered.
        fixture.bars.insert(
            "SPY".to_string(),
            vec![
                bar(4, dec!(436.0), dec!(436.8)),
                bar(1, dec!(435.8), dec!(436.2)),
                bar(29, dec!(436.0), dec!(436.1)),
            ],
        );

        let result = run_backtest_on_cases(&fixture, &engine_cfg(), None);
        assert!(result.failures.is_empty());
        let trade = &result.trades[0];
        assert_eq!(trade.status, SpreadStatus::Completed);
        assert_eq!(trade.entry_net, Some(dec!(0.70)));
        assert_eq!(trade.exit_net, Some(dec!(0.20)));
        assert_eq!(trade.exit_occasion, Some(Occasion::ExitProfit));
        assert_eq!(trade.realized_pnl, Some(dec!(50)));
        assert_eq!(result.summary.winning_trades, 1);
    }

    #[test]
    fn max_bars_stops_before_exit() {
        let mut fixture = BacktestFixture {
            cases: vec![bull_put_case()],
            ..BacktestFixture::default()
        };
        fixture.bars.insert(
            "SPY".to_string(),
            vec![bar(1, dec!(435.8), dec!(436.2)), bar(4, dec!(436.0), dec!(436.8))],
        );

        let result = run_backtest_on_cases(&fixture, &engine_cfg(), Some(1));
        assert_eq!(result.trades[0].status, SpreadStatus::Entered);
        assert_eq!(result.summary.active_trades, 1);
        assert_eq!(result.summary.total_trades, 0);
    }

    #[test]
    fn missing_exit_pair_is_reported_per_case() {
        let mut case = bull_put_case();
        case.snapshots.remove(&Occasion::ExitProfit);
        let mut fixture = BacktestFixture {
            cases: vec![case],
            ..BacktestFixture::default()
        };
        fixture.bars.insert(
            "SPY".to_string(),
            vec![bar(1, dec!(435.8), dec!(436.2)), bar(4, dec!(436.0), dec!(436.8))],
        );

        let result = run_backtest_on_cases(&fixture, &engine_cfg(), None);
        assert!(result.trades.is_empty());
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].error.contains("exit_profit"));
    }
}
