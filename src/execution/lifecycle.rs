use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::execution::fill::{simulate_entry, simulate_exit};
use crate::strategy::{
    Direction, Occasion, SnapshotPair, Spread, TradeOutcome, UnderlyingBar,
};
use crate::utils::math::realized_pnl;

/// Lifecycle status of a spread. `Completed` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadStatus {
    #[default]
    None,
    Entered,
    Completed,
}

impl SpreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SpreadStatus::None => "none",
            SpreadStatus::Entered => "entered",
            SpreadStatus::Completed => "completed",
        }
    }

    /// The only allowed edges are `none -> entered` and `entered -> completed`.
    pub fn can_transition_to(self, next: SpreadStatus) -> bool {
        matches!(
            (self, next),
            (SpreadStatus::None, SpreadStatus::Entered)
                | (SpreadStatus::Entered, SpreadStatus::Completed)
        )
    }

    pub fn transition(self, next: SpreadStatus) -> EngineResult<SpreadStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for SpreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SpreadStatus::None),
            "entered" => Ok(SpreadStatus::Entered),
            "completed" => Ok(SpreadStatus::Completed),
            other => Err(format!("unknown spread status `{other}`")),
        }
    }
}

/// What the monitor decided to do with a spread for one underlying observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Enter,
    Exit(Occasion),
}

/// Exit snapshots observed by the market-data collaborator for a given occasion.
#[derive(Clone, Debug)]
pub struct ExitObservation {
    pub occasion: Occasion,
    pub pair: SnapshotPair,
}

/// True when any price of the bar touches the entry price in the trade's direction.
pub fn entry_triggered(spread: &Spread, bar: &UnderlyingBar) -> bool {
    let entry = spread.entry_price;
    match spread.direction {
        Direction::Bullish => bar.prices().iter().any(|p| *p >= entry),
        Direction::Bearish => bar.prices().iter().any(|p| *p <= entry),
    }
}

/// Exit occasion for an entered spread, if any.
///
/// A bar that breaches both target and stop resolves to a loss. With neither breached, a
/// spread whose expiration has been reached exits on the expiration occasion.
pub fn exit_trigger(spread: &Spread, bar: &UnderlyingBar, as_of: NaiveDate) -> Option<Occasion> {
    let prices = bar.prices();
    let (hit_target, hit_stop) = match spread.direction {
        Direction::Bullish => (
            prices.iter().any(|p| *p >= spread.target_price),
            prices.iter().any(|p| *p <= spread.stop_price),
        ),
        Direction::Bearish => (
            prices.iter().any(|p| *p <= spread.target_price),
            prices.iter().any(|p| *p >= spread.stop_price),
        ),
    };

    if hit_stop {
        Some(Occasion::ExitLoss)
    } else if hit_target {
        Some(Occasion::ExitProfit)
    } else if as_of >= spread.expiration_date {
        Some(Occasion::Expiration)
    } else {
        None
    }
}

/// Whether a spread that never opened can still open on `as_of`.
pub fn entry_window_open(spread: &Spread, as_of: NaiveDate) -> bool {
    as_of < spread.expiration_date
}

/// Decide the next step for a spread. Completed spreads are never re-evaluated, and a
/// spread that never opened stays closed once its expiration is reached.
pub fn evaluate(spread: &Spread, bar: &UnderlyingBar, as_of: NaiveDate) -> Decision {
    match spread.agent_status {
        SpreadStatus::None if !entry_window_open(spread, as_of) => Decision::Hold,
        SpreadStatus::None if entry_triggered(spread, bar) => Decision::Enter,
        SpreadStatus::None => Decision::Hold,
        SpreadStatus::Entered => exit_trigger(spread, bar, as_of)
            .map(Decision::Exit)
            .unwrap_or(Decision::Hold),
        SpreadStatus::Completed => Decision::Hold,
    }
}

/// `none -> entered` using the recorded entry snapshots. Returns the updated spread; the
/// input is left untouched when any step fails.
pub fn enter(spread: &Spread, at: DateTime<Utc>) -> EngineResult<Spread> {
    let status = spread.agent_status.transition(SpreadStatus::Entered)?;
    let pair = spread.recorded_pair(Occasion::Entry)?;
    let fill = simulate_entry(spread.strategy, pair)?;

    let mut next = spread.clone();
    next.agent_status = status;
    next.entry_timestamp = Some(at);
    next.actual_entry_price = Some(fill.net);
    next.short_leg.actual_entry_price = Some(fill.short_price);
    next.long_leg.actual_entry_price = Some(fill.long_price);

    info!(
        target: "lifecycle",
        spread_guid = %next.spread_guid,
        underlying = %next.underlying_ticker,
        entry_net = %fill.net,
        "spread entered"
    );
    Ok(next)
}

/// `entered -> completed` on the `trigger` occasion.
///
/// `observation` carries freshly fetched exit snapshots; without it the pair already
/// recorded for `trigger` is used. An observation captured for a different occasion is
/// rejected as stale.
pub fn complete(
    spread: &Spread,
    trigger: Occasion,
    observation: Option<ExitObservation>,
    at: DateTime<Utc>,
) -> EngineResult<Spread> {
    let status = spread.agent_status.transition(SpreadStatus::Completed)?;
    if trigger == Occasion::Entry {
        return Err(EngineError::StaleSnapshot {
            expected: Occasion::ExitProfit,
            actual: trigger,
        });
    }

    let mut next = spread.clone();
    if let Some(obs) = observation {
        if obs.occasion != trigger {
            return Err(EngineError::StaleSnapshot {
                expected: trigger,
                actual: obs.occasion,
            });
        }
        if !next.snapshots.record(obs.occasion, obs.pair) {
            debug!(
                target: "lifecycle",
                spread_guid = %next.spread_guid,
                occasion = %trigger,
                "exit snapshots already recorded; keeping the first observation"
            );
        }
    }

    let pair = next.recorded_pair(trigger)?;
    let fill = simulate_exit(next.strategy, pair)?;
    let entry = next.actual_entry_price.ok_or_else(|| {
        EngineError::InvalidSpread(format!(
            "spread {} is entered without an entry price",
            next.spread_guid
        ))
    })?;
    let pnl = realized_pnl(
        next.strategy,
        entry,
        fill.net,
        next.multiplier,
        next.position_size,
    );

    next.agent_status = status;
    next.is_processed = true;
    next.exit_timestamp = Some(at);
    next.actual_exit_price = Some(fill.net);
    next.short_leg.actual_exit_price = Some(fill.short_price);
    next.long_leg.actual_exit_price = Some(fill.long_price);
    next.realized_pnl = Some(pnl);
    next.trade_outcome = Some(if pnl > rust_decimal::Decimal::ZERO {
        TradeOutcome::Profit
    } else {
        TradeOutcome::Loss
    });

    info!(
        target: "lifecycle",
        spread_guid = %next.spread_guid,
        underlying = %next.underlying_ticker,
        occasion = %trigger,
        exit_net = %fill.net,
        realized_pnl = %pnl,
        "spread completed"
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_is_monotonic() {
        assert!(SpreadStatus::None.can_transition_to(SpreadStatus::Entered));
        assert!(SpreadStatus::Entered.can_transition_to(SpreadStatus::Completed));
        assert!(!SpreadStatus::None.can_transition_to(SpreadStatus::Completed));
        assert!(!SpreadStatus::Entered.can_transition_to(SpreadStatus::None));
        assert!(!SpreadStatus::Completed.can_transition_to(SpreadStatus::Completed));
        assert_eq!(
            SpreadStatus::Completed.transition(SpreadStatus::Entered),
            Err(EngineError::InvalidTransition {
                from: SpreadStatus::Completed,
                to: SpreadStatus::Entered
            })
        );
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in [SpreadStatus::None, SpreadStatus::Entered, SpreadStatus::Completed] {
            assert_eq!(s.as_str().parse::<SpreadStatus>(), Ok(s));
        }
        assert!("open".parse::<SpreadStatus>().is_err());
    }
}
