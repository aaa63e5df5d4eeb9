pub mod fill;
pub mod lifecycle;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::client::MarketDataSource;
use crate::error::{EngineError, Stage, StageError};
use crate::monitoring::metrics::{log_metrics_snapshot, METRICS};
use crate::storage::{SpreadStore, StoreError};
use crate::strategy::{
    Direction, LegSelector, OptionChain, ScoringEngine, SnapshotPair, Spread, SpreadParams,
    SpreadStrategy, UnderlyingBar,
};
use crate::types::AppConfig;

pub use fill::{simulate_entry, simulate_exit, Fill};
pub use lifecycle::{Decision, ExitObservation, SpreadStatus};

/// Everything one batch pass needs. Nothing here outlives the pass.
pub struct RunContext {
    pub now: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub selector: LegSelector,
    pub scoring: ScoringEngine,
    pub spread_params: SpreadParams,
    pub max_parallel: usize,
    pub store: Arc<dyn SpreadStore>,
    pub market_data: Arc<dyn MarketDataSource>,
}

impl RunContext {
    pub fn from_config(
        cfg: &AppConfig,
        store: Arc<dyn SpreadStore>,
        market_data: Arc<dyn MarketDataSource>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            now,
            as_of: now.date_naive(),
            selector: LegSelector::new((&cfg.engine).into()),
            scoring: ScoringEngine::new((&cfg.engine).into()),
            spread_params: (&cfg.engine).into(),
            max_parallel: cfg.execution.max_parallel_evaluations.max(1),
            store,
            market_data,
        }
    }
}

/// Result of one spread's step within a pass.
#[derive(Debug)]
pub enum StepOutcome {
    Selected,
    Entered,
    Completed,
    Held,
    /// Another evaluation already moved the stored record past the expected status.
    LostRace,
    Failed(StageError),
    /// Recorded but non-fatal; the spread was still persisted.
    Degraded(StageError),
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub evaluated: usize,
    pub selected: usize,
    pub entered: usize,
    pub completed: usize,
    pub held: usize,
    pub lost_race: usize,
    /// Errors that stopped a spread's current step.
    pub failures: Vec<StageError>,
    /// Errors that only degraded a result.
    pub warnings: Vec<StageError>,
}

impl BatchSummary {
    fn absorb(&mut self, outcome: StepOutcome) {
        if !matches!(outcome, StepOutcome::Degraded(_)) {
            self.evaluated += 1;
        }
        match outcome {
            StepOutcome::Selected => self.selected += 1,
            StepOutcome::Entered => self.entered += 1,
            StepOutcome::Completed => self.completed += 1,
            StepOutcome::Held => self.held += 1,
            StepOutcome::LostRace => self.lost_race += 1,
            StepOutcome::Failed(err) => self.failures.push(err),
            StepOutcome::Degraded(err) => self.warnings.push(err),
        }
    }

    fn log(&self, pass: &str) {
        info!(
            target: "bot",
            pass,
            evaluated = self.evaluated,
            selected = self.selected,
            entered = self.entered,
            completed = self.completed,
            held = self.held,
            lost_race = self.lost_race,
            failures = self.failures.len(),
            warnings = self.warnings.len(),
            "batch pass finished"
        );
        log_metrics_snapshot(&METRICS.snapshot());
    }
}

fn fail(err: StageError) -> StepOutcome {
    warn!(
        target: "bot",
        spread_guid = ?err.spread_guid,
        stage = %err.stage,
        error = %err.message,
        "spread step failed"
    );
    METRICS.record_stage_failure(err.stage, err.spread_guid);
    StepOutcome::Failed(err)
}

/// Every intent evaluated for each ticker.
pub const INTENTS: [(Direction, SpreadStrategy); 4] = [
    (Direction::Bullish, SpreadStrategy::Credit),
    (Direction::Bearish, SpreadStrategy::Credit),
    (Direction::Bullish, SpreadStrategy::Debit),
    (Direction::Bearish, SpreadStrategy::Debit),
];

/// Selection pass: build, score and insert one spread per ticker and intent.
pub async fn select_pass(
    ctx: &RunContext,
    tickers: &[String],
    expiration: NaiveDate,
) -> BatchSummary {
    info!(
        target: "bot",
        tickers = tickers.len(),
        %expiration,
        "selection pass starting"
    );

    let outcomes: Vec<Vec<StepOutcome>> = stream::iter(tickers.iter().cloned())
        .map(|ticker| async move { select_ticker(ctx, &ticker, expiration).await })
        .buffer_unordered(ctx.max_parallel)
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes.into_iter().flatten() {
        summary.absorb(outcome);
    }
    summary.log("select");
    summary
}

async fn select_ticker(
    ctx: &RunContext,
    ticker: &str,
    expiration: NaiveDate,
) -> Vec<StepOutcome> {
    let chain = match ctx.market_data.option_chain(ticker, expiration).await {
        Ok(chain) => chain,
        Err(err) => {
            return vec![fail(StageError::other(
                None,
                Stage::MarketData,
                format!("{ticker}: {err}"),
            ))]
        }
    };

    let mut out = Vec::with_capacity(INTENTS.len());
    for (direction, strategy) in INTENTS {
        out.extend(select_one(ctx, &chain, direction, strategy).await);
    }
    out
}

/// Build and score one spread without persisting it.
pub fn build_spread(
    ctx: &RunContext,
    chain: &OptionChain,
    direction: Direction,
    strategy: SpreadStrategy,
) -> Result<(Spread, Option<EngineError>), StageError> {
    let selection = ctx
        .selector
        .select(chain, direction, strategy)
        .map_err(|e| StageError::engine(None, Stage::Selection, e))?;
    let spread = Spread::build(&selection, &ctx.spread_params, ctx.now).map_err(|e| {
        let stage = match e {
            EngineError::MissingQuote { .. } => Stage::EntryFill,
            _ => Stage::Selection,
        };
        StageError::engine(None, stage, e)
    })?;

    let breakdown = ctx.scoring.score(&spread);
    let incomplete = breakdown.ensure_complete().err();
    Ok((spread.with_score(breakdown), incomplete))
}

async fn select_one(
    ctx: &RunContext,
    chain: &OptionChain,
    direction: Direction,
    strategy: SpreadStrategy,
) -> Vec<StepOutcome> {
    let (spread, incomplete) = match build_spread(ctx, chain, direction, strategy) {
        Ok(built) => built,
        Err(err) => return vec![fail(err)],
    };

    let mut out = Vec::new();
    if let Some(err) = incomplete {
        warn!(
            target: "selection",
            spread_guid = %spread.spread_guid,
            error = %err,
            "scored with missing inputs"
        );
        out.push(StepOutcome::Degraded(StageError::engine(
            Some(spread.spread_guid),
            Stage::Scoring,
            err,
        )));
    }

    match ctx.store.insert(&spread).await {
        Ok(()) => {
            METRICS.record_selected(&spread.underlying_ticker, spread.spread_guid);
            info!(
                target: "selection",
                spread_guid = %spread.spread_guid,
                underlying = %spread.underlying_ticker,
                %direction,
                %strategy,
                adjusted_score = ?spread.score.as_ref().map(|b| b.adjusted_score),
                "spread stored"
            );
            out.push(StepOutcome::Selected);
        }
        Err(err) => out.push(fail(StageError::other(
            Some(spread.spread_guid),
            Stage::Persistence,
            err,
        ))),
    }
    out
}

/// Lifecycle pass over every entered spread and every unopened spread before its expiration.
///
/// Each spread is independent; failures are collected and never stop the batch.
pub async fn run_pass(ctx: &RunContext) -> Result<BatchSummary, StoreError> {
    let spreads: Vec<Spread> = ctx
        .store
        .list()
        .await?
        .into_iter()
        .filter(|s| match s.agent_status {
            SpreadStatus::None => lifecycle::entry_window_open(s, ctx.as_of),
            SpreadStatus::Entered => true,
            SpreadStatus::Completed => false,
        })
        .collect();

    info!(target: "bot", open = spreads.len(), as_of = %ctx.as_of, "lifecycle pass starting");

    let mut underlyings: Vec<String> = spreads.iter().map(|s| s.underlying_ticker.clone()).collect();
    underlyings.sort();
    underlyings.dedup();

    let bars: HashMap<String, Result<UnderlyingBar, String>> = stream::iter(underlyings)
        .map(|u| async move {
            let bar = ctx
                .market_data
                .previous_bar(&u)
                .await
                .map_err(|e| e.to_string());
            (u, bar)
        })
        .buffer_unordered(ctx.max_parallel)
        .collect()
        .await;
    let bars = &bars;

    let outcomes: Vec<StepOutcome> = stream::iter(spreads)
        .map(|spread| async move {
            match bars.get(&spread.underlying_ticker) {
                Some(Ok(bar)) => advance(ctx, spread, bar).await,
                Some(Err(err)) => fail(StageError::other(
                    Some(spread.spread_guid),
                    Stage::MarketData,
                    err,
                )),
                None => fail(StageError::other(
                    Some(spread.spread_guid),
                    Stage::MarketData,
                    "no bar fetched",
                )),
            }
        })
        .buffer_unordered(ctx.max_parallel)
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        summary.absorb(outcome);
    }
    summary.log("run");
    Ok(summary)
}

/// Take at most one lifecycle step for a spread and persist it conditionally.
pub async fn advance(ctx: &RunContext, spread: Spread, bar: &UnderlyingBar) -> StepOutcome {
    let guid = Some(spread.spread_guid);
    match lifecycle::evaluate(&spread, bar, ctx.as_of) {
        Decision::Hold => {
            debug!(target: "lifecycle", spread_guid = %spread.spread_guid, "holding");
            StepOutcome::Held
        }
        Decision::Enter => {
            let next = match lifecycle::enter(&spread, ctx.now) {
                Ok(next) => next,
                Err(err) => return fail(StageError::engine(guid, Stage::EntryFill, err)),
            };
            persist(ctx, SpreadStatus::None, &next, StepOutcome::Entered).await
        }
        Decision::Exit(occasion) => {
            let observation = if spread.snapshots.get(occasion).is_some() {
                None
            } else {
                match fetch_pair(ctx, &spread).await {
                    Ok(pair) => Some(ExitObservation { occasion, pair }),
                    Err(err) => return fail(err),
                }
            };
            let next = match lifecycle::complete(&spread, occasion, observation, ctx.now) {
                Ok(next) => next,
                Err(err @ EngineError::InvalidTransition { .. }) => {
                    return fail(StageError::engine(guid, Stage::Monitoring, err))
                }
                Err(err) => return fail(StageError::engine(guid, Stage::ExitFill, err)),
            };
            persist(ctx, SpreadStatus::Entered, &next, StepOutcome::Completed).await
        }
    }
}

async fn fetch_pair(ctx: &RunContext, spread: &Spread) -> Result<SnapshotPair, StageError> {
    let guid = Some(spread.spread_guid);
    let tickers = [spread.short_leg.ticker.clone(), spread.long_leg.ticker.clone()];
    let mut snaps = ctx
        .market_data
        .contract_snapshots(&spread.underlying_ticker, &tickers)
        .await
        .map_err(|e| StageError::other(guid, Stage::MarketData, e))?;
    if snaps.len() != 2 {
        return Err(StageError::other(
            guid,
            Stage::MarketData,
            format!("expected 2 leg snapshots, got {}", snaps.len()),
        ));
    }
    let long = snaps.remove(1);
    let short = snaps.remove(0);
    Ok(SnapshotPair { short, long })
}

async fn persist(
    ctx: &RunContext,
    expected: SpreadStatus,
    next: &Spread,
    won: StepOutcome,
) -> StepOutcome {
    match ctx.store.compare_and_swap(expected, next).await {
        Ok(true) => {
            match next.agent_status {
                SpreadStatus::Entered => METRICS.record_entered(next.spread_guid),
                SpreadStatus::Completed => METRICS.record_completed(next.spread_guid),
                SpreadStatus::None => {}
            }
            won
        }
        Ok(false) => {
            info!(
                target: "storage",
                spread_guid = %next.spread_guid,
                expected = %expected,
                "stored status moved on; transition dropped"
            );
            StepOutcome::LostRace
        }
        Err(err) => fail(StageError::other(
            Some(next.spread_guid),
            Stage::Persistence,
            err,
        )),
    }
}
