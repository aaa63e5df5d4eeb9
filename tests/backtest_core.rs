use options_spread_bot::backtest::core::run_backtest_on_cases;
use options_spread_bot::backtest::runner::load_fixture;
use options_spread_bot::execution::SpreadStatus;
use options_spread_bot::strategy::{Occasion, TradeOutcome};
use options_spread_bot::types::EngineConfig;

use rust_decimal_macros::dec;

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

fn fixture_path() -> String {
    format!("{}/tests/fixtures/backtest.json", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn backtest_replays_every_exit_kind() {
    let fixture = load_fixture(&fixture_path()).unwrap();
    let result = run_backtest_on_cases(&fixture, &engine_cfg(), None);

    assert!(result.failures.is_empty(), "{:?}", result.failures);
    assert_eq!(result.trades.len(), 4);

    let by_case = |name: &str| {
        result
            .trades
            .iter()
            .find(|t| t.case == name)
            .unwrap_or_else(|| panic!("missing case {name}"))
    };

    let spy = by_case("spy-bull-put-target");
    assert_eq!(spy.entry_net, Some(dec!(0.70)));
    assert_eq!(spy.exit_occasion, Some(Occasion::ExitProfit));
    assert_eq!(spy.realized_pnl, Some(dec!(50)));
    assert_eq!(spy.outcome, Some(TradeOutcome::Profit));

    let iwm = by_case("iwm-bull-put-stop");
    assert_eq!(iwm.exit_net, Some(dec!(1.55)));
    assert_eq!(iwm.exit_occasion, Some(Occasion::ExitLoss));
    assert_eq!(iwm.realized_pnl, Some(dec!(-85)));

    let qqq = by_case("qqq-bear-put-stop");
    assert_eq!(qqq.entry_net, Some(dec!(2.60)));
    assert_eq!(qqq.exit_net, Some(dec!(0.90)));
    assert_eq!(qqq.realized_pnl, Some(dec!(-170)));
    assert_eq!(qqq.outcome, Some(TradeOutcome::Loss));

    let dia = by_case("dia-bear-put-expiration");
    assert_eq!(dia.exit_occasion, Some(Occasion::Expiration));
    assert_eq!(dia.realized_pnl, Some(dec!(90)));

    assert!(result
        .trades
        .iter()
        .all(|t| t.status == SpreadStatus::Completed));
    assert_eq!(result.summary.total_trades, 4);
    assert_eq!(result.summary.winning_trades, 2);
    assert!((result.summary.win_rate - 50.0).abs() < 1e-9);
    assert_eq!(result.summary.total_pnl, dec!(-115));
}

#[test]
fn backtest_is_deterministic_apart_from_guids() {
    let fixture = load_fixture(&fixture_path()).unwrap();
    let a = run_backtest_on_cases(&fixture, &engine_cfg(), None);
    let b = run_backtest_on_cases(&fixture, &engine_cfg(), None);

    let key = |r: &options_spread_bot::backtest::BacktestResult| {
        r.trades
            .iter()
            .map(|t| (t.case.clone(), t.realized_pnl, t.exit_occasion, t.adjusted_score))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&a), key(&b));
    assert_eq!(a.summary, b.summary);
}

#[test]
fn completed_spreads_ignore_later_bars() {
    let fixture = load_fixture(&fixture_path()).unwrap();
    let result = run_backtest_on_cases(&fixture, &engine_cfg(), None);

    // SPY has a stop-breaching bar after the profit exit.
    let spy = result
        .spreads
        .iter()
        .find(|s| s.underlying_ticker == "SPY")
        .unwrap();
    assert_eq!(spy.trade_outcome, Some(TradeOutcome::Profit));
    assert_eq!(
        spy.exit_timestamp.map(|t| t.date_naive().to_string()),
        Some("2024-03-04".to_string())
    );
}
