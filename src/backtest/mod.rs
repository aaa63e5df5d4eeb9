pub mod config;
pub mod core;
pub mod runner;

pub use config::BacktestConfig;
pub use core::{BacktestCase, BacktestFixture, BacktestResult, BacktestTrade};
