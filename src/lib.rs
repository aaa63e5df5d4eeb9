pub mod client;
pub mod error;
pub mod strategy;
pub mod execution;
pub mod storage;
pub mod monitoring;
pub mod utils;
pub mod backtest;
pub mod types;

pub use crate::types::*;
