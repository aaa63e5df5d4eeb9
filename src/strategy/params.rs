use rust_decimal::Decimal;

use crate::types::EngineConfig;

/// Parameters for choosing the two legs from a chain.
#[derive(Clone, Debug)]
pub struct SelectionParams {
    /// |delta| the short leg should be closest to.
    pub target_delta: Decimal,
    /// Exact strike distance to the protective leg.
    pub strike_width: Decimal,
    /// Net premium over width below which a spread is not worth opening.
    pub min_premium_ratio: Option<Decimal>,
}

/// Parameters for the composite trade-quality score.
#[derive(Clone, Debug)]
pub struct ScoringParams {
    /// Ideal strike width; derived from the underlying price when absent.
    pub optimal_width: Option<Decimal>,
    /// Ratio deviation from 1.0 at which the width component reaches zero.
    pub width_tolerance: f64,
    /// Dollar budget the risk-utilization component measures max risk against.
    pub account_risk_budget: Decimal,
    pub volume_target: u64,
    pub open_interest_target: u64,
}

/// Parameters fixed at spread construction and used again at exit.
#[derive(Clone, Debug)]
pub struct SpreadParams {
    /// Fraction of the entry net used as the move to the target price.
    pub target_reward_ratio: Decimal,
    /// Fraction of the entry net used as the move to the stop price.
    pub stop_ratio: Decimal,
    /// Shares per contract.
    pub multiplier: Decimal,
    /// Number of contract pairs.
    pub position_size: Decimal,
    pub exit_days_before_expiration: i64,
}

impl From<&EngineConfig> for SelectionParams {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            target_delta: cfg.target_delta,
            strike_width: cfg.strike_width,
            min_premium_ratio: cfg.min_premium_ratio,
        }
    }
}

impl From<&EngineConfig> for ScoringParams {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            optimal_width: cfg.optimal_width,
            width_tolerance: cfg.width_tolerance,
            account_risk_budget: cfg.account_risk_budget,
            volume_target: cfg.volume_target,
            open_interest_target: cfg.open_interest_target,
        }
    }
}

impl From<&EngineConfig> for SpreadParams {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            target_reward_ratio: cfg.target_reward_ratio,
            stop_ratio: cfg.stop_ratio,
            multiplier: cfg.contract_multiplier,
            position_size: cfg.position_size,
            exit_days_before_expiration: cfg.exit_days_before_expiration,
        }
    }
}
