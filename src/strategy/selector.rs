use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::strategy::{
    params::SelectionParams, ContractSnapshot, ContractType, Direction, OptionChain,
    SpreadStrategy,
};

/// Short and long legs chosen from one chain, with the intent they were chosen for.
#[derive(Clone, Debug)]
pub struct LegSelection {
    pub underlying: String,
    pub direction: Direction,
    pub strategy: SpreadStrategy,
    pub contract_type: ContractType,
    pub previous_close: Decimal,
    pub expiration: NaiveDate,
    pub short: ContractSnapshot,
    pub long: ContractSnapshot,
}

/// Signed strike offset from the short leg to the long leg.
///
/// Credit spreads protect with the farther out-of-the-money strike; debit spreads buy the
/// higher-delta strike.
pub fn long_strike_offset(
    contract_type: ContractType,
    strategy: SpreadStrategy,
    width: Decimal,
) -> Decimal {
    match (contract_type, strategy) {
        (ContractType::Put, SpreadStrategy::Credit) => -width,
        (ContractType::Call, SpreadStrategy::Credit) => width,
        (ContractType::Call, SpreadStrategy::Debit) => -width,
        (ContractType::Put, SpreadStrategy::Debit) => width,
    }
}

/// Pure, deterministic leg selection over a provided chain.
#[derive(Clone, Debug)]
pub struct LegSelector {
    params: SelectionParams,
}

impl LegSelector {
    pub fn new(params: SelectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SelectionParams {
        &self.params
    }

    pub fn select(
        &self,
        chain: &OptionChain,
        direction: Direction,
        strategy: SpreadStrategy,
    ) -> EngineResult<LegSelection> {
        let contract_type = strategy.contract_type(direction);
        let candidates = chain.of_type(contract_type);
        if candidates.is_empty() {
            return Err(EngineError::NoEligibleContract(format!(
                "no {contract_type} contracts for {} expiring {}",
                chain.underlying, chain.expiration
            )));
        }

        let target = self.params.target_delta.abs();
        let short = candidates
            .iter()
            .filter_map(|c| c.quote.delta.map(|d| (*c, d)))
            .min_by(|(a, da), (b, db)| {
                let key_a = (
                    (da.abs() - target).abs(),
                    (a.strike - chain.previous_close).abs(),
                    a.strike,
                );
                let key_b = (
                    (db.abs() - target).abs(),
                    (b.strike - chain.previous_close).abs(),
                    b.strike,
                );
                key_a.cmp(&key_b)
            })
            .map(|(c, _)| c)
            .ok_or_else(|| {
                EngineError::NoEligibleContract(format!(
                    "no {contract_type} contract with a delta for {}",
                    chain.underlying
                ))
            })?;

        let long_strike =
            short.strike + long_strike_offset(contract_type, strategy, self.params.strike_width);
        let long = candidates
            .iter()
            .find(|c| c.strike == long_strike)
            .ok_or_else(|| {
                EngineError::NoEligibleContract(format!(
                    "no {contract_type} contract at long strike {long_strike} for {}",
                    chain.underlying
                ))
            })?;

        if let Some(floor) = self.params.min_premium_ratio {
            self.check_premium_floor(short, long, strategy, floor)?;
        }

        debug!(
            target: "selection",
            underlying = %chain.underlying,
            %direction,
            %strategy,
            short = %short.ticker,
            long = %long.ticker,
            "legs selected"
        );

        Ok(LegSelection {
            underlying: chain.underlying.clone(),
            direction,
            strategy,
            contract_type,
            previous_close: chain.previous_close,
            expiration: chain.expiration,
            short: short.clone(),
            long: (*long).clone(),
        })
    }

    /// Rejects a pair whose conservatively quoted net is non-positive or too thin for the
    /// width. Pairs missing a bid or ask are left for spread construction to reject.
    fn check_premium_floor(
        &self,
        short: &ContractSnapshot,
        long: &ContractSnapshot,
        strategy: SpreadStrategy,
        floor: Decimal,
    ) -> EngineResult<()> {
        let (Some(short_bid), Some(long_ask)) = (short.quote.bid, long.quote.ask) else {
            return Ok(());
        };
        let net = match strategy {
            SpreadStrategy::Credit => short_bid - long_ask,
            SpreadStrategy::Debit => long_ask - short_bid,
        };
        let width = self.params.strike_width;
        if net <= Decimal::ZERO || width <= Decimal::ZERO || net / width < floor {
            return Err(EngineError::NoEligibleContract(format!(
                "net premium {net} over width {width} is below {floor} for {} / {}",
                short.ticker, long.ticker
            )));
        }
        Ok(())
    }
}
