//! Conservative paper fills.
//!
//! Every simulated fill takes the unfavourable side of each leg's quote: opening sells the
//! short leg at its bid and buys the long leg at its ask, closing does the opposite. The
//! net is never taken at the mid and never rounded beyond the quoted precision. Both sides of
//! both legs must be quoted.

use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::strategy::{ContractSnapshot, SnapshotPair, SpreadStrategy};

/// Per-leg prices and the resulting net for one simulated fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fill {
    pub net: Decimal,
    pub short_price: Decimal,
    pub long_price: Decimal,
}

/// Open the spread: sell the short leg at the bid, buy the long leg at the ask.
pub fn simulate_entry(strategy: SpreadStrategy, pair: &SnapshotPair) -> EngineResult<Fill> {
    entry_fill(strategy, &pair.short, &pair.long)
}

/// Close the spread: buy back the short leg at the ask, sell the long leg at the bid.
pub fn simulate_exit(strategy: SpreadStrategy, pair: &SnapshotPair) -> EngineResult<Fill> {
    exit_fill(strategy, &pair.short, &pair.long)
}

pub fn entry_fill(
    strategy: SpreadStrategy,
    short: &ContractSnapshot,
    long: &ContractSnapshot,
) -> EngineResult<Fill> {
    require_two_sided(short, long)?;
    let short_price = short.bid()?;
    let long_price = long.ask()?;
    let net = match strategy {
        SpreadStrategy::Credit => short_price - long_price,
        SpreadStrategy::Debit => long_price - short_price,
    };
    Ok(Fill {
        net,
        short_price,
        long_price,
    })
}

pub fn exit_fill(
    strategy: SpreadStrategy,
    short: &ContractSnapshot,
    long: &ContractSnapshot,
) -> EngineResult<Fill> {
    require_two_sided(short, long)?;
    let short_price = short.ask()?;
    let long_price = long.bid()?;
    let net = match strategy {
        SpreadStrategy::Credit => short_price - long_price,
        SpreadStrategy::Debit => long_price - short_price,
    };
    Ok(Fill {
        net,
        short_price,
        long_price,
    })
}

fn require_two_sided(short: &ContractSnapshot, long: &ContractSnapshot) -> EngineResult<()> {
    for leg in [short, long] {
        leg.bid()?;
        leg.ask()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::strategy::{ContractType, Quote};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn leg(ticker: &str, bid: Option<Decimal>, ask: Option<Decimal>) -> ContractSnapshot {
        ContractSnapshot {
            ticker: ticker.to_string(),
            strike: dec!(430),
            contract_type: ContractType::Put,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            quote: Quote {
                bid,
                ask,
                ..Quote::default()
            },
        }
    }

    fn pair(short: (Decimal, Decimal), long: (Decimal, Decimal)) -> SnapshotPair {
        SnapshotPair {
            short: leg("SHORT", Some(short.0), Some(short.1)),
            long: leg("LONG", Some(long.0), Some(long.1)),
        }
    }

    #[test]
    fn credit_entry_sells_bid_buys_ask() {
        let p = pair((dec!(1.50), dec!(1.60)), (dec!(0.70), dec!(0.80)));
        let fill = simulate_entry(SpreadStrategy::Credit, &p).unwrap();
        assert_eq!(fill.net, dec!(0.70));
        assert_eq!(fill.short_price, dec!(1.50));
        assert_eq!(fill.long_price, dec!(0.80));
    }

    #[test]
    fn credit_exit_buys_back_at_ask() {
        let p = pair((dec!(0.25), dec!(0.30)), (dec!(0.10), dec!(0.12)));
        let fill = simulate_exit(SpreadStrategy::Credit, &p).unwrap();
        assert_eq!(fill.net, dec!(0.20));
    }

    #[test]
    fn debit_entry_and_exit() {
        let entry = pair((dec!(1.90), dec!(2.00)), (dec!(3.90), dec!(4.00)));
        assert_eq!(simulate_entry(SpreadStrategy::Debit, &entry).unwrap().net, dec!(2.10));

        let exit = pair((dec!(3.90), dec!(4.00)), (dec!(7.00), dec!(7.10)));
        assert_eq!(simulate_exit(SpreadStrategy::Debit, &exit).unwrap().net, dec!(3.00));
    }

    #[test]
    fn missing_side_is_reported() {
        let p = SnapshotPair {
            short: leg("SHORT", Some(dec!(1.50)), None),
            long: leg("LONG", Some(dec!(0.70)), Some(dec!(0.80))),
        };
        let missing = Err(EngineError::MissingQuote {
            ticker: "SHORT".to_string(),
            field: "ask",
        });
        assert_eq!(simulate_entry(SpreadStrategy::Credit, &p), missing);
        assert_eq!(
            simulate_exit(SpreadStrategy::Debit, &p),
            Err(EngineError::MissingQuote {
                ticker: "SHORT".to_string(),
                field: "ask"
            })
        );
    }
}
