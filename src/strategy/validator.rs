use crate::strategy::{ContractType, Direction, Spread, SpreadStrategy};

/// Structural checks for a vertical spread. Returns every violation found; empty means valid.
pub fn validate(spread: &Spread) -> Vec<String> {
    let mut errors = Vec::new();
    let name = format!(
        "{} {} {} {}",
        spread.underlying_ticker, spread.direction, spread.contract_type, spread.strategy
    );

    let short = &spread.short_leg;
    let long = &spread.long_leg;

    if short.contract_type != long.contract_type {
        errors.push(format!(
            "{name}: contract types don't match: {} vs {}",
            short.contract_type, long.contract_type
        ));
    }
    if short.contract_type != spread.contract_type {
        errors.push(format!(
            "{name}: legs are {} but the spread is {}",
            short.contract_type, spread.contract_type
        ));
    }
    if short.expiration != long.expiration {
        errors.push(format!(
            "{name}: legs expire on different dates: {} vs {}",
            short.expiration, long.expiration
        ));
    }
    if spread.strategy.contract_type(spread.direction) != spread.contract_type {
        errors.push(format!(
            "{name}: a {} {} spread must use {}s",
            spread.direction,
            spread.strategy,
            spread.strategy.contract_type(spread.direction)
        ));
    }

    match spread.direction {
        Direction::Bullish => {
            if spread.target_price <= spread.entry_price {
                errors.push(format!(
                    "{name}: bullish target price ({}) <= entry price ({})",
                    spread.target_price, spread.entry_price
                ));
            }
            if spread.stop_price >= spread.entry_price {
                errors.push(format!(
                    "{name}: bullish stop price ({}) >= entry price ({})",
                    spread.stop_price, spread.entry_price
                ));
            }
        }
        Direction::Bearish => {
            if spread.target_price >= spread.entry_price {
                errors.push(format!(
                    "{name}: bearish target price ({}) >= entry price ({})",
                    spread.target_price, spread.entry_price
                ));
            }
            if spread.stop_price <= spread.entry_price {
                errors.push(format!(
                    "{name}: bearish stop price ({}) <= entry price ({})",
                    spread.stop_price, spread.entry_price
                ));
            }
        }
    }

    let strikes_ok = match (spread.strategy, spread.contract_type) {
        // Credit: the protective long leg sits farther out of the money.
        (SpreadStrategy::Credit, ContractType::Put) => short.strike > long.strike,
        (SpreadStrategy::Credit, ContractType::Call) => short.strike < long.strike,
        // Debit: the long leg is the one closer to the money.
        (SpreadStrategy::Debit, ContractType::Call) => long.strike < short.strike,
        (SpreadStrategy::Debit, ContractType::Put) => long.strike > short.strike,
    };
    if !strikes_ok {
        errors.push(format!(
            "{name}: strike order is wrong (short {}, long {})",
            short.strike, long.strike
        ));
    }

    if (short.strike - long.strike).abs() != spread.distance_between_strikes {
        errors.push(format!(
            "{name}: distance between strikes {} does not match legs",
            spread.distance_between_strikes
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::lifecycle::SpreadStatus;
    use crate::strategy::{Leg, SnapshotSet};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn leg(strike: Decimal, ct: ContractType) -> Leg {
        Leg {
            ticker: format!("O:QQQ{ct}{strike}"),
            strike,
            contract_type: ct,
            expiration: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            actual_entry_price: None,
            actual_exit_price: None,
        }
    }

    fn bear_put_debit() -> Spread {
        Spread {
            spread_guid: Uuid::nil(),
            underlying_ticker: "QQQ".to_string(),
            direction: Direction::Bearish,
            strategy: SpreadStrategy::Debit,
            contract_type: ContractType::Put,
            distance_between_strikes: dec!(5),
            short_leg: leg(dec!(415), ContractType::Put),
            long_leg: leg(dec!(420), ContractType::Put),
            previous_close: dec!(425),
            entry_price: dec!(425),
            target_price: dec!(423.32),
            stop_price: dec!(426.05),
            target_reward: dec!(1.68),
            target_stop: dec!(1.05),
            breakeven: dec!(417.90),
            net_premium: dec!(2.10),
            max_reward: dec!(290),
            max_risk: dec!(210),
            probability_of_profit: None,
            score: None,
            agent_status: SpreadStatus::None,
            is_processed: false,
            entry_timestamp: None,
            exit_timestamp: None,
            actual_entry_price: None,
            actual_exit_price: None,
            realized_pnl: None,
            trade_outcome: None,
            expiration_date: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
            description: String::new(),
            multiplier: dec!(100),
            position_size: Decimal::ONE,
            snapshots: SnapshotSet::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn well_formed_spread_passes() {
        assert!(validate(&bear_put_debit()).is_empty());
    }

    #[test]
    fn inverted_strikes_are_flagged() {
        let mut s = bear_put_debit();
        std::mem::swap(&mut s.short_leg, &mut s.long_leg);
        let errors = validate(&s);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("strike order"));
    }

    #[test]
    fn price_direction_and_type_mismatch() {
        let mut s = bear_put_debit();
        s.target_price = dec!(430);
        s.long_leg.contract_type = ContractType::Call;
        let errors = validate(&s);
        assert!(errors.iter().any(|e| e.contains("target price")));
        assert!(errors.iter().any(|e| e.contains("contract types don't match")));
    }
}
