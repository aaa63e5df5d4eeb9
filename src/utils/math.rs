use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::strategy::{Direction, SpreadStrategy};

/// Strike widths the width heuristic snaps to.
pub const STANDARD_WIDTHS: [Decimal; 6] = [
    dec!(1),
    dec!(2.5),
    dec!(5),
    dec!(10),
    dec!(25),
    dec!(50),
];

/// Realized profit and loss in dollars for a closed spread.
///
/// `entry` and `exit` are the simulated net prices per share, `multiplier` is shares per
/// contract, `size` is the number of contract pairs.
pub fn realized_pnl(
    strategy: SpreadStrategy,
    entry: Decimal,
    exit: Decimal,
    multiplier: Decimal,
    size: Decimal,
) -> Decimal {
    match strategy {
        SpreadStrategy::Credit => (entry - exit) * multiplier * size,
        SpreadStrategy::Debit => (exit - entry) * multiplier * size,
    }
}

/// `(max_reward, max_risk)` in dollars for one contract pair.
pub fn reward_and_risk(
    strategy: SpreadStrategy,
    entry: Decimal,
    width: Decimal,
    multiplier: Decimal,
) -> (Decimal, Decimal) {
    match strategy {
        SpreadStrategy::Credit => (entry * multiplier, (width - entry) * multiplier),
        SpreadStrategy::Debit => ((width - entry) * multiplier, entry * multiplier),
    }
}

/// Closest standard width to `raw`; ties go to the narrower width.
pub fn nearest_standard_width(raw: Decimal) -> Decimal {
    let mut best = STANDARD_WIDTHS[0];
    for w in STANDARD_WIDTHS.iter().copied().skip(1) {
        if (w - raw).abs() < (best - raw).abs() {
            best = w;
        }
    }
    best
}

/// Width heuristic: 5% of the underlying, stretched for bullish and tightened for bearish
/// trades, snapped to a standard width.
pub fn optimal_width(price: Decimal, direction: Direction) -> Decimal {
    let factor = match direction {
        Direction::Bullish => dec!(1.2),
        Direction::Bearish => dec!(0.8),
    };
    nearest_standard_width(price * dec!(0.05) * factor)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Round to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
