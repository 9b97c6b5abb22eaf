// 4.0: per-trader position record. quote size is the signed virtual debt/credit,
// base size is everything the trader holds in base, trade size is the open notional.
// 4.1 has the netting logic for increase/reduce/flip at the bottom.

use crate::types::{ceil_to, QuoteSize, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quote_size: QuoteSize,
    pub base_size: Decimal,
    pub trade_size: Decimal,
    // cpf at which funding was last realized into base_size
    pub entry_cpf: Decimal,
}

/// The externally visible triple. `(quote_size, base_size, trade_size)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub quote_size: Decimal,
    pub base_size: Decimal,
    pub trade_size: Decimal,
}

impl Position {
    pub fn new(entry_cpf: Decimal) -> Self {
        Self {
            entry_cpf,
            ..Self::default()
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quote_size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        self.quote_size.side()
    }

    /// Flat and holding nothing. Such records are dropped from the ledger.
    pub fn is_empty(&self) -> bool {
        self.is_flat() && self.base_size.is_zero()
    }

    pub fn view(&self) -> PositionView {
        PositionView {
            quote_size: self.quote_size.value(),
            base_size: self.base_size,
            trade_size: self.trade_size,
        }
    }

    // trade size is zero exactly when the position is flat
    pub fn is_consistent(&self) -> bool {
        self.trade_size >= Decimal::ZERO && (self.trade_size.is_zero() == self.quote_size.is_zero())
    }

    pub fn realize_funding(&mut self, fee: Decimal, cpf: Decimal) {
        self.base_size += fee;
        self.entry_cpf = cpf;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Netting {
    /// Flat, or same direction as the open exposure.
    Increase,
    /// Opposite direction, at most the open exposure.
    Reduce,
    /// Opposite direction, beyond the open exposure. The excess opens a new leg.
    Flip,
}

pub fn classify_trade(position: &Position, side: Side, quote_amount: Decimal) -> Netting {
    match position.side() {
        None => Netting::Increase,
        Some(current) if current == side => Netting::Increase,
        Some(_) if quote_amount <= position.quote_size.abs() => Netting::Reduce,
        Some(_) => Netting::Flip,
    }
}

#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub position: Position,
    pub netting: Netting,
    /// Base pnl realized on the closed portion. zero for pure increases.
    pub realized_pnl: Decimal,
}

// 4.1: applies a fill of `quote_amount` quote against `base_amount` base on `side`.
// longs receive base for the quote they take on, shorts pay base for the quote they hold.
pub fn apply_trade(
    position: &Position,
    side: Side,
    quote_amount: Decimal,
    base_amount: Decimal,
    base_decimals: u32,
) -> PositionUpdate {
    debug_assert!(quote_amount > Decimal::ZERO && base_amount > Decimal::ZERO);

    let netting = classify_trade(position, side, quote_amount);
    let open_quote = position.quote_size.abs();

    let (trade_size, base_closing, released) = match netting {
        Netting::Increase => (position.trade_size + base_amount, Decimal::ZERO, Decimal::ZERO),
        Netting::Reduce => {
            // entry unchanged, keep the remaining share of the old notional
            let remaining = ceil_to(
                position.trade_size * (open_quote - quote_amount) / open_quote,
                base_decimals,
            );
            (remaining, base_amount, position.trade_size - remaining)
        }
        Netting::Flip => {
            // old exposure closes in full, only the new leg's base stays open
            let new_leg = ceil_to(
                base_amount * (quote_amount - open_quote) / quote_amount,
                base_decimals,
            );
            (new_leg, base_amount - new_leg, position.trade_size)
        }
    };

    let realized_pnl = match (netting, position.side()) {
        (Netting::Increase, _) | (_, None) => Decimal::ZERO,
        (_, Some(Side::Long)) => released - base_closing,
        (_, Some(Side::Short)) => base_closing - released,
    };

    let base_size = match side {
        Side::Long => position.base_size + base_amount,
        Side::Short => position.base_size - base_amount,
    };

    let updated = Position {
        quote_size: position.quote_size.trade(side, quote_amount),
        base_size,
        trade_size,
        entry_cpf: position.entry_cpf,
    };
    debug_assert!(updated.is_consistent(), "trade size out of sync with quote size");

    PositionUpdate {
        position: updated,
        netting,
        realized_pnl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DECIMALS: u32 = 18;

    fn funded(margin: Decimal) -> Position {
        Position {
            base_size: margin,
            ..Position::default()
        }
    }

    #[test]
    fn open_long_from_flat() {
        // 1 base of margin, buy 2000 quote of exposure at 2000
        let update = apply_trade(&funded(dec!(1)), Side::Long, dec!(2000), dec!(1), DECIMALS);
        let pos = update.position;

        assert_eq!(update.netting, Netting::Increase);
        assert_eq!(pos.quote_size.value(), dec!(-2000));
        assert_eq!(pos.base_size, dec!(2));
        assert_eq!(pos.trade_size, dec!(1));
        assert_eq!(update.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn open_short_from_flat() {
        let update = apply_trade(&funded(dec!(1)), Side::Short, dec!(2000), dec!(1), DECIMALS);
        let pos = update.position;

        assert_eq!(pos.quote_size.value(), dec!(2000));
        assert_eq!(pos.base_size, Decimal::ZERO);
        assert_eq!(pos.trade_size, dec!(1));
    }

    #[test]
    fn same_direction_accumulates() {
        let first = apply_trade(&funded(dec!(1)), Side::Long, dec!(2000), dec!(1), DECIMALS).position;
        let second = apply_trade(&first, Side::Long, dec!(1000), dec!(0.5), DECIMALS).position;

        assert_eq!(second.quote_size.value(), dec!(-3000));
        assert_eq!(second.base_size, dec!(2.5));
        assert_eq!(second.trade_size, dec!(1.5));
    }

    #[test]
    fn small_reverse_reduces_proportionally() {
        let short = apply_trade(&funded(dec!(1)), Side::Short, dec!(2000), dec!(1), DECIMALS).position;
        let update = apply_trade(&short, Side::Long, dec!(500), dec!(0.25), DECIMALS);

        assert_eq!(update.netting, Netting::Reduce);
        assert_eq!(update.position.quote_size.value(), dec!(1500));
        assert_eq!(update.position.base_size, dec!(0.25));
        assert_eq!(update.position.trade_size, dec!(0.75));
        // bought back at the entry price
        assert_eq!(update.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn exact_reverse_goes_flat() {
        let long = apply_trade(&funded(dec!(1)), Side::Long, dec!(2000), dec!(1), DECIMALS).position;
        // price moved to 2500: closing 2000 quote costs 0.8 base
        let update = apply_trade(&long, Side::Short, dec!(2000), dec!(0.8), DECIMALS);

        assert!(update.position.is_flat());
        assert_eq!(update.position.trade_size, Decimal::ZERO);
        assert_eq!(update.position.base_size, dec!(1.2));
        assert_eq!(update.realized_pnl, dec!(0.2));
    }

    #[test]
    fn bigger_reverse_flips_to_new_leg() {
        let long = apply_trade(&funded(dec!(1)), Side::Long, dec!(2000), dec!(1), DECIMALS).position;
        let update = apply_trade(&long, Side::Short, dec!(4000), dec!(2), DECIMALS);
        let pos = update.position;

        assert_eq!(update.netting, Netting::Flip);
        assert_eq!(pos.quote_size.value(), dec!(2000));
        assert_eq!(pos.trade_size, dec!(1));
        assert_eq!(pos.base_size, Decimal::ZERO);
        assert_eq!(update.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn remaining_trade_rounds_up_to_stay_open() {
        let pos = Position {
            quote_size: QuoteSize::new(dec!(3)),
            base_size: Decimal::ZERO,
            trade_size: dec!(0.000000000000000001),
            entry_cpf: Decimal::ZERO,
        };
        let update = apply_trade(&pos, Side::Long, dec!(2), dec!(0.000000000000000001), DECIMALS);

        assert_eq!(update.position.quote_size.value(), dec!(1));
        assert!(update.position.trade_size > Decimal::ZERO);
        assert!(update.position.is_consistent());
    }

    #[test]
    fn funding_realization_moves_base() {
        let mut pos = funded(dec!(1));
        pos.realize_funding(dec!(-0.01), dec!(0.5));
        assert_eq!(pos.base_size, dec!(0.99));
        assert_eq!(pos.entry_cpf, dec!(0.5));
    }

    #[test]
    fn view_exposes_triple() {
        let pos = apply_trade(&funded(dec!(1)), Side::Long, dec!(2000), dec!(1), DECIMALS).position;
        let view = pos.view();
        assert_eq!(view.quote_size, dec!(-2000));
        assert_eq!(view.base_size, dec!(2));
        assert_eq!(view.trade_size, dec!(1));
    }
}
