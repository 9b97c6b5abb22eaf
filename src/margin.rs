//! Margin health for a single position, in base units.
//!
//! A position's open quote is valued in base against the AMM's reserves with
//! a beta-weighted depth term, so larger positions are marked more harshly.
//! Everything else (equity, margin ratio, required margin, withdrawable
//! margin, unrealized pnl) follows from that one valuation plus the trader's
//! base balance and pending funding.
//!
//! Margin ratio here is equity over gross asset, i.e. one minus the debt
//! ratio. A long at initial margin `imr` therefore needs `debt / (1 - imr)`
//! of asset, which is where the long-side required margin comes from.

use crate::amm::Reserves;
use crate::position::Position;
use crate::types::{ceil_to, floor_to, QuoteSize, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Base value of `|quote_size|` at the pool.
///
/// Longs owe quote and must buy it back, so depth shrinks the quote side and
/// the debt rounds up. Shorts hold quote and would sell it, so the asset
/// rounds down. Returns `None` when the pool cannot absorb the quote at this
/// beta.
pub fn position_value(
    quote_size: QuoteSize,
    reserves: &Reserves,
    beta: Decimal,
    base_decimals: u32,
) -> Option<Decimal> {
    let quote = quote_size.abs();
    if quote.is_zero() {
        return Some(Decimal::ZERO);
    }
    if reserves.base <= Decimal::ZERO || reserves.quote <= Decimal::ZERO {
        return None;
    }

    match quote_size.side()? {
        Side::Long => {
            let depth = reserves.quote - beta * quote;
            if depth <= Decimal::ZERO {
                return None;
            }
            Some(ceil_to(
                quote.checked_mul(reserves.base)?.checked_div(depth)?,
                base_decimals,
            ))
        }
        Side::Short => {
            let depth = reserves.quote + beta * quote;
            Some(floor_to(
                quote.checked_mul(reserves.base)?.checked_div(depth)?,
                base_decimals,
            ))
        }
    }
}

/// Everything the health checks need, frozen at one price and one cpf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub side: Option<Side>,
    /// `base_size + pending funding fee`.
    pub margin: Decimal,
    /// Base value of the open quote, see [`position_value`].
    pub value: Decimal,
    pub trade_size: Decimal,
}

impl HealthSnapshot {
    pub fn new(position: &Position, funding_fee: Decimal, value: Decimal) -> Self {
        Self {
            side: position.side(),
            margin: position.base_size + funding_fee,
            value,
            trade_size: position.trade_size,
        }
    }

    // signed balance sheet legs: long holds margin and owes value,
    // short holds value plus margin (margin may be negative, then it is debt)
    fn legs(&self) -> [Decimal; 2] {
        match self.side {
            Some(Side::Long) => [self.margin, -self.value],
            Some(Side::Short) => [self.value, self.margin],
            None => [self.margin, Decimal::ZERO],
        }
    }

    pub fn gross_asset(&self) -> Decimal {
        self.legs().iter().filter(|l| **l > Decimal::ZERO).sum()
    }

    pub fn debt(&self) -> Decimal {
        -self.legs().iter().filter(|l| **l < Decimal::ZERO).sum::<Decimal>()
    }

    pub fn equity(&self) -> Decimal {
        self.legs().iter().sum()
    }

    /// `None` when flat. Zero when nothing backs the position at all.
    pub fn margin_ratio(&self) -> Option<Decimal> {
        self.side?;
        let asset = self.gross_asset();
        if asset <= Decimal::ZERO {
            return Some(Decimal::ZERO);
        }
        Some(self.equity() / asset)
    }

    pub fn required_margin(&self, init_margin_ratio: Decimal, base_decimals: u32) -> Decimal {
        let raw = match self.side {
            None => return Decimal::ZERO,
            Some(Side::Long) => self.value * init_margin_ratio / (Decimal::ONE - init_margin_ratio),
            Some(Side::Short) => self.value * init_margin_ratio,
        };
        ceil_to(raw, base_decimals)
    }

    pub fn meets(&self, init_margin_ratio: Decimal) -> bool {
        match self.margin_ratio() {
            None => true,
            Some(ratio) => ratio >= init_margin_ratio,
        }
    }

    /// Free margin, never above what the engine actually holds.
    pub fn withdrawable(&self, init_margin_ratio: Decimal, reserve: Decimal, base_decimals: u32) -> Decimal {
        let free = match self.side {
            None => self.margin,
            Some(_) => self.equity() - self.required_margin(init_margin_ratio, base_decimals),
        };
        floor_to(free, base_decimals).max(Decimal::ZERO).min(reserve.max(Decimal::ZERO))
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        match self.side {
            None => Decimal::ZERO,
            Some(Side::Long) => self.trade_size - self.value,
            Some(Side::Short) => self.value - self.trade_size,
        }
    }
}
