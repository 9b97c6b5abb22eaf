// 9.0: the virtual AMM the ledger trades against. the margin engine only sees the trait:
// estimate, swap, reserves, spot price. the pricing curve itself lives behind it.
// 9.0.1 has MockAmm, a fixed-price pool used by tests and the simulator.

use crate::types::{ceil_to, floor_to, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// which leg is exact. QuoteIn: exact quote goes in, base comes out (rounded down).
// QuoteOut: exact quote comes out, base goes in (rounded up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    QuoteIn,
    QuoteOut,
}

impl SwapDirection {
    // longs borrow quote and buy base with it, shorts sell base for an exact quote amount
    pub fn for_open(side: Side) -> Self {
        match side {
            Side::Long => SwapDirection::QuoteIn,
            Side::Short => SwapDirection::QuoteOut,
        }
    }

    // closing a side trades the opposite way
    pub fn for_close(side: Side) -> Self {
        Self::for_open(side.opposite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub base: Decimal,
    pub quote: Decimal,
}

impl Reserves {
    pub fn spot_price(&self) -> Option<Price> {
        if self.base.is_zero() {
            return None;
        }
        Price::new(self.quote / self.base)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmmError {
    #[error("swap amount must be positive")]
    ZeroAmount,

    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Decimal, available: Decimal },

    #[error("pool has no price")]
    NoPrice,
}

pub trait Amm {
    /// Pool state the engine puts back when a call aborts after swapping.
    type Snapshot;

    /// Base amount a swap of `quote_amount` would move, without executing it.
    fn estimate_swap(&self, direction: SwapDirection, quote_amount: Decimal) -> Result<Decimal, AmmError>;

    fn swap(&mut self, direction: SwapDirection, quote_amount: Decimal) -> Result<Decimal, AmmError>;

    fn reserves(&self) -> Reserves;

    fn price(&self) -> Option<Price> {
        self.reserves().spot_price()
    }

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}

// 9.0.1: constant price pool. reserves are (B, B * price) so beta-weighted valuation
// still sees depth. set_price re-marks the quote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockAmm {
    price: Decimal,
    base_reserve: Decimal,
    base_decimals: u32,
    // added to every executed swap, so tests can force estimate != result
    swap_skew: Decimal,
    swap_count: u64,
}

impl MockAmm {
    pub fn new(price: Price, base_reserve: Decimal) -> Self {
        Self {
            price: price.value(),
            base_reserve,
            base_decimals: 18,
            swap_skew: Decimal::ZERO,
            swap_count: 0,
        }
    }

    pub fn with_base_decimals(mut self, decimals: u32) -> Self {
        self.base_decimals = decimals;
        self
    }

    pub fn set_price(&mut self, price: Price) {
        self.price = price.value();
    }

    pub fn set_swap_skew(&mut self, skew: Decimal) {
        self.swap_skew = skew;
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    fn quote(&self, direction: SwapDirection, quote_amount: Decimal) -> Result<Decimal, AmmError> {
        if quote_amount <= Decimal::ZERO {
            return Err(AmmError::ZeroAmount);
        }
        if self.price <= Decimal::ZERO {
            return Err(AmmError::NoPrice);
        }

        let raw = quote_amount / self.price;
        match direction {
            SwapDirection::QuoteIn => Ok(floor_to(raw, self.base_decimals)),
            SwapDirection::QuoteOut => {
                let available = self.base_reserve * self.price;
                if quote_amount > available {
                    return Err(AmmError::InsufficientLiquidity {
                        requested: quote_amount,
                        available,
                    });
                }
                Ok(ceil_to(raw, self.base_decimals))
            }
        }
    }
}

impl Amm for MockAmm {
    // price and depth are fixed, only the swap counter moves
    type Snapshot = u64;

    fn estimate_swap(&self, direction: SwapDirection, quote_amount: Decimal) -> Result<Decimal, AmmError> {
        self.quote(direction, quote_amount)
    }

    fn swap(&mut self, direction: SwapDirection, quote_amount: Decimal) -> Result<Decimal, AmmError> {
        let base = self.quote(direction, quote_amount)?;
        self.swap_count += 1;
        Ok(base + self.swap_skew)
    }

    fn reserves(&self) -> Reserves {
        Reserves {
            base: self.base_reserve,
            quote: self.base_reserve * self.price,
        }
    }

    fn snapshot(&self) -> u64 {
        self.swap_count
    }

    fn restore(&mut self, snapshot: u64) {
        self.swap_count = snapshot;
    }
}
