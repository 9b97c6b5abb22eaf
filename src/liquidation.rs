//! Liquidation conditions and settlement of the liquidated remainder.
//!
//! A position is liquidatable once its margin ratio at the oracle index price
//! drops below the maintenance threshold. The forced close then leaves the
//! trader with some base remainder: a positive remainder pays the liquidator
//! bonus and feeds the insurance fund, a negative one is bad debt.

use crate::margin::HealthSnapshot;
use crate::types::floor_to;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationStatus {
    /// Nothing open.
    Flat,
    Healthy { margin_ratio: Decimal },
    Liquidatable { margin_ratio: Decimal },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, LiquidationStatus::Liquidatable { .. })
    }
}

pub fn evaluate_liquidation(snapshot: &HealthSnapshot, liquidate_threshold: Decimal) -> LiquidationStatus {
    match snapshot.margin_ratio() {
        None => LiquidationStatus::Flat,
        Some(margin_ratio) if margin_ratio < liquidate_threshold => {
            LiquidationStatus::Liquidatable { margin_ratio }
        }
        Some(margin_ratio) => LiquidationStatus::Healthy { margin_ratio },
    }
}

/// Where the trader's base goes once the position is force-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationSplit {
    /// `base_size` after the close, before the split.
    pub remain: Decimal,
    pub bonus: Decimal,
    pub insurance_contribution: Decimal,
    pub bad_debt: Decimal,
}

/// The liquidator takes `liquidate_fee_ratio` of a positive remainder, never
/// more than the engine holds. The rest feeds the insurance fund.
pub fn split_remainder(
    remain: Decimal,
    liquidate_fee_ratio: Decimal,
    reserve: Decimal,
    base_decimals: u32,
) -> LiquidationSplit {
    if remain <= Decimal::ZERO {
        return LiquidationSplit {
            remain,
            bonus: Decimal::ZERO,
            insurance_contribution: Decimal::ZERO,
            bad_debt: -remain,
        };
    }

    let fee = floor_to(remain * liquidate_fee_ratio, base_decimals);
    let bonus = fee.min(reserve.max(Decimal::ZERO));

    LiquidationSplit {
        remain,
        bonus,
        insurance_contribution: remain - bonus,
        bad_debt: Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceFund {
    pub balance: Decimal,
    pub total_deposits: Decimal,
    pub total_payouts: Decimal,
}

impl InsuranceFund {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            total_deposits: initial_balance,
            total_payouts: Decimal::ZERO,
        }
    }

    pub fn deposit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.total_deposits += amount;
    }

    // returns the part actually covered
    pub fn cover_bad_debt(&mut self, amount: Decimal) -> Decimal {
        let covered = amount.min(self.balance).max(Decimal::ZERO);
        self.balance -= covered;
        self.total_payouts += covered;
        covered
    }

    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
