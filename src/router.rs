// 12.0: router. a registered account that turns trader intents into margin calls.
// adds what the core leaves out: deadlines, wallet funding, slippage bounds, auto withdraw.
// 12.1 has the wallet-funded paths, which snapshot the engine so they stay all-or-nothing.

use crate::amm::{Amm, SwapDirection};
use crate::custody::CustodyError;
use crate::engine::{CloseResult, LiquidationResult, Margin, MarginError, OpenResult};
use crate::oracle::PriceOracle;
use crate::types::{AccountId, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Expired: deadline {deadline:?} passed at {now:?}")]
    Expired { deadline: Timestamp, now: Timestamp },

    #[error("Insufficient base amount: would receive {actual}, limit {limit}")]
    InsufficientBaseAmount { actual: Decimal, limit: Decimal },

    #[error("Excessive base amount: would pay {actual}, limit {limit}")]
    ExcessiveBaseAmount { actual: Decimal, limit: Decimal },

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Margin error: {0}")]
    Margin(#[from] MarginError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterCloseResult {
    pub close: CloseResult,
    // base sent back to the trader's wallet when auto withdraw kicked in
    pub withdrawn: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    id: AccountId,
    // receives liquidation bonuses
    beneficiary: AccountId,
}

impl Router {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            beneficiary: id,
        }
    }

    pub fn with_beneficiary(mut self, beneficiary: AccountId) -> Self {
        self.beneficiary = beneficiary;
        self
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn beneficiary(&self) -> AccountId {
        self.beneficiary
    }

    pub fn check_deadline<A: Amm, O: PriceOracle>(
        &self,
        margin: &Margin<A, O>,
        deadline: Timestamp,
    ) -> Result<(), RouterError> {
        let now = margin.time();
        if now > deadline {
            return Err(RouterError::Expired { deadline, now });
        }
        Ok(())
    }

    /// Wallet -> custody, then credited to `trader`.
    pub fn deposit<A: Amm, O: PriceOracle>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        amount: Decimal,
        deadline: Timestamp,
    ) -> Result<(), RouterError> {
        self.check_deadline(margin, deadline)?;
        if amount <= Decimal::ZERO {
            return Err(MarginError::ZeroDepositAmount.into());
        }
        margin.vault_mut().transfer_in(trader, amount)?;
        margin.add_margin(trader, amount)?;
        Ok(())
    }

    pub fn withdraw<A: Amm, O: PriceOracle>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        amount: Decimal,
        deadline: Timestamp,
    ) -> Result<(), RouterError> {
        self.check_deadline(margin, deadline)?;
        margin.remove_margin(self.id, trader, trader, amount)?;
        Ok(())
    }

    /// Opens against margin already in the engine. `base_limit` is the least
    /// base a long accepts, or the most base a short pays.
    pub fn open_position_with_margin<A: Amm, O: PriceOracle>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        side: Side,
        quote_amount: Decimal,
        base_limit: Decimal,
        deadline: Timestamp,
    ) -> Result<OpenResult, RouterError> {
        self.check_deadline(margin, deadline)?;
        check_slippage(margin, side, quote_amount, base_limit)?;
        Ok(margin.open_position(self.id, trader, side, quote_amount)?)
    }

    pub fn liquidate<A: Amm, O: PriceOracle>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        deadline: Timestamp,
    ) -> Result<LiquidationResult, RouterError> {
        self.check_deadline(margin, deadline)?;
        Ok(margin.liquidate(self.id, trader, self.beneficiary)?)
    }
}

// 12.1: multi-step paths. a failure after the first step puts the engine back as it was.
impl Router {
    pub fn open_position_with_wallet<A, O>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        side: Side,
        margin_amount: Decimal,
        quote_amount: Decimal,
        base_limit: Decimal,
        deadline: Timestamp,
    ) -> Result<OpenResult, RouterError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        atomically(margin, |m| {
            self.deposit(m, trader, margin_amount, deadline)?;
            self.open_position_with_margin(m, trader, side, quote_amount, base_limit, deadline)
        })
    }

    /// Closes `quote_amount`. When that leaves the trader flat and
    /// `auto_withdraw` is set, everything withdrawable goes back to the wallet.
    pub fn close_position<A, O>(
        &self,
        margin: &mut Margin<A, O>,
        trader: AccountId,
        quote_amount: Decimal,
        auto_withdraw: bool,
        deadline: Timestamp,
    ) -> Result<RouterCloseResult, RouterError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        self.check_deadline(margin, deadline)?;
        atomically(margin, |m| {
            let close = m.close_position(self.id, trader, quote_amount)?;

            let mut withdrawn = Decimal::ZERO;
            if auto_withdraw && close.position.quote_size.is_zero() {
                let withdrawable = m.get_withdrawable(trader)?;
                if withdrawable > Decimal::ZERO {
                    m.remove_margin(self.id, trader, trader, withdrawable)?;
                    withdrawn = withdrawable;
                }
            }

            Ok(RouterCloseResult { close, withdrawn })
        })
    }
}

fn check_slippage<A: Amm, O: PriceOracle>(
    margin: &Margin<A, O>,
    side: Side,
    quote_amount: Decimal,
    base_limit: Decimal,
) -> Result<(), RouterError> {
    let actual = margin
        .amm()
        .estimate_swap(SwapDirection::for_open(side), quote_amount)
        .map_err(MarginError::from)?;

    match side {
        Side::Long if actual < base_limit => Err(RouterError::InsufficientBaseAmount {
            actual,
            limit: base_limit,
        }),
        Side::Short if actual > base_limit => Err(RouterError::ExcessiveBaseAmount {
            actual,
            limit: base_limit,
        }),
        _ => Ok(()),
    }
}

/// Runs `body` against the engine and restores the whole engine, vault
/// included, if it fails.
pub fn atomically<A, O, T, E>(
    margin: &mut Margin<A, O>,
    body: impl FnOnce(&mut Margin<A, O>) -> Result<T, E>,
) -> Result<T, E>
where
    A: Amm + Clone,
    O: PriceOracle + Clone,
{
    let snapshot = margin.clone();
    let result = body(margin);
    if result.is_err() {
        *margin = snapshot;
    }
    result
}
