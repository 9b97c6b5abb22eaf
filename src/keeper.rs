//! Keeper order layer.
//!
//! Traders sign open/close orders off-line and keepers submit them here. The
//! order book checks routing, authorship, replay and the limit price, then
//! forwards the order through its [`Router`]. Signature schemes live outside
//! this crate: callers pass the already-authenticated signer.

use crate::amm::{Amm, SwapDirection};
use crate::engine::{Margin, MarginError, OpenResult};
use crate::oracle::PriceOracle;
use crate::router::{atomically, Router, RouterCloseResult, RouterError};
use crate::types::{AccountId, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeeperError {
    #[error("Wrong router: order targets {expected}, book routes through {actual}")]
    WrongRouter { expected: AccountId, actual: AccountId },

    #[error("Not signer: order belongs to {trader}, signed by {signer}")]
    NotSigner { trader: AccountId, signer: AccountId },

    #[error("Nonce {nonce} already used by {trader}")]
    NonceUsed { trader: AccountId, nonce: u64 },

    #[error("Expired: deadline {deadline:?} passed at {now:?}")]
    Expired { deadline: Timestamp, now: Timestamp },

    #[error("Side {requested} does not match open position")]
    SideNotMatch { requested: Side },

    #[error("Price limit: execution price {price}, limit {limit}")]
    PriceLimit { price: Decimal, limit: Decimal },

    #[error("Forbidden: {caller} is not the book owner")]
    Forbidden { caller: AccountId },

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Margin error: {0}")]
    Margin(#[from] MarginError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub router_to_execute: AccountId,
    pub trader: AccountId,
    pub side: Side,
    // margin pulled from the wallet when with_wallet is set
    pub base_amount: Decimal,
    pub quote_amount: Decimal,
    // quote per base
    pub limit_price: Decimal,
    pub deadline: Timestamp,
    pub with_wallet: bool,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub router_to_execute: AccountId,
    pub trader: AccountId,
    // side of the position being closed
    pub side: Side,
    pub quote_amount: Decimal,
    pub limit_price: Decimal,
    pub deadline: Timestamp,
    pub auto_withdraw: bool,
    pub nonce: u64,
}

/// An order paired with the account that signed it.
#[derive(Debug, Clone)]
pub struct Signed<T> {
    pub order: T,
    pub signer: AccountId,
}

impl<T> Signed<T> {
    pub fn new(order: T, signer: AccountId) -> Self {
        Self { order, signer }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBook {
    owner: AccountId,
    router: Router,
    used_nonces: HashSet<(AccountId, u64)>,
}

impl OrderBook {
    pub fn new(owner: AccountId, router: Router) -> Self {
        Self {
            owner,
            router,
            used_nonces: HashSet::new(),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn set_router(&mut self, caller: AccountId, router: Router) -> Result<(), KeeperError> {
        if caller != self.owner {
            return Err(KeeperError::Forbidden { caller });
        }
        log::info!("order book now routes through {}", router.id());
        self.router = router;
        Ok(())
    }

    pub fn is_nonce_used(&self, trader: AccountId, nonce: u64) -> bool {
        self.used_nonces.contains(&(trader, nonce))
    }

    pub fn execute_open<A, O>(
        &mut self,
        margin: &mut Margin<A, O>,
        order: &OpenOrder,
        signer: AccountId,
    ) -> Result<OpenResult, KeeperError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        self.verify(margin, order.router_to_execute, order.trader, signer, order.nonce, order.deadline)?;

        let direction = SwapDirection::for_open(order.side);
        let price = execution_price(margin, direction, order.quote_amount)?;
        let within = match order.side {
            Side::Long => price <= order.limit_price,
            Side::Short => price >= order.limit_price,
        };
        if !within {
            return Err(KeeperError::PriceLimit {
                price,
                limit: order.limit_price,
            });
        }

        // the limit price already bounds the fill
        let base_limit = match order.side {
            Side::Long => Decimal::ZERO,
            Side::Short => Decimal::MAX,
        };
        let result = if order.with_wallet {
            self.router.open_position_with_wallet(
                margin,
                order.trader,
                order.side,
                order.base_amount,
                order.quote_amount,
                base_limit,
                order.deadline,
            )?
        } else {
            self.router.open_position_with_margin(
                margin,
                order.trader,
                order.side,
                order.quote_amount,
                base_limit,
                order.deadline,
            )?
        };

        self.used_nonces.insert((order.trader, order.nonce));
        log::info!("executed open order {} for {}", order.nonce, order.trader);
        Ok(result)
    }

    pub fn execute_close<A, O>(
        &mut self,
        margin: &mut Margin<A, O>,
        order: &CloseOrder,
        signer: AccountId,
    ) -> Result<RouterCloseResult, KeeperError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        self.verify(margin, order.router_to_execute, order.trader, signer, order.nonce, order.deadline)?;

        let open_side = margin.position(order.trader).and_then(|p| p.side());
        if open_side != Some(order.side) {
            return Err(KeeperError::SideNotMatch { requested: order.side });
        }

        let direction = SwapDirection::for_close(order.side);
        let price = execution_price(margin, direction, order.quote_amount)?;
        let within = match order.side {
            Side::Long => price >= order.limit_price,
            Side::Short => price <= order.limit_price,
        };
        if !within {
            return Err(KeeperError::PriceLimit {
                price,
                limit: order.limit_price,
            });
        }

        let result = self.router.close_position(
            margin,
            order.trader,
            order.quote_amount,
            order.auto_withdraw,
            order.deadline,
        )?;

        self.used_nonces.insert((order.trader, order.nonce));
        log::info!("executed close order {} for {}", order.nonce, order.trader);
        Ok(result)
    }

    /// Executes in order. Without `require_success` each order stands alone and
    /// its outcome is reported; with it, the first failure undoes the whole batch.
    pub fn batch_execute_open<A, O>(
        &mut self,
        margin: &mut Margin<A, O>,
        orders: &[Signed<OpenOrder>],
        require_success: bool,
    ) -> Result<Vec<Result<OpenResult, KeeperError>>, KeeperError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        self.batch(margin, orders, require_success, |book, m, signed| {
            book.execute_open(m, &signed.order, signed.signer)
        })
    }

    pub fn batch_execute_close<A, O>(
        &mut self,
        margin: &mut Margin<A, O>,
        orders: &[Signed<CloseOrder>],
        require_success: bool,
    ) -> Result<Vec<Result<RouterCloseResult, KeeperError>>, KeeperError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        self.batch(margin, orders, require_success, |book, m, signed| {
            book.execute_close(m, &signed.order, signed.signer)
        })
    }

    fn batch<A, O, T, R>(
        &mut self,
        margin: &mut Margin<A, O>,
        orders: &[T],
        require_success: bool,
        mut execute: impl FnMut(&mut Self, &mut Margin<A, O>, &T) -> Result<R, KeeperError>,
    ) -> Result<Vec<Result<R, KeeperError>>, KeeperError>
    where
        A: Amm + Clone,
        O: PriceOracle + Clone,
    {
        if !require_success {
            return Ok(orders.iter().map(|o| execute(self, margin, o)).collect());
        }

        let nonces = self.used_nonces.clone();
        let outcome = atomically(margin, |m| {
            orders
                .iter()
                .map(|o| execute(self, m, o).map(Ok::<R, KeeperError>))
                .collect::<Result<Vec<_>, KeeperError>>()
        });
        if outcome.is_err() {
            self.used_nonces = nonces;
        }
        outcome
    }

    fn verify<A: Amm, O: PriceOracle>(
        &self,
        margin: &Margin<A, O>,
        router_to_execute: AccountId,
        trader: AccountId,
        signer: AccountId,
        nonce: u64,
        deadline: Timestamp,
    ) -> Result<(), KeeperError> {
        if router_to_execute != self.router.id() {
            return Err(KeeperError::WrongRouter {
                expected: router_to_execute,
                actual: self.router.id(),
            });
        }
        if signer != trader {
            return Err(KeeperError::NotSigner { trader, signer });
        }
        if self.is_nonce_used(trader, nonce) {
            return Err(KeeperError::NonceUsed { trader, nonce });
        }
        let now = margin.time();
        if now > deadline {
            return Err(KeeperError::Expired { deadline, now });
        }
        Ok(())
    }
}

// quote per base at the pool's current estimate
fn execution_price<A: Amm, O: PriceOracle>(
    margin: &Margin<A, O>,
    direction: SwapDirection,
    quote_amount: Decimal,
) -> Result<Decimal, KeeperError> {
    let base = margin
        .amm()
        .estimate_swap(direction, quote_amount)
        .map_err(MarginError::from)?;
    if base <= Decimal::ZERO {
        return Err(MarginError::TinyQuoteAmount.into());
    }
    Ok(quote_amount / base)
}
