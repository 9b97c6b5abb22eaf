//! Margin deposits/withdrawals and position opens/closes.

use super::core::Margin;
use super::results::{CloseResult, MarginError, OpenResult};
use crate::amm::{Amm, SwapDirection};
use crate::events::{
    BadDebtEvent, EventPayload, MarginAddedEvent, MarginRemovedEvent, PositionClosedEvent,
    PositionOpenedEvent,
};
use crate::oracle::PriceOracle;
use crate::position::apply_trade;
use crate::types::{AccountId, Side};
use rust_decimal::Decimal;

impl<A: Amm, O: PriceOracle> Margin<A, O> {
    /// Credit base that already sits unclaimed in custody to `trader`.
    /// Permissionless: whoever calls first claims it.
    pub fn add_margin(&mut self, trader: AccountId, amount: Decimal) -> Result<(), MarginError> {
        self.guarded(Some(trader), |m| {
            if amount <= Decimal::ZERO {
                return Err(MarginError::ZeroDepositAmount);
            }

            let unclaimed = m.vault.custody_balance() - m.reserve;
            if amount > unclaimed {
                return Err(MarginError::WrongDepositAmount { amount, unclaimed });
            }

            m.settle_funding()?;
            m.realize_funding(trader)?;

            let mut position = m.position_or_new(trader);
            position.base_size += amount;
            m.store_position(trader, position);
            m.reserve += amount;

            m.emit_event(EventPayload::MarginAdded(MarginAddedEvent {
                trader,
                amount,
                reserve: m.reserve,
            }));
            Ok(())
        })
    }

    pub fn remove_margin(
        &mut self,
        caller: AccountId,
        trader: AccountId,
        recipient: AccountId,
        amount: Decimal,
    ) -> Result<(), MarginError> {
        self.guarded(Some(trader), |m| {
            m.authorize(caller, trader)?;
            if amount <= Decimal::ZERO {
                return Err(MarginError::ZeroWithdrawAmount);
            }

            m.settle_funding()?;
            m.realize_funding(trader)?;

            let withdrawable = m.get_withdrawable(trader)?;
            if amount > withdrawable {
                return Err(MarginError::NotEnoughWithdrawable {
                    requested: amount,
                    withdrawable,
                });
            }

            let mut position = m.position_or_new(trader);
            position.base_size -= amount;
            m.store_position(trader, position);
            m.reserve -= amount;

            m.emit_event(EventPayload::MarginRemoved(MarginRemovedEvent {
                trader,
                recipient,
                amount,
                reserve: m.reserve,
            }));

            m.vault.transfer_out(recipient, amount)?;
            Ok(())
        })
    }

    pub fn open_position(
        &mut self,
        caller: AccountId,
        trader: AccountId,
        side: Side,
        quote_amount: Decimal,
    ) -> Result<OpenResult, MarginError> {
        self.guarded(Some(trader), |m| {
            m.authorize(caller, trader)?;
            if quote_amount <= Decimal::ZERO {
                return Err(MarginError::ZeroQuoteAmount);
            }

            m.settle_funding()?;
            m.realize_funding(trader)?;

            let direction = SwapDirection::for_open(side);
            let base_amount = m.amm.estimate_swap(direction, quote_amount)?;
            if base_amount <= Decimal::ZERO {
                return Err(MarginError::TinyQuoteAmount);
            }

            let current = m.position_or_new(trader);
            let update = apply_trade(&current, side, quote_amount, base_amount, m.config.base_decimals);

            let snapshot = m.snapshot_at_pool(&update.position, Decimal::ZERO)?;
            if let Some(margin_ratio) = snapshot.margin_ratio() {
                if margin_ratio < m.risk.init_margin_ratio {
                    return Err(MarginError::InitMarginRatio {
                        margin_ratio,
                        required: m.risk.init_margin_ratio,
                    });
                }
            }

            let view = update.position.view();
            m.store_position(trader, update.position);
            m.swap_exact(direction, quote_amount, base_amount)?;

            m.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
                trader,
                side,
                quote_amount,
                base_amount,
                position: view,
            }));

            Ok(OpenResult {
                trader,
                side,
                quote_amount,
                base_amount,
                realized_pnl: update.realized_pnl,
                position: view,
            })
        })
    }

    pub fn close_position(
        &mut self,
        caller: AccountId,
        trader: AccountId,
        quote_amount: Decimal,
    ) -> Result<CloseResult, MarginError> {
        self.guarded(Some(trader), |m| {
            m.authorize(caller, trader)?;
            if quote_amount <= Decimal::ZERO {
                return Err(MarginError::ZeroPosition);
            }

            m.settle_funding()?;
            m.realize_funding(trader)?;

            let current = m.position_or_new(trader);
            let open = current.quote_size.abs();
            let side = match current.side() {
                Some(side) if quote_amount <= open => side,
                _ => {
                    return Err(MarginError::AbovePosition {
                        requested: quote_amount,
                        open,
                    })
                }
            };

            let direction = SwapDirection::for_close(side);
            let base_amount = m.amm.estimate_swap(direction, quote_amount)?;
            if base_amount <= Decimal::ZERO {
                return Err(MarginError::TinyQuoteAmount);
            }

            let update = apply_trade(
                &current,
                side.opposite(),
                quote_amount,
                base_amount,
                m.config.base_decimals,
            );
            let mut position = update.position;

            let mut bad_debt = Decimal::ZERO;
            if position.is_flat() && position.base_size < Decimal::ZERO {
                bad_debt = -position.base_size;
                position.base_size = Decimal::ZERO;
                m.absorb_bad_debt(trader, bad_debt);
            }

            let view = position.view();
            m.store_position(trader, position);
            m.swap_exact(direction, quote_amount, base_amount)?;

            m.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                trader,
                side,
                quote_amount,
                base_amount,
                realized_pnl: update.realized_pnl,
                position: view,
            }));

            Ok(CloseResult {
                trader,
                side,
                quote_amount,
                base_amount,
                realized_pnl: update.realized_pnl,
                bad_debt,
                position: view,
            })
        })
    }

    // ledger is already committed from the estimate; the executed swap must agree
    pub(super) fn swap_exact(
        &mut self,
        direction: SwapDirection,
        quote_amount: Decimal,
        estimated: Decimal,
    ) -> Result<(), MarginError> {
        let executed = self.amm.swap(direction, quote_amount)?;
        if executed != estimated {
            return Err(MarginError::SwapMismatch { estimated, executed });
        }
        Ok(())
    }

    // insurance covers what it can, the rest is tracked as uncovered
    pub(super) fn absorb_bad_debt(&mut self, trader: AccountId, debt_amount: Decimal) {
        let covered = self.insurance_fund.cover_bad_debt(debt_amount);
        let uncovered = debt_amount - covered;
        self.bad_debt += uncovered;

        log::warn!(
            "bad debt of {} for {}: {} covered by insurance, {} uncovered",
            debt_amount,
            trader,
            covered,
            uncovered
        );
        self.emit_event(EventPayload::BadDebt(BadDebtEvent {
            trader,
            debt_amount,
            covered_by_insurance: covered,
            uncovered,
        }));
    }
}
