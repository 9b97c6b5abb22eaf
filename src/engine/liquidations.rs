//! Liquidation execution.

use super::core::Margin;
use super::results::{LiquidationResult, MarginError};
use crate::amm::{Amm, SwapDirection};
use crate::events::{EventPayload, LiquidatedEvent};
use crate::liquidation::{split_remainder, LiquidationStatus};
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::{AccountId, Side};
use rust_decimal::Decimal;

impl<A: Amm, O: PriceOracle> Margin<A, O> {
    /// Force-close `trader`'s whole position. Only registered routers may call.
    /// The liquidator bonus goes to `beneficiary`.
    pub fn liquidate(
        &mut self,
        caller: AccountId,
        trader: AccountId,
        beneficiary: AccountId,
    ) -> Result<LiquidationResult, MarginError> {
        self.guarded(Some(trader), |m| {
            if !m.routers.contains(caller) {
                return Err(MarginError::Forbidden { caller });
            }

            let Some(side) = m.positions.get(&trader).and_then(Position::side) else {
                return Err(MarginError::ZeroPosition);
            };

            m.settle_funding()?;
            m.realize_funding(trader)?;

            let margin_ratio = match m.liquidation_status(trader)? {
                LiquidationStatus::Liquidatable { margin_ratio } => margin_ratio,
                LiquidationStatus::Healthy { margin_ratio } => {
                    return Err(MarginError::NotLiquidatable { margin_ratio })
                }
                LiquidationStatus::Flat => return Err(MarginError::ZeroPosition),
            };

            let position = m.position_or_new(trader);
            let quote_amount = position.quote_size.abs();
            let direction = SwapDirection::for_close(side);
            let base_amount = m.amm.estimate_swap(direction, quote_amount)?;

            // a long pays base to buy back its debt, a short receives base for its quote
            let remain = match side {
                Side::Long => position.base_size - base_amount,
                Side::Short => position.base_size + base_amount,
            };
            let split = split_remainder(
                remain,
                m.risk.liquidate_fee_ratio,
                m.reserve,
                m.config.base_decimals,
            );

            if split.insurance_contribution > Decimal::ZERO {
                m.insurance_fund.deposit(split.insurance_contribution);
            }
            if split.bad_debt > Decimal::ZERO {
                m.absorb_bad_debt(trader, split.bad_debt);
            }

            m.store_position(trader, Position::new(m.funding.latest_cpf));
            m.reserve -= split.bonus;
            if base_amount > Decimal::ZERO {
                m.swap_exact(direction, quote_amount, base_amount)?;
            }

            log::info!(
                "liquidated {} ({} {} quote) at margin ratio {}: bonus {}, bad debt {}",
                trader,
                side,
                quote_amount,
                margin_ratio,
                split.bonus,
                split.bad_debt
            );
            m.emit_event(EventPayload::Liquidated(LiquidatedEvent {
                trader,
                liquidator: caller,
                beneficiary,
                side,
                quote_amount,
                base_amount,
                margin_ratio,
                bonus: split.bonus,
                insurance_contribution: split.insurance_contribution,
                bad_debt: split.bad_debt,
            }));

            if split.bonus > Decimal::ZERO {
                m.vault.transfer_out(beneficiary, split.bonus)?;
            }

            Ok(LiquidationResult {
                trader,
                beneficiary,
                side,
                quote_amount,
                base_amount,
                margin_ratio,
                bonus: split.bonus,
                insurance_contribution: split.insurance_contribution,
                bad_debt: split.bad_debt,
            })
        })
    }
}
