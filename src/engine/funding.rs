//! Funding fee settlement.

use super::core::Margin;
use super::results::{CpfUpdate, MarginError};
use crate::amm::{Amm, AmmError};
use crate::events::{CpfUpdatedEvent, EventPayload, FundingRealizedEvent};
use crate::funding::{boost, funding_fee, pending_cpf, settle};
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::{floor_to, AccountId, Timestamp};
use rust_decimal::Decimal;

impl<A: Amm, O: PriceOracle> Margin<A, O> {
    /// Settle the global cpf up to now. Callable by anyone at any time.
    pub fn update_cpf(&mut self) -> Result<CpfUpdate, MarginError> {
        self.guarded(None, |m| m.settle_funding())
    }

    pub fn latest_cpf(&self) -> Decimal {
        self.funding.latest_cpf
    }

    pub fn last_update_cpf(&self) -> Timestamp {
        self.funding.last_update
    }

    /// Pending funding for `trader` as of now, without touching state.
    /// Positive is a credit, negative a charge.
    pub fn cal_funding_fee(&self, trader: AccountId) -> Result<Decimal, MarginError> {
        let Some(position) = self.positions.get(&trader) else {
            return Ok(Decimal::ZERO);
        };
        let (premium, boost) = self.premium_and_boost()?;
        let cpf = pending_cpf(&self.funding, self.current_time, premium, boost);
        self.fee_for(position, cpf)
    }

    pub(super) fn settle_funding(&mut self) -> Result<CpfUpdate, MarginError> {
        let (premium, boost) = self.premium_and_boost()?;
        let before = self.funding.latest_cpf;
        let advanced = self.current_time > self.funding.last_update;

        self.funding = settle(&self.funding, self.current_time, premium, boost);
        let update = CpfUpdate {
            latest_cpf: self.funding.latest_cpf,
            delta: self.funding.latest_cpf - before,
            boost,
            last_update: self.funding.last_update,
        };

        if advanced {
            log::debug!(
                "cpf settled: {} (delta {}, boost {})",
                update.latest_cpf,
                update.delta,
                update.boost
            );
            self.emit_event(EventPayload::CpfUpdated(CpfUpdatedEvent {
                latest_cpf: update.latest_cpf,
                delta: update.delta,
                boost,
            }));
        }

        Ok(update)
    }

    // assumes settle_funding already ran in this call
    pub(super) fn realize_funding(&mut self, trader: AccountId) -> Result<Decimal, MarginError> {
        let cpf = self.funding.latest_cpf;
        let Some(position) = self.positions.get(&trader) else {
            return Ok(Decimal::ZERO);
        };
        let fee = self.fee_for(position, cpf)?;

        if let Some(position) = self.positions.get_mut(&trader) {
            position.realize_funding(fee, cpf);
        }

        if !fee.is_zero() {
            self.emit_event(EventPayload::FundingRealized(FundingRealizedEvent {
                trader,
                fee,
                cpf,
            }));
        }
        Ok(fee)
    }

    fn premium_and_boost(&self) -> Result<(Decimal, Decimal), MarginError> {
        let premium = self.oracle.premium_fraction()?;
        let boost = boost(premium, &self.open_interest, self.risk.max_cpf_boost);
        Ok((premium, boost))
    }

    // exposure is the position's signed spot value in base, negative for longs
    fn fee_for(&self, position: &Position, cpf: Decimal) -> Result<Decimal, MarginError> {
        if position.is_flat() || cpf == position.entry_cpf {
            return Ok(Decimal::ZERO);
        }
        let price = self.amm.price().ok_or(AmmError::NoPrice)?;
        let exposure = price.quote_to_base(position.quote_size.value());
        Ok(floor_to(
            funding_fee(exposure, position.entry_cpf, cpf),
            self.config.base_decimals,
        ))
    }
}
