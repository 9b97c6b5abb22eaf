//! Margin health views.

use super::core::Margin;
use super::results::MarginError;
use crate::amm::{Amm, Reserves};
use crate::liquidation::{evaluate_liquidation, LiquidationStatus};
use crate::margin::{position_value, HealthSnapshot};
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::AccountId;
use rust_decimal::Decimal;

impl<A: Amm, O: PriceOracle> Margin<A, O> {
    /// Base that `trader` could withdraw right now, funding included.
    pub fn get_withdrawable(&self, trader: AccountId) -> Result<Decimal, MarginError> {
        let Some(position) = self.positions.get(&trader) else {
            return Ok(Decimal::ZERO);
        };
        let fee = self.cal_funding_fee(trader)?;
        let snapshot = self.snapshot_at_pool(position, fee)?;
        Ok(snapshot.withdrawable(
            self.risk.init_margin_ratio,
            self.reserve,
            self.config.base_decimals,
        ))
    }

    /// Base pnl of the open position at the pool. Funding not included.
    pub fn cal_unrealized_pnl(&self, trader: AccountId) -> Result<Decimal, MarginError> {
        let Some(position) = self.positions.get(&trader) else {
            return Ok(Decimal::ZERO);
        };
        Ok(self.snapshot_at_pool(position, Decimal::ZERO)?.unrealized_pnl())
    }

    /// `None` when flat.
    pub fn margin_ratio(&self, trader: AccountId) -> Result<Option<Decimal>, MarginError> {
        let Some(position) = self.positions.get(&trader) else {
            return Ok(None);
        };
        let fee = self.cal_funding_fee(trader)?;
        Ok(self.snapshot_at_pool(position, fee)?.margin_ratio())
    }

    /// Liquidation check at the oracle index price, pending funding included.
    pub fn liquidation_status(&self, trader: AccountId) -> Result<LiquidationStatus, MarginError> {
        let Some(position) = self.positions.get(&trader) else {
            return Ok(LiquidationStatus::Flat);
        };
        let fee = self.cal_funding_fee(trader)?;
        let snapshot = self.snapshot_at_index(position, fee)?;
        Ok(evaluate_liquidation(&snapshot, self.risk.liquidate_threshold))
    }

    pub fn can_liquidate(&self, trader: AccountId) -> Result<bool, MarginError> {
        Ok(self.liquidation_status(trader)?.is_liquidatable())
    }

    // beta-weighted against the AMM's reserves
    pub(super) fn snapshot_at_pool(&self, position: &Position, fee: Decimal) -> Result<HealthSnapshot, MarginError> {
        let value = position_value(
            position.quote_size,
            &self.amm.reserves(),
            self.risk.beta,
            self.config.base_decimals,
        )
        .ok_or(MarginError::Unvaluable)?;
        Ok(HealthSnapshot::new(position, fee, value))
    }

    // spot valuation at the index price, no depth term
    pub(super) fn snapshot_at_index(&self, position: &Position, fee: Decimal) -> Result<HealthSnapshot, MarginError> {
        let index = self.oracle.index_price()?;
        let spot = Reserves {
            base: Decimal::ONE,
            quote: index.value(),
        };
        let value = position_value(position.quote_size, &spot, Decimal::ZERO, self.config.base_decimals)
            .ok_or(MarginError::Unvaluable)?;
        Ok(HealthSnapshot::new(position, fee, value))
    }
}
