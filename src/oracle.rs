// Price oracle integration
//
// The ledger reads two things from the oracle: the index price used for
// liquidation checks, and the premium fraction (per second, signed) that drives
// funding. Where those numbers come from is up to the implementation.

use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle has no index price")]
    NoIndexPrice,

    #[error("oracle is unavailable")]
    Unavailable,
}

/// Implement this to plug a real oracle network into the margin engine.
pub trait PriceOracle {
    fn index_price(&self) -> Result<Price, OracleError>;

    /// Signed premium fraction per second. Positive means longs pay.
    fn premium_fraction(&self) -> Result<Decimal, OracleError>;
}

/// Mock oracle for testing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockPriceOracle {
    index_price: Option<Price>,
    premium_fraction: Decimal,
    healthy: bool,
}

impl MockPriceOracle {
    pub fn new(index_price: Price) -> Self {
        Self {
            index_price: Some(index_price),
            premium_fraction: Decimal::ZERO,
            healthy: true,
        }
    }

    pub fn set_index_price(&mut self, price: Price) {
        self.index_price = Some(price);
    }

    pub fn clear_index_price(&mut self) {
        self.index_price = None;
    }

    pub fn set_premium_fraction(&mut self, premium: Decimal) {
        self.premium_fraction = premium;
    }

    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }
}

impl PriceOracle for MockPriceOracle {
    fn index_price(&self) -> Result<Price, OracleError> {
        if !self.healthy {
            return Err(OracleError::Unavailable);
        }
        self.index_price.ok_or(OracleError::NoIndexPrice)
    }

    fn premium_fraction(&self) -> Result<Decimal, OracleError> {
        if !self.healthy {
            return Err(OracleError::Unavailable);
        }
        Ok(self.premium_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_mock_oracle() {
        let mut oracle = MockPriceOracle::new(Price::new_unchecked(dec!(2000)));
        assert_eq!(oracle.index_price().unwrap().value(), dec!(2000));
        assert_eq!(oracle.premium_fraction().unwrap(), Decimal::ZERO);

        oracle.set_premium_fraction(dec!(-0.0001));
        assert_eq!(oracle.premium_fraction().unwrap(), dec!(-0.0001));

        oracle.clear_index_price();
        assert_eq!(oracle.index_price(), Err(OracleError::NoIndexPrice));
    }

    #[test]
    fn test_unhealthy_oracle() {
        let mut oracle = MockPriceOracle::new(Price::new_unchecked(dec!(2000)));
        oracle.set_healthy(false);
        assert_eq!(oracle.index_price(), Err(OracleError::Unavailable));
        assert_eq!(oracle.premium_fraction(), Err(OracleError::Unavailable));
    }
}
