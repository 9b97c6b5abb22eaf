// 8.0.2: result types and errors for margin engine operations.

use crate::amm::AmmError;
use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::oracle::OracleError;
use crate::position::PositionView;
use crate::types::{AccountId, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResult {
    pub trader: AccountId,
    pub side: Side,
    pub quote_amount: Decimal,
    // base received by a long, paid by a short
    pub base_amount: Decimal,
    pub realized_pnl: Decimal,
    pub position: PositionView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    pub trader: AccountId,
    pub side: Side,
    pub quote_amount: Decimal,
    // base paid by a long close, received by a short close
    pub base_amount: Decimal,
    pub realized_pnl: Decimal,
    // deficit written off when the close left the trader flat and negative
    pub bad_debt: Decimal,
    pub position: PositionView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub trader: AccountId,
    pub beneficiary: AccountId,
    pub side: Side,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub margin_ratio: Decimal,
    pub bonus: Decimal,
    pub insurance_contribution: Decimal,
    pub bad_debt: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpfUpdate {
    pub latest_cpf: Decimal,
    pub delta: Decimal,
    pub boost: Decimal,
    pub last_update: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarginError {
    #[error("Forbidden: {caller} may not act for this trader")]
    Forbidden { caller: AccountId },

    #[error("Deposit amount must be positive")]
    ZeroDepositAmount,

    #[error("Wrong deposit amount {amount}: only {unclaimed} unclaimed in custody")]
    WrongDepositAmount { amount: Decimal, unclaimed: Decimal },

    #[error("Withdraw amount must be positive")]
    ZeroWithdrawAmount,

    #[error("Not enough withdrawable: requested {requested}, withdrawable {withdrawable}")]
    NotEnoughWithdrawable { requested: Decimal, withdrawable: Decimal },

    #[error("Quote amount must be positive")]
    ZeroQuoteAmount,

    #[error("Quote amount too small to move any base")]
    TinyQuoteAmount,

    #[error("Margin ratio {margin_ratio} below initial margin ratio {required}")]
    InitMarginRatio { margin_ratio: Decimal, required: Decimal },

    #[error("No position to close")]
    ZeroPosition,

    #[error("Close of {requested} above open position {open}")]
    AbovePosition { requested: Decimal, open: Decimal },

    #[error("Position not liquidatable at margin ratio {margin_ratio}")]
    NotLiquidatable { margin_ratio: Decimal },

    #[error("Reentrant call")]
    Reentrant,

    #[error("Swap mismatch: estimated {estimated}, executed {executed}")]
    SwapMismatch { estimated: Decimal, executed: Decimal },

    #[error("Position cannot be valued at current pool depth")]
    Unvaluable,

    #[error("AMM error: {0}")]
    Amm(#[from] AmmError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
