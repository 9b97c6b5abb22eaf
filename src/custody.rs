// 9.2 custody.rs: MOCKED. just balance changes, no real token transfers.
// wallets hold base tokens outside the engine, custody is what the margin engine holds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::AccountId;

// Errors from custody operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("transfer amount must be positive")]
    InvalidAmount,
}

// Direction of a custody movement, kept for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Mint,
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub kind: TransferKind,
    pub account_id: AccountId,
    pub amount: Decimal,
}

// The base-token vault behind one margin engine.
// custody_balance can exceed the engine's reserve: tokens sent in but not yet claimed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralVault {
    wallets: HashMap<AccountId, Decimal>,
    custody: Decimal,
    // Total moved into custody
    total_in: Decimal,
    // Total paid out of custody
    total_out: Decimal,
    history: Vec<TransferRecord>,
}

impl CollateralVault {
    pub fn new() -> Self {
        Self::default()
    }

    // Credit a wallet from nowhere (test faucet)
    pub fn mint(&mut self, account_id: AccountId, amount: Decimal) -> Result<(), CustodyError> {
        if amount <= Decimal::ZERO {
            return Err(CustodyError::InvalidAmount);
        }
        *self.wallets.entry(account_id).or_insert(Decimal::ZERO) += amount;
        self.record(TransferKind::Mint, account_id, amount);
        Ok(())
    }

    // Move tokens from a wallet into custody
    pub fn transfer_in(&mut self, from: AccountId, amount: Decimal) -> Result<(), CustodyError> {
        if amount <= Decimal::ZERO {
            return Err(CustodyError::InvalidAmount);
        }

        let available = self.balance_of(from);
        if amount > available {
            return Err(CustodyError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        self.wallets.insert(from, available - amount);
        self.custody += amount;
        self.total_in += amount;
        self.record(TransferKind::Inbound, from, amount);
        Ok(())
    }

    // Pay tokens out of custody to a wallet
    pub fn transfer_out(&mut self, to: AccountId, amount: Decimal) -> Result<(), CustodyError> {
        if amount <= Decimal::ZERO {
            return Err(CustodyError::InvalidAmount);
        }
        if amount > self.custody {
            return Err(CustodyError::InsufficientBalance {
                available: self.custody,
                requested: amount,
            });
        }

        self.custody -= amount;
        *self.wallets.entry(to).or_insert(Decimal::ZERO) += amount;
        self.total_out += amount;
        self.record(TransferKind::Outbound, to, amount);
        Ok(())
    }

    pub fn custody_balance(&self) -> Decimal {
        self.custody
    }

    pub fn balance_of(&self, account_id: AccountId) -> Decimal {
        self.wallets.get(&account_id).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_in(&self) -> Decimal {
        self.total_in
    }

    pub fn total_out(&self) -> Decimal {
        self.total_out
    }

    pub fn history(&self) -> &[TransferRecord] {
        &self.history
    }

    fn record(&mut self, kind: TransferKind, account_id: AccountId, amount: Decimal) {
        self.history.push(TransferRecord {
            kind,
            account_id,
            amount,
        });
    }
}
