// 5.0: funding fee accrual. one global cumulative premium fraction (cpf), settled lazily.
// 5.0 has the state structs. 5.1 boost, 5.2 pending delta and settlement, 5.3 per-trader fee.

use crate::types::{QuoteSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingState {
    pub latest_cpf: Decimal,
    pub last_update: Timestamp,
}

impl FundingState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            latest_cpf: Decimal::ZERO,
            last_update: timestamp,
        }
    }
}

// summed |quote size| per side. longs and shorts are tracked apart so the boost can weigh them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInterest {
    pub long_quote: Decimal,
    pub short_quote: Decimal,
}

impl OpenInterest {
    pub fn is_empty(&self) -> bool {
        self.long_quote.is_zero() && self.short_quote.is_zero()
    }

    /// Swaps one position's contribution for another's.
    pub fn replace(&mut self, before: QuoteSize, after: QuoteSize) {
        self.remove(before);
        self.add(after);
    }

    fn add(&mut self, size: QuoteSize) {
        if size.is_long() {
            self.long_quote += size.abs();
        } else if size.is_short() {
            self.short_quote += size.abs();
        }
    }

    fn remove(&mut self, size: QuoteSize) {
        if size.is_long() {
            self.long_quote = (self.long_quote - size.abs()).max(Decimal::ZERO);
        } else if size.is_short() {
            self.short_quote = (self.short_quote - size.abs()).max(Decimal::ZERO);
        }
    }
}

// 5.1: positive premium = longs pay. the boost is paying OI over receiving OI,
// so a lopsided book pays more per unit of premium.
pub fn boost(premium: Decimal, oi: &OpenInterest, max_cpf_boost: Decimal) -> Decimal {
    if premium.is_zero() || oi.is_empty() {
        return Decimal::ZERO;
    }

    let (paying, receiving) = if premium > Decimal::ZERO {
        (oi.long_quote, oi.short_quote)
    } else {
        (oi.short_quote, oi.long_quote)
    };

    if receiving.is_zero() {
        return max_cpf_boost;
    }

    (paying / receiving).max(-max_cpf_boost).min(max_cpf_boost)
}

// 5.2: pure, so views can call it as often as they like
pub fn pending_cpf_delta(
    state: &FundingState,
    now: Timestamp,
    premium: Decimal,
    boost: Decimal,
) -> Decimal {
    boost * premium * state.last_update.elapsed_secs(&now)
}

pub fn pending_cpf(state: &FundingState, now: Timestamp, premium: Decimal, boost: Decimal) -> Decimal {
    state.latest_cpf + pending_cpf_delta(state, now, premium, boost)
}

/// Folds the pending delta into the state. `last_update` never moves backwards.
pub fn settle(state: &FundingState, now: Timestamp, premium: Decimal, boost: Decimal) -> FundingState {
    if now <= state.last_update {
        return *state;
    }

    FundingState {
        latest_cpf: pending_cpf(state, now, premium, boost),
        last_update: now,
    }
}

// 5.3: exposure is the signed base value of the position, negative for longs.
// the fee is a credit to base size: negative means the trader pays.
pub fn funding_fee(exposure: Decimal, entry_cpf: Decimal, cpf: Decimal) -> Decimal {
    exposure * (cpf - entry_cpf)
}
