// 11.0: every state change produces an event. used for audit trails and notifying
// keepers. the EventPayload enum lists all event types. EventLog is the bounded store.

use crate::config::RiskConfig;
use crate::position::PositionView;
use crate::types::{AccountId, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Margin events
    MarginAdded(MarginAddedEvent),
    MarginRemoved(MarginRemovedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),

    // Funding events
    CpfUpdated(CpfUpdatedEvent),
    FundingRealized(FundingRealizedEvent),

    // Risk events
    Liquidated(LiquidatedEvent),
    BadDebt(BadDebtEvent),

    // Governance events
    RiskConfigUpdated(RiskConfig),
    RouterRegistered(AccountId),
    RouterUnregistered(AccountId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginAddedEvent {
    pub trader: AccountId,
    pub amount: Decimal,
    pub reserve: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRemovedEvent {
    pub trader: AccountId,
    pub recipient: AccountId,
    pub amount: Decimal,
    pub reserve: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub trader: AccountId,
    pub side: Side,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub position: PositionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub trader: AccountId,
    // side of the position being reduced
    pub side: Side,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub realized_pnl: Decimal,
    pub position: PositionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpfUpdatedEvent {
    pub latest_cpf: Decimal,
    pub delta: Decimal,
    pub boost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRealizedEvent {
    pub trader: AccountId,
    pub fee: Decimal,
    pub cpf: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatedEvent {
    pub trader: AccountId,
    pub liquidator: AccountId,
    pub beneficiary: AccountId,
    pub side: Side,
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    pub margin_ratio: Decimal,
    pub bonus: Decimal,
    pub insurance_contribution: Decimal,
    pub bad_debt: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub trader: AccountId,
    pub debt_amount: Decimal,
    pub covered_by_insurance: Decimal,
    pub uncovered: Decimal,
}

// bounded, oldest events fall off the front
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<Event>,
    next_id: u64,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn push(&mut self, timestamp: Timestamp, payload: EventPayload) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;

        self.events.push_back(Event::new(id, timestamp, payload));
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
        id
    }

    pub fn next_id(&self) -> EventId {
        EventId(self.next_id)
    }

    /// Drops every event from `id` onwards and rewinds the id counter.
    pub fn rewind_to(&mut self, id: EventId) {
        while self.events.back().is_some_and(|e| e.id >= id) {
            self.events.pop_back();
        }
        self.next_id = id.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn recent(&self, count: usize) -> Vec<&Event> {
        let start = self.events.len().saturating_sub(count);
        self.events.range(start..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
