// 8.0 engine/core.rs: the margin engine. one market, all traders, reserve, funding, insurance.

use super::config::EngineConfig;
use super::results::MarginError;
use crate::amm::Amm;
use crate::config::{ConfigError, MarginSettings, RiskConfig, RouterRegistry};
use crate::custody::CollateralVault;
use crate::events::{Event, EventId, EventLog, EventPayload};
use crate::funding::{FundingState, OpenInterest};
use crate::liquidation::InsuranceFund;
use crate::oracle::PriceOracle;
use crate::position::{Position, PositionView};
use crate::types::{AccountId, Timestamp};
use rust_decimal::Decimal;
use std::collections::HashMap;

/** 8.1: main engine struct. all ledger state lives here */
#[derive(Debug, Clone)]
pub struct Margin<A: Amm, O: PriceOracle> {
    pub(super) config: EngineConfig,
    pub(super) risk: RiskConfig,
    pub(super) governor: AccountId,
    pub(super) routers: RouterRegistry,
    pub(super) amm: A,
    pub(super) oracle: O,
    pub(super) vault: CollateralVault,
    pub(super) positions: HashMap<AccountId, Position>,
    pub(super) reserve: Decimal,
    pub(super) funding: FundingState,
    pub(super) open_interest: OpenInterest,
    pub(super) insurance_fund: InsuranceFund,
    // uncovered bad debt, after the insurance fund ran dry
    pub(super) bad_debt: Decimal,
    pub(super) events: EventLog,
    pub(super) current_time: Timestamp,
    pub(super) in_flight: bool,
}

// 8.2: what a failed call restores. only one trader is touched per call.
#[derive(Debug, Clone)]
pub(super) struct Checkpoint<S> {
    trader: Option<(AccountId, Option<Position>)>,
    amm: S,
    reserve: Decimal,
    funding: FundingState,
    open_interest: OpenInterest,
    insurance_fund: InsuranceFund,
    bad_debt: Decimal,
    event_mark: EventId,
}

impl<A: Amm, O: PriceOracle> Margin<A, O> {
    pub fn new(
        governor: AccountId,
        amm: A,
        oracle: O,
        settings: MarginSettings,
        now: Timestamp,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let MarginSettings { engine, risk } = settings;

        Ok(Self {
            events: EventLog::new(engine.max_events),
            config: engine,
            risk,
            governor,
            routers: RouterRegistry::new(),
            amm,
            oracle,
            vault: CollateralVault::new(),
            positions: HashMap::new(),
            reserve: Decimal::ZERO,
            funding: FundingState::new(now),
            open_interest: OpenInterest::default(),
            insurance_fund: InsuranceFund::default(),
            bad_debt: Decimal::ZERO,
            current_time: now,
            in_flight: false,
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    // governance

    pub fn governor(&self) -> AccountId {
        self.governor
    }

    pub fn risk_config(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_risk_config(&mut self, caller: AccountId, risk: RiskConfig) -> Result<(), MarginError> {
        self.only_governor(caller)?;
        risk.validate()?;
        self.risk = risk.clone();
        log::info!("risk config updated: {:?}", risk);
        self.emit_event(EventPayload::RiskConfigUpdated(risk));
        Ok(())
    }

    pub fn register_router(&mut self, caller: AccountId, router: AccountId) -> Result<(), MarginError> {
        self.only_governor(caller)?;
        if self.routers.register(router) {
            self.emit_event(EventPayload::RouterRegistered(router));
        }
        Ok(())
    }

    pub fn unregister_router(&mut self, caller: AccountId, router: AccountId) -> Result<(), MarginError> {
        self.only_governor(caller)?;
        if self.routers.unregister(router) {
            self.emit_event(EventPayload::RouterUnregistered(router));
        }
        Ok(())
    }

    pub fn is_router(&self, account: AccountId) -> bool {
        self.routers.contains(account)
    }

    fn only_governor(&self, caller: AccountId) -> Result<(), MarginError> {
        if caller != self.governor {
            return Err(MarginError::Forbidden { caller });
        }
        Ok(())
    }

    // trader itself or any registered router
    pub(super) fn authorize(&self, caller: AccountId, trader: AccountId) -> Result<(), MarginError> {
        if caller == trader || self.routers.contains(caller) {
            Ok(())
        } else {
            Err(MarginError::Forbidden { caller })
        }
    }

    // collaborators

    pub fn amm(&self) -> &A {
        &self.amm
    }

    pub fn amm_mut(&mut self) -> &mut A {
        &mut self.amm
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn vault(&self) -> &CollateralVault {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut CollateralVault {
        &mut self.vault
    }

    // ledger views

    pub fn trader_position(&self, trader: AccountId) -> PositionView {
        self.positions
            .get(&trader)
            .map(Position::view)
            .unwrap_or_default()
    }

    pub fn position(&self, trader: AccountId) -> Option<&Position> {
        self.positions.get(&trader)
    }

    pub fn traders(&self) -> impl Iterator<Item = &AccountId> {
        self.positions.keys()
    }

    pub fn reserve(&self) -> Decimal {
        self.reserve
    }

    pub fn open_interest(&self) -> OpenInterest {
        self.open_interest
    }

    pub fn insurance_fund(&self) -> &InsuranceFund {
        &self.insurance_fund
    }

    pub fn bad_debt(&self) -> Decimal {
        self.bad_debt
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn recent_events(&self, count: usize) -> Vec<&Event> {
        self.events.recent(count)
    }

    /// Seeds the insurance fund from `from`'s wallet. The tokens count toward
    /// `reserve` so `add_margin` cannot claim them.
    pub fn fund_insurance(&mut self, from: AccountId, amount: Decimal) -> Result<(), MarginError> {
        self.guarded(None, |m| {
            m.vault.transfer_in(from, amount)?;
            m.reserve += amount;
            m.insurance_fund.deposit(amount);
            Ok(())
        })
    }

    // 8.3: non-reentrant, all-or-nothing section around every mutating entry point
    pub(super) fn guarded<T>(
        &mut self,
        trader: Option<AccountId>,
        body: impl FnOnce(&mut Self) -> Result<T, MarginError>,
    ) -> Result<T, MarginError> {
        if self.in_flight {
            return Err(MarginError::Reentrant);
        }
        self.in_flight = true;

        let checkpoint = self.checkpoint(trader);
        let result = body(self);
        if let Err(err) = &result {
            log::debug!("rolling back: {}", err);
            self.restore(checkpoint);
        }

        self.in_flight = false;
        result
    }

    fn checkpoint(&self, trader: Option<AccountId>) -> Checkpoint<A::Snapshot> {
        Checkpoint {
            trader: trader.map(|t| (t, self.positions.get(&t).cloned())),
            amm: self.amm.snapshot(),
            reserve: self.reserve,
            funding: self.funding,
            open_interest: self.open_interest,
            insurance_fund: self.insurance_fund.clone(),
            bad_debt: self.bad_debt,
            event_mark: self.events.next_id(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<A::Snapshot>) {
        self.amm.restore(checkpoint.amm);
        if let Some((trader, position)) = checkpoint.trader {
            match position {
                Some(p) => {
                    self.positions.insert(trader, p);
                }
                None => {
                    self.positions.remove(&trader);
                }
            }
        }
        self.reserve = checkpoint.reserve;
        self.funding = checkpoint.funding;
        self.open_interest = checkpoint.open_interest;
        self.insurance_fund = checkpoint.insurance_fund;
        self.bad_debt = checkpoint.bad_debt;
        self.events.rewind_to(checkpoint.event_mark);
    }

    /// Writes `position` back, dropping it from the ledger once nothing is left,
    /// and keeps open interest in step.
    pub(super) fn store_position(&mut self, trader: AccountId, position: Position) {
        let before = self
            .positions
            .get(&trader)
            .map(|p| p.quote_size)
            .unwrap_or_default();
        self.open_interest.replace(before, position.quote_size);

        if position.is_empty() {
            self.positions.remove(&trader);
        } else {
            self.positions.insert(trader, position);
        }
    }

    pub(super) fn position_or_new(&self, trader: AccountId) -> Position {
        self.positions
            .get(&trader)
            .cloned()
            .unwrap_or_else(|| Position::new(self.funding.latest_cpf))
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        log::debug!("[event {}] {:?}", self.events.next_id().0, payload);
        self.events.push(self.current_time, payload);
    }
}
