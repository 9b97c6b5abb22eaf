//! Router and keeper order book against a live margin engine.

use perps_margin::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const GOV: AccountId = AccountId(1);
const ROUTER: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(3);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);

type Sim = Margin<MockAmm, MockPriceOracle>;

fn engine() -> Sim {
    let price = Price::new_unchecked(dec!(2000));
    let mut settings = MarginSettings::default();
    settings.risk.beta = Decimal::ZERO;
    settings.risk.liquidate_fee_ratio = dec!(0.2);

    let mut margin = Margin::new(
        GOV,
        MockAmm::new(price, dec!(1000)),
        MockPriceOracle::new(price),
        settings,
        Timestamp::from_secs(1_000),
    )
    .unwrap();
    margin.register_router(GOV, ROUTER).unwrap();
    margin.vault_mut().mint(ALICE, dec!(5)).unwrap();
    margin.vault_mut().mint(BOB, dec!(5)).unwrap();
    margin
}

fn router() -> Router {
    Router::new(ROUTER).with_beneficiary(KEEPER)
}

fn later() -> Timestamp {
    Timestamp::from_secs(2_000)
}

fn open_order(trader: AccountId, side: Side, nonce: u64) -> OpenOrder {
    OpenOrder {
        router_to_execute: ROUTER,
        trader,
        side,
        base_amount: dec!(1),
        quote_amount: dec!(2000),
        limit_price: match side {
            Side::Long => dec!(2100),
            Side::Short => dec!(1900),
        },
        deadline: later(),
        with_wallet: true,
        nonce,
    }
}

fn close_order(trader: AccountId, side: Side, nonce: u64) -> CloseOrder {
    CloseOrder {
        router_to_execute: ROUTER,
        trader,
        side,
        quote_amount: dec!(2000),
        limit_price: match side {
            Side::Long => dec!(1900),
            Side::Short => dec!(2100),
        },
        deadline: later(),
        auto_withdraw: false,
        nonce,
    }
}

#[test]
fn deposit_and_withdraw_through_router() {
    let mut m = engine();
    let r = router();

    r.deposit(&mut m, ALICE, dec!(2), later()).unwrap();
    assert_eq!(m.vault().balance_of(ALICE), dec!(3));
    assert_eq!(m.trader_position(ALICE).base_size, dec!(2));

    r.withdraw(&mut m, ALICE, dec!(0.5), later()).unwrap();
    assert_eq!(m.vault().balance_of(ALICE), dec!(3.5));
    assert_eq!(m.reserve(), dec!(1.5));
}

#[test]
fn expired_intent_changes_nothing() {
    let mut m = engine();
    let r = router();
    m.set_time(Timestamp::from_secs(2_001));

    let err = r.deposit(&mut m, ALICE, dec!(1), later()).unwrap_err();
    assert!(matches!(err, RouterError::Expired { .. }));
    assert_eq!(m.vault().balance_of(ALICE), dec!(5));
    assert_eq!(m.reserve(), Decimal::ZERO);
}

#[test]
fn deposit_beyond_wallet_fails() {
    let mut m = engine();
    let err = router().deposit(&mut m, ALICE, dec!(6), later()).unwrap_err();
    assert!(matches!(
        err,
        RouterError::Custody(CustodyError::InsufficientBalance { .. })
    ));
}

#[test]
fn unregistered_router_is_forbidden() {
    let mut m = engine();
    let stranger = Router::new(AccountId(77));
    stranger.deposit(&mut m, ALICE, dec!(1), later()).unwrap();

    let err = stranger
        .open_position_with_margin(&mut m, ALICE, Side::Long, dec!(2000), Decimal::ZERO, later())
        .unwrap_err();
    assert_eq!(
        err,
        RouterError::Margin(MarginError::Forbidden { caller: AccountId(77) })
    );
}

#[test]
fn wallet_open_then_close_with_auto_withdraw() {
    let mut m = engine();
    let r = router();

    let opened = r
        .open_position_with_wallet(&mut m, ALICE, Side::Long, dec!(1), dec!(2000), dec!(1), later())
        .unwrap();
    assert_eq!(opened.base_amount, dec!(1));
    assert_eq!(m.vault().balance_of(ALICE), dec!(4));

    // partial close keeps the margin in the engine
    let partial = r.close_position(&mut m, ALICE, dec!(1000), true, later()).unwrap();
    assert_eq!(partial.withdrawn, Decimal::ZERO);
    assert_eq!(m.trader_position(ALICE).quote_size, dec!(-1000));

    let closed = r.close_position(&mut m, ALICE, dec!(1000), true, later()).unwrap();
    assert_eq!(closed.withdrawn, dec!(1));
    assert_eq!(m.vault().balance_of(ALICE), dec!(5));
    assert!(m.position(ALICE).is_none());
    assert_eq!(m.reserve(), Decimal::ZERO);
}

#[test]
fn router_liquidation_pays_beneficiary() {
    let mut m = engine();
    let r = router();
    r.open_position_with_wallet(&mut m, ALICE, Side::Short, dec!(0.0909), dec!(2000), dec!(1), later())
        .unwrap();

    m.amm_mut().set_price(Price::new_unchecked(dec!(2100)));
    m.oracle_mut().set_index_price(Price::new_unchecked(dec!(2100)));

    let result = r.liquidate(&mut m, ALICE, later()).unwrap();
    assert_eq!(result.beneficiary, KEEPER);
    assert_eq!(result.bonus, dec!(0.008656190476190476));
    assert_eq!(m.vault().balance_of(KEEPER), result.bonus);

    let liquidated = m.events().any(|e| {
        matches!(&e.payload, EventPayload::Liquidated(l) if l.liquidator == ROUTER && l.trader == ALICE)
    });
    assert!(liquidated);
}

#[test]
fn keeper_executes_open_and_close() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());

    let opened = book
        .execute_open(&mut m, &open_order(ALICE, Side::Long, 1), ALICE)
        .unwrap();
    assert_eq!(opened.side, Side::Long);
    assert_eq!(m.trader_position(ALICE).quote_size, dec!(-2000));
    assert_eq!(m.vault().balance_of(ALICE), dec!(4));

    let err = book
        .execute_close(&mut m, &close_order(ALICE, Side::Short, 2), ALICE)
        .unwrap_err();
    assert_eq!(err, KeeperError::SideNotMatch { requested: Side::Short });

    let mut close = close_order(ALICE, Side::Long, 2);
    close.auto_withdraw = true;
    let closed = book.execute_close(&mut m, &close, ALICE).unwrap();
    assert_eq!(closed.close.position.quote_size, Decimal::ZERO);
    assert_eq!(closed.withdrawn, dec!(1));
    assert!(book.is_nonce_used(ALICE, 2));
}

#[test]
fn keeper_margin_funded_open() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());
    book.router().deposit(&mut m, BOB, dec!(1), later()).unwrap();

    let mut order = open_order(BOB, Side::Short, 7);
    order.with_wallet = false;
    book.execute_open(&mut m, &order, BOB).unwrap();

    assert_eq!(m.vault().balance_of(BOB), dec!(4));
    assert_eq!(m.trader_position(BOB).quote_size, dec!(2000));
}

#[test]
fn keeper_limit_price_per_side() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());

    let mut long = open_order(ALICE, Side::Long, 1);
    long.limit_price = dec!(1999);
    assert!(matches!(
        book.execute_open(&mut m, &long, ALICE),
        Err(KeeperError::PriceLimit { .. })
    ));

    let mut short = open_order(BOB, Side::Short, 1);
    short.limit_price = dec!(2001);
    assert!(matches!(
        book.execute_open(&mut m, &short, BOB),
        Err(KeeperError::PriceLimit { .. })
    ));

    assert!(m.position(ALICE).is_none());
    assert!(m.position(BOB).is_none());
}

#[test]
fn nonces_are_per_trader() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());

    book.execute_open(&mut m, &open_order(ALICE, Side::Long, 1), ALICE).unwrap();
    book.execute_open(&mut m, &open_order(BOB, Side::Long, 1), BOB).unwrap();
    assert_eq!(
        book.execute_open(&mut m, &open_order(ALICE, Side::Long, 1), ALICE),
        Err(KeeperError::NonceUsed { trader: ALICE, nonce: 1 })
    );
}

#[test]
fn non_atomic_batch_reports_each_order() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());

    let orders = vec![
        Signed::new(open_order(ALICE, Side::Long, 1), ALICE),
        Signed::new(open_order(BOB, Side::Long, 1), ALICE),
    ];
    let results = book.batch_execute_open(&mut m, &orders, false).unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(KeeperError::NotSigner { .. })));
    assert!(m.position(ALICE).is_some());
    assert!(m.position(BOB).is_none());
}

#[test]
fn atomic_batch_undoes_everything_on_failure() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());

    let orders = vec![
        Signed::new(open_order(ALICE, Side::Long, 1), ALICE),
        Signed::new(open_order(BOB, Side::Long, 1), ALICE),
    ];
    let err = book.batch_execute_open(&mut m, &orders, true).unwrap_err();

    assert!(matches!(err, KeeperError::NotSigner { .. }));
    assert!(m.position(ALICE).is_none());
    assert_eq!(m.vault().balance_of(ALICE), dec!(5));
    assert!(!book.is_nonce_used(ALICE, 1));

    // the same orders, correctly signed, go through together
    let orders = vec![
        Signed::new(open_order(ALICE, Side::Long, 1), ALICE),
        Signed::new(open_order(BOB, Side::Long, 1), BOB),
    ];
    let results = book.batch_execute_open(&mut m, &orders, true).unwrap();
    assert!(results.iter().all(Result::is_ok));
}

#[test]
fn batch_close_respects_require_success() {
    let mut m = engine();
    let mut book = OrderBook::new(GOV, router());
    book.execute_open(&mut m, &open_order(ALICE, Side::Long, 1), ALICE).unwrap();

    let closes = vec![
        Signed::new(close_order(ALICE, Side::Long, 2), ALICE),
        Signed::new(close_order(BOB, Side::Long, 2), BOB),
    ];
    assert!(book.batch_execute_close(&mut m, &closes, true).is_err());
    assert_eq!(m.trader_position(ALICE).quote_size, dec!(-2000));

    let results = book.batch_execute_close(&mut m, &closes, false).unwrap();
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(KeeperError::SideNotMatch { .. })));
    assert_eq!(m.trader_position(ALICE).quote_size, Decimal::ZERO);
}
