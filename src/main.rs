//! Margin engine simulation.
//!
//! Walks one pair through its lifecycle: deposits, leveraged opens, funding
//! accrual, a price shock and the liquidation that follows, plus a keeper
//! executing a signed limit order. Set `MARGIN_CONFIG` to load settings from a
//! toml file and `RUST_LOG=debug` to see every event.

use perps_margin::*;
use rust_decimal_macros::dec;
use std::error::Error;

const GOVERNOR: AccountId = AccountId(1);
const ROUTER: AccountId = AccountId(2);
const KEEPER: AccountId = AccountId(3);

type Sim = Margin<MockAmm, MockPriceOracle>;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("Perpetual Margin Engine Simulation");
    println!("Single Pair, Base Collateral, Virtual AMM\n");

    scenario_1_leveraged_long()?;
    scenario_2_funding_accrual()?;
    scenario_3_price_shock_liquidation()?;
    scenario_4_keeper_limit_order()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn setup(price: rust_decimal::Decimal) -> Result<(Sim, Router), Box<dyn Error>> {
    let settings = MarginSettings::from_env_or(Environment::Development)?;
    let price = Price::new(price).ok_or("price must be positive")?;

    let mut margin = Margin::new(
        GOVERNOR,
        MockAmm::new(price, dec!(1000)),
        MockPriceOracle::new(price),
        settings,
        Timestamp::now(),
    )?;
    margin.register_router(GOVERNOR, ROUTER)?;

    let router = Router::new(ROUTER).with_beneficiary(KEEPER);
    Ok((margin, router))
}

fn deadline(margin: &Sim) -> Timestamp {
    margin.time().plus_millis(60_000)
}

/// Deposit through the router and open a long against the pool.
fn scenario_1_leveraged_long() -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Leveraged Long\n");

    let (mut margin, router) = setup(dec!(2000))?;
    let alice = AccountId(10);
    margin.vault_mut().mint(alice, dec!(5))?;

    let expires = deadline(&margin);
    router.deposit(&mut margin, alice, dec!(1), expires)?;
    println!("  Alice deposits 1 base, reserve now {}", margin.reserve());

    let open = router.open_position_with_margin(
        &mut margin,
        alice,
        Side::Long,
        dec!(10000),
        dec!(4.9),
        expires,
    )?;
    println!("  Alice longs 10,000 quote, receives {} base", open.base_amount);

    let view = margin.trader_position(alice);
    println!(
        "  Position: quote {}, base {}, trade {}",
        view.quote_size, view.base_size, view.trade_size
    );
    println!("  Margin ratio: {:?}", margin.margin_ratio(alice)?);
    println!("  Withdrawable: {}", margin.get_withdrawable(alice)?);
    println!("  Max leverage at current risk config: {}x\n", margin.risk_config().max_leverage());
    Ok(())
}

/// Longs pay shorts while the premium is positive.
fn scenario_2_funding_accrual() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Funding Accrual\n");

    let (mut margin, router) = setup(dec!(2000))?;
    let bob = AccountId(11);
    let carol = AccountId(12);
    for trader in [bob, carol] {
        margin.vault_mut().mint(trader, dec!(5))?;
    }

    let expires = deadline(&margin);
    router.open_position_with_wallet(&mut margin, bob, Side::Long, dec!(1), dec!(4000), dec!(1.9), expires)?;
    router.open_position_with_wallet(&mut margin, carol, Side::Short, dec!(1), dec!(2000), dec!(1.1), expires)?;
    println!("  Bob longs 4,000 quote, Carol shorts 2,000 quote");

    margin.oracle_mut().set_premium_fraction(dec!(0.000001));
    margin.advance_time(3_600_000);

    println!("  One hour at premium 0.000001/s");
    println!("  Pending fee Bob: {}", margin.cal_funding_fee(bob)?);
    println!("  Pending fee Carol: {}", margin.cal_funding_fee(carol)?);

    let update = margin.update_cpf()?;
    println!("  cpf settled at {} (boost {})", update.latest_cpf, update.boost);

    // the clock moved an hour, so the old deadline has passed
    let expires = deadline(&margin);
    let closed = router.close_position(&mut margin, bob, dec!(4000), true, expires)?;
    println!(
        "  Bob closes, realized pnl {}, {} base sent back to wallet",
        closed.close.realized_pnl, closed.withdrawn
    );
    println!("  Bob's wallet: {}\n", margin.vault().balance_of(bob));
    Ok(())
}

/// A short is squeezed by the oracle and liquidated by the router.
fn scenario_3_price_shock_liquidation() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Price Shock and Liquidation\n");

    let (mut margin, router) = setup(dec!(2000))?;
    let dave = AccountId(13);
    let treasury = AccountId(14);
    margin.vault_mut().mint(dave, dec!(1))?;
    margin.vault_mut().mint(treasury, dec!(2))?;
    margin.fund_insurance(treasury, dec!(0.5))?;
    println!("  Insurance fund seeded with {}", margin.insurance_fund().balance);

    let expires = deadline(&margin);
    router.open_position_with_wallet(&mut margin, dave, Side::Short, dec!(0.2), dec!(2000), dec!(1.01), expires)?;
    println!("  Dave shorts 2,000 quote on 0.2 base margin");

    for shock in [dec!(2100), dec!(2300), dec!(2500)] {
        let price = Price::new(shock).ok_or("price must be positive")?;
        margin.oracle_mut().set_index_price(price);
        margin.amm_mut().set_price(price);
        let liquidatable = margin.can_liquidate(dave)?;
        println!("  Price {} -> liquidatable: {}", shock, liquidatable);
        if liquidatable {
            break;
        }
    }

    let result = router.liquidate(&mut margin, dave, expires)?;
    println!("  Liquidated at margin ratio {}", result.margin_ratio);
    println!(
        "  Bonus {}, insurance {}, bad debt {}",
        result.bonus, result.insurance_contribution, result.bad_debt
    );
    println!("  Beneficiary wallet: {}", margin.vault().balance_of(KEEPER));
    println!("  Uncovered bad debt: {}\n", margin.bad_debt());
    Ok(())
}

/// A keeper fills a signed open order, then the matching close.
fn scenario_4_keeper_limit_order() -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Keeper Limit Orders\n");

    let (mut margin, router) = setup(dec!(2000))?;
    let erin = AccountId(15);
    margin.vault_mut().mint(erin, dec!(3))?;
    let mut book = OrderBook::new(GOVERNOR, router);

    let open = OpenOrder {
        router_to_execute: ROUTER,
        trader: erin,
        side: Side::Long,
        base_amount: dec!(1),
        quote_amount: dec!(3000),
        limit_price: dec!(2050),
        deadline: deadline(&margin),
        with_wallet: true,
        nonce: 1,
    };
    let filled = book.execute_open(&mut margin, &open, erin)?;
    println!("  Open long filled: {} base for 3,000 quote", filled.base_amount);

    let close = CloseOrder {
        router_to_execute: ROUTER,
        trader: erin,
        side: Side::Long,
        quote_amount: dec!(3000),
        limit_price: dec!(2100),
        deadline: deadline(&margin),
        auto_withdraw: true,
        nonce: 2,
    };
    match book.execute_close(&mut margin, &close, erin) {
        Ok(_) => println!("  Take-profit filled early"),
        Err(err) => println!("  Take-profit waits: {}", err),
    }

    let price = Price::new(dec!(2150)).ok_or("price must be positive")?;
    margin.amm_mut().set_price(price);
    margin.oracle_mut().set_index_price(price);
    let closed = book.execute_close(&mut margin, &close, erin)?;
    println!(
        "  Price 2150: take-profit filled, pnl {}, withdrawn {}",
        closed.close.realized_pnl, closed.withdrawn
    );
    println!("  Erin's wallet: {}", margin.vault().balance_of(erin));
    println!("  Events recorded: {}", margin.events().count());
    Ok(())
}
