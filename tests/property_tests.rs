//! Property-based tests for the ledger and health math.
//!
//! These tests verify invariants hold under random inputs.

use perps_margin::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const GOV: AccountId = AccountId(1);
const ROUTER: AccountId = AccountId(2);
const TRADER: AccountId = AccountId(10);

type Sim = Margin<MockAmm, MockPriceOracle>;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1_000i64..5_000i64).prop_map(Decimal::from) // 1,000 to 5,000 quote per base
}

fn quote_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 10,000 quote
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn premium_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=100i64).prop_map(|x| Decimal::new(x, 7)) // 0.0000001 to 0.00001 per second
}

fn engine_at(price: Decimal) -> Sim {
    let price = Price::new_unchecked(price);
    let mut settings = MarginSettings::default();
    settings.risk.beta = Decimal::ZERO;

    let mut margin = Margin::new(
        GOV,
        MockAmm::new(price, dec!(1_000_000)),
        MockPriceOracle::new(price),
        settings,
        Timestamp::from_secs(0),
    )
    .unwrap();
    margin.register_router(GOV, ROUTER).unwrap();
    margin
}

fn fund(margin: &mut Sim, amount: Decimal) {
    margin.vault_mut().mint(TRADER, amount).unwrap();
    margin.vault_mut().transfer_in(TRADER, amount).unwrap();
    margin.add_margin(TRADER, amount).unwrap();
}

// ten times the notional, comfortably above any initial margin
fn ample_margin(quote: Decimal, price: Decimal) -> Decimal {
    (quote / price * dec!(10)).round_dp(18) + Decimal::ONE
}

proptest! {
    /// tradeSize is zero exactly when quoteSize is, whatever the trades
    #[test]
    fn trade_size_tracks_quote_size(
        price in price_strategy(),
        trades in proptest::collection::vec((side_strategy(), quote_strategy()), 1..12),
    ) {
        let mut m = engine_at(price);
        fund(&mut m, dec!(1_000));

        for (side, quote) in trades {
            // failures are fine, they must leave the invariant intact too
            let _ = m.open_position(TRADER, TRADER, side, quote);
            let view = m.trader_position(TRADER);
            prop_assert_eq!(view.trade_size.is_zero(), view.quote_size.is_zero());
            prop_assert!(view.trade_size >= Decimal::ZERO);
        }
    }

    /// Closing the whole quote size always lands flat
    #[test]
    fn full_close_is_flat(
        price in price_strategy(),
        side in side_strategy(),
        quote in quote_strategy(),
    ) {
        let mut m = engine_at(price);
        fund(&mut m, ample_margin(quote, price));
        m.open_position(TRADER, TRADER, side, quote).unwrap();

        let open = m.trader_position(TRADER).quote_size.abs();
        let closed = m.close_position(TRADER, TRADER, open).unwrap();
        prop_assert!(closed.position.quote_size.is_zero());
        prop_assert!(closed.position.trade_size.is_zero());
    }

    /// Closing k leaves the same sign and |quoteSize| - k
    #[test]
    fn partial_close_shrinks_by_k(
        price in price_strategy(),
        side in side_strategy(),
        quote in quote_strategy(),
        fraction in 1u32..100u32,
    ) {
        let mut m = engine_at(price);
        fund(&mut m, ample_margin(quote, price));
        m.open_position(TRADER, TRADER, side, quote).unwrap();

        let before = m.trader_position(TRADER).quote_size;
        let k = (quote * Decimal::from(fraction) / dec!(100)).round_dp(2);
        prop_assume!(k > Decimal::ZERO && k < quote);

        m.close_position(TRADER, TRADER, k).unwrap();
        let after = m.trader_position(TRADER).quote_size;
        prop_assert_eq!(after.is_sign_negative(), before.is_sign_negative());
        prop_assert_eq!(after.abs(), before.abs() - k);
    }

    /// Reversing with exactly the open quote returns to zero
    #[test]
    fn exact_reverse_is_flat(
        price in price_strategy(),
        side in side_strategy(),
        quote in quote_strategy(),
    ) {
        let mut m = engine_at(price);
        fund(&mut m, ample_margin(quote, price));
        m.open_position(TRADER, TRADER, side, quote).unwrap();
        m.open_position(TRADER, TRADER, side.opposite(), quote).unwrap();

        let view = m.trader_position(TRADER);
        prop_assert!(view.quote_size.is_zero());
        prop_assert!(view.trade_size.is_zero());
    }

    /// Paying funding never raises withdrawable, receiving never lowers it
    #[test]
    fn withdrawable_monotone_under_funding(
        price in price_strategy(),
        side in side_strategy(),
        quote in quote_strategy(),
        premium in premium_strategy(),
        steps in proptest::collection::vec(1i64..3_600_000i64, 1..6),
    ) {
        let mut m = engine_at(price);
        fund(&mut m, ample_margin(quote, price));
        m.open_position(TRADER, TRADER, side, quote).unwrap();

        // positive premium: longs pay
        m.oracle_mut().set_premium_fraction(premium);
        let mut before = m.get_withdrawable(TRADER).unwrap();
        for millis in steps {
            m.advance_time(millis);
            let now = m.get_withdrawable(TRADER).unwrap();
            match side {
                Side::Long => prop_assert!(now <= before),
                Side::Short => prop_assert!(now >= before),
            }
            before = now;
        }
    }

    /// Liquidation always resets the position, bonus or not
    #[test]
    fn liquidation_resets_position(
        price in price_strategy(),
        quote in quote_strategy(),
        pool_follows in any::<bool>(),
    ) {
        let mut m = engine_at(price);
        // a tenth of the notional, just above initial margin
        fund(&mut m, (quote / price / dec!(10)).round_dp(18));
        m.open_position(TRADER, TRADER, Side::Short, quote).unwrap();

        let shocked = Price::new_unchecked(price * dec!(1.2));
        m.oracle_mut().set_index_price(shocked);
        if pool_follows {
            m.amm_mut().set_price(shocked);
        }

        prop_assert!(m.can_liquidate(TRADER).unwrap());
        let result = m.liquidate(ROUTER, TRADER, GOV).unwrap();

        prop_assert_eq!(m.trader_position(TRADER), PositionView::default());
        prop_assert!(result.bonus >= Decimal::ZERO);
        prop_assert!(result.bonus.is_zero() || result.bad_debt.is_zero());
        prop_assert!(m.reserve() >= Decimal::ZERO);
    }

    /// Bonus plus insurance is the remainder, and the bonus never beats its fee share
    #[test]
    fn split_accounts_for_remainder(
        remain in (-1_000_000i64..1_000_000i64).prop_map(|x| Decimal::new(x, 6)),
        reserve in (0i64..1_000_000i64).prop_map(|x| Decimal::new(x, 6)),
    ) {
        let split = split_remainder(remain, dec!(0.02), reserve, 18);
        if remain > Decimal::ZERO {
            prop_assert_eq!(split.bonus + split.insurance_contribution, remain);
            prop_assert!(split.bonus <= remain * dec!(0.02));
            prop_assert!(split.bonus <= reserve);
            prop_assert!(split.insurance_contribution >= Decimal::ZERO);
            prop_assert!(split.bad_debt.is_zero());
        } else {
            prop_assert!(split.bonus.is_zero());
            prop_assert_eq!(split.bad_debt, -remain);
        }
    }

    /// Boost never leaves [-max, max]
    #[test]
    fn boost_bounded(
        premium in (-100i64..=100i64).prop_map(|x| Decimal::new(x, 6)),
        long_quote in (0i64..1_000_000i64).prop_map(Decimal::from),
        short_quote in (0i64..1_000_000i64).prop_map(Decimal::from),
    ) {
        let oi = OpenInterest { long_quote, short_quote };
        let b = boost(premium, &oi, dec!(10));
        prop_assert!(b >= dec!(-10) && b <= dec!(10));
        if premium.is_zero() {
            prop_assert!(b.is_zero());
        }
    }

    /// Depth makes longs owe more and shorts hold less
    #[test]
    fn beta_marks_harder(
        quote in quote_strategy(),
        beta in (0i64..=100i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let reserves = Reserves { base: dec!(1_000), quote: dec!(2_000_000) };
        let long = QuoteSize::from_side(Side::Long, quote);
        let short = QuoteSize::from_side(Side::Short, quote);

        let long_flat = position_value(long, &reserves, Decimal::ZERO, 18).unwrap();
        let long_deep = position_value(long, &reserves, beta, 18).unwrap();
        let short_flat = position_value(short, &reserves, Decimal::ZERO, 18).unwrap();
        let short_deep = position_value(short, &reserves, beta, 18).unwrap();

        prop_assert!(long_deep >= long_flat);
        prop_assert!(short_deep <= short_flat);
    }
}

#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn pool_too_shallow_is_unvaluable() {
        let reserves = Reserves { base: dec!(1), quote: dec!(2000) };
        let long = QuoteSize::from_side(Side::Long, dec!(2000));
        assert_eq!(position_value(long, &reserves, Decimal::ONE, 18), None);
    }

    #[test]
    fn funding_accumulation_over_time() {
        let mut m = engine_at(dec!(2000));
        fund(&mut m, dec!(1));
        m.open_position(TRADER, TRADER, Side::Long, dec!(2000)).unwrap();
        m.oracle_mut().set_premium_fraction(dec!(0.000001));

        // lazy settlement: many small updates add up to one big one
        for _ in 0..10 {
            m.advance_time(1_000);
            m.update_cpf().unwrap();
        }
        assert_eq!(m.latest_cpf(), dec!(0.0001));
        assert_eq!(m.cal_funding_fee(TRADER).unwrap(), dec!(-0.0001));
    }
}
