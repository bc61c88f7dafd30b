//! Swap Math Property Tests
//!
//! Properties every pool quote must satisfy regardless of reserves, fees or
//! trade size.

use proptest::prelude::*;
use std::collections::BTreeMap;
use torq_amm::v3_math::V3Math;
use torq_amm::{PoolState, V2Math, V2PoolState, V3PoolState, U256};

const LIQUIDITY: u128 = 1_000_000_000_000_000_000;

fn layered_v3_pool(fee_pips: u32) -> V3PoolState {
    let mut ticks = BTreeMap::new();
    ticks.insert(-6000, (LIQUIDITY / 10) as i128);
    ticks.insert(-60, LIQUIDITY as i128);
    ticks.insert(60, -(LIQUIDITY as i128));
    ticks.insert(6000, -((LIQUIDITY / 10) as i128));
    V3PoolState {
        sqrt_price_x96: U256::one() << 96,
        liquidity: LIQUIDITY + LIQUIDITY / 10,
        current_tick: 0,
        fee_pips,
        tick_spacing: 60,
        ticks,
    }
}

prop_compose! {
    fn v2_pool()
        (
            reserve0 in 1_000u128..1_000_000_000_000_000_000_000u128,
            reserve1 in 1_000u128..1_000_000_000_000_000_000_000u128,
            fee_bps in 0u32..100u32,
        ) -> V2PoolState {
        V2PoolState::new(reserve0, reserve1, fee_bps)
    }
}

proptest! {
    /// Property: A V2 swap can never drain the output reserve
    #[test]
    fn v2_output_below_reserve(
        pool in v2_pool(),
        amount_in in 1u128..1_000_000_000_000_000_000_000_000u128,
        zero_for_one in any::<bool>(),
    ) {
        let (reserve_in, reserve_out) = pool.oriented_reserves(zero_for_one);
        let out = V2Math::calculate_output_amount(amount_in, reserve_in, reserve_out, pool.fee_bps).unwrap();
        prop_assert!(out < reserve_out);
    }

    /// Property: More input never yields less output
    #[test]
    fn v2_output_monotonic(
        pool in v2_pool(),
        amount_in in 1u128..1_000_000_000_000_000_000u128,
        extra in 1u128..1_000_000_000_000u128,
    ) {
        let small = V2Math::calculate_output_amount(amount_in, pool.reserve0, pool.reserve1, pool.fee_bps).unwrap();
        let large = V2Math::calculate_output_amount(amount_in + extra, pool.reserve0, pool.reserve1, pool.fee_bps).unwrap();
        prop_assert!(large >= small);
    }

    /// Property: The constant product never shrinks after a swap
    #[test]
    fn v2_invariant_never_decreases(
        pool in v2_pool(),
        amount_in in 1u128..1_000_000_000_000_000_000u128,
        zero_for_one in any::<bool>(),
    ) {
        let state = PoolState::ConstantProduct(pool.clone());
        let outcome = state.swap_exact_in(amount_in, zero_for_one).unwrap();
        let PoolState::ConstantProduct(post) = outcome.post_state else {
            return Err(TestCaseError::fail("protocol changed during swap"));
        };
        let before = U256::from(pool.reserve0) * U256::from(pool.reserve1);
        let after = U256::from(post.reserve0) * U256::from(post.reserve1);
        prop_assert!(after >= before);
        prop_assert!(outcome.price_impact_bps <= 10_000);
    }

    /// Property: Walking the tick map never pays more than pretending the
    /// current range extends forever
    #[test]
    fn v3_tick_crossing_never_beats_single_range(
        amount_in in 1_000_000u128..40_000_000_000_000_000u128,
        zero_for_one in any::<bool>(),
        fee_pips in prop::sample::select(vec![100u32, 500, 3000, 10000]),
    ) {
        let pool = layered_v3_pool(fee_pips);
        let crossing = V3Math::calculate_output_amount(amount_in, &pool, zero_for_one);
        let naive = V3Math::swap_within_range(amount_in, &pool, zero_for_one).unwrap();
        if let Ok(crossing) = crossing {
            prop_assert!(crossing.amount_out <= naive.amount_out + 1);
            if crossing.ticks_crossed == 0 {
                prop_assert_eq!(crossing.amount_out, naive.amount_out);
            }
        }
    }

    /// Property: Quotes are a pure function of the snapshot
    #[test]
    fn v3_quote_idempotent(
        amount_in in 1_000u128..10_000_000_000_000_000u128,
        zero_for_one in any::<bool>(),
    ) {
        let pool = PoolState::ConcentratedLiquidity(layered_v3_pool(3000));
        let first = pool.swap_exact_in(amount_in, zero_for_one);
        let second = pool.swap_exact_in(amount_in, zero_for_one);
        prop_assert_eq!(first, second);
    }
}
