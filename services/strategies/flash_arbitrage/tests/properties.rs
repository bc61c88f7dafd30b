//! Properties that must hold for any market state

mod common;

use common::*;
use flash_arbitrage_strategy::error::ArbitrageError;
use flash_arbitrage_strategy::market::MarketSnapshot;
use flash_arbitrage_strategy::quote_manager::PoolOverlay;
use flash_arbitrage_strategy::registry::DexRegistry;
use proptest::prelude::*;
use torq_amm::{DexProtocol, PoolState, V2PoolState};
use types::{DexAddress, TokenAddress};

fn market(usdc_reserve: u128, weth_reserve: u128, fee_bps: u32) -> MarketSnapshot {
    MarketSnapshot::new(BLOCK, NOW).with_pool(
        dex_a(),
        usdc(),
        weth(),
        PoolState::ConstantProduct(V2PoolState::new(usdc_reserve, weth_reserve, fee_bps)),
    )
}

proptest! {
    #[test]
    fn prop_pair_support_is_symmetric(a in 1u64..10_000, b in 1u64..10_000) {
        prop_assume!(a != b);
        let registry = DexRegistry::new(operator());
        let dex = DexAddress::from_low_u64(0xd0);
        registry
            .register_dex(operator(), dex, "Dex", DexProtocol::ConstantProduct, 50, 0)
            .unwrap();
        let (a, b) = (TokenAddress::from_low_u64(a), TokenAddress::from_low_u64(b));
        registry.add_supported_pair(operator(), dex, a, b).unwrap();

        prop_assert!(registry.is_pair_supported(&dex, &a, &b));
        prop_assert!(registry.is_pair_supported(&dex, &b, &a));
    }

    #[test]
    fn prop_quotes_do_not_mutate_the_snapshot(
        usdc_reserve in 1_000_000_000u128..1_000_000_000_000_000,
        weth_reserve in 1_000_000_000_000_000_000u128..1_000_000_000_000_000_000_000_000,
        fee_bps in 0u32..300,
        amount in 1u128..1_000_000_000_000,
    ) {
        let fixture = Fixture::new(3000, 3000);
        let snapshot = market(usdc_reserve, weth_reserve, fee_bps);
        let before = snapshot.clone();

        let first = fixture.quotes.get_dex_quote(&snapshot, &dex_a(), &usdc(), &weth(), amount);
        let second = fixture.quotes.get_dex_quote(&snapshot, &dex_a(), &usdc(), &weth(), amount);
        prop_assert_eq!(first, second);
        prop_assert_eq!(snapshot, before);
    }

    #[test]
    fn prop_round_trip_through_one_pool_never_profits(
        usdc_reserve in 1_000_000_000u128..1_000_000_000_000_000,
        weth_reserve in 1_000_000_000_000_000_000u128..1_000_000_000_000_000_000_000_000,
        fee_bps in 0u32..300,
        amount in 1_000u128..1_000_000_000_000,
    ) {
        let fixture = Fixture::new(3000, 3000);
        let snapshot = market(usdc_reserve, weth_reserve, fee_bps);
        let mut overlay = PoolOverlay::new(&snapshot);

        let Ok(out) = fixture.quotes.quote_in_overlay(&overlay, &dex_a(), &usdc(), &weth(), amount) else {
            return Ok(());
        };
        overlay.stage(&out);
        let Ok(back) = fixture
            .quotes
            .quote_in_overlay(&overlay, &dex_a(), &weth(), &usdc(), out.output_amount)
        else {
            return Ok(());
        };
        prop_assert!(back.output_amount <= amount);
    }

    #[test]
    fn prop_open_paths_are_rejected(middle in proptest::collection::vec(1u64..4, 1..4)) {
        let fixture = Fixture::new(3000, 3020);
        let mut tokens = vec![usdc()];
        tokens.extend(middle.iter().map(|_| weth()));
        let dexes = vec![dex_a(); tokens.len() - 1];

        let validation = fixture.validator.validate_path(
            &fixture.snapshot(),
            &tokens,
            &dexes,
            TRADE,
            GAS_PRICE_FOR_5_USDC,
            &fixture.search_params(),
        );
        prop_assert!(!validation.is_valid);
        prop_assert!(matches!(validation.failure_reason, Some(ArbitrageError::InvalidPath(_))));
    }

    #[test]
    fn prop_found_paths_beat_their_gas(bid in 2_900u128..3_200) {
        let fixture = Fixture::new(3000, bid);
        let report = fixture
            .finder()
            .search(usdc(), None, TRADE, GAS_PRICE_FOR_5_USDC, &fixture.search_params())
            .unwrap();
        for path in &report.paths {
            prop_assert!(path.net_profit() > 0);
            prop_assert_eq!(path.tokens().first(), path.tokens().last());
            prop_assert!(path.total_gas_estimate() <= fixture.search_params().max_gas_per_path);
        }
        if bid <= 3_010 {
            prop_assert!(report.paths.is_empty());
        }
    }
}
