//! Shared two-DEX USDC/WETH market for scenario tests
//!
//! DEX A sells WETH at an effective `ask` (USDC paid per WETH bought), DEX B
//! buys it back at an effective `bid`. Both pools charge a 1% fee and hold
//! 1M WETH, so slippage on a 1000 USDC trade is negligible and the reverse
//! cycle always loses to the fee spread. Gas is priced so a two-hop V2 path
//! costs exactly 5 USDC.

#![allow(dead_code)]

use flash_arbitrage_strategy::config::{CircuitBreakerConfig, ExecutorConfig, ParameterStore, SearchLimits, SearchParameters};
use flash_arbitrage_strategy::events::EventBus;
use flash_arbitrage_strategy::executor::MultiPathArbitrage;
use flash_arbitrage_strategy::ledger::{ExecutionVenue, SimulatedVenue};
use flash_arbitrage_strategy::market::{MarketSnapshot, MarketSource, PoolKey};
use flash_arbitrage_strategy::path_finder::PathFinder;
use flash_arbitrage_strategy::path_validator::PathValidator;
use flash_arbitrage_strategy::quote_manager::QuoteManager;
use flash_arbitrage_strategy::registry::{DexRegistry, PriceFeedRegistry, StaticOracleSource, TokenRegistry};
use std::sync::Arc;
use torq_amm::{DexProtocol, PoolState, V2PoolState};
use types::{AccountAddress, DexAddress, OracleAddress, OraclePrice, TokenAddress, TokenInfo};

pub const BLOCK: u64 = 100;
pub const NOW: u64 = 1_700_000_000;

/// 1000 USDC
pub const TRADE: u128 = 1_000_000_000;
/// 180_000 gas at this price is 0.0016666... WETH = 5.000000 USDC after rounding up
pub const GAS_PRICE_FOR_5_USDC: u128 = 9_259_259_259;
pub const FIVE_USDC: u128 = 5_000_000;
pub const TWO_HOP_GAS: u64 = 2 * torq_amm::protocol::CONSTANT_PRODUCT_SWAP_GAS;
pub const TRADER_USDC: u128 = 100_000_000_000;

const POOL_FEE_BPS: u32 = 100;
const WETH_RESERVE: u128 = 1_000_000 * 1_000_000_000_000_000_000;
const STALE_THRESHOLD: u64 = 3_600;

pub fn usdc() -> TokenAddress {
    TokenAddress::from_low_u64(0x10)
}

pub fn weth() -> TokenAddress {
    TokenAddress::from_low_u64(0x20)
}

pub fn dai() -> TokenAddress {
    TokenAddress::from_low_u64(0x30)
}

pub fn operator() -> AccountAddress {
    AccountAddress::from_low_u64(0xaa)
}

pub fn trader() -> AccountAddress {
    AccountAddress::from_low_u64(0xbb)
}

pub fn stranger() -> AccountAddress {
    AccountAddress::from_low_u64(0xcc)
}

pub fn dex_a() -> DexAddress {
    DexAddress::from_low_u64(0xa1)
}

pub fn dex_b() -> DexAddress {
    DexAddress::from_low_u64(0xb1)
}

pub fn dex_c() -> DexAddress {
    DexAddress::from_low_u64(0xc3)
}

pub fn oracle() -> OracleAddress {
    OracleAddress::from_low_u64(0xf1)
}

/// USDC is token0: reserves are (USDC, WETH)
fn pool(usdc_reserve: u128) -> PoolState {
    PoolState::ConstantProduct(V2PoolState::new(usdc_reserve, WETH_RESERVE, POOL_FEE_BPS))
}

/// Pool where buying WETH costs `ask` USDC each after the fee
pub fn pool_for_ask(ask: u128) -> PoolState {
    pool(ask * 1_000_000_000_000 * 99 / 100)
}

/// Pool where selling WETH returns `bid` USDC each after the fee
pub fn pool_for_bid(bid: u128) -> PoolState {
    pool(bid * 1_000_000_000_000 * 100 / 99)
}

pub struct Fixture {
    pub tokens: Arc<TokenRegistry>,
    pub dexes: Arc<DexRegistry>,
    pub oracle: Arc<StaticOracleSource>,
    pub feeds: Arc<PriceFeedRegistry>,
    pub quotes: Arc<QuoteManager>,
    pub validator: Arc<PathValidator>,
    pub venue: Arc<SimulatedVenue>,
    pub params: Arc<ParameterStore>,
    pub events: EventBus,
}

impl Fixture {
    pub fn new(ask_a: u128, bid_b: u128) -> Self {
        Self::with_oracle_age(ask_a, bid_b, 0)
    }

    /// Oracle answer last updated `age` seconds before the block
    pub fn with_oracle_age(ask_a: u128, bid_b: u128, age: u64) -> Self {
        let events = EventBus::default();
        let tokens = Arc::new(TokenRegistry::new(operator()));
        tokens.register_token(operator(), TokenInfo::new(usdc(), "USDC", 6)).unwrap();
        tokens.register_token(operator(), TokenInfo::new(weth(), "WETH", 18)).unwrap();

        let dexes = Arc::new(DexRegistry::new(operator()).with_events(events.clone()));
        for (dex, name) in [(dex_a(), "DexA"), (dex_b(), "DexB")] {
            dexes
                .register_dex(operator(), dex, name, DexProtocol::ConstantProduct, 10, 0)
                .unwrap();
            dexes.add_supported_pair(operator(), dex, usdc(), weth()).unwrap();
        }

        let oracle_source = Arc::new(StaticOracleSource::new());
        let feeds = Arc::new(PriceFeedRegistry::new(operator(), oracle_source.clone()).with_events(events.clone()));
        feeds
            .register_price_feed(operator(), weth(), usdc(), oracle(), STALE_THRESHOLD)
            .unwrap();
        oracle_source.set_answer(oracle(), OraclePrice::new(300_000_000_000, 8), NOW - age);

        let snapshot = MarketSnapshot::new(BLOCK, NOW)
            .with_pool(dex_a(), usdc(), weth(), pool_for_ask(ask_a))
            .with_pool(dex_b(), usdc(), weth(), pool_for_bid(bid_b));
        let venue = Arc::new(SimulatedVenue::new(snapshot));
        venue.set_balance(trader(), usdc(), TRADER_USDC);

        let quotes = Arc::new(QuoteManager::new(dexes.clone(), tokens.clone(), 0));
        let validator = Arc::new(PathValidator::new(quotes.clone(), feeds.clone(), weth()));
        let params = Arc::new(
            ParameterStore::new(operator(), SearchParameters::default())
                .unwrap()
                .with_events(events.clone()),
        );

        Self {
            tokens,
            dexes,
            oracle: oracle_source,
            feeds,
            quotes,
            validator,
            venue,
            params,
            events,
        }
    }

    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        ExecutionVenue::snapshot(self.venue.as_ref())
    }

    pub fn search_params(&self) -> SearchParameters {
        self.params.current()
    }

    pub fn finder(&self) -> PathFinder {
        self.finder_with(SearchLimits::default(), self.venue.clone())
    }

    pub fn finder_with(&self, limits: SearchLimits, market: Arc<dyn MarketSource>) -> PathFinder {
        PathFinder::new(self.validator.clone(), self.feeds.clone(), market, limits).with_events(self.events.clone())
    }

    pub fn engine(&self) -> MultiPathArbitrage {
        self.engine_on(self.venue.clone(), CircuitBreakerConfig::default())
    }

    pub fn engine_on(&self, venue: Arc<dyn ExecutionVenue>, breaker: CircuitBreakerConfig) -> MultiPathArbitrage {
        MultiPathArbitrage::new(
            operator(),
            trader(),
            ExecutorConfig::default(),
            breaker,
            self.validator.clone(),
            venue,
            self.params.clone(),
        )
        .with_events(self.events.clone())
    }

    /// DEX C lists WETH/DAI at 3000 DAI per WETH and DAI/USDC at
    /// `usdc_per_kilo_dai / 1000` USDC per DAI, both with a 0.3% fee
    ///
    /// Neither pair has an oracle feed. Each `set_pool` mines a block.
    pub fn add_dai_triangle(&self, usdc_per_kilo_dai: u128) {
        self.tokens.register_token(operator(), TokenInfo::new(dai(), "DAI", 18)).unwrap();
        self.dexes
            .register_dex(operator(), dex_c(), "DexC", DexProtocol::ConstantProduct, 10, 0)
            .unwrap();
        self.dexes.add_supported_pair(operator(), dex_c(), weth(), dai()).unwrap();
        self.dexes.add_supported_pair(operator(), dex_c(), dai(), usdc()).unwrap();

        // Reserves follow address order: WETH < DAI and USDC < DAI
        self.venue.set_pool(
            PoolKey::new(dex_c(), weth(), dai()),
            PoolState::ConstantProduct(V2PoolState::new(WETH_RESERVE, 3_000 * WETH_RESERVE, 30)),
        );
        let dai_reserve = 100_000_000 * 1_000_000_000_000_000_000;
        let usdc_reserve = 100_000_000 * usdc_per_kilo_dai * 1_000;
        self.venue.set_pool(
            PoolKey::new(dex_c(), usdc(), dai()),
            PoolState::ConstantProduct(V2PoolState::new(usdc_reserve, dai_reserve, 30)),
        );
    }

    pub fn trader_usdc(&self) -> u128 {
        self.venue.balance(&trader(), &usdc())
    }
}
