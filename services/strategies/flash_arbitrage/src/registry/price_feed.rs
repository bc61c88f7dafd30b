//! Price feed registry
//!
//! Feeds are keyed by ordered `(base, quote)`: a WETH/USDC feed answers
//! "USDC per WETH" and is never silently read as USDC/WETH. Callers that
//! accept either orientation use [`PriceFeedRegistry::get_oriented_price`],
//! which inverts explicitly.

use super::Authority;
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::events::{emit, ArbitrageEvent, EventBus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use types::{AccountAddress, OracleAddress, OraclePrice, TokenAddress, NORMALIZED_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedEntry {
    pub base: TokenAddress,
    pub quote: TokenAddress,
    pub oracle: OracleAddress,
    pub stale_threshold_secs: u64,
}

/// Latest round reported by an oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAnswer {
    pub price: OraclePrice,
    pub updated_at: u64,
}

/// A fresh price with the time it was last updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceReading {
    pub price: OraclePrice,
    pub updated_at: u64,
}

/// Where oracle answers come from
pub trait OracleSource: Send + Sync {
    fn latest_answer(&self, oracle: &OracleAddress) -> Option<OracleAnswer>;
}

/// In-memory oracle answers, set by the loader or by tests
#[derive(Debug, Default)]
pub struct StaticOracleSource {
    answers: RwLock<HashMap<OracleAddress, OracleAnswer>>,
}

impl StaticOracleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_answer(&self, oracle: OracleAddress, price: OraclePrice, updated_at: u64) {
        self.answers
            .write()
            .insert(oracle, OracleAnswer { price, updated_at });
    }
}

impl OracleSource for StaticOracleSource {
    fn latest_answer(&self, oracle: &OracleAddress) -> Option<OracleAnswer> {
        self.answers.read().get(oracle).copied()
    }
}

pub struct PriceFeedRegistry {
    authority: Authority,
    feeds: RwLock<HashMap<(TokenAddress, TokenAddress), PriceFeedEntry>>,
    source: Arc<dyn OracleSource>,
    events: Option<EventBus>,
}

impl PriceFeedRegistry {
    pub fn new(owner: AccountAddress, source: Arc<dyn OracleSource>) -> Self {
        Self {
            authority: Authority::new(owner),
            feeds: RwLock::new(HashMap::new()),
            source,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Register the feed for `base/quote`, replacing any previous oracle
    pub fn register_price_feed(
        &self,
        caller: AccountAddress,
        base: TokenAddress,
        quote: TokenAddress,
        oracle: OracleAddress,
        stale_threshold_secs: u64,
    ) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        if base == quote {
            return Err(ArbitrageError::InvalidConfig(
                "a price feed needs two distinct tokens".to_string(),
            ));
        }
        let entry = PriceFeedEntry {
            base,
            quote,
            oracle,
            stale_threshold_secs,
        };
        if let Some(previous) = self.feeds.write().insert((base, quote), entry) {
            info!(%base, %quote, old = %previous.oracle, new = %oracle, "Price feed replaced");
        } else {
            info!(%base, %quote, %oracle, stale_threshold_secs, "Price feed registered");
        }
        emit(
            &self.events,
            ArbitrageEvent::PriceFeedRegistered {
                base,
                quote,
                oracle,
                stale_threshold_secs,
            },
        );
        Ok(())
    }

    /// Direction-aware: only a `base/quote` feed counts
    pub fn has_price_feed(&self, base: &TokenAddress, quote: &TokenAddress) -> bool {
        self.feeds.read().contains_key(&(*base, *quote))
    }

    pub fn feed(&self, base: &TokenAddress, quote: &TokenAddress) -> Option<PriceFeedEntry> {
        self.feeds.read().get(&(*base, *quote)).cloned()
    }

    /// Quote units per one base unit, rejected once older than the threshold
    pub fn get_price(&self, base: TokenAddress, quote: TokenAddress, now: u64) -> ArbitrageResult<PriceReading> {
        let entry = self
            .feed(&base, &quote)
            .ok_or(ArbitrageError::NoPriceFeed { base, quote })?;
        let answer = self
            .source
            .latest_answer(&entry.oracle)
            .ok_or(ArbitrageError::NoPriceFeed { base, quote })?;

        let age_secs = now.saturating_sub(answer.updated_at);
        if age_secs > entry.stale_threshold_secs {
            debug!(%base, %quote, age_secs, threshold = entry.stale_threshold_secs, "Stale oracle answer");
            return Err(ArbitrageError::StalePrice {
                base,
                quote,
                age_secs,
                threshold_secs: entry.stale_threshold_secs,
            });
        }
        if answer.price.is_zero() {
            return Err(ArbitrageError::NoPriceFeed { base, quote });
        }
        Ok(PriceReading {
            price: answer.price,
            updated_at: answer.updated_at,
        })
    }

    /// `price(base/quote)` from the direct feed or the inverted reverse feed
    ///
    /// Inverted prices are expressed with 18 decimals.
    pub fn get_oriented_price(&self, base: TokenAddress, quote: TokenAddress, now: u64) -> ArbitrageResult<PriceReading> {
        if self.has_price_feed(&base, &quote) {
            return self.get_price(base, quote, now);
        }
        if self.has_price_feed(&quote, &base) {
            let reverse = self.get_price(quote, base, now)?;
            return Ok(PriceReading {
                price: reverse.price.invert(NORMALIZED_DECIMALS)?,
                updated_at: reverse.updated_at,
            });
        }
        Err(ArbitrageError::NoPriceFeed { base, quote })
    }

    /// `price(a/c) = price(a/b) * price(b/c)`
    ///
    /// Both legs are oriented first, so the composition is always a product of
    /// consistently oriented ratios. The result is as fresh as its older leg.
    pub fn get_cross_price(
        &self,
        a: TokenAddress,
        b: TokenAddress,
        c: TokenAddress,
        now: u64,
    ) -> ArbitrageResult<PriceReading> {
        let first = self.get_oriented_price(a, b, now)?;
        let second = self.get_oriented_price(b, c, now)?;
        Ok(PriceReading {
            price: first.price.compose(second.price)?,
            updated_at: first.updated_at.min(second.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn owner() -> AccountAddress {
        AccountAddress::from_low_u64(1)
    }

    fn setup() -> (PriceFeedRegistry, Arc<StaticOracleSource>) {
        let source = Arc::new(StaticOracleSource::new());
        let registry = PriceFeedRegistry::new(owner(), source.clone());
        (registry, source)
    }

    const WETH: u64 = 2;
    const USDC: u64 = 3;
    const DAI: u64 = 4;

    fn token(n: u64) -> TokenAddress {
        TokenAddress::from_low_u64(n)
    }

    #[test]
    fn test_fresh_price_is_returned_with_decimals() {
        let (registry, source) = setup();
        let oracle = OracleAddress::from_low_u64(50);
        registry.register_price_feed(owner(), token(WETH), token(USDC), oracle, 3600).unwrap();
        source.set_answer(oracle, OraclePrice::new(3_000_00000000, 8), 1_000);

        let reading = registry.get_price(token(WETH), token(USDC), 1_000 + 3600).unwrap();
        assert_eq!(reading.price.decimals, 8);
        assert_eq!(reading.updated_at, 1_000);
        assert!(registry.has_price_feed(&token(WETH), &token(USDC)));
        assert!(!registry.has_price_feed(&token(USDC), &token(WETH)));
    }

    #[test]
    fn test_stale_price_is_rejected() {
        let (registry, source) = setup();
        let oracle = OracleAddress::from_low_u64(50);
        registry.register_price_feed(owner(), token(WETH), token(USDC), oracle, 60).unwrap();
        source.set_answer(oracle, OraclePrice::new(3_000_00000000, 8), 1_000);

        let err = registry.get_price(token(WETH), token(USDC), 1_061).unwrap_err();
        assert_eq!(
            err,
            ArbitrageError::StalePrice {
                base: token(WETH),
                quote: token(USDC),
                age_secs: 61,
                threshold_secs: 60,
            }
        );
        assert!(registry.get_price(token(WETH), token(USDC), 1_060).is_ok());
    }

    #[test]
    fn test_reverse_lookup_inverts_explicitly() {
        let (registry, source) = setup();
        let oracle = OracleAddress::from_low_u64(50);
        registry.register_price_feed(owner(), token(WETH), token(USDC), oracle, 60).unwrap();
        source.set_answer(oracle, OraclePrice::new(2_000_00000000, 8), 10);

        let reading = registry.get_oriented_price(token(USDC), token(WETH), 10).unwrap();
        assert_eq!(reading.price.decimals, 18);
        assert_eq!(reading.price.to_decimal().unwrap(), dec!(0.0005));
        assert!(matches!(
            registry.get_price(token(USDC), token(WETH), 10),
            Err(ArbitrageError::NoPriceFeed { .. })
        ));
    }

    #[test]
    fn test_cross_price_multiplies_legs() {
        let (registry, source) = setup();
        let (weth_usdc, dai_usdc) = (OracleAddress::from_low_u64(50), OracleAddress::from_low_u64(51));
        registry.register_price_feed(owner(), token(WETH), token(USDC), weth_usdc, 60).unwrap();
        registry.register_price_feed(owner(), token(DAI), token(USDC), dai_usdc, 60).unwrap();
        source.set_answer(weth_usdc, OraclePrice::new(3_000_00000000, 8), 10);
        // 1 DAI = 1.25 USDC, so 1 USDC = 0.8 DAI
        source.set_answer(dai_usdc, OraclePrice::new(1_25000000, 8), 5);

        let weth_dai = registry.get_cross_price(token(WETH), token(USDC), token(DAI), 20).unwrap();
        assert_eq!(weth_dai.price.to_decimal().unwrap(), dec!(2400));
        assert_eq!(weth_dai.updated_at, 5);
    }

    #[test]
    fn test_cross_price_through_two_inverted_legs() {
        let (registry, source) = setup();
        let (dai_weth, usdc_dai) = (OracleAddress::from_low_u64(52), OracleAddress::from_low_u64(53));
        registry.register_price_feed(owner(), token(DAI), token(WETH), dai_weth, 60).unwrap();
        registry.register_price_feed(owner(), token(USDC), token(DAI), usdc_dai, 60).unwrap();
        // 1 DAI = 0.0004 WETH and 1 USDC = 1 DAI, both 18-decimal feeds
        source.set_answer(dai_weth, OraclePrice::new(400_000_000_000_000, 18), 10);
        source.set_answer(usdc_dai, OraclePrice::new(10u128.pow(18), 18), 12);

        // Both legs invert to 18 decimals: WETH/DAI = 2500, DAI/USDC = 1
        let weth_usdc = registry.get_cross_price(token(WETH), token(DAI), token(USDC), 20).unwrap();
        assert_eq!(weth_usdc.price.decimals, 18);
        assert_eq!(weth_usdc.price.answer, 2_500 * 10u128.pow(18));
        assert_eq!(weth_usdc.price.to_decimal().unwrap(), dec!(2500));
        assert_eq!(weth_usdc.updated_at, 10);
    }

    #[test]
    fn test_unauthorized_registration() {
        let (registry, _) = setup();
        let stranger = AccountAddress::from_low_u64(9);
        assert_eq!(
            registry.register_price_feed(stranger, token(WETH), token(USDC), OracleAddress::ZERO, 60),
            Err(ArbitrageError::Unauthorized(stranger))
        );
    }
}
