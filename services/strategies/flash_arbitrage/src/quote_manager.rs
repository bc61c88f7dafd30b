//! # Quote Manager - Normalized Cross-DEX Quotes
//!
//! Produces one [`Quote`] shape for every DEX protocol family. Dispatch
//! happens once per quote on the registry entry's
//! [`DexProtocol`](torq_amm::DexProtocol); the pool
//! math itself lives in `torq-amm`:
//!
//! - constant product: exact Uniswap V2 integer formula with input fee
//! - concentrated liquidity: Uniswap V3 swap steps across initialized ticks,
//!   so large trades pay the slippage of every range they cross
//!
//! Quotes are pure functions of `(registry, snapshot, inputs)` and are never
//! cached; the same inputs against the same snapshot always give the same
//! quote.

use crate::error::{ArbitrageError, ArbitrageResult};
use crate::market::{zero_for_one, MarketSnapshot, PoolKey};
use crate::registry::{DexEntry, DexRegistry, TokenRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use torq_amm::PoolState;
use tracing::debug;
use types::{DexAddress, OraclePrice, TokenAddress, NORMALIZED_DECIMALS};

/// Normalized quote for one hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub dex: DexAddress,
    pub token_in: TokenAddress,
    pub token_out: TokenAddress,
    pub amount_in: u128,
    pub output_amount: u128,
    /// DEX overhead plus protocol swap gas (and per-tick gas for V3)
    pub gas_estimate: u64,
    pub price_impact_bps: u32,
    /// Output-token depth before the trade, native base units
    pub available_liquidity: u128,
    pub ticks_crossed: u32,
    pub block_number: u64,
    /// Pool after this hop settles; later hops through the same pool see it
    pub post_state: PoolState,
}

/// Quote annotated with its gas cost at a given gas price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedQuote {
    pub quote: Quote,
    pub gas_cost_wei: u128,
}

/// Snapshot plus pool states staged by earlier hops of the same path
pub struct PoolOverlay<'a> {
    snapshot: &'a MarketSnapshot,
    staged: Vec<(PoolKey, PoolState)>,
}

impl<'a> PoolOverlay<'a> {
    pub fn new(snapshot: &'a MarketSnapshot) -> Self {
        Self {
            snapshot,
            staged: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &'a MarketSnapshot {
        self.snapshot
    }

    pub fn pool(&self, key: &PoolKey) -> Option<&PoolState> {
        self.staged
            .iter()
            .rev()
            .find(|(staged, _)| staged == key)
            .map(|(_, state)| state)
            .or_else(|| self.snapshot.pool(key))
    }

    pub fn stage(&mut self, quote: &Quote) {
        self.staged.push((
            PoolKey::new(quote.dex, quote.token_in, quote.token_out),
            quote.post_state.clone(),
        ));
    }

    pub fn depth(&self) -> usize {
        self.staged.len()
    }

    /// Drop every stage above `depth`
    pub fn unwind(&mut self, depth: usize) {
        self.staged.truncate(depth);
    }
}

pub struct QuoteManager {
    dex_registry: Arc<DexRegistry>,
    tokens: Arc<TokenRegistry>,
    /// Minimum output-side liquidity, 18-decimal normalized units
    liquidity_floor: u128,
    quote_calls: AtomicU64,
}

impl QuoteManager {
    pub fn new(dex_registry: Arc<DexRegistry>, tokens: Arc<TokenRegistry>, liquidity_floor: u128) -> Self {
        Self {
            dex_registry,
            tokens,
            liquidity_floor,
            quote_calls: AtomicU64::new(0),
        }
    }

    pub fn dex_registry(&self) -> &Arc<DexRegistry> {
        &self.dex_registry
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    /// Total quotes computed since construction
    pub fn quote_calls(&self) -> u64 {
        self.quote_calls.load(Ordering::Relaxed)
    }

    /// Quote `amount_in` of `token_in` for `token_out` on one DEX
    pub fn get_dex_quote(
        &self,
        snapshot: &MarketSnapshot,
        dex: &DexAddress,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        amount_in: u128,
    ) -> ArbitrageResult<Quote> {
        self.quote_in_overlay(&PoolOverlay::new(snapshot), dex, token_in, token_out, amount_in)
    }

    /// Quote against a snapshot with earlier hops of the same path applied
    pub fn quote_in_overlay(
        &self,
        overlay: &PoolOverlay<'_>,
        dex: &DexAddress,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        amount_in: u128,
    ) -> ArbitrageResult<Quote> {
        let entry = self.supported_entry(dex, token_in, token_out)?;
        let pool = overlay
            .pool(&PoolKey::new(*dex, *token_in, *token_out))
            .ok_or_else(|| {
                ArbitrageError::InsufficientLiquidity(format!("{} has no pool for the pair", entry.name))
            })?;
        self.quote_pool(&entry, pool, token_in, token_out, amount_in, overlay.snapshot().block_number)
    }

    fn supported_entry(&self, dex: &DexAddress, token_in: &TokenAddress, token_out: &TokenAddress) -> ArbitrageResult<DexEntry> {
        let entry = self.dex_registry.get_dex_info(dex)?;
        if !entry.is_active || token_in == token_out || !entry.supports(token_in, token_out) {
            return Err(ArbitrageError::UnsupportedPair {
                dex: *dex,
                token_a: *token_in,
                token_b: *token_out,
            });
        }
        Ok(entry)
    }

    fn quote_pool(
        &self,
        entry: &DexEntry,
        pool: &PoolState,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        amount_in: u128,
        block_number: u64,
    ) -> ArbitrageResult<Quote> {
        self.quote_calls.fetch_add(1, Ordering::Relaxed);

        if pool.protocol() != entry.protocol {
            return Err(ArbitrageError::InvalidConfig(format!(
                "{} is registered as {} but its pool is {}",
                entry.name,
                entry.protocol,
                pool.protocol()
            )));
        }
        if !pool.has_liquidity() {
            return Err(ArbitrageError::InsufficientLiquidity(format!(
                "{} pool has zero liquidity",
                entry.name
            )));
        }

        let outcome = pool.swap_exact_in(amount_in, zero_for_one(token_in, token_out))?;

        let out_decimals = self.tokens.decimals(token_out)?;
        let normalized_liquidity = types::precision::normalize_amount(outcome.available_liquidity, out_decimals);
        if normalized_liquidity < self.liquidity_floor {
            return Err(ArbitrageError::InsufficientLiquidity(format!(
                "{} depth {} below floor {}",
                entry.name, normalized_liquidity, self.liquidity_floor
            )));
        }

        let gas_estimate = entry
            .gas_overhead
            .saturating_add(entry.protocol.swap_gas(outcome.ticks_crossed));

        debug!(
            dex = %entry.name,
            amount_in = amount_in as f64,
            amount_out = outcome.amount_out as f64,
            impact_bps = outcome.price_impact_bps,
            ticks_crossed = outcome.ticks_crossed,
            "Quoted hop"
        );

        Ok(Quote {
            dex: entry.address,
            token_in: *token_in,
            token_out: *token_out,
            amount_in,
            output_amount: outcome.amount_out,
            gas_estimate,
            price_impact_bps: outcome.price_impact_bps,
            available_liquidity: outcome.available_liquidity,
            ticks_crossed: outcome.ticks_crossed,
            block_number,
            post_state: outcome.post_state,
        })
    }

    /// Quotes from every active DEX listing the pair, best output first
    ///
    /// A failing DEX is left out; it never aborts the batch.
    pub fn get_quotes(
        &self,
        snapshot: &MarketSnapshot,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
        amount_in: u128,
        max_gas_price: u128,
    ) -> Vec<PricedQuote> {
        let mut quotes: Vec<PricedQuote> = self
            .dex_registry
            .get_active_dexes()
            .iter()
            .filter(|entry| entry.supports(token_in, token_out))
            .filter_map(|entry| {
                match self.get_dex_quote(snapshot, &entry.address, token_in, token_out, amount_in) {
                    Ok(quote) => Some(PricedQuote {
                        gas_cost_wei: (quote.gas_estimate as u128).saturating_mul(max_gas_price),
                        quote,
                    }),
                    Err(err) => {
                        debug!(dex = %entry.name, error = %err, "DEX omitted from batch quote");
                        None
                    }
                }
            })
            .collect();
        quotes.sort_by(|a, b| b.quote.output_amount.cmp(&a.quote.output_amount));
        quotes
    }

    /// Pre-trade price of `token_in` in `token_out` (whole tokens, 18 decimals)
    pub fn spot_price(
        &self,
        snapshot: &MarketSnapshot,
        dex: &DexAddress,
        token_in: &TokenAddress,
        token_out: &TokenAddress,
    ) -> ArbitrageResult<OraclePrice> {
        let entry = self.supported_entry(dex, token_in, token_out)?;
        let pool = snapshot
            .pool(&PoolKey::new(*dex, *token_in, *token_out))
            .ok_or_else(|| ArbitrageError::InsufficientLiquidity(format!("{} has no pool for the pair", entry.name)))?;
        let spot = pool.spot_price(zero_for_one(token_in, token_out))?;

        let dec_in = self.tokens.decimals(token_in)? as u32;
        let dec_out = self.tokens.decimals(token_out)? as u32;
        // out_base/in_base * 10^dec_in / 10^dec_out, then to 18 decimals
        let answer = spot.scaled(NORMALIZED_DECIMALS as u32 + dec_in, dec_out)?;
        Ok(OraclePrice::new(answer, NORMALIZED_DECIMALS))
    }

    /// Chain quotes along a path, each hop seeing earlier hops' pool updates
    pub fn quote_path(
        &self,
        snapshot: &MarketSnapshot,
        tokens: &[TokenAddress],
        dexes: &[DexAddress],
        amount_in: u128,
    ) -> ArbitrageResult<Vec<Quote>> {
        let mut overlay = PoolOverlay::new(snapshot);
        let mut amount = amount_in;
        let mut quotes = Vec::with_capacity(dexes.len());
        for (hop, dex) in tokens.windows(2).zip(dexes) {
            let quote = self.quote_in_overlay(&overlay, dex, &hop[0], &hop[1], amount)?;
            amount = quote.output_amount;
            overlay.stage(&quote);
            quotes.push(quote);
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use torq_amm::{DexProtocol, V2PoolState, V3PoolState, U256};
    use types::{AccountAddress, TokenInfo};

    const USDC: u64 = 1;
    const WETH: u64 = 2;

    fn owner() -> AccountAddress {
        AccountAddress::from_low_u64(1)
    }

    fn token(n: u64) -> TokenAddress {
        TokenAddress::from_low_u64(n)
    }

    fn dex(n: u64) -> DexAddress {
        DexAddress::from_low_u64(100 + n)
    }

    fn manager(floor: u128) -> QuoteManager {
        let tokens = Arc::new(TokenRegistry::new(owner()));
        tokens.register_token(owner(), TokenInfo::new(token(USDC), "USDC", 6)).unwrap();
        tokens.register_token(owner(), TokenInfo::new(token(WETH), "WETH", 18)).unwrap();

        let registry = Arc::new(DexRegistry::new(owner()));
        registry.register_dex(owner(), dex(1), "V2", DexProtocol::ConstantProduct, 50, 20_000).unwrap();
        registry.register_dex(owner(), dex(2), "V2-fork", DexProtocol::ConstantProduct, 50, 25_000).unwrap();
        registry.register_dex(owner(), dex(3), "Empty", DexProtocol::ConstantProduct, 50, 0).unwrap();
        registry.register_dex(owner(), dex(4), "V3", DexProtocol::ConcentratedLiquidity, 50, 0).unwrap();
        for n in 1..=4 {
            registry.add_supported_pair(owner(), dex(n), token(USDC), token(WETH)).unwrap();
        }
        QuoteManager::new(registry, tokens, floor)
    }

    fn snapshot() -> MarketSnapshot {
        // token0 = USDC, token1 = WETH
        let liquidity = 10u128.pow(18);
        let mut ticks = BTreeMap::new();
        ticks.insert(-887_220, liquidity as i128);
        ticks.insert(887_220, -(liquidity as i128));
        MarketSnapshot::new(10, 1_000)
            .with_pool(dex(1), token(USDC), token(WETH), PoolState::ConstantProduct(V2PoolState::new(3_000_000 * 10u128.pow(6), 1_000 * 10u128.pow(18), 30)))
            .with_pool(dex(2), token(USDC), token(WETH), PoolState::ConstantProduct(V2PoolState::new(2_950_000 * 10u128.pow(6), 1_000 * 10u128.pow(18), 30)))
            .with_pool(dex(3), token(USDC), token(WETH), PoolState::ConstantProduct(V2PoolState::new(0, 0, 30)))
            .with_pool(
                dex(4),
                token(USDC),
                token(WETH),
                PoolState::ConcentratedLiquidity(V3PoolState {
                    sqrt_price_x96: U256::one() << 96,
                    liquidity,
                    current_tick: 0,
                    fee_pips: 3000,
                    tick_spacing: 60,
                    ticks,
                }),
            )
    }

    #[test]
    fn test_constant_product_quote() {
        let manager = manager(0);
        let quote = manager
            .get_dex_quote(&snapshot(), &dex(1), &token(WETH), &token(USDC), 10u128.pow(18))
            .unwrap();
        // ~3000 USDC minus 0.3% fee and a little impact
        assert!(quote.output_amount > 2_980 * 10u128.pow(6));
        assert!(quote.output_amount < 2_991 * 10u128.pow(6));
        assert_eq!(quote.gas_estimate, 20_000 + torq_amm::protocol::CONSTANT_PRODUCT_SWAP_GAS);
        assert_eq!(quote.available_liquidity, 3_000_000 * 10u128.pow(6));
        assert_eq!(quote.block_number, 10);
    }

    #[test]
    fn test_quote_is_idempotent() {
        let manager = manager(0);
        let snapshot = snapshot();
        for n in [1, 4] {
            let first = manager.get_dex_quote(&snapshot, &dex(n), &token(USDC), &token(WETH), 5_000_000_000).unwrap();
            let second = manager.get_dex_quote(&snapshot, &dex(n), &token(USDC), &token(WETH), 5_000_000_000).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_zero_liquidity_pool() {
        let manager = manager(0);
        let result = manager.get_dex_quote(&snapshot(), &dex(3), &token(USDC), &token(WETH), 1_000_000);
        assert!(matches!(result, Err(ArbitrageError::InsufficientLiquidity(_))));
    }

    #[test]
    fn test_unsupported_and_inactive() {
        let manager = manager(0);
        let snapshot = snapshot();
        let other = token(99);
        assert!(matches!(
            manager.get_dex_quote(&snapshot, &dex(1), &token(USDC), &other, 1),
            Err(ArbitrageError::UnsupportedPair { .. })
        ));
        manager.dex_registry().deactivate_dex(owner(), dex(1)).unwrap();
        assert!(matches!(
            manager.get_dex_quote(&snapshot, &dex(1), &token(USDC), &token(WETH), 1_000_000),
            Err(ArbitrageError::UnsupportedPair { .. })
        ));
    }

    #[test]
    fn test_liquidity_floor_is_normalized() {
        // 3M USDC depth = 3e24 normalized; 1000 WETH depth = 1e21 normalized
        let manager = manager(2 * 10u128.pow(24));
        let snapshot = snapshot();
        assert!(manager
            .get_dex_quote(&snapshot, &dex(1), &token(WETH), &token(USDC), 10u128.pow(18))
            .is_ok());
        assert!(matches!(
            manager.get_dex_quote(&snapshot, &dex(1), &token(USDC), &token(WETH), 1_000_000),
            Err(ArbitrageError::InsufficientLiquidity(_))
        ));
    }

    #[test]
    fn test_batch_omits_failures_and_sorts() {
        let manager = manager(0);
        let quotes = manager.get_quotes(&snapshot(), &token(WETH), &token(USDC), 10u128.pow(17), 30_000_000_000);

        // Empty pool dropped; the V3 pool prices one raw WETH unit at one raw
        // USDC unit, so it pays out far more base units than either V2 pool
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].quote.dex, dex(4));
        assert_eq!(quotes[1].quote.dex, dex(1));
        assert_eq!(quotes[2].quote.dex, dex(2));
        assert!(quotes.windows(2).all(|w| w[0].quote.output_amount >= w[1].quote.output_amount));
        assert_eq!(quotes[1].gas_cost_wei, quotes[1].quote.gas_estimate as u128 * 30_000_000_000);
    }

    #[test]
    fn test_spot_price_reads_decimals() {
        let manager = manager(0);
        let price = manager.spot_price(&snapshot(), &dex(1), &token(WETH), &token(USDC)).unwrap();
        assert_eq!(price.decimals, 18);
        assert_eq!(price.to_decimal().unwrap(), dec!(3000));
    }

    #[test]
    fn test_path_quote_sees_its_own_pool_updates() {
        let manager = manager(0);
        let snapshot = snapshot();
        let amount = 10_000 * 10u128.pow(6);
        let tokens = [token(USDC), token(WETH), token(USDC)];

        let round_trip = manager.quote_path(&snapshot, &tokens, &[dex(1), dex(1)], amount).unwrap();
        assert_eq!(round_trip.len(), 2);
        // Selling back into the pool just moved returns less than the input
        assert!(round_trip[1].output_amount < amount);

        let fresh = manager
            .get_dex_quote(&snapshot, &dex(1), &token(WETH), &token(USDC), round_trip[0].output_amount)
            .unwrap();
        assert!(fresh.output_amount < round_trip[1].output_amount);
    }
}
