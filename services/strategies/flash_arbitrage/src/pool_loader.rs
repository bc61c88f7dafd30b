//! Market snapshot file loader
//!
//! Reads a JSON description of one block's market (tokens, DEXes, pool
//! states, oracle answers, lending pools, opening balances) and installs it
//! into the registries. Pool entries must list `token0 < token1`, the on-chain
//! ordering the swap direction is derived from; anything else is skipped with
//! a warning rather than silently mispriced.

use crate::error::ArbitrageResult;
use crate::flash_loan::{LendingPool, StaticLendingPool};
use crate::ledger::SimulatedVenue;
use crate::market::{MarketSnapshot, PoolKey};
use crate::registry::{DexRegistry, PriceFeedRegistry, StaticOracleSource, TokenRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use torq_amm::{DexProtocol, PoolState};
use tracing::{info, warn};
use types::{AccountAddress, DexAddress, OracleAddress, OraclePrice, TokenAddress, TokenInfo};

#[derive(Debug, Clone, Deserialize, Serialize)]
struct MarketFileJson {
    block_number: u64,
    block_timestamp: u64,
    native_token: TokenAddress,
    tokens: Vec<TokenInfo>,
    dexes: Vec<DexSpec>,
    #[serde(default)]
    pools: Vec<PoolJson>,
    #[serde(default)]
    price_feeds: Vec<PriceFeedSpec>,
    #[serde(default)]
    lending_pools: Vec<LendingPoolSpec>,
    #[serde(default)]
    balances: Vec<BalanceSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct PoolJson {
    dex: DexAddress,
    token0: TokenAddress,
    token1: TokenAddress,
    state: PoolState,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DexSpec {
    pub address: DexAddress,
    pub name: String,
    pub protocol: DexProtocol,
    pub max_slippage_bps: u32,
    #[serde(default)]
    pub gas_overhead: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PriceFeedSpec {
    pub base: TokenAddress,
    pub quote: TokenAddress,
    pub oracle: OracleAddress,
    pub stale_threshold_secs: u64,
    pub answer: u128,
    pub decimals: u8,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LendingPoolSpec {
    pub name: String,
    pub fee_bps: u32,
    #[serde(default)]
    pub liquidity: Vec<TokenAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenAmount {
    pub token: TokenAddress,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BalanceSpec {
    pub account: AccountAddress,
    pub token: TokenAddress,
    pub amount: u128,
}

/// Parsed market file, ready to install
#[derive(Debug, Clone)]
pub struct LoadedMarket {
    pub snapshot: MarketSnapshot,
    pub native_token: TokenAddress,
    pub tokens: Vec<TokenInfo>,
    pub dexes: Vec<DexSpec>,
    /// `(dex, token0, token1)` for every accepted pool
    pub pool_pairs: Vec<(DexAddress, TokenAddress, TokenAddress)>,
    pub price_feeds: Vec<PriceFeedSpec>,
    pub lending_pools: Vec<LendingPoolSpec>,
    pub balances: Vec<BalanceSpec>,
}

/// Load a market file from disk
pub fn load_market(path: &Path) -> Result<LoadedMarket> {
    info!("Loading market snapshot from {:?}", path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read market file {}", path.display()))?;
    parse_market(&content).with_context(|| format!("Invalid market file {}", path.display()))
}

pub fn parse_market(json: &str) -> Result<LoadedMarket> {
    let file: MarketFileJson = serde_json::from_str(json).context("Failed to parse market JSON")?;

    let known_dexes: HashMap<DexAddress, DexProtocol> =
        file.dexes.iter().map(|dex| (dex.address, dex.protocol)).collect();
    let mut snapshot = MarketSnapshot::new(file.block_number, file.block_timestamp);
    let mut pool_pairs = Vec::with_capacity(file.pools.len());

    for pool in file.pools {
        if pool.token0 >= pool.token1 {
            warn!(
                dex = %pool.dex,
                "Skipping pool {}/{}: token0 must sort below token1",
                pool.token0,
                pool.token1
            );
            continue;
        }
        match known_dexes.get(&pool.dex) {
            None => {
                warn!(dex = %pool.dex, "Skipping pool on unlisted DEX");
                continue;
            }
            Some(protocol) if *protocol != pool.state.protocol() => {
                warn!(
                    dex = %pool.dex,
                    expected = %protocol,
                    found = %pool.state.protocol(),
                    "Skipping pool with mismatched protocol"
                );
                continue;
            }
            Some(_) => {}
        }
        snapshot.insert_pool(PoolKey::new(pool.dex, pool.token0, pool.token1), pool.state);
        pool_pairs.push((pool.dex, pool.token0, pool.token1));
    }

    info!(
        block = file.block_number,
        tokens = file.tokens.len(),
        dexes = file.dexes.len(),
        pools = pool_pairs.len(),
        feeds = file.price_feeds.len(),
        "Market snapshot parsed"
    );

    Ok(LoadedMarket {
        snapshot,
        native_token: file.native_token,
        tokens: file.tokens,
        dexes: file.dexes,
        pool_pairs,
        price_feeds: file.price_feeds,
        lending_pools: file.lending_pools,
        balances: file.balances,
    })
}

impl LoadedMarket {
    /// Register tokens, DEXes with their pool pairs, and price feeds
    pub fn install(
        &self,
        owner: AccountAddress,
        tokens: &TokenRegistry,
        dexes: &DexRegistry,
        feeds: &PriceFeedRegistry,
        oracle: &StaticOracleSource,
    ) -> ArbitrageResult<()> {
        for token in &self.tokens {
            tokens.register_token(owner, token.clone())?;
        }
        for dex in &self.dexes {
            dexes.register_dex(
                owner,
                dex.address,
                dex.name.clone(),
                dex.protocol,
                dex.max_slippage_bps,
                dex.gas_overhead,
            )?;
        }
        for (dex, token0, token1) in &self.pool_pairs {
            dexes.add_supported_pair(owner, *dex, *token0, *token1)?;
        }
        for feed in &self.price_feeds {
            feeds.register_price_feed(owner, feed.base, feed.quote, feed.oracle, feed.stale_threshold_secs)?;
            oracle.set_answer(feed.oracle, OraclePrice::new(feed.answer, feed.decimals), feed.updated_at);
        }
        Ok(())
    }

    pub fn lenders(&self) -> Vec<Arc<dyn LendingPool>> {
        self.lending_pools
            .iter()
            .map(|spec| {
                let pool = StaticLendingPool::new(spec.name.clone(), spec.fee_bps);
                for entry in &spec.liquidity {
                    pool.set_liquidity(entry.token, entry.amount);
                }
                Arc::new(pool) as Arc<dyn LendingPool>
            })
            .collect()
    }

    /// Opening balances into a simulated venue
    pub fn fund(&self, venue: &SimulatedVenue) {
        for balance in &self.balances {
            venue.set_balance(balance.account, balance.token, balance.amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MARKET: &str = r#"{
        "block_number": 100,
        "block_timestamp": 1700000000,
        "native_token": "0x0000000000000000000000000000000000000002",
        "tokens": [
            {"address": "0x0000000000000000000000000000000000000001", "symbol": "USDC", "decimals": 6},
            {"address": "0x0000000000000000000000000000000000000002", "symbol": "WETH", "decimals": 18}
        ],
        "dexes": [
            {"address": "0x00000000000000000000000000000000000000a1", "name": "UniswapV2", "protocol": "constant_product", "max_slippage_bps": 50, "gas_overhead": 20000}
        ],
        "pools": [
            {
                "dex": "0x00000000000000000000000000000000000000a1",
                "token0": "0x0000000000000000000000000000000000000001",
                "token1": "0x0000000000000000000000000000000000000002",
                "state": {"constant_product": {"reserve0": 3000000000000, "reserve1": 1000000000000000000000, "fee_bps": 30}}
            },
            {
                "dex": "0x00000000000000000000000000000000000000a1",
                "token0": "0x0000000000000000000000000000000000000002",
                "token1": "0x0000000000000000000000000000000000000001",
                "state": {"constant_product": {"reserve0": 1, "reserve1": 1, "fee_bps": 30}}
            }
        ],
        "price_feeds": [
            {
                "base": "0x0000000000000000000000000000000000000002",
                "quote": "0x0000000000000000000000000000000000000001",
                "oracle": "0x00000000000000000000000000000000000000f1",
                "stale_threshold_secs": 3600,
                "answer": 300000000000,
                "decimals": 8,
                "updated_at": 1699999990
            }
        ],
        "lending_pools": [
            {"name": "aave", "fee_bps": 5, "liquidity": [{"token": "0x0000000000000000000000000000000000000001", "amount": 1000000000000}]}
        ]
    }"#;

    #[test]
    fn test_parse_skips_misordered_pool() {
        let market = parse_market(MARKET).unwrap();
        assert_eq!(market.snapshot.block_number, 100);
        assert_eq!(market.pool_pairs.len(), 1);
        assert_eq!(market.snapshot.pool_count(), 1);
        assert_eq!(market.tokens.len(), 2);
        assert_eq!(market.lenders().len(), 1);
    }

    #[test]
    fn test_install_registers_everything() {
        let market = parse_market(MARKET).unwrap();
        let owner = AccountAddress::from_low_u64(1);
        let tokens = TokenRegistry::new(owner);
        let dexes = DexRegistry::new(owner);
        let oracle = Arc::new(StaticOracleSource::new());
        let feeds = PriceFeedRegistry::new(owner, oracle.clone());
        market.install(owner, &tokens, &dexes, &feeds, &oracle).unwrap();

        let (usdc, weth) = (TokenAddress::from_low_u64(1), TokenAddress::from_low_u64(2));
        assert_eq!(tokens.decimals(&weth).unwrap(), 18);
        assert!(dexes.is_pair_supported(&DexAddress::from_low_u64(0xa1), &weth, &usdc));
        let reading = feeds.get_price(weth, usdc, 1_700_000_000).unwrap();
        assert_eq!(reading.price, OraclePrice::new(300_000_000_000, 8));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MARKET.as_bytes()).unwrap();
        let market = load_market(file.path()).unwrap();
        assert_eq!(market.native_token, TokenAddress::from_low_u64(2));

        assert!(load_market(Path::new("/nonexistent/market.json")).is_err());
    }
}
