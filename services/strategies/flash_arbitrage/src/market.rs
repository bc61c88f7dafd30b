//! Market snapshots
//!
//! Every quote feeding one decision is read from a single immutable
//! [`MarketSnapshot`] tagged with its block height. Readers hold an
//! `Arc<MarketSnapshot>`; producers publish a whole new snapshot, so no reader
//! ever sees pools from two different blocks.

use crate::registry::TokenPair;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use torq_amm::PoolState;
use tracing::debug;
use types::{DexAddress, TokenAddress};

/// One pool: a DEX and an unordered token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub dex: DexAddress,
    pub pair: TokenPair,
}

impl PoolKey {
    pub fn new(dex: DexAddress, a: TokenAddress, b: TokenAddress) -> Self {
        Self {
            dex,
            pair: TokenPair::new(a, b),
        }
    }
}

/// Swap direction in a pool keyed by `token0 < token1`
pub fn zero_for_one(token_in: &TokenAddress, token_out: &TokenAddress) -> bool {
    token_in < token_out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub block_number: u64,
    /// Seconds; the "now" for oracle staleness and time locks
    pub block_timestamp: u64,
    pools: HashMap<PoolKey, PoolState>,
}

impl MarketSnapshot {
    pub fn new(block_number: u64, block_timestamp: u64) -> Self {
        Self {
            block_number,
            block_timestamp,
            pools: HashMap::new(),
        }
    }

    pub fn with_pool(mut self, dex: DexAddress, a: TokenAddress, b: TokenAddress, state: PoolState) -> Self {
        self.insert_pool(PoolKey::new(dex, a, b), state);
        self
    }

    pub fn insert_pool(&mut self, key: PoolKey, state: PoolState) {
        self.pools.insert(key, state);
    }

    pub fn pool(&self, key: &PoolKey) -> Option<&PoolState> {
        self.pools.get(key)
    }

    pub fn pools(&self) -> impl Iterator<Item = (&PoolKey, &PoolState)> {
        self.pools.iter()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// The same pools at a later block
    pub fn advanced(&self, block_number: u64, block_timestamp: u64) -> Self {
        Self {
            block_number,
            block_timestamp,
            pools: self.pools.clone(),
        }
    }
}

/// Source of the current market snapshot
pub trait MarketSource: Send + Sync {
    fn snapshot(&self) -> Arc<MarketSnapshot>;

    fn block_number(&self) -> u64 {
        self.snapshot().block_number
    }
}

/// Market state fed by an external producer
#[derive(Debug, Default)]
pub struct LiveMarket {
    current: RwLock<Arc<MarketSnapshot>>,
}

impl LiveMarket {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Replace the snapshot wholesale
    pub fn publish(&self, snapshot: MarketSnapshot) {
        debug!(block = snapshot.block_number, pools = snapshot.pool_count(), "Market snapshot published");
        *self.current.write() = Arc::new(snapshot);
    }

    /// New block with one pool changed
    pub fn update_pool(&self, key: PoolKey, state: PoolState, block_number: u64, block_timestamp: u64) {
        let mut current = self.current.write();
        let mut next = current.advanced(block_number, block_timestamp);
        next.insert_pool(key, state);
        *current = Arc::new(next);
    }
}

impl MarketSource for LiveMarket {
    fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.current.read().clone()
    }

    fn block_number(&self) -> u64 {
        self.current.read().block_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torq_amm::V2PoolState;

    #[test]
    fn test_pool_lookup_ignores_token_order() {
        let (a, b) = (TokenAddress::from_low_u64(2), TokenAddress::from_low_u64(1));
        let dex = DexAddress::from_low_u64(9);
        let snapshot = MarketSnapshot::new(1, 100).with_pool(
            dex,
            a,
            b,
            PoolState::ConstantProduct(V2PoolState::new(10, 20, 30)),
        );
        assert!(snapshot.pool(&PoolKey::new(dex, b, a)).is_some());
        assert!(zero_for_one(&b, &a));
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let market = LiveMarket::new(MarketSnapshot::new(1, 100));
        let held = market.snapshot();
        let key = PoolKey::new(DexAddress::from_low_u64(1), TokenAddress::from_low_u64(1), TokenAddress::from_low_u64(2));
        market.update_pool(key, PoolState::ConstantProduct(V2PoolState::new(1, 1, 30)), 2, 112);

        assert_eq!(held.block_number, 1);
        assert_eq!(held.pool_count(), 0);
        assert_eq!(market.block_number(), 2);
        assert_eq!(market.snapshot().pool_count(), 1);
    }
}
