//! Settlement venue and staged transactions
//!
//! A trade never touches venue state directly. [`ExecutionVenue::begin`]
//! hands out a [`StagedTransaction`] holding a copy of the balances and an
//! overlay of touched pools; hops mutate only the copy. `commit` applies the
//! copy in one step, and dropping the transaction discards it, so a failed
//! trade leaves balances and pools exactly as they were.

use crate::error::{ArbitrageError, ArbitrageResult};
use crate::market::{zero_for_one, MarketSnapshot, MarketSource, PoolKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use torq_amm::PoolState;
use tracing::debug;
use types::{AccountAddress, DexAddress, TokenAddress};

/// Balances and pool states staged by one in-flight trade
#[derive(Debug, Clone)]
pub struct StagedTransaction {
    account: AccountAddress,
    base: Arc<MarketSnapshot>,
    pools: HashMap<PoolKey, PoolState>,
    balances: HashMap<(AccountAddress, TokenAddress), u128>,
}

impl StagedTransaction {
    pub fn new(
        account: AccountAddress,
        base: Arc<MarketSnapshot>,
        balances: HashMap<(AccountAddress, TokenAddress), u128>,
    ) -> Self {
        Self {
            account,
            base,
            pools: HashMap::new(),
            balances,
        }
    }

    /// Account trading in this transaction
    pub fn account(&self) -> AccountAddress {
        self.account
    }

    /// Block the transaction was opened at
    pub fn block_number(&self) -> u64 {
        self.base.block_number
    }

    pub fn base(&self) -> &Arc<MarketSnapshot> {
        &self.base
    }

    pub fn balance(&self, account: &AccountAddress, token: &TokenAddress) -> u128 {
        self.balances.get(&(*account, *token)).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, account: AccountAddress, token: TokenAddress, amount: u128) {
        let entry = self.balances.entry((account, token)).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn debit(&mut self, account: AccountAddress, token: TokenAddress, amount: u128) -> ArbitrageResult<()> {
        let available = self.balance(&account, &token);
        if available < amount {
            return Err(ArbitrageError::InsufficientBalance {
                token,
                needed: amount,
                available,
            });
        }
        self.balances.insert((account, token), available - amount);
        Ok(())
    }

    pub fn transfer(&mut self, from: AccountAddress, to: AccountAddress, token: TokenAddress, amount: u128) -> ArbitrageResult<()> {
        self.debit(from, token, amount)?;
        self.credit(to, token, amount);
        Ok(())
    }

    /// Pool as this transaction sees it
    pub fn pool(&self, key: &PoolKey) -> Option<&PoolState> {
        self.pools.get(key).or_else(|| self.base.pool(key))
    }

    pub fn stage_pool(&mut self, key: PoolKey, state: PoolState) {
        self.pools.insert(key, state);
    }

    /// Swap the trading account's `amount_in` through one pool
    pub fn swap(&mut self, dex: DexAddress, token_in: TokenAddress, token_out: TokenAddress, amount_in: u128) -> ArbitrageResult<u128> {
        let key = PoolKey::new(dex, token_in, token_out);
        let pool = self.pool(&key).ok_or_else(|| {
            ArbitrageError::InsufficientLiquidity(format!("no pool on {} for the pair", dex.short()))
        })?;
        let outcome = pool.swap_exact_in(amount_in, zero_for_one(&token_in, &token_out))?;

        self.debit(self.account, token_in, amount_in)?;
        self.credit(self.account, token_out, outcome.amount_out);
        self.stage_pool(key, outcome.post_state);
        Ok(outcome.amount_out)
    }
}

/// Where trades settle
pub trait ExecutionVenue: Send + Sync {
    /// Current pools, the state a trade would execute against
    fn snapshot(&self) -> Arc<MarketSnapshot>;

    fn balance(&self, account: &AccountAddress, token: &TokenAddress) -> u128;

    fn begin(&self, account: AccountAddress) -> StagedTransaction;

    /// Execute one hop inside `tx`, returning the realized output
    fn swap(
        &self,
        tx: &mut StagedTransaction,
        dex: DexAddress,
        token_in: TokenAddress,
        token_out: TokenAddress,
        amount_in: u128,
    ) -> ArbitrageResult<u128> {
        tx.swap(dex, token_in, token_out, amount_in)
    }

    /// Apply `tx` atomically
    fn commit(&self, tx: StagedTransaction) -> ArbitrageResult<()>;
}

#[derive(Debug, Default)]
struct VenueState {
    snapshot: Arc<MarketSnapshot>,
    balances: HashMap<(AccountAddress, TokenAddress), u128>,
}

/// In-memory venue: one pool set and one balance sheet
///
/// Every commit mines a block, so a transaction opened before another commit
/// is refused.
#[derive(Debug, Default)]
pub struct SimulatedVenue {
    state: RwLock<VenueState>,
}

impl SimulatedVenue {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            state: RwLock::new(VenueState {
                snapshot: Arc::new(snapshot),
                balances: HashMap::new(),
            }),
        }
    }

    pub fn set_balance(&self, account: AccountAddress, token: TokenAddress, amount: u128) {
        self.state.write().balances.insert((account, token), amount);
    }

    /// Mine an empty block
    pub fn advance_block(&self, seconds: u64) {
        let mut state = self.state.write();
        let next = state
            .snapshot
            .advanced(state.snapshot.block_number + 1, state.snapshot.block_timestamp + seconds);
        state.snapshot = Arc::new(next);
    }

    /// Replace one pool, mining a block
    pub fn set_pool(&self, key: PoolKey, pool: PoolState) {
        let mut state = self.state.write();
        let mut next = state
            .snapshot
            .advanced(state.snapshot.block_number + 1, state.snapshot.block_timestamp);
        next.insert_pool(key, pool);
        state.snapshot = Arc::new(next);
    }
}

impl ExecutionVenue for SimulatedVenue {
    fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.state.read().snapshot.clone()
    }

    fn balance(&self, account: &AccountAddress, token: &TokenAddress) -> u128 {
        self.state
            .read()
            .balances
            .get(&(*account, *token))
            .copied()
            .unwrap_or_default()
    }

    fn begin(&self, account: AccountAddress) -> StagedTransaction {
        let state = self.state.read();
        StagedTransaction::new(account, state.snapshot.clone(), state.balances.clone())
    }

    fn commit(&self, tx: StagedTransaction) -> ArbitrageResult<()> {
        let mut state = self.state.write();
        if state.snapshot.block_number != tx.block_number() {
            return Err(ArbitrageError::BlockHeightChanged { restarts: 0 });
        }

        let mut next = state
            .snapshot
            .advanced(state.snapshot.block_number + 1, state.snapshot.block_timestamp);
        let touched = tx.pools.len();
        for (key, pool) in tx.pools {
            next.insert_pool(key, pool);
        }
        state.snapshot = Arc::new(next);
        state.balances = tx.balances;

        debug!(
            account = %tx.account.short(),
            block = state.snapshot.block_number,
            pools = touched,
            "Staged transaction committed"
        );
        Ok(())
    }
}

impl MarketSource for SimulatedVenue {
    fn snapshot(&self) -> Arc<MarketSnapshot> {
        ExecutionVenue::snapshot(self)
    }

    fn block_number(&self) -> u64 {
        self.state.read().snapshot.block_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torq_amm::V2PoolState;

    fn setup() -> (SimulatedVenue, AccountAddress, TokenAddress, TokenAddress, DexAddress) {
        let (a, b) = (TokenAddress::from_low_u64(1), TokenAddress::from_low_u64(2));
        let dex = DexAddress::from_low_u64(7);
        let venue = SimulatedVenue::new(MarketSnapshot::new(1, 100).with_pool(
            dex,
            a,
            b,
            PoolState::ConstantProduct(V2PoolState::new(1_000_000, 1_000_000, 30)),
        ));
        let account = AccountAddress::from_low_u64(5);
        venue.set_balance(account, a, 10_000);
        (venue, account, a, b, dex)
    }

    #[test]
    fn test_dropped_transaction_changes_nothing() {
        let (venue, account, a, b, dex) = setup();
        let before = ExecutionVenue::snapshot(&venue);
        {
            let mut tx = venue.begin(account);
            let out = venue.swap(&mut tx, dex, a, b, 5_000).unwrap();
            assert!(out > 0);
            assert_eq!(tx.balance(&account, &a), 5_000);
        }
        assert_eq!(venue.balance(&account, &a), 10_000);
        assert_eq!(venue.balance(&account, &b), 0);
        assert_eq!(*ExecutionVenue::snapshot(&venue), *before);
    }

    #[test]
    fn test_commit_applies_and_mines() {
        let (venue, account, a, b, dex) = setup();
        let mut tx = venue.begin(account);
        let out = venue.swap(&mut tx, dex, a, b, 5_000).unwrap();
        venue.commit(tx).unwrap();

        assert_eq!(venue.balance(&account, &a), 5_000);
        assert_eq!(venue.balance(&account, &b), out);
        assert_eq!(MarketSource::block_number(&venue), 2);
    }

    #[test]
    fn test_stale_transaction_is_refused() {
        let (venue, account, a, b, dex) = setup();
        let mut tx = venue.begin(account);
        venue.swap(&mut tx, dex, a, b, 1_000).unwrap();
        venue.advance_block(12);
        assert!(matches!(venue.commit(tx), Err(ArbitrageError::BlockHeightChanged { .. })));
        assert_eq!(venue.balance(&account, &a), 10_000);
    }

    #[test]
    fn test_overdraft_is_refused() {
        let (venue, account, a, b, dex) = setup();
        let mut tx = venue.begin(account);
        assert!(matches!(
            venue.swap(&mut tx, dex, a, b, 20_000),
            Err(ArbitrageError::InsufficientBalance { needed: 20_000, available: 10_000, .. })
        ));
    }
}
