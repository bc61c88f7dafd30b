//! Paths and execution records
//!
//! A [`Path`] is built once by the path finder and consumed by the execution
//! engine. Its fields are private so nothing can patch a stale path in place;
//! the engine re-derives every quote from current state instead.

use crate::error::{ArbitrageError, ArbitrageResult};
use serde::{Deserialize, Serialize};
use types::{DexAddress, TokenAddress};

/// Hop-count ceiling; deeper cycles are dominated by gas and slippage
pub const MAX_PATH_HOPS: usize = 4;

/// Structural checks that need no market data
///
/// Runs before any quote so malformed paths fail fast.
pub fn check_structure(
    tokens: &[TokenAddress],
    dexes: &[DexAddress],
    amount_in: u128,
) -> ArbitrageResult<()> {
    if tokens.len() < 2 || dexes.is_empty() {
        return Err(ArbitrageError::InvalidPath("path has no hops".to_string()));
    }
    if dexes.len() != tokens.len() - 1 {
        return Err(ArbitrageError::InvalidPath(format!(
            "{} tokens need {} DEXes, got {}",
            tokens.len(),
            tokens.len() - 1,
            dexes.len()
        )));
    }
    if tokens.first() != tokens.last() {
        return Err(ArbitrageError::InvalidPath(
            "path must end in its start token".to_string(),
        ));
    }
    if dexes.len() > MAX_PATH_HOPS {
        return Err(ArbitrageError::InvalidPath(format!(
            "{} hops exceeds the {} hop ceiling",
            dexes.len(),
            MAX_PATH_HOPS
        )));
    }
    if tokens.windows(2).any(|hop| hop[0] == hop[1]) {
        return Err(ArbitrageError::InvalidPath(
            "hop swaps a token for itself".to_string(),
        ));
    }
    if amount_in == 0 {
        return Err(ArbitrageError::InvalidPath("input amount must be positive".to_string()));
    }
    Ok(())
}

/// Cyclic multi-hop route, immutable after construction
///
/// Deserialization goes through [`Path::new`], so a decoded path has passed
/// the same structural checks as one built by the finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PathRecord")]
pub struct Path {
    tokens: Vec<TokenAddress>,
    dexes: Vec<DexAddress>,
    total_gas_estimate: u64,
    /// Output minus input at search time, start-token base units
    expected_profit: i128,
    /// Gas cost at search time, start-token base units
    gas_cost: u128,
    use_flash_loan: bool,
    block_number: u64,
}

/// Wire shape of [`Path`] before validation
#[derive(Deserialize)]
struct PathRecord {
    tokens: Vec<TokenAddress>,
    dexes: Vec<DexAddress>,
    total_gas_estimate: u64,
    expected_profit: i128,
    gas_cost: u128,
    #[serde(default)]
    use_flash_loan: bool,
    block_number: u64,
}

impl TryFrom<PathRecord> for Path {
    type Error = ArbitrageError;

    fn try_from(record: PathRecord) -> ArbitrageResult<Self> {
        Path::new(
            record.tokens,
            record.dexes,
            record.total_gas_estimate,
            record.expected_profit,
            record.gas_cost,
            record.block_number,
        )
        .map(|path| path.with_flash_loan(record.use_flash_loan))
    }
}

impl Path {
    pub fn new(
        tokens: Vec<TokenAddress>,
        dexes: Vec<DexAddress>,
        total_gas_estimate: u64,
        expected_profit: i128,
        gas_cost: u128,
        block_number: u64,
    ) -> ArbitrageResult<Self> {
        // Amount is irrelevant for the shape check
        check_structure(&tokens, &dexes, 1)?;
        Ok(Self {
            tokens,
            dexes,
            total_gas_estimate,
            expected_profit,
            gas_cost,
            use_flash_loan: false,
            block_number,
        })
    }

    /// Same route, flagged for flash-loan financing
    pub fn with_flash_loan(mut self, use_flash_loan: bool) -> Self {
        self.use_flash_loan = use_flash_loan;
        self
    }

    pub fn tokens(&self) -> &[TokenAddress] {
        &self.tokens
    }

    pub fn dexes(&self) -> &[DexAddress] {
        &self.dexes
    }

    pub fn hops(&self) -> usize {
        self.dexes.len()
    }

    pub fn start_token(&self) -> TokenAddress {
        self.tokens[0]
    }

    pub fn total_gas_estimate(&self) -> u64 {
        self.total_gas_estimate
    }

    pub fn expected_profit(&self) -> i128 {
        self.expected_profit
    }

    pub fn gas_cost(&self) -> u128 {
        self.gas_cost
    }

    /// Expected profit after gas
    pub fn net_profit(&self) -> i128 {
        self.expected_profit
            .saturating_sub(i128::try_from(self.gas_cost).unwrap_or(i128::MAX))
    }

    pub fn use_flash_loan(&self) -> bool {
        self.use_flash_loan
    }

    /// Block the search priced this path at
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// `USDC -[0x1234abcd]-> WETH -[0x5678ef01]-> USDC`
    pub fn describe(&self, symbol: impl Fn(&TokenAddress) -> String) -> String {
        let mut out = symbol(&self.tokens[0]);
        for (dex, token) in self.dexes.iter().zip(&self.tokens[1..]) {
            out.push_str(&format!(" -[{}]-> {}", dex.short(), symbol(token)));
        }
        out
    }
}

/// Flash-loan leg of an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub provider: String,
    pub principal: u128,
    pub fee: u128,
}

impl LoanTerms {
    pub fn repayment(&self) -> u128 {
        self.principal.saturating_add(self.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxOutcome {
    Committed,
    /// Every staged hop discarded; `code` is the error taxonomy code
    RolledBack { code: String, reason: String },
}

/// Record of one execution attempt, committed wholly or rolled back wholly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecution {
    pub path: Path,
    pub committed_amount: u128,
    pub realized_output: u128,
    /// Output minus input minus loan fee
    pub realized_profit: i128,
    pub gas_used: u64,
    pub outcome: TxOutcome,
    pub block_number: u64,
    pub loan: Option<LoanTerms>,
}

impl TradeExecution {
    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, TxOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(n: u64) -> TokenAddress {
        TokenAddress::from_low_u64(n)
    }

    fn dex(n: u64) -> DexAddress {
        DexAddress::from_low_u64(n)
    }

    #[test]
    fn test_structure_requires_cycle() {
        let err = check_structure(&[token(1), token(2), token(3)], &[dex(1), dex(2)], 100);
        assert!(matches!(err, Err(ArbitrageError::InvalidPath(_))));
        assert!(check_structure(&[token(1), token(2), token(1)], &[dex(1), dex(2)], 100).is_ok());
    }

    #[test]
    fn test_structure_rejects_mismatched_lengths_and_empty_paths() {
        assert!(check_structure(&[token(1), token(2), token(1)], &[dex(1)], 100).is_err());
        assert!(check_structure(&[token(1)], &[], 100).is_err());
        assert!(check_structure(&[], &[], 100).is_err());
        assert!(check_structure(&[token(1), token(2), token(1)], &[dex(1), dex(2)], 0).is_err());
    }

    #[test]
    fn test_structure_enforces_hop_ceiling() {
        let tokens = vec![token(1), token(2), token(3), token(4), token(5), token(1)];
        let dexes = vec![dex(1); 5];
        assert!(check_structure(&tokens, &dexes, 1).is_err());
    }

    #[test]
    fn test_decoded_paths_are_checked() {
        let path = Path::new(vec![token(1), token(2), token(1)], vec![dex(1), dex(2)], 180_000, 500, 200, 7)
            .unwrap()
            .with_flash_loan(true);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<Path>(&json).unwrap(), path);

        let empty = r#"{"tokens":[],"dexes":[],"total_gas_estimate":0,"expected_profit":0,"gas_cost":0,"use_flash_loan":false,"block_number":1}"#;
        let err = serde_json::from_str::<Path>(empty).unwrap_err();
        assert!(err.to_string().contains("no hops"));

        let open = serde_json::json!({
            "tokens": [token(1), token(2)],
            "dexes": [dex(1)],
            "total_gas_estimate": 90_000,
            "expected_profit": 1,
            "gas_cost": 0,
            "block_number": 1
        });
        assert!(serde_json::from_value::<Path>(open).is_err());
    }

    #[test]
    fn test_net_profit_subtracts_gas() {
        let path = Path::new(vec![token(1), token(2), token(1)], vec![dex(1), dex(2)], 180_000, 500, 200, 7)
            .unwrap();
        assert_eq!(path.net_profit(), 300);
        assert_eq!(path.hops(), 2);
        assert!(!path.use_flash_loan());
        assert!(path.clone().with_flash_loan(true).use_flash_loan());
    }
}
