//! Error taxonomy for the arbitrage core
//!
//! Observers surface these errors verbatim through [`ArbitrageError::code`],
//! so operators can tell transient market conditions (stale oracle, thin
//! pools) apart from structural problems (unsupported pair, paused system).

use thiserror::Error;
use torq_amm::AmmError;
use types::{AccountAddress, DexAddress, FixedPointError, TokenAddress};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArbitrageError {
    #[error("DEX {dex} does not support pair {token_a}/{token_b}")]
    UnsupportedPair {
        dex: DexAddress,
        token_a: TokenAddress,
        token_b: TokenAddress,
    },

    #[error("Price for {base}/{quote} is {age_secs}s old (threshold {threshold_secs}s)")]
    StalePrice {
        base: TokenAddress,
        quote: TokenAddress,
        age_secs: u64,
        threshold_secs: u64,
    },

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Price impact {impact_bps} bps exceeds maximum {max_bps} bps")]
    ExcessivePriceImpact { impact_bps: u32, max_bps: u32 },

    #[error("Path gas {gas} exceeds budget {max_gas}")]
    ExcessiveGas { gas: u64, max_gas: u64 },

    #[error("No profitable path found: {0}")]
    NoPathFound(String),

    #[error("Expected profit {expected_profit} does not cover costs {costs}")]
    UnprofitableAfterGas { expected_profit: i128, costs: u128 },

    #[error("Realized output {realized} below required {required}")]
    ProfitShortfall { realized: u128, required: u128 },

    #[error("System is paused")]
    SystemPaused,

    #[error("Circuit breaker tripped after {failures} consecutive failures")]
    CircuitBreakerTripped { failures: u32 },

    #[error("Caller {0} is not authorized")]
    Unauthorized(AccountAddress),

    #[error("DEX {0} is already registered")]
    AlreadyRegistered(DexAddress),

    #[error("Unknown DEX {0}")]
    UnknownDex(DexAddress),

    #[error("Unknown token {0}")]
    UnknownToken(TokenAddress),

    #[error("No price feed for {base}/{quote}")]
    NoPriceFeed {
        base: TokenAddress,
        quote: TokenAddress,
    },

    #[error("Flash loan repayment of {owed} not covered by output {available}")]
    RepaymentFailed { owed: u128, available: u128 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Trade size {amount} exceeds maximum {max}")]
    ExceedsMaxTradeSize { amount: u128, max: u128 },

    #[error("Balance of {token} is {available}, needed {needed}")]
    InsufficientBalance {
        token: TokenAddress,
        needed: u128,
        available: u128,
    },

    #[error("Withdrawal {id} is locked for another {remaining_secs}s")]
    WithdrawalLocked { id: u64, remaining_secs: u64 },

    #[error("Unknown withdrawal request {0}")]
    UnknownWithdrawal(u64),

    #[error("Block height kept changing during search ({restarts} restarts)")]
    BlockHeightChanged { restarts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("AMM math error: {0}")]
    Amm(AmmError),

    #[error("Price arithmetic error: {0}")]
    Price(#[from] FixedPointError),
}

impl From<AmmError> for ArbitrageError {
    fn from(err: AmmError) -> Self {
        match err {
            AmmError::InsufficientLiquidity(reason) => ArbitrageError::InsufficientLiquidity(reason),
            other => ArbitrageError::Amm(other),
        }
    }
}

impl ArbitrageError {
    /// Stable machine-readable identifier
    pub fn code(&self) -> &'static str {
        match self {
            ArbitrageError::UnsupportedPair { .. } => "UNSUPPORTED_PAIR",
            ArbitrageError::StalePrice { .. } => "STALE_PRICE",
            ArbitrageError::InsufficientLiquidity(_) => "INSUFFICIENT_LIQUIDITY",
            ArbitrageError::ExcessivePriceImpact { .. } => "EXCESSIVE_PRICE_IMPACT",
            ArbitrageError::ExcessiveGas { .. } => "EXCESSIVE_GAS",
            ArbitrageError::NoPathFound(_) => "NO_PATH_FOUND",
            ArbitrageError::UnprofitableAfterGas { .. } => "UNPROFITABLE_AFTER_GAS",
            ArbitrageError::ProfitShortfall { .. } => "PROFIT_SHORTFALL",
            ArbitrageError::SystemPaused => "SYSTEM_PAUSED",
            ArbitrageError::CircuitBreakerTripped { .. } => "CIRCUIT_BREAKER_TRIPPED",
            ArbitrageError::Unauthorized(_) => "UNAUTHORIZED",
            ArbitrageError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            ArbitrageError::UnknownDex(_) => "UNKNOWN_DEX",
            ArbitrageError::UnknownToken(_) => "UNKNOWN_TOKEN",
            ArbitrageError::NoPriceFeed { .. } => "NO_PRICE_FEED",
            ArbitrageError::RepaymentFailed { .. } => "REPAYMENT_FAILED",
            ArbitrageError::InvalidPath(_) => "INVALID_PATH",
            ArbitrageError::ExceedsMaxTradeSize { .. } => "EXCEEDS_MAX_TRADE_SIZE",
            ArbitrageError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ArbitrageError::WithdrawalLocked { .. } => "WITHDRAWAL_LOCKED",
            ArbitrageError::UnknownWithdrawal(_) => "UNKNOWN_WITHDRAWAL",
            ArbitrageError::BlockHeightChanged { .. } => "BLOCK_HEIGHT_CHANGED",
            ArbitrageError::InvalidConfig(_) => "INVALID_CONFIG",
            ArbitrageError::Amm(_) => "AMM_MATH",
            ArbitrageError::Price(_) => "PRICE_ARITHMETIC",
        }
    }

    /// Market-state failures that may clear up on a later block
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArbitrageError::StalePrice { .. }
                | ArbitrageError::InsufficientLiquidity(_)
                | ArbitrageError::ExcessivePriceImpact { .. }
                | ArbitrageError::ExcessiveGas { .. }
                | ArbitrageError::NoPathFound(_)
                | ArbitrageError::UnprofitableAfterGas { .. }
                | ArbitrageError::ProfitShortfall { .. }
                | ArbitrageError::RepaymentFailed { .. }
                | ArbitrageError::BlockHeightChanged { .. }
                | ArbitrageError::WithdrawalLocked { .. }
        )
    }
}

pub type ArbitrageResult<T> = Result<T, ArbitrageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amm_liquidity_maps_to_taxonomy() {
        let err: ArbitrageError = AmmError::InsufficientLiquidity("empty".to_string()).into();
        assert_eq!(err.code(), "INSUFFICIENT_LIQUIDITY");
        assert!(err.is_transient());

        let err: ArbitrageError = AmmError::Overflow("mul").into();
        assert_eq!(err.code(), "AMM_MATH");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_structural_failures_are_not_transient() {
        assert!(!ArbitrageError::SystemPaused.is_transient());
        assert!(!ArbitrageError::UnknownDex(DexAddress::ZERO).is_transient());
        assert!(!ArbitrageError::UnsupportedPair {
            dex: DexAddress::ZERO,
            token_a: TokenAddress::ZERO,
            token_b: TokenAddress::ZERO,
        }
        .is_transient());
    }
}
