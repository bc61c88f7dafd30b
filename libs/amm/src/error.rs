//! AMM math error types

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    /// Pool cannot fill the trade (zero reserves, no in-range liquidity, ticks exhausted)
    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
}

pub type AmmResult<T> = Result<T, AmmError>;
