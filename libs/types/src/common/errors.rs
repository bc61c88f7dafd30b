//! Error types for fixed-point arithmetic and address parsing
//!
//! Covers overflow and unit-mismatch failures in oracle price arithmetic, as
//! well as malformed hex addresses coming from configuration files.

use thiserror::Error;

/// Errors that can occur while parsing a 20-byte hex address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    /// Input did not contain exactly 40 hex characters after the optional `0x`
    #[error("Invalid address length: expected 40 hex characters, got {len}")]
    InvalidLength { len: usize },

    /// Input contained non-hex characters
    #[error("Invalid hex in address '{input}'")]
    InvalidHex { input: String },
}

/// Errors that can occur during fixed-point price arithmetic
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    /// Intermediate value exceeded the representable range
    #[error("Overflow while {operation}")]
    Overflow { operation: &'static str },

    /// Division by a zero price
    #[error("Division by zero in fixed-point arithmetic")]
    DivisionByZero,

    /// Requested more decimals than the representation supports
    #[error("Unsupported decimals: {decimals} (max {max})")]
    UnsupportedDecimals { decimals: u8, max: u8 },

    /// Value could not be converted to a Decimal
    #[error("Value {value} cannot be represented as a Decimal")]
    NotRepresentable { value: u128 },
}
