//! Token precision handling
//!
//! DEX token amounts are kept in native base units everywhere in the core.
//! The only place amounts from different tokens are compared directly is a
//! policy threshold (for example the minimum pool liquidity), and those
//! comparisons go through [`TokenInfo::normalize`] into 18-decimal units.
//!
//! ### Native precision by token
//! - **WETH**: 18 decimal places (`1 WETH = 1_000_000_000_000_000_000 wei`)
//! - **USDC**: 6 decimal places (`1 USDC = 1_000_000 units`)
//! - **WBTC**: 8 decimal places

use crate::common::identifiers::TokenAddress;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Scale used when amounts of different tokens must be compared
pub const NORMALIZED_DECIMALS: u8 = 18;

/// Token metadata supplied by the configuration layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: TokenAddress,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(address: TokenAddress, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    /// One whole token in base units
    pub fn unit(&self) -> u128 {
        10u128.saturating_pow(self.decimals as u32)
    }

    /// Convert a base-unit amount to 18-decimal units (saturating)
    pub fn normalize(&self, amount: u128) -> u128 {
        normalize_amount(amount, self.decimals)
    }

    /// Human-readable amount for log lines
    pub fn display_amount(&self, amount: u128) -> String {
        match i128::try_from(amount)
            .ok()
            .and_then(|raw| Decimal::try_from_i128_with_scale(raw, self.decimals.min(28) as u32).ok())
        {
            Some(value) => format!("{} {}", value.normalize(), self.symbol),
            None => format!("{} (raw) {}", amount, self.symbol),
        }
    }
}

/// Convert `amount` with `decimals` into 18-decimal units
///
/// Tokens with more than 18 decimals are scaled down (truncating).
pub fn normalize_amount(amount: u128, decimals: u8) -> u128 {
    if decimals <= NORMALIZED_DECIMALS {
        let factor = 10u128.pow((NORMALIZED_DECIMALS - decimals) as u32);
        amount.saturating_mul(factor)
    } else {
        amount / 10u128.saturating_pow((decimals - NORMALIZED_DECIMALS) as u32)
    }
}
