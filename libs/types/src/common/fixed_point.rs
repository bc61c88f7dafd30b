//! Fixed-point oracle prices with explicit decimals
//!
//! Oracle answers arrive as scaled integers whose scale differs per feed
//! (Chainlink USD feeds use 8 decimals, ETH-denominated feeds use 18). Mixing
//! them is the most common unit bug in this domain, so `OraclePrice` never
//! assumes a scale: every operation reads `decimals` from both operands and
//! rescales explicitly.
//!
//! ## Design Principles
//!
//! - **No Precision Loss**: integer storage, checked arithmetic
//! - **Explicit Orientation**: `price(A/B)` is "units of B per one A"; inversion
//!   and composition are separate, named operations
//! - **Clear Boundaries**: conversion to `Decimal` only for comparisons/display

use crate::common::errors::FixedPointError;
use ethers_core::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest power of ten that fits comfortably in u128 arithmetic
pub const MAX_PRICE_DECIMALS: u8 = 36;

/// Maximum scale representable by `rust_decimal`
const MAX_DECIMAL_SCALE: u8 = 28;

fn pow10(decimals: u8) -> Result<u128, FixedPointError> {
    if decimals > MAX_PRICE_DECIMALS {
        return Err(FixedPointError::UnsupportedDecimals {
            decimals,
            max: MAX_PRICE_DECIMALS,
        });
    }
    Ok(10u128.pow(decimals as u32))
}

/// Price of one unit of a base asset expressed in a quote asset
///
/// `answer / 10^decimals` quote units per one base unit (whole tokens, not
/// base units; token decimals are applied separately by the consumer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OraclePrice {
    pub answer: u128,
    pub decimals: u8,
}

impl OraclePrice {
    pub const fn new(answer: u128, decimals: u8) -> Self {
        Self { answer, decimals }
    }

    /// Exactly one, at the given scale
    pub fn one(decimals: u8) -> Result<Self, FixedPointError> {
        Ok(Self::new(pow10(decimals)?, decimals))
    }

    pub fn is_zero(&self) -> bool {
        self.answer == 0
    }

    /// Re-express the same price at a different scale
    ///
    /// Scaling down truncates toward zero.
    pub fn rescale(self, decimals: u8) -> Result<Self, FixedPointError> {
        if decimals == self.decimals {
            return Ok(self);
        }
        let answer = if decimals > self.decimals {
            self.answer
                .checked_mul(pow10(decimals - self.decimals)?)
                .ok_or(FixedPointError::Overflow {
                    operation: "rescaling price up",
                })?
        } else {
            self.answer / pow10(self.decimals - decimals)?
        };
        Ok(Self::new(answer, decimals))
    }

    /// Compose `self = price(A/B)` with `next = price(B/C)` into `price(A/C)`
    ///
    /// The result keeps `self.decimals`. The product of two 18-decimal
    /// answers exceeds u128, so it is formed in 256 bits.
    pub fn compose(self, next: OraclePrice) -> Result<Self, FixedPointError> {
        let product = U256::from(self.answer) * U256::from(next.answer);
        let composed = product / U256::from(pow10(next.decimals)?);
        if composed > U256::from(u128::MAX) {
            return Err(FixedPointError::Overflow {
                operation: "composing prices",
            });
        }
        Ok(Self::new(composed.as_u128(), self.decimals))
    }

    /// Turn `price(A/B)` into `price(B/A)` at the requested scale
    pub fn invert(self, decimals: u8) -> Result<Self, FixedPointError> {
        if self.answer == 0 {
            return Err(FixedPointError::DivisionByZero);
        }
        let total = self
            .decimals
            .checked_add(decimals)
            .filter(|total| *total <= MAX_PRICE_DECIMALS)
            .ok_or(FixedPointError::UnsupportedDecimals {
                decimals: self.decimals.saturating_add(decimals),
                max: MAX_PRICE_DECIMALS,
            })?;
        Ok(Self::new(pow10(total)? / self.answer, decimals))
    }

    /// Convert for comparisons and display
    pub fn to_decimal(self) -> Result<Decimal, FixedPointError> {
        let price = if self.decimals > MAX_DECIMAL_SCALE {
            self.rescale(MAX_DECIMAL_SCALE)?
        } else {
            self
        };
        let mantissa = i128::try_from(price.answer).map_err(|_| {
            FixedPointError::NotRepresentable {
                value: price.answer,
            }
        })?;
        Decimal::try_from_i128_with_scale(mantissa, price.decimals as u32).map_err(|_| {
            FixedPointError::NotRepresentable {
                value: price.answer,
            }
        })
    }

    /// Absolute deviation from `reference` in basis points of `reference`
    pub fn deviation_bps(self, reference: OraclePrice) -> Result<u32, FixedPointError> {
        let scale = self.decimals.max(reference.decimals);
        let ours = self.rescale(scale)?.answer;
        let theirs = reference.rescale(scale)?.answer;
        if theirs == 0 {
            return Err(FixedPointError::DivisionByZero);
        }
        let diff = ours.abs_diff(theirs);
        let bps = diff
            .checked_mul(10_000)
            .ok_or(FixedPointError::Overflow {
                operation: "computing deviation",
            })?
            / theirs;
        Ok(u32::try_from(bps).unwrap_or(u32::MAX))
    }
}

impl fmt::Display for OraclePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{}e-{}", self.answer, self.decimals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rescale_between_feed_formats() {
        let usd_8 = OraclePrice::new(3_000_00000000, 8);
        let usd_18 = usd_8.rescale(18).unwrap();
        assert_eq!(usd_18.answer, 3_000 * 10u128.pow(18));
        assert_eq!(usd_18.rescale(8).unwrap(), usd_8);
    }

    #[test]
    fn test_compose_multiplies_consistently_oriented_prices() {
        // WETH/USDC = 3000, USDC/DAI = 0.999 → WETH/DAI = 2997
        let weth_usdc = OraclePrice::new(3_000_00000000, 8);
        let usdc_dai = OraclePrice::new(999_000_000_000_000_000, 18);
        let weth_dai = weth_usdc.compose(usdc_dai).unwrap();
        assert_eq!(weth_dai.decimals, 8);
        assert_eq!(weth_dai.to_decimal().unwrap(), dec!(2997));
    }

    #[test]
    fn test_compose_eighteen_decimal_legs() {
        // WETH/DAI = 3000, DAI/USDC = 1, both at 18 decimals
        let weth_dai = OraclePrice::new(3_000 * 10u128.pow(18), 18);
        let dai_usdc = OraclePrice::new(10u128.pow(18), 18);
        let weth_usdc = weth_dai.compose(dai_usdc).unwrap();
        assert_eq!(weth_usdc, OraclePrice::new(3_000 * 10u128.pow(18), 18));

        let huge = OraclePrice::new(u128::MAX, 18);
        assert!(matches!(
            huge.compose(OraclePrice::new(2 * 10u128.pow(18), 18)),
            Err(FixedPointError::Overflow { .. })
        ));
    }

    #[test]
    fn test_invert() {
        let weth_usdc = OraclePrice::new(2_000_00000000, 8);
        let usdc_weth = weth_usdc.invert(18).unwrap();
        assert_eq!(usdc_weth.to_decimal().unwrap(), dec!(0.0005));
        assert_eq!(
            OraclePrice::new(0, 8).invert(8),
            Err(FixedPointError::DivisionByZero)
        );
    }

    #[test]
    fn test_deviation_bps_across_scales() {
        let dex = OraclePrice::new(3_030 * 10u128.pow(18), 18);
        let oracle = OraclePrice::new(3_000_00000000, 8);
        assert_eq!(dex.deviation_bps(oracle).unwrap(), 100);
    }

    #[test]
    fn test_unsupported_decimals() {
        assert!(matches!(
            OraclePrice::one(40),
            Err(FixedPointError::UnsupportedDecimals { .. })
        ));
    }
}
