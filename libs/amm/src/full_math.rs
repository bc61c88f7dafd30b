//! 512-bit intermediate multiply/divide helpers
//!
//! Mirrors the pool contracts' `FullMath`: `a * b / denominator` never
//! overflows in the intermediate product, only in the final result.

use crate::error::{AmmError, AmmResult};
use ethers_core::types::{U256, U512};

/// 2^96, the fixed-point scale of `sqrtPriceX96`
pub fn q96() -> U256 {
    U256::one() << 96
}

pub fn u512_to_u256(value: U512, context: &'static str) -> AmmResult<U256> {
    U256::try_from(value).map_err(|_| AmmError::Overflow(context))
}

pub fn u256_to_u128(value: U256, context: &'static str) -> AmmResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::Overflow(context));
    }
    Ok(value.as_u128())
}

/// floor(a * b / denominator)
pub fn mul_div(a: U256, b: U256, denominator: U256) -> AmmResult<U256> {
    if denominator.is_zero() {
        return Err(AmmError::InvalidInput("mul_div by zero".to_string()));
    }
    let product = a.full_mul(b);
    u512_to_u256(product / U512::from(denominator), "mul_div")
}

/// ceil(a * b / denominator)
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> AmmResult<U256> {
    if denominator.is_zero() {
        return Err(AmmError::InvalidInput("mul_div by zero".to_string()));
    }
    let product = a.full_mul(b);
    let denominator = U512::from(denominator);
    let mut result = product / denominator;
    if !(product % denominator).is_zero() {
        result += U512::one();
    }
    u512_to_u256(result, "mul_div_rounding_up")
}

/// ceil(a / b)
pub fn div_rounding_up(a: U256, b: U256) -> AmmResult<U256> {
    if b.is_zero() {
        return Err(AmmError::InvalidInput("division by zero".to_string()));
    }
    let quotient = a / b;
    if (a % b).is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::one())
    }
}

/// Basis points of shortfall of `numerator / denominator` below 1, clamped to [0, 10000]
///
/// Used for price impact: the ratio is execution price over spot price.
pub fn shortfall_bps(numerator: U512, denominator: U512) -> u32 {
    if denominator.is_zero() {
        return crate::BPS_DENOMINATOR;
    }
    let ratio_bps = numerator * U512::from(crate::BPS_DENOMINATOR) / denominator;
    let bps = U512::from(crate::BPS_DENOMINATOR);
    if ratio_bps >= bps {
        0
    } else {
        (bps - ratio_bps).low_u32()
    }
}
