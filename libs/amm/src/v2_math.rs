//! Uniswap V2 AMM math with exact integer calculations
//!
//! Reproduces `UniswapV2Library.getAmountOut/getAmountIn` bit for bit, so a
//! quote computed here equals what the pair contract would pay out.

use crate::error::{AmmError, AmmResult};
use crate::full_math::{mul_div, shortfall_bps, u256_to_u128};
use crate::BPS_DENOMINATOR;
use ethers_core::types::{U256, U512};
use serde::{Deserialize, Serialize};

/// Pool reserves and fee structure for V2 AMMs, ordered by token address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2PoolState {
    pub reserve0: u128,
    pub reserve1: u128,
    pub fee_bps: u32, // Fee in basis points (30 = 0.3%)
}

impl V2PoolState {
    pub fn new(reserve0: u128, reserve1: u128, fee_bps: u32) -> Self {
        Self {
            reserve0,
            reserve1,
            fee_bps,
        }
    }

    /// (reserve_in, reserve_out) for the given direction
    pub fn oriented_reserves(&self, zero_for_one: bool) -> (u128, u128) {
        if zero_for_one {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    pub fn has_liquidity(&self) -> bool {
        self.reserve0 > 0 && self.reserve1 > 0
    }

    /// Reserves after an exact-input swap has settled
    pub fn after_swap(&self, amount_in: u128, amount_out: u128, zero_for_one: bool) -> AmmResult<Self> {
        let (reserve_in, reserve_out) = self.oriented_reserves(zero_for_one);
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(AmmError::Overflow("v2 reserve update"))?;
        let new_out = reserve_out
            .checked_sub(amount_out)
            .ok_or_else(|| AmmError::InsufficientLiquidity("output exceeds reserve".to_string()))?;
        Ok(if zero_for_one {
            Self::new(new_in, new_out, self.fee_bps)
        } else {
            Self::new(new_out, new_in, self.fee_bps)
        })
    }
}

/// V2 AMM math functions with zero precision loss
pub struct V2Math;

impl V2Math {
    fn check_fee(fee_bps: u32) -> AmmResult<()> {
        if fee_bps >= BPS_DENOMINATOR {
            return Err(AmmError::InvalidInput(format!(
                "fee of {} bps leaves nothing to trade",
                fee_bps
            )));
        }
        Ok(())
    }

    /// Exact output amount for the `x*y=k` invariant with input-side fee
    ///
    /// `out = in*(10000-fee)*r_out / (r_in*10000 + in*(10000-fee))`, floored.
    pub fn calculate_output_amount(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> AmmResult<u128> {
        if amount_in == 0 {
            return Err(AmmError::InvalidInput("input amount must be positive".to_string()));
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::InsufficientLiquidity("pool has zero reserves".to_string()));
        }
        Self::check_fee(fee_bps)?;

        let amount_in_with_fee = U256::from(amount_in) * U256::from(BPS_DENOMINATOR - fee_bps);
        let denominator = U256::from(reserve_in) * U256::from(BPS_DENOMINATOR) + amount_in_with_fee;
        let out = mul_div(amount_in_with_fee, U256::from(reserve_out), denominator)?;
        u256_to_u128(out, "v2 output")
    }

    /// Minimum input that yields at least `amount_out` (rounded up like the router)
    pub fn calculate_input_amount(
        amount_out: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> AmmResult<u128> {
        if amount_out == 0 {
            return Err(AmmError::InvalidInput("output amount must be positive".to_string()));
        }
        if reserve_in == 0 || amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity(
                "requested output exceeds reserves".to_string(),
            ));
        }
        Self::check_fee(fee_bps)?;

        let numerator = U256::from(reserve_in) * U256::from(amount_out);
        let denominator = U256::from(reserve_out - amount_out) * U256::from(BPS_DENOMINATOR - fee_bps);
        let amount_in = mul_div(numerator, U256::from(BPS_DENOMINATOR), denominator)? + U256::one();
        u256_to_u128(amount_in, "v2 input")
    }

    /// Price impact in basis points: execution price of the post-fee input
    /// against the pre-trade spot price `reserve_out / reserve_in`
    pub fn price_impact_bps(
        amount_in: u128,
        amount_out: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> AmmResult<u32> {
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::InsufficientLiquidity("pool has zero reserves".to_string()));
        }
        Self::check_fee(fee_bps)?;
        let effective_in =
            U512::from(amount_in) * U512::from(BPS_DENOMINATOR - fee_bps) / U512::from(BPS_DENOMINATOR);
        let numerator = U512::from(amount_out) * U512::from(reserve_in);
        let denominator = effective_in * U512::from(reserve_out);
        Ok(shortfall_bps(numerator, denominator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_output_calculation() {
        // Classic router example: 1 unit in against 100/100 reserves
        let out = V2Math::calculate_output_amount(1_000, 100_000, 100_000, 30).unwrap();
        // 1000*9970*100000 / (100000*10000 + 1000*9970) = 987.1...
        assert_eq!(out, 987);
    }

    #[test]
    fn test_input_amount_inverts_output() {
        let reserve_in = 5_000_000_000_000u128;
        let reserve_out = 2_000_000_000_000_000_000_000u128;
        let out = V2Math::calculate_output_amount(1_000_000_000, reserve_in, reserve_out, 30).unwrap();
        let needed = V2Math::calculate_input_amount(out, reserve_in, reserve_out, 30).unwrap();
        assert!(needed <= 1_000_000_000);
        let out_again = V2Math::calculate_output_amount(needed, reserve_in, reserve_out, 30).unwrap();
        assert!(out_again >= out);
    }

    #[test]
    fn test_zero_reserves_is_insufficient_liquidity() {
        assert!(matches!(
            V2Math::calculate_output_amount(1_000, 0, 1_000, 30),
            Err(AmmError::InsufficientLiquidity(_))
        ));
        assert!(matches!(
            V2Math::calculate_output_amount(1_000, 1_000, 0, 30),
            Err(AmmError::InsufficientLiquidity(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            V2Math::calculate_output_amount(0, 1_000, 1_000, 30),
            Err(AmmError::InvalidInput(_))
        ));
        assert!(matches!(
            V2Math::calculate_output_amount(10, 1_000, 1_000, 10_000),
            Err(AmmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_price_impact() {
        let reserve = 1_000_000_000_000u128;
        let small = V2Math::calculate_output_amount(1_000_000, reserve, reserve, 30).unwrap();
        let large = V2Math::calculate_output_amount(100_000_000_000, reserve, reserve, 30).unwrap();

        let small_impact = V2Math::price_impact_bps(1_000_000, small, reserve, reserve, 30).unwrap();
        let large_impact =
            V2Math::price_impact_bps(100_000_000_000, large, reserve, reserve, 30).unwrap();

        assert!(small_impact <= 1);
        // ~10% of the pool moves the price by roughly 9%
        assert!(large_impact > 800 && large_impact < 1000, "impact {}", large_impact);
    }

    #[test]
    fn test_after_swap_preserves_orientation() {
        let pool = V2PoolState::new(1_000, 2_000, 30);
        let out = V2Math::calculate_output_amount(100, 2_000, 1_000, 30).unwrap();
        let post = pool.after_swap(100, out, false).unwrap();
        assert_eq!(post.reserve1, 2_100);
        assert_eq!(post.reserve0, 1_000 - out);
        assert!(post.reserve0 * post.reserve1 >= 1_000 * 2_000);
    }
}
