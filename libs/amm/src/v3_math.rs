//! Uniswap V3 tick mathematics for exact calculations
//!
//! Ports `TickMath`, `SqrtPriceMath` and `SwapMath` to 256-bit integers and
//! runs the pool's exact-input swap loop over an in-memory tick map. Every
//! time the price reaches an initialized tick, that tick's `liquidity_net` is
//! applied, so large trades see the liquidity that is really there.

use crate::error::{AmmError, AmmResult};
use crate::full_math::{div_rounding_up, mul_div, mul_div_rounding_up, q96, u256_to_u128};
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// V3 tick math constants
pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// Fee denominator: fees are expressed in hundredths of a basis point
pub const FEE_PIPS_DENOMINATOR: u32 = 1_000_000;

/// `get_sqrt_ratio_at_tick(MIN_TICK)`
pub fn min_sqrt_ratio() -> U256 {
    U256::from(4_295_128_739u64)
}

/// `get_sqrt_ratio_at_tick(MAX_TICK)`
pub fn max_sqrt_ratio() -> U256 {
    U256([0x5d951d5263988d26, 0xefd1fc6a50648849, 0xfffd8963, 0])
}

/// Per-bit multipliers: `sqrt(1.0001^-(2^i))` in Q128
const TICK_MULTIPLIERS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// V3 pool state with concentrated liquidity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V3PoolState {
    pub sqrt_price_x96: U256,
    /// Liquidity active at `current_tick`
    pub liquidity: u128,
    pub current_tick: i32,
    pub fee_pips: u32, // Fee in pips (3000 = 0.3%)
    pub tick_spacing: i32,
    /// Initialized ticks and their `liquidity_net`
    #[serde(default)]
    pub ticks: BTreeMap<i32, i128>,
}

impl V3PoolState {
    pub fn has_liquidity(&self) -> bool {
        self.liquidity > 0 || self.ticks.values().any(|net| *net != 0)
    }

    /// Next initialized tick in the swap direction, or the tick bound
    fn next_initialized_tick(&self, tick: i32, zero_for_one: bool) -> (i32, bool) {
        if zero_for_one {
            match self.ticks.range(..=tick).next_back() {
                Some((next, _)) => (*next, true),
                None => (MIN_TICK, false),
            }
        } else {
            match self.ticks.range(tick.saturating_add(1)..).next() {
                Some((next, _)) => (*next, true),
                None => (MAX_TICK, false),
            }
        }
    }

    /// Virtual reserve of the output token at the current price
    pub fn virtual_output_reserve(&self, zero_for_one: bool) -> AmmResult<u128> {
        if self.liquidity == 0 || self.sqrt_price_x96.is_zero() {
            return Ok(0);
        }
        let liquidity = U256::from(self.liquidity);
        let reserve = if zero_for_one {
            mul_div(liquidity, self.sqrt_price_x96, q96())?
        } else {
            mul_div(liquidity, q96(), self.sqrt_price_x96)?
        };
        Ok(u256_to_u128(reserve, "virtual reserve").unwrap_or(u128::MAX))
    }
}

/// Result of an exact-input V3 swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3SwapResult {
    pub amount_out: u128,
    /// Input consumed by the curve, fees excluded
    pub amount_in_after_fees: u128,
    pub fee_paid: u128,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    pub ticks_crossed: u32,
}

/// One `SwapMath.computeSwapStep` result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x96: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// V3 AMM math with tick-based calculations
pub struct V3Math;

impl V3Math {
    /// `sqrt(1.0001^tick) * 2^96`, rounded up
    pub fn get_sqrt_ratio_at_tick(tick: i32) -> AmmResult<U256> {
        let abs_tick = tick.unsigned_abs();
        if abs_tick > MAX_TICK as u32 {
            return Err(AmmError::InvalidInput(format!("tick {} out of range", tick)));
        }

        let mut ratio = if abs_tick & 0x1 != 0 {
            U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
        } else {
            U256::one() << 128
        };
        for (bit, multiplier) in TICK_MULTIPLIERS {
            if abs_tick & bit != 0 {
                ratio = (ratio * U256::from(multiplier)) >> 128;
            }
        }
        if tick > 0 {
            ratio = U256::MAX / ratio;
        }

        let remainder = ratio & U256::from(u32::MAX);
        let sqrt_price = ratio >> 32;
        Ok(if remainder.is_zero() {
            sqrt_price
        } else {
            sqrt_price + U256::one()
        })
    }

    /// Greatest tick whose sqrt ratio is <= `sqrt_price_x96`
    pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> AmmResult<i32> {
        if sqrt_price_x96 < min_sqrt_ratio() || sqrt_price_x96 >= max_sqrt_ratio() {
            return Err(AmmError::InvalidInput(format!(
                "sqrt price {} out of range",
                sqrt_price_x96
            )));
        }
        let (mut low, mut high) = (MIN_TICK, MAX_TICK);
        while low < high {
            // Upper midpoint so `low = mid` always makes progress
            let mid = low + (high - low + 1) / 2;
            if Self::get_sqrt_ratio_at_tick(mid)? <= sqrt_price_x96 {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        Ok(low)
    }

    /// Token0 between two prices: `L * 2^96 * (b - a) / (b * a)`
    pub fn get_amount0_delta(
        sqrt_ratio_a_x96: U256,
        sqrt_ratio_b_x96: U256,
        liquidity: u128,
        round_up: bool,
    ) -> AmmResult<U256> {
        let (lower, upper) = if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
            (sqrt_ratio_b_x96, sqrt_ratio_a_x96)
        } else {
            (sqrt_ratio_a_x96, sqrt_ratio_b_x96)
        };
        if lower.is_zero() {
            return Err(AmmError::InvalidInput("zero sqrt price".to_string()));
        }

        let numerator1 = U256::from(liquidity) << 96;
        let numerator2 = upper - lower;
        if round_up {
            div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower)
        } else {
            Ok(mul_div(numerator1, numerator2, upper)? / lower)
        }
    }

    /// Token1 between two prices: `L * (b - a) / 2^96`
    pub fn get_amount1_delta(
        sqrt_ratio_a_x96: U256,
        sqrt_ratio_b_x96: U256,
        liquidity: u128,
        round_up: bool,
    ) -> AmmResult<U256> {
        let diff = if sqrt_ratio_a_x96 > sqrt_ratio_b_x96 {
            sqrt_ratio_a_x96 - sqrt_ratio_b_x96
        } else {
            sqrt_ratio_b_x96 - sqrt_ratio_a_x96
        };
        if round_up {
            mul_div_rounding_up(U256::from(liquidity), diff, q96())
        } else {
            mul_div(U256::from(liquidity), diff, q96())
        }
    }

    /// Price after adding `amount` of token0 (rounds up, price moves down)
    fn next_sqrt_price_from_amount0(sqrt_price_x96: U256, liquidity: u128, amount: U256) -> AmmResult<U256> {
        if amount.is_zero() {
            return Ok(sqrt_price_x96);
        }
        let numerator1 = U256::from(liquidity) << 96;
        if let Some(product) = amount.checked_mul(sqrt_price_x96) {
            if let Some(denominator) = numerator1.checked_add(product) {
                return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator);
            }
        }
        let denominator = (numerator1 / sqrt_price_x96)
            .checked_add(amount)
            .ok_or(AmmError::Overflow("next sqrt price from amount0"))?;
        div_rounding_up(numerator1, denominator)
    }

    /// Price after adding `amount` of token1 (rounds down, price moves up)
    fn next_sqrt_price_from_amount1(sqrt_price_x96: U256, liquidity: u128, amount: U256) -> AmmResult<U256> {
        let max_u160 = (U256::one() << 160) - U256::one();
        let quotient = if amount <= max_u160 {
            (amount << 96) / U256::from(liquidity)
        } else {
            mul_div(amount, q96(), U256::from(liquidity))?
        };
        sqrt_price_x96
            .checked_add(quotient)
            .ok_or(AmmError::Overflow("next sqrt price from amount1"))
    }

    fn next_sqrt_price_from_input(
        sqrt_price_x96: U256,
        liquidity: u128,
        amount_in: U256,
        zero_for_one: bool,
    ) -> AmmResult<U256> {
        if sqrt_price_x96.is_zero() || liquidity == 0 {
            return Err(AmmError::InsufficientLiquidity("no active liquidity".to_string()));
        }
        if zero_for_one {
            Self::next_sqrt_price_from_amount0(sqrt_price_x96, liquidity, amount_in)
        } else {
            Self::next_sqrt_price_from_amount1(sqrt_price_x96, liquidity, amount_in)
        }
    }

    /// One exact-input swap step toward `sqrt_target_x96` at constant liquidity
    pub fn compute_swap_step(
        sqrt_current_x96: U256,
        sqrt_target_x96: U256,
        liquidity: u128,
        amount_remaining: U256,
        fee_pips: u32,
    ) -> AmmResult<SwapStep> {
        if fee_pips >= FEE_PIPS_DENOMINATOR {
            return Err(AmmError::InvalidInput(format!("fee of {} pips", fee_pips)));
        }
        let zero_for_one = sqrt_current_x96 >= sqrt_target_x96;
        let fee = U256::from(fee_pips);
        let fee_complement = U256::from(FEE_PIPS_DENOMINATOR - fee_pips);

        let amount_remaining_less_fee =
            mul_div(amount_remaining, fee_complement, U256::from(FEE_PIPS_DENOMINATOR))?;
        let amount_to_target = if zero_for_one {
            Self::get_amount0_delta(sqrt_target_x96, sqrt_current_x96, liquidity, true)?
        } else {
            Self::get_amount1_delta(sqrt_current_x96, sqrt_target_x96, liquidity, true)?
        };

        let sqrt_next_x96 = if amount_remaining_less_fee >= amount_to_target {
            sqrt_target_x96
        } else {
            Self::next_sqrt_price_from_input(
                sqrt_current_x96,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        };
        let reached_target = sqrt_next_x96 == sqrt_target_x96;

        let (amount_in, amount_out) = if zero_for_one {
            let amount_in = if reached_target {
                amount_to_target
            } else {
                Self::get_amount0_delta(sqrt_next_x96, sqrt_current_x96, liquidity, true)?
            };
            let amount_out = Self::get_amount1_delta(sqrt_next_x96, sqrt_current_x96, liquidity, false)?;
            (amount_in, amount_out)
        } else {
            let amount_in = if reached_target {
                amount_to_target
            } else {
                Self::get_amount1_delta(sqrt_current_x96, sqrt_next_x96, liquidity, true)?
            };
            let amount_out = Self::get_amount0_delta(sqrt_current_x96, sqrt_next_x96, liquidity, false)?;
            (amount_in, amount_out)
        };

        let fee_amount = if reached_target {
            mul_div_rounding_up(amount_in, fee, fee_complement)?
        } else {
            amount_remaining
                .checked_sub(amount_in)
                .ok_or(AmmError::Overflow("swap step fee"))?
        };

        Ok(SwapStep {
            sqrt_price_next_x96: sqrt_next_x96,
            amount_in,
            amount_out,
            fee_amount,
        })
    }

    fn apply_liquidity_net(liquidity: u128, net: i128) -> AmmResult<u128> {
        if net >= 0 {
            liquidity
                .checked_add(net as u128)
                .ok_or(AmmError::Overflow("liquidity add"))
        } else {
            liquidity
                .checked_sub(net.unsigned_abs())
                .ok_or_else(|| AmmError::InvalidInput("liquidity_net exceeds active liquidity".to_string()))
        }
    }

    /// Exact-input swap across initialized ticks
    ///
    /// Fails with `InsufficientLiquidity` when the tick map runs out of
    /// liquidity before the input is fully consumed.
    pub fn calculate_output_amount(
        amount_in: u128,
        pool: &V3PoolState,
        zero_for_one: bool,
    ) -> AmmResult<V3SwapResult> {
        if amount_in == 0 {
            return Err(AmmError::InvalidInput("input amount must be positive".to_string()));
        }
        if !pool.has_liquidity() {
            return Err(AmmError::InsufficientLiquidity("pool has zero liquidity".to_string()));
        }
        let price_limit = if zero_for_one {
            min_sqrt_ratio() + U256::one()
        } else {
            max_sqrt_ratio() - U256::one()
        };

        let mut remaining = U256::from(amount_in);
        let mut amount_out = U256::zero();
        let mut consumed = U256::zero();
        let mut fee_paid = U256::zero();
        let mut sqrt_price = pool.sqrt_price_x96;
        let mut tick = pool.current_tick;
        let mut liquidity = pool.liquidity;
        let mut ticks_crossed = 0u32;

        while !remaining.is_zero() && sqrt_price != price_limit {
            let (next_tick, initialized) = pool.next_initialized_tick(tick, zero_for_one);
            let next_tick = next_tick.clamp(MIN_TICK, MAX_TICK);
            let sqrt_next_tick = Self::get_sqrt_ratio_at_tick(next_tick)?;
            let target = if zero_for_one {
                sqrt_next_tick.max(price_limit)
            } else {
                sqrt_next_tick.min(price_limit)
            };

            let step_start = sqrt_price;
            let step = Self::compute_swap_step(sqrt_price, target, liquidity, remaining, pool.fee_pips)?;
            sqrt_price = step.sqrt_price_next_x96;
            let spent = step.amount_in + step.fee_amount;
            remaining = remaining
                .checked_sub(spent)
                .ok_or(AmmError::Overflow("swap remaining"))?;
            amount_out += step.amount_out;
            consumed += step.amount_in;
            fee_paid += step.fee_amount;

            if sqrt_price == sqrt_next_tick {
                if initialized {
                    let net = pool.ticks.get(&next_tick).copied().unwrap_or_default();
                    let net = if zero_for_one { -net } else { net };
                    liquidity = Self::apply_liquidity_net(liquidity, net)?;
                    ticks_crossed += 1;
                }
                tick = if zero_for_one { next_tick - 1 } else { next_tick };
            } else if sqrt_price != step_start {
                tick = Self::get_tick_at_sqrt_ratio(sqrt_price)?;
            }
        }

        if !remaining.is_zero() {
            return Err(AmmError::InsufficientLiquidity(format!(
                "initialized liquidity exhausted with {} input unfilled",
                remaining
            )));
        }

        Ok(V3SwapResult {
            amount_out: u256_to_u128(amount_out, "v3 output")?,
            amount_in_after_fees: u256_to_u128(consumed, "v3 input")?,
            fee_paid: u256_to_u128(fee_paid, "v3 fee")?,
            sqrt_price_x96: sqrt_price,
            tick,
            liquidity,
            ticks_crossed,
        })
    }

    /// Single-range swap that keeps the active liquidity for the whole trade
    ///
    /// Ignores initialized ticks. Only accurate while the trade stays inside
    /// the current range; beyond it the output is overstated.
    pub fn swap_within_range(
        amount_in: u128,
        pool: &V3PoolState,
        zero_for_one: bool,
    ) -> AmmResult<V3SwapResult> {
        if pool.liquidity == 0 {
            return Err(AmmError::InsufficientLiquidity("no liquidity in range".to_string()));
        }
        let price_limit = if zero_for_one {
            min_sqrt_ratio() + U256::one()
        } else {
            max_sqrt_ratio() - U256::one()
        };
        let step = Self::compute_swap_step(
            pool.sqrt_price_x96,
            price_limit,
            pool.liquidity,
            U256::from(amount_in),
            pool.fee_pips,
        )?;
        Ok(V3SwapResult {
            amount_out: u256_to_u128(step.amount_out, "v3 output")?,
            amount_in_after_fees: u256_to_u128(step.amount_in, "v3 input")?,
            fee_paid: u256_to_u128(step.fee_amount, "v3 fee")?,
            sqrt_price_x96: step.sqrt_price_next_x96,
            tick: Self::get_tick_at_sqrt_ratio(step.sqrt_price_next_x96)?,
            liquidity: pool.liquidity,
            ticks_crossed: 0,
        })
    }
}
