//! Protocol dispatch for heterogeneous DEX pools
//!
//! Each registered DEX carries a [`DexProtocol`] tag and each pool snapshot a
//! matching [`PoolState`] variant. Quoting dispatches once on the variant, so
//! every protocol family produces the same [`SwapOutcome`] shape.

use crate::error::{AmmError, AmmResult};
use crate::full_math::shortfall_bps;
use crate::v2_math::{V2Math, V2PoolState};
use crate::v3_math::{V3Math, V3PoolState};
use ethers_core::types::U512;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gas for a single constant-product swap hop
pub const CONSTANT_PRODUCT_SWAP_GAS: u64 = 90_000;
/// Gas for a single concentrated-liquidity swap hop that stays in range
pub const CONCENTRATED_LIQUIDITY_SWAP_GAS: u64 = 130_000;
/// Extra gas for every initialized tick crossed
pub const GAS_PER_TICK_CROSSED: u64 = 25_000;

/// AMM family of a DEX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexProtocol {
    /// Uniswap V2 family (`x*y=k`)
    ConstantProduct,
    /// Uniswap V3 family (ticks + sqrt price)
    ConcentratedLiquidity,
}

impl DexProtocol {
    pub fn base_swap_gas(&self) -> u64 {
        match self {
            DexProtocol::ConstantProduct => CONSTANT_PRODUCT_SWAP_GAS,
            DexProtocol::ConcentratedLiquidity => CONCENTRATED_LIQUIDITY_SWAP_GAS,
        }
    }

    /// Gas estimate for one hop that crossed `ticks_crossed` ticks
    pub fn swap_gas(&self, ticks_crossed: u32) -> u64 {
        match self {
            DexProtocol::ConstantProduct => self.base_swap_gas(),
            DexProtocol::ConcentratedLiquidity => {
                self.base_swap_gas() + GAS_PER_TICK_CROSSED * ticks_crossed as u64
            }
        }
    }
}

impl fmt::Display for DexProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DexProtocol::ConstantProduct => write!(f, "constant-product"),
            DexProtocol::ConcentratedLiquidity => write!(f, "concentrated-liquidity"),
        }
    }
}

/// Instantaneous price as an exact ratio of output base units per input base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotPrice {
    pub numerator: U512,
    pub denominator: U512,
}

impl SpotPrice {
    /// `numerator * 10^mul_exp10 / (denominator * 10^div_exp10)`
    ///
    /// Callers use the exponents to fold token decimals and the target
    /// fixed-point scale into one integer division.
    pub fn scaled(&self, mul_exp10: u32, div_exp10: u32) -> AmmResult<u128> {
        let numerator = self
            .numerator
            .checked_mul(U512::exp10(mul_exp10 as usize))
            .ok_or(AmmError::Overflow("spot price scaling"))?;
        let denominator = self
            .denominator
            .checked_mul(U512::exp10(div_exp10 as usize))
            .ok_or(AmmError::Overflow("spot price scaling"))?;
        if denominator.is_zero() {
            return Err(AmmError::InsufficientLiquidity("empty pool has no price".to_string()));
        }
        let value = numerator / denominator;
        if value > U512::from(u128::MAX) {
            return Err(AmmError::Overflow("spot price"));
        }
        Ok(value.low_u128())
    }
}

/// Outcome of an exact-input swap against a pool snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_out: u128,
    pub price_impact_bps: u32,
    /// Output-token depth before the trade (reserve or virtual reserve)
    pub available_liquidity: u128,
    pub ticks_crossed: u32,
    /// Pool state after the swap settles
    pub post_state: PoolState,
}

/// Pool snapshot for one (DEX, token pair), token0 < token1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    ConstantProduct(V2PoolState),
    ConcentratedLiquidity(V3PoolState),
}

impl PoolState {
    pub fn protocol(&self) -> DexProtocol {
        match self {
            PoolState::ConstantProduct(_) => DexProtocol::ConstantProduct,
            PoolState::ConcentratedLiquidity(_) => DexProtocol::ConcentratedLiquidity,
        }
    }

    pub fn has_liquidity(&self) -> bool {
        match self {
            PoolState::ConstantProduct(pool) => pool.has_liquidity(),
            PoolState::ConcentratedLiquidity(pool) => pool.has_liquidity(),
        }
    }

    /// Output base units per input base unit before any trade
    pub fn spot_price(&self, zero_for_one: bool) -> AmmResult<SpotPrice> {
        match self {
            PoolState::ConstantProduct(pool) => {
                let (reserve_in, reserve_out) = pool.oriented_reserves(zero_for_one);
                if reserve_in == 0 || reserve_out == 0 {
                    return Err(AmmError::InsufficientLiquidity("pool has zero reserves".to_string()));
                }
                Ok(SpotPrice {
                    numerator: U512::from(reserve_out),
                    denominator: U512::from(reserve_in),
                })
            }
            PoolState::ConcentratedLiquidity(pool) => {
                if pool.sqrt_price_x96.is_zero() {
                    return Err(AmmError::InvalidInput("zero sqrt price".to_string()));
                }
                // price(token1/token0) = sqrtP^2 / 2^192
                let price_x192 = pool.sqrt_price_x96.full_mul(pool.sqrt_price_x96);
                let q192 = U512::one() << 192;
                Ok(if zero_for_one {
                    SpotPrice {
                        numerator: price_x192,
                        denominator: q192,
                    }
                } else {
                    SpotPrice {
                        numerator: q192,
                        denominator: price_x192,
                    }
                })
            }
        }
    }

    /// Exact-input swap; never mutates `self`
    pub fn swap_exact_in(&self, amount_in: u128, zero_for_one: bool) -> AmmResult<SwapOutcome> {
        match self {
            PoolState::ConstantProduct(pool) => {
                let (reserve_in, reserve_out) = pool.oriented_reserves(zero_for_one);
                let amount_out =
                    V2Math::calculate_output_amount(amount_in, reserve_in, reserve_out, pool.fee_bps)?;
                let price_impact_bps =
                    V2Math::price_impact_bps(amount_in, amount_out, reserve_in, reserve_out, pool.fee_bps)?;
                Ok(SwapOutcome {
                    amount_out,
                    price_impact_bps,
                    available_liquidity: reserve_out,
                    ticks_crossed: 0,
                    post_state: PoolState::ConstantProduct(pool.after_swap(
                        amount_in,
                        amount_out,
                        zero_for_one,
                    )?),
                })
            }
            PoolState::ConcentratedLiquidity(pool) => {
                let result = V3Math::calculate_output_amount(amount_in, pool, zero_for_one)?;
                let spot = self.spot_price(zero_for_one)?;
                // execution / spot = (out / in) / (num / den)
                let price_impact_bps = shortfall_bps(
                    U512::from(result.amount_out) * spot.denominator,
                    U512::from(result.amount_in_after_fees) * spot.numerator,
                );
                let post_state = V3PoolState {
                    sqrt_price_x96: result.sqrt_price_x96,
                    liquidity: result.liquidity,
                    current_tick: result.tick,
                    ..pool.clone()
                };
                Ok(SwapOutcome {
                    amount_out: result.amount_out,
                    price_impact_bps,
                    available_liquidity: pool.virtual_output_reserve(zero_for_one)?,
                    ticks_crossed: result.ticks_crossed,
                    post_state: PoolState::ConcentratedLiquidity(post_state),
                })
            }
        }
    }
}
