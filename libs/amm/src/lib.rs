//! # Torq AMM Library - Exact DEX Swap Mathematics
//!
//! ## Purpose
//!
//! Mathematical foundation for quoting swaps across heterogeneous DEX families.
//! Implements the exact integer formulas the pools themselves execute, so an
//! off-chain quote equals the on-chain result to the last base unit:
//!
//! - **Constant product** (Uniswap V2 family): `x*y=k` with input-side fee
//! - **Concentrated liquidity** (Uniswap V3 family): `SwapMath` steps across
//!   initialized ticks, updating active liquidity on every crossing
//!
//! ## Integration Points
//!
//! - **Input Sources**: Pool state snapshots (reserves, sqrt price, tick liquidity)
//! - **Output Destinations**: Quote manager, path validator, execution venue
//! - **Protocol Dispatch**: [`PoolState`] is a tagged variant dispatched once per DEX entry
//! - **Precision**: 256/512-bit integer arithmetic, no floating point
//!
//! ## Why tick crossing matters
//!
//! A single-range V3 calculation keeps the active liquidity constant for the
//! whole trade. Once the trade pushes the price past the next initialized tick
//! the real pool has less (or more) liquidity, and the single-range result
//! silently overstates output for larger trades. [`V3Math::calculate_output_amount`]
//! walks the tick map; [`V3Math::swap_within_range`] is kept for comparison.

pub mod error;
pub mod full_math;
pub mod optimal_size;
pub mod protocol;
pub mod v2_math;
pub mod v3_math;

pub use error::{AmmError, AmmResult};
pub use optimal_size::{OptimalPosition, OptimalSizeCalculator, SizingConfig};
pub use protocol::{DexProtocol, PoolState, SpotPrice, SwapOutcome};
pub use v2_math::{V2Math, V2PoolState};
pub use v3_math::{V3Math, V3PoolState, V3SwapResult};

/// Common numeric types for AMM calculations
pub use ethers_core::types::{U256, U512};

/// Basis-point denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u32 = 10_000;
