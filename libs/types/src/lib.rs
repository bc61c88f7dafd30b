//! # Torq Arbitrage Types
//!
//! Shared type system for the multi-path arbitrage core: typed 20-byte
//! addresses, token metadata, and fixed-point oracle prices.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: token amounts stay in native base units (`u128`)
//! - **Explicit Decimals**: every price carries its own `decimals` field, so a
//!   6-decimal USDC quote can never be mistaken for an 18-decimal WETH quote
//! - **Type Safety**: distinct address wrappers prevent passing a DEX address
//!   where a token address is expected
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{OraclePrice, TokenAddress, TokenInfo};
//!
//! let usdc: TokenAddress = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().unwrap();
//! let info = TokenInfo::new(usdc, "USDC", 6);
//! assert_eq!(info.normalize(1_000_000), 1_000_000_000_000_000_000);
//!
//! // 3000.00000000 USDC per WETH with 8 explicit decimals
//! let price = OraclePrice::new(300_000_000_000, 8);
//! assert_eq!(price.decimals, 8);
//! ```

#[cfg(feature = "common")]
pub mod common;

#[cfg(feature = "common")]
pub mod precision;

#[cfg(feature = "common")]
pub use common::errors::{AddressParseError, FixedPointError};
#[cfg(feature = "common")]
pub use common::fixed_point::OraclePrice;
#[cfg(feature = "common")]
pub use common::identifiers::{AccountAddress, DexAddress, OracleAddress, TokenAddress};
#[cfg(feature = "common")]
pub use precision::{TokenInfo, NORMALIZED_DECIMALS};

#[cfg(feature = "common")]
pub use rust_decimal::Decimal;
