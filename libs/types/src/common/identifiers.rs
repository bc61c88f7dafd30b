//! Typed 20-byte address wrappers
//!
//! Tokens, DEXes, oracles and accounts are all 20-byte EVM addresses. Giving
//! each role its own wrapper turns "passed the pool where the token was
//! expected" into a compile error:
//!
//! ```rust
//! use types::{DexAddress, TokenAddress};
//!
//! fn quote(dex: DexAddress, token: TokenAddress) {}
//!
//! let dex = DexAddress::from_low_u64(1);
//! let token = TokenAddress::from_low_u64(2);
//! quote(dex, token);
//! // quote(token, dex); // ❌ Compile error!
//! ```
//!
//! All wrappers display and serialize as lowercase `0x`-prefixed hex so they
//! round-trip through JSON/TOML configuration unchanged.

use crate::common::errors::AddressParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse a 20-byte hex address with optional `0x` prefix
pub fn parse_hex_address(input: &str) -> Result<[u8; 20], AddressParseError> {
    let cleaned = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    if cleaned.len() != 40 {
        return Err(AddressParseError::InvalidLength { len: cleaned.len() });
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut bytes).map_err(|_| AddressParseError::InvalidHex {
        input: input.to_string(),
    })?;
    Ok(bytes)
}

/// Define a typed address wrapper with hex Display/FromStr/serde support
#[macro_export]
macro_rules! define_address_type {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub [u8; 20]);

        impl $name {
            /// The all-zero address
            pub const ZERO: Self = Self([0u8; 20]);

            #[inline(always)]
            pub const fn new(bytes: [u8; 20]) -> Self {
                Self(bytes)
            }

            /// Address whose last eight bytes hold `value` (fixtures and tests)
            pub fn from_low_u64(value: u64) -> Self {
                let mut bytes = [0u8; 20];
                bytes[12..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }

            #[inline(always)]
            pub fn as_bytes(&self) -> &[u8; 20] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 20]
            }

            /// First four bytes as hex, for compact log lines
            pub fn short(&self) -> String {
                format!("0x{}", hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = AddressParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex_address(s).map(Self)
            }
        }

        impl From<[u8; 20]> for $name {
            fn from(bytes: [u8; 20]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_address_type!(
    /// ERC-20 token address
    TokenAddress
);

define_address_type!(
    /// DEX identifier (router or pool-manager address)
    DexAddress
);

define_address_type!(
    /// Price oracle (aggregator) address
    OracleAddress
);

define_address_type!(
    /// Externally owned or contract account (operators, vaults, recipients)
    AccountAddress
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let with = TokenAddress::from_str("0x2791bca1f2de4661ed88a30c99a7a9449aa84174").unwrap();
        let without = TokenAddress::from_str("2791BCA1F2DE4661ED88A30C99A7A9449AA84174").unwrap();
        assert_eq!(with, without);
        assert_eq!(
            with.to_string(),
            "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            TokenAddress::from_str("0x1234"),
            Err(AddressParseError::InvalidLength { len: 4 })
        );
        assert!(matches!(
            DexAddress::from_str("0xzz91bca1f2de4661ed88a30c99a7a9449aa84174"),
            Err(AddressParseError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let dex = DexAddress::from_low_u64(0xabcdef);
        let json = serde_json::to_string(&dex).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000abcdef\"");
        let back: DexAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dex);
    }

    #[test]
    fn test_ordering_follows_bytes() {
        assert!(TokenAddress::from_low_u64(1) < TokenAddress::from_low_u64(2));
        assert!(TokenAddress::ZERO.is_zero());
    }
}
