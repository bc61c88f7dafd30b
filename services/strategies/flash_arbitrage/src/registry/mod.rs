//! Registries owned by the administrative authority
//!
//! DEX entries, price feeds and token metadata are the only persistent shared
//! mutable state in the core. Every write goes through [`Authority::ensure`];
//! reads are public and side-effect free.

pub mod dex;
pub mod price_feed;
pub mod tokens;

pub use dex::{DexEntry, DexRegistry, TokenPair};
pub use price_feed::{
    OracleAnswer, OracleSource, PriceFeedEntry, PriceFeedRegistry, PriceReading,
    StaticOracleSource,
};
pub use tokens::TokenRegistry;

use crate::error::{ArbitrageError, ArbitrageResult};
use types::AccountAddress;

/// Single owner allowed to mutate a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    owner: AccountAddress,
}

impl Authority {
    pub fn new(owner: AccountAddress) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> AccountAddress {
        self.owner
    }

    pub fn ensure(&self, caller: AccountAddress) -> ArbitrageResult<()> {
        if caller != self.owner {
            return Err(ArbitrageError::Unauthorized(caller));
        }
        Ok(())
    }
}
