//! DEX registry
//!
//! Entries are never removed. Deactivation keeps the entry (and its pair
//! list) so historical paths that reference it still resolve.

use super::Authority;
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::events::{emit, ArbitrageEvent, EventBus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use torq_amm::{DexProtocol, BPS_DENOMINATOR};
use tracing::info;
use types::{AccountAddress, DexAddress, TokenAddress};

/// Unordered token pair stored as `token0 < token1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub token0: TokenAddress,
    pub token1: TokenAddress,
}

impl TokenPair {
    pub fn new(a: TokenAddress, b: TokenAddress) -> Self {
        if a <= b {
            Self { token0: a, token1: b }
        } else {
            Self { token0: b, token1: a }
        }
    }

    pub fn contains(&self, token: &TokenAddress) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// The counterpart of `token`, if it belongs to the pair
    pub fn other(&self, token: &TokenAddress) -> Option<TokenAddress> {
        if self.token0 == *token {
            Some(self.token1)
        } else if self.token1 == *token {
            Some(self.token0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexEntry {
    pub address: DexAddress,
    pub name: String,
    pub protocol: DexProtocol,
    pub max_slippage_bps: u32,
    /// Router/call overhead on top of the protocol's swap gas
    pub gas_overhead: u64,
    pub is_active: bool,
    pub supported_pairs: BTreeSet<TokenPair>,
}

impl DexEntry {
    pub fn supports(&self, a: &TokenAddress, b: &TokenAddress) -> bool {
        self.supported_pairs.contains(&TokenPair::new(*a, *b))
    }
}

pub struct DexRegistry {
    authority: Authority,
    entries: RwLock<BTreeMap<DexAddress, DexEntry>>,
    events: Option<EventBus>,
}

impl DexRegistry {
    pub fn new(owner: AccountAddress) -> Self {
        Self {
            authority: Authority::new(owner),
            entries: RwLock::new(BTreeMap::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn owner(&self) -> AccountAddress {
        self.authority.owner()
    }

    pub fn register_dex(
        &self,
        caller: AccountAddress,
        address: DexAddress,
        name: impl Into<String>,
        protocol: DexProtocol,
        max_slippage_bps: u32,
        gas_overhead: u64,
    ) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        if max_slippage_bps > BPS_DENOMINATOR {
            return Err(ArbitrageError::InvalidConfig(format!(
                "max slippage {} bps exceeds 100%",
                max_slippage_bps
            )));
        }

        let name = name.into();
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&address) {
                return Err(ArbitrageError::AlreadyRegistered(address));
            }
            entries.insert(
                address,
                DexEntry {
                    address,
                    name: name.clone(),
                    protocol,
                    max_slippage_bps,
                    gas_overhead,
                    is_active: true,
                    supported_pairs: BTreeSet::new(),
                },
            );
        }

        info!(dex = %address, name = %name, %protocol, "DEX registered");
        emit(
            &self.events,
            ArbitrageEvent::DexRegistered {
                dex: address,
                name,
                protocol,
            },
        );
        Ok(())
    }

    pub fn deactivate_dex(&self, caller: AccountAddress, address: DexAddress) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(&address)
                .ok_or(ArbitrageError::UnknownDex(address))?;
            if !entry.is_active {
                return Ok(());
            }
            entry.is_active = false;
        }

        info!(dex = %address, "DEX deactivated");
        emit(&self.events, ArbitrageEvent::DexDeactivated { dex: address });
        Ok(())
    }

    pub fn add_supported_pair(
        &self,
        caller: AccountAddress,
        address: DexAddress,
        token_a: TokenAddress,
        token_b: TokenAddress,
    ) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        if token_a == token_b {
            return Err(ArbitrageError::InvalidConfig(
                "a pair needs two distinct tokens".to_string(),
            ));
        }
        let added = self
            .entries
            .write()
            .get_mut(&address)
            .ok_or(ArbitrageError::UnknownDex(address))?
            .supported_pairs
            .insert(TokenPair::new(token_a, token_b));

        if added {
            emit(
                &self.events,
                ArbitrageEvent::PairAdded {
                    dex: address,
                    token_a,
                    token_b,
                },
            );
        }
        Ok(())
    }

    /// Active entries ordered by address
    pub fn get_active_dexes(&self) -> Vec<DexEntry> {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.is_active)
            .cloned()
            .collect()
    }

    pub fn get_dex_info(&self, address: &DexAddress) -> ArbitrageResult<DexEntry> {
        self.entries
            .read()
            .get(address)
            .cloned()
            .ok_or(ArbitrageError::UnknownDex(*address))
    }

    /// Whether the DEX lists the pair, in either order
    pub fn is_pair_supported(&self, address: &DexAddress, a: &TokenAddress, b: &TokenAddress) -> bool {
        self.entries
            .read()
            .get(address)
            .map(|entry| entry.supports(a, b))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
