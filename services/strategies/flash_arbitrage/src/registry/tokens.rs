//! Token metadata supplied by the configuration layer

use super::Authority;
use crate::error::{ArbitrageError, ArbitrageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use types::{AccountAddress, TokenAddress, TokenInfo};

pub struct TokenRegistry {
    authority: Authority,
    tokens: RwLock<HashMap<TokenAddress, TokenInfo>>,
}

impl TokenRegistry {
    pub fn new(owner: AccountAddress) -> Self {
        Self {
            authority: Authority::new(owner),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Register or refresh token metadata
    pub fn register_token(&self, caller: AccountAddress, info: TokenInfo) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        if info.decimals > 36 {
            return Err(ArbitrageError::InvalidConfig(format!(
                "{} declares {} decimals",
                info.symbol, info.decimals
            )));
        }
        debug!(token = %info.address, symbol = %info.symbol, decimals = info.decimals, "Token registered");
        self.tokens.write().insert(info.address, info);
        Ok(())
    }

    pub fn get(&self, token: &TokenAddress) -> ArbitrageResult<TokenInfo> {
        self.tokens
            .read()
            .get(token)
            .cloned()
            .ok_or(ArbitrageError::UnknownToken(*token))
    }

    pub fn decimals(&self, token: &TokenAddress) -> ArbitrageResult<u8> {
        self.tokens
            .read()
            .get(token)
            .map(|info| info.decimals)
            .ok_or(ArbitrageError::UnknownToken(*token))
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<TokenInfo> {
        self.tokens
            .read()
            .values()
            .find(|info| info.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
    }

    /// Symbol for log lines, short address when unknown
    pub fn symbol(&self, token: &TokenAddress) -> String {
        self.tokens
            .read()
            .get(token)
            .map(|info| info.symbol.clone())
            .unwrap_or_else(|| token.short())
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let owner = AccountAddress::from_low_u64(1);
        let registry = TokenRegistry::new(owner);
        let usdc = TokenInfo::new(TokenAddress::from_low_u64(10), "USDC", 6);
        registry.register_token(owner, usdc.clone()).unwrap();

        assert_eq!(registry.decimals(&usdc.address).unwrap(), 6);
        assert_eq!(registry.by_symbol("usdc"), Some(usdc));
        assert!(matches!(
            registry.get(&TokenAddress::from_low_u64(11)),
            Err(ArbitrageError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_only_owner_registers() {
        let registry = TokenRegistry::new(AccountAddress::from_low_u64(1));
        let stranger = AccountAddress::from_low_u64(2);
        let result = registry.register_token(stranger, TokenInfo::new(TokenAddress::from_low_u64(10), "USDC", 6));
        assert_eq!(result, Err(ArbitrageError::Unauthorized(stranger)));
        assert!(registry.is_empty());
    }
}
