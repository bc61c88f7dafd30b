//! # Flash Arbitrage Configuration
//!
//! Strategy parameters for search, validation, execution and flash loans.
//! Loaded from JSON (`market.strategy_config` in the service TOML) with
//! `ARBITRAGE_*` environment overrides, and validated as a whole before any
//! component sees it.
//!
//! [`SearchParameters`] is the owner-mutable part. It lives in a
//! [`ParameterStore`] and is handed to the path finder and validator
//! explicitly on every call, never read from ambient global state.

use crate::error::{ArbitrageError, ArbitrageResult};
use crate::events::{emit, ArbitrageEvent, EventBus};
use crate::registry::Authority;
use crate::trade::MAX_PATH_HOPS;
use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use torq_amm::BPS_DENOMINATOR;
use tracing::info;
use types::{AccountAddress, TokenAddress};

/// Complete configuration for the arbitrage strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashArbitrageConfig {
    pub search: SearchParameters,
    pub limits: SearchLimits,
    pub executor: ExecutorConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub flash_loan: FlashLoanConfig,
    /// Gas token override; the market snapshot's native token otherwise
    pub native_token: Option<TokenAddress>,
}

/// Path acceptance policy, updated only by the registry owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub max_gas_per_path: u64,
    /// Minimum per-hop output-side liquidity, 18-decimal normalized units
    pub min_liquidity_required: u128,
    pub max_price_impact_bps: u32,
}

/// Bounds on a single search invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// 2..=4
    pub max_hops: usize,
    pub max_quote_calls: u32,
    pub time_budget_ms: u64,
    /// Restarts allowed when the block height moves mid-search
    pub max_restarts: u32,
    /// DEX spot vs oracle reference; edges beyond this are skipped
    pub price_deviation_tolerance_bps: u32,
    /// Skip edges with no oracle reference at all
    pub require_price_feed: bool,
    /// QuoteManager floor on output-side liquidity, 18-decimal normalized units
    pub quote_liquidity_floor: u128,
}

/// Execution engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Required realized profit as a share of the committed amount
    pub min_profit_bps: u32,
    /// Per-trade cap in 18-decimal normalized units of the start token
    pub max_trade_size: u128,
    pub emergency_withdrawal_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub max_consecutive_failures: u32,
    pub failure_window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashLoanConfig {
    /// Lending pools charging more than this are ignored
    pub max_fee_bps: u32,
    /// Extra gas for the borrow/repay calls
    pub loan_gas_overhead: u64,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            max_gas_per_path: 800_000,
            min_liquidity_required: 1_000 * 10u128.pow(18),
            max_price_impact_bps: 300, // 3%
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_hops: 3,
            max_quote_calls: 2_000,
            time_budget_ms: 250,
            max_restarts: 3,
            price_deviation_tolerance_bps: 500, // 5%
            require_price_feed: false,
            quote_liquidity_floor: 0,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            min_profit_bps: 5,
            max_trade_size: 1_000_000 * 10u128.pow(18),
            emergency_withdrawal_delay_secs: 24 * 3600,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            failure_window_secs: 600,
        }
    }
}

impl Default for FlashLoanConfig {
    fn default() -> Self {
        Self {
            max_fee_bps: 30,
            loan_gas_overhead: 80_000,
        }
    }
}

impl SearchParameters {
    pub fn validate(&self) -> ArbitrageResult<()> {
        if self.max_gas_per_path == 0 {
            return Err(ArbitrageError::InvalidConfig(
                "max_gas_per_path must be positive".to_string(),
            ));
        }
        if self.max_price_impact_bps > BPS_DENOMINATOR {
            return Err(ArbitrageError::InvalidConfig(
                "max_price_impact_bps must be <= 10000".to_string(),
            ));
        }
        Ok(())
    }
}

impl FlashArbitrageConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read strategy config {:?}", path))?;
        let config: Self = serde_json::from_str(&contents).context("Failed to parse strategy config JSON")?;
        Ok(config)
    }

    /// Defaults with `ARBITRAGE_*` environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override fields from `ARBITRAGE_*` environment variables when present
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_parse::<usize>("ARBITRAGE_MAX_HOPS") {
            self.limits.max_hops = value;
        }
        if let Some(value) = env_parse::<u64>("ARBITRAGE_MAX_GAS_PER_PATH") {
            self.search.max_gas_per_path = value;
        }
        if let Some(value) = env_parse::<u32>("ARBITRAGE_MAX_PRICE_IMPACT_BPS") {
            self.search.max_price_impact_bps = value;
        }
        if let Some(value) = env_parse::<u32>("ARBITRAGE_MIN_PROFIT_BPS") {
            self.executor.min_profit_bps = value;
        }
        if let Some(value) = env_parse::<u128>("ARBITRAGE_MAX_TRADE_SIZE") {
            self.executor.max_trade_size = value;
        }
        if let Some(value) = env_parse::<TokenAddress>("ARBITRAGE_NATIVE_TOKEN") {
            self.native_token = Some(value);
        }
        if let Ok(value) = std::env::var("ARBITRAGE_REQUIRE_PRICE_FEED") {
            self.limits.require_price_feed = value.eq_ignore_ascii_case("true");
        }
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        self.search.validate()?;

        if !(2..=MAX_PATH_HOPS).contains(&self.limits.max_hops) {
            anyhow::bail!("max_hops must be between 2 and {}", MAX_PATH_HOPS);
        }
        if self.limits.max_quote_calls == 0 {
            anyhow::bail!("max_quote_calls must be positive");
        }
        if self.limits.time_budget_ms == 0 {
            anyhow::bail!("time_budget_ms must be positive");
        }
        if self.limits.price_deviation_tolerance_bps > BPS_DENOMINATOR {
            anyhow::bail!("price_deviation_tolerance_bps must be <= 10000");
        }

        if self.executor.min_profit_bps > BPS_DENOMINATOR {
            anyhow::bail!("min_profit_bps must be <= 10000 (100%)");
        }
        if self.executor.max_trade_size == 0 {
            anyhow::bail!("max_trade_size must be positive");
        }

        if self.circuit_breaker.max_consecutive_failures == 0 {
            anyhow::bail!("max_consecutive_failures must be positive");
        }
        if self.flash_loan.max_fee_bps > BPS_DENOMINATOR {
            anyhow::bail!("flash loan max_fee_bps must be <= 10000");
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

/// Owner-mutable [`SearchParameters`]
pub struct ParameterStore {
    authority: Authority,
    current: RwLock<SearchParameters>,
    events: Option<EventBus>,
}

impl ParameterStore {
    pub fn new(owner: AccountAddress, initial: SearchParameters) -> ArbitrageResult<Self> {
        initial.validate()?;
        Ok(Self {
            authority: Authority::new(owner),
            current: RwLock::new(initial),
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Copy of the parameters in force right now
    pub fn current(&self) -> SearchParameters {
        *self.current.read()
    }

    pub fn update(&self, caller: AccountAddress, parameters: SearchParameters) -> ArbitrageResult<()> {
        self.authority.ensure(caller)?;
        parameters.validate()?;
        *self.current.write() = parameters;
        info!(
            max_gas_per_path = parameters.max_gas_per_path,
            min_liquidity_required = parameters.min_liquidity_required as f64,
            max_price_impact_bps = parameters.max_price_impact_bps,
            "Search parameters updated"
        );
        emit(&self.events, ArbitrageEvent::SearchParametersUpdated { parameters });
        Ok(())
    }
}
