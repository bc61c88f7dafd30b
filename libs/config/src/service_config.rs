//! Service Configuration Module
//!
//! Provides configuration loading for the arbitrage service binary.
//! Supports loading from TOML files with environment-specific overrides and
//! `TORQ_`-prefixed environment variables (`TORQ_SEARCH__MAX_GAS_PRICE_GWEI=80`).

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default location of the service configuration
pub const DEFAULT_CONFIG_PATH: &str = "config/flash_arbitrage.toml";

/// Main service configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArbitrageServiceConfig {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Where market state and strategy parameters come from
    pub market: MarketSettings,

    /// What the periodic search looks for
    pub search: SearchSettings,

    /// Who administers the core and whose balances fund trades
    pub accounts: AccountSettings,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

/// Global configuration settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
    /// "pretty" or "json"
    pub log_format: String,
}

/// Market data and strategy parameter sources
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketSettings {
    /// JSON pool snapshot (tokens, DEXes, pools, price feeds)
    pub snapshot_file: PathBuf,
    /// JSON strategy parameters; defaults apply when absent
    pub strategy_config: Option<PathBuf>,
    /// How often the search loop runs
    pub refresh_interval_ms: u64,
}

/// Search targets
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchSettings {
    /// Token symbols to start cycles from
    #[serde(default)]
    pub start_tokens: Vec<String>,
    /// Trade size per start token in whole tokens ("1000", "0.5")
    pub trade_size: String,
    pub max_gas_price_gwei: u64,
}

/// Hex account addresses
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccountSettings {
    /// Registry owner and execution operator
    pub operator: String,
    pub trading_account: String,
}

/// Feature flags
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct FeatureFlags {
    /// Execute found paths against the venue instead of only reporting them
    pub enable_execution: bool,
    /// Size trades with flash-loan capital when it adds profit
    pub enable_flash_loans: bool,
    pub debug_mode: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ArbitrageServiceConfig {
    /// Load configuration from files with environment overrides
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        // Add environment-specific overrides if specified
        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or(Path::new("config"))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (TORQ_ prefix, `__` between levels)
        builder = builder.add_source(
            Environment::with_prefix("TORQ")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Expand environment variables and `~` in file paths
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.market.snapshot_file = expand_path(&self.market.snapshot_file)
            .context("Failed to expand snapshot file path")?;

        if let Some(path) = &self.market.strategy_config {
            let expanded = expand_path(path).context("Failed to expand strategy config path")?;
            self.market.strategy_config = Some(expanded);
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Write the effective configuration, e.g. to pin a resolved environment
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.search.start_tokens.is_empty() {
            bail!("search.start_tokens must name at least one token");
        }
        if self.market.refresh_interval_ms == 0 {
            bail!("market.refresh_interval_ms must be positive");
        }
        if self.accounts.operator.trim().is_empty() || self.accounts.trading_account.trim().is_empty() {
            bail!("accounts.operator and accounts.trading_account are required");
        }
        if !matches!(self.global.log_format.as_str(), "pretty" | "json") {
            bail!("global.log_format must be \"pretty\" or \"json\"");
        }
        Ok(())
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Convenience function to load, expand and validate the default configuration
pub fn load_config(environment: Option<&str>) -> Result<ArbitrageServiceConfig> {
    let mut config = ArbitrageServiceConfig::load(None, environment)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const BASE_CONFIG: &str = r#"
[global]
log_level = "debug"
log_format = "pretty"

[market]
snapshot_file = "$TORQ_TEST_DATA_DIR/pools.json"
refresh_interval_ms = 2000

[search]
start_tokens = ["USDC", "WETH"]
trade_size = "1000"
max_gas_price_gwei = 50

[accounts]
operator = "0x00000000000000000000000000000000000000aa"
trading_account = "0x00000000000000000000000000000000000000bb"

[features]
debug_mode = true
"#;

    #[test]
    fn test_load_base_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();

        let config = ArbitrageServiceConfig::load(Some(&config_path), None).unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.search.start_tokens, vec!["USDC", "WETH"]);
        assert_eq!(config.search.trade_size, "1000");
        assert!(config.features.debug_mode);
        assert!(!config.features.enable_execution);
        assert!(config.market.strategy_config.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_environment_file_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();
        fs::create_dir(dir.path().join("environments")).unwrap();
        fs::write(
            dir.path().join("environments").join("production.toml"),
            "[features]\nenable_execution = true\n\n[market]\nrefresh_interval_ms = 500\n",
        )
        .unwrap();

        let config = ArbitrageServiceConfig::load(Some(&config_path), Some("production")).unwrap();

        assert!(config.features.enable_execution);
        assert_eq!(config.market.refresh_interval_ms, 500);
        assert_eq!(config.search.start_tokens.len(), 2);
    }

    #[test]
    fn test_environment_variable_override() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();
        std::env::set_var("TORQ_FEATURES__ENABLE_FLASH_LOANS", "true");

        let config = ArbitrageServiceConfig::load(Some(&config_path), None).unwrap();
        std::env::remove_var("TORQ_FEATURES__ENABLE_FLASH_LOANS");

        assert!(config.features.enable_flash_loans);
    }

    #[test]
    fn test_path_expansion() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();
        std::env::set_var("TORQ_TEST_DATA_DIR", "/srv/torq");

        let mut config = ArbitrageServiceConfig::load(Some(&config_path), None).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.market.snapshot_file, PathBuf::from("/srv/torq/pools.json"));
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG).unwrap();
        let original = ArbitrageServiceConfig::load(Some(&config_path), None).unwrap();

        let saved_path = dir.path().join("resolved.toml");
        original.save(&saved_path).unwrap();
        let reloaded = ArbitrageServiceConfig::load(Some(&saved_path), None).unwrap();

        assert_eq!(reloaded.search.start_tokens, original.search.start_tokens);
        assert_eq!(reloaded.search.max_gas_price_gwei, 50);
        assert_eq!(reloaded.accounts.operator, original.accounts.operator);
        assert_eq!(reloaded.market.refresh_interval_ms, 2000);
    }

    #[test]
    fn test_validation_rejects_empty_start_tokens() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("flash_arbitrage.toml");
        fs::write(&config_path, BASE_CONFIG.replace(r#"["USDC", "WETH"]"#, "[]")).unwrap();

        let config = ArbitrageServiceConfig::load(Some(&config_path), None).unwrap();
        assert!(config.validate().is_err());
    }
}
