//! # Torq Service Configuration
//!
//! Configuration loading for the arbitrage service binary: a base TOML file,
//! an optional `environments/<env>.toml` overlay next to it, and `TORQ_`
//! environment variables on top.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use torq_config::load_config;
//!
//! let config = load_config(Some("production"))?;
//! println!("snapshot: {:?}", config.market.snapshot_file);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod service_config;

// Re-export commonly used types
pub use service_config::{
    load_config, AccountSettings, ArbitrageServiceConfig, FeatureFlags, GlobalConfig, MarketSettings,
    SearchSettings, DEFAULT_CONFIG_PATH,
};
