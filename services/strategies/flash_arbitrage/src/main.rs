use anyhow::{Context, Result};
use flash_arbitrage_strategy::config::FlashArbitrageConfig;
use flash_arbitrage_strategy::pool_loader;
use flash_arbitrage_strategy::strategy_engine::StrategyEngine;
use std::path::PathBuf;
use torq_config::ArbitrageServiceConfig;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let environment = std::env::var("TORQ_ENV").ok();

    let mut service = ArbitrageServiceConfig::load(config_path.as_deref(), environment.as_deref())
        .context("Failed to load service configuration")?;
    service.expand_env_vars()?;
    service.validate()?;

    init_tracing(&service.global.log_level, &service.global.log_format);
    info!("🚀 Starting Flash Arbitrage Service...");

    let strategy = match &service.market.strategy_config {
        Some(path) => FlashArbitrageConfig::from_file(path)
            .with_context(|| format!("Failed to load strategy config {}", path.display()))?,
        None => {
            info!("No strategy config file, using defaults with environment overrides");
            FlashArbitrageConfig::from_env()
        }
    };

    let market = pool_loader::load_market(&service.market.snapshot_file)?;
    let engine = StrategyEngine::build(&service, &strategy, &market)?;

    if service.features.debug_mode {
        debug!("Effective configuration:\n{}", service.to_toml()?);
        let mut events = engine.events().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => debug!(event = event.name(), "{}", json),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                }
            }
        });
    }

    info!("✅ Flash Arbitrage Service initialized successfully");
    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Strategy engine stopped with an error")?;

    info!("Flash Arbitrage Service stopped");
    Ok(())
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
