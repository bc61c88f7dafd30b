//! # Flash Arbitrage Strategy Engine - Search and Execution Loop
//!
//! ## Purpose
//!
//! Wires the registries, quote manager, validator, path finder, execution
//! engine and flash-loan manager from one service configuration and one
//! market snapshot, then runs the periodic cycle:
//!
//! ```text
//! interval tick → [PathFinder] per start token → best Path
//!                        ↓
//!             [FlashLoanManager] sizing (optional)
//!                        ↓
//!             [MultiPathArbitrage] staged execution (optional)
//!                        ↓
//!                 CycleReport + events
//! ```
//!
//! A cycle never aborts on a single failed target: `NoPathFound` is the normal
//! quiet outcome, other errors are logged and counted.

use crate::config::{FlashArbitrageConfig, ParameterStore};
use crate::error::ArbitrageError;
use crate::events::EventBus;
use crate::executor::MultiPathArbitrage;
use crate::flash_loan::{FlashLoanManager, PathParams};
use crate::ledger::SimulatedVenue;
use crate::market::MarketSource;
use crate::path_finder::PathFinder;
use crate::path_validator::PathValidator;
use crate::pool_loader::LoadedMarket;
use crate::quote_manager::QuoteManager;
use crate::registry::{DexRegistry, PriceFeedRegistry, StaticOracleSource, TokenRegistry};
use crate::trade::{Path, TradeExecution};
use anyhow::{bail, Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use torq_config::ArbitrageServiceConfig;
use tracing::{debug, info, warn};
use types::{AccountAddress, TokenAddress};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// One start token and the amount to cycle from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTarget {
    pub token: TokenAddress,
    pub amount: u128,
}

/// Outcome counters for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub block_number: u64,
    pub opportunities: usize,
    pub executed: usize,
    pub failed: usize,
    pub realized_profit: Vec<(TokenAddress, i128)>,
}

pub struct StrategyEngine {
    operator: AccountAddress,
    finder: PathFinder,
    engine: Arc<MultiPathArbitrage>,
    flash_loans: Option<FlashLoanManager>,
    parameters: Arc<ParameterStore>,
    venue: Arc<SimulatedVenue>,
    events: EventBus,
    targets: Vec<SearchTarget>,
    max_gas_price: u128,
    execute: bool,
    refresh_interval: Duration,
}

impl StrategyEngine {
    /// Build every component from configuration and a loaded market
    pub fn build(service: &ArbitrageServiceConfig, strategy: &FlashArbitrageConfig, market: &LoadedMarket) -> Result<Self> {
        strategy.validate()?;
        let operator = AccountAddress::from_str(&service.accounts.operator).context("Invalid accounts.operator")?;
        let account = AccountAddress::from_str(&service.accounts.trading_account)
            .context("Invalid accounts.trading_account")?;
        let events = EventBus::default();

        let tokens = Arc::new(TokenRegistry::new(operator));
        let dexes = Arc::new(DexRegistry::new(operator).with_events(events.clone()));
        let oracle = Arc::new(StaticOracleSource::new());
        let feeds = Arc::new(PriceFeedRegistry::new(operator, oracle.clone()).with_events(events.clone()));
        market
            .install(operator, &tokens, &dexes, &feeds, &oracle)
            .context("Failed to install market snapshot")?;

        let venue = Arc::new(SimulatedVenue::new(market.snapshot.clone()));
        market.fund(&venue);

        let native_token = strategy.native_token.unwrap_or(market.native_token);
        let quotes = Arc::new(QuoteManager::new(
            dexes,
            tokens.clone(),
            strategy.limits.quote_liquidity_floor,
        ));
        let validator = Arc::new(PathValidator::new(quotes, feeds.clone(), native_token));
        let parameters = Arc::new(ParameterStore::new(operator, strategy.search)?.with_events(events.clone()));
        let finder = PathFinder::new(
            validator.clone(),
            feeds,
            venue.clone() as Arc<dyn MarketSource>,
            strategy.limits.clone(),
        )
        .with_events(events.clone());
        let engine = Arc::new(
            MultiPathArbitrage::new(
                operator,
                account,
                strategy.executor.clone(),
                strategy.circuit_breaker.clone(),
                validator,
                venue.clone(),
                parameters.clone(),
            )
            .with_events(events.clone()),
        );

        let flash_loans = service.features.enable_flash_loans.then(|| {
            market
                .lenders()
                .into_iter()
                .fold(FlashLoanManager::new(engine.clone(), strategy.flash_loan.clone()), |manager, lender| {
                    manager.with_lender(lender)
                })
        });

        let mut targets = Vec::with_capacity(service.search.start_tokens.len());
        for symbol in &service.search.start_tokens {
            let info = tokens
                .by_symbol(symbol)
                .with_context(|| format!("Start token {} is not in the market snapshot", symbol))?;
            let amount = parse_trade_size(&service.search.trade_size, info.decimals)
                .with_context(|| format!("Invalid trade size for {}", symbol))?;
            targets.push(SearchTarget {
                token: info.address,
                amount,
            });
        }

        info!(
            targets = targets.len(),
            execution = service.features.enable_execution,
            flash_loans = flash_loans.is_some(),
            native = %native_token.short(),
            "Strategy engine built"
        );

        Ok(Self {
            operator,
            finder,
            engine,
            flash_loans,
            parameters,
            venue,
            events,
            targets,
            max_gas_price: (service.search.max_gas_price_gwei as u128).saturating_mul(WEI_PER_GWEI),
            execute: service.features.enable_execution,
            refresh_interval: Duration::from_millis(service.market.refresh_interval_ms),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn engine(&self) -> &Arc<MultiPathArbitrage> {
        &self.engine
    }

    pub fn finder(&self) -> &PathFinder {
        &self.finder
    }

    pub fn venue(&self) -> &Arc<SimulatedVenue> {
        &self.venue
    }

    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    pub fn targets(&self) -> &[SearchTarget] {
        &self.targets
    }

    /// Search every target once, executing the best path when enabled
    pub fn run_cycle(&self) -> CycleReport {
        let params = self.parameters.current();
        let mut report = CycleReport {
            block_number: MarketSource::block_number(self.venue.as_ref()),
            ..CycleReport::default()
        };

        for target in &self.targets {
            let path = match self
                .finder
                .find_best_path(target.token, target.amount, self.max_gas_price, &params)
            {
                Ok(path) => path,
                Err(ArbitrageError::NoPathFound(reason)) => {
                    debug!(%reason, "No opportunity this cycle");
                    continue;
                }
                Err(err) => {
                    warn!(code = err.code(), error = %err, "Search failed");
                    report.failed += 1;
                    continue;
                }
            };
            report.opportunities += 1;
            if !self.execute {
                continue;
            }

            match self.execute_path(&path, target) {
                Ok(execution) => {
                    report.executed += 1;
                    report.realized_profit.push((target.token, execution.realized_profit));
                }
                Err(err) => {
                    report.failed += 1;
                    debug!(code = err.code(), "Execution attempt failed");
                }
            }
        }
        report
    }

    fn execute_path(&self, path: &Path, target: &SearchTarget) -> Result<TradeExecution, ArbitrageError> {
        if let Some(flash_loans) = &self.flash_loans {
            let params = self.parameters.current();
            let plan = flash_loans.plan_for_path(path, target.amount, self.max_gas_price, &params);
            if plan.use_flash_loan() {
                return flash_loans.execute_with_flash_loan(
                    self.operator,
                    target.token,
                    plan.loan_amount,
                    PathParams {
                        path,
                        own_amount: target.amount,
                        max_gas_price: self.max_gas_price,
                    },
                );
            }
        }
        self.engine
            .execute_multi_path_arbitrage(self.operator, path, target.amount, self.max_gas_price)
    }

    /// Run cycles on the refresh interval until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        log_success!(
            "Flash arbitrage engine running every {:?} over {} start tokens",
            self.refresh_interval,
            self.targets.len()
        );
        let mut ticker = tokio::time::interval(self.refresh_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle();
                    log_metrics!(
                        "Block {}: {} opportunities, {} executed, {} failed",
                        report.block_number,
                        report.opportunities,
                        report.executed,
                        report.failed
                    );
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping search loop");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Whole-token size ("1000", "0.5") to base units, truncating extra precision
pub fn parse_trade_size(size: &str, decimals: u8) -> Result<u128> {
    let value = Decimal::from_str(size.trim()).with_context(|| format!("'{}' is not a number", size))?;
    if value <= Decimal::ZERO {
        bail!("trade size must be positive, got {}", size);
    }
    let truncated = value
        .round_dp_with_strategy(decimals as u32, RoundingStrategy::ToZero)
        .normalize();
    let mantissa = u128::try_from(truncated.mantissa()).context("trade size out of range")?;
    let shift = decimals as u32 - truncated.scale();
    let amount = 10u128
        .checked_pow(shift)
        .and_then(|factor| mantissa.checked_mul(factor))
        .context("trade size overflows u128")?;
    if amount == 0 {
        bail!("trade size {} is below one base unit", size);
    }
    Ok(amount)
}
