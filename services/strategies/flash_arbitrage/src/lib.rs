//! # Flash Arbitrage Strategy - Multi-Path Cyclic Arbitrage Core
//!
//! ## Purpose
//!
//! Finds, validates and atomically executes cyclic arbitrage across
//! heterogeneous DEXes: start with token A, swap through up to four pools,
//! end with more A than you started with after gas.
//!
//! ## Architecture Role
//!
//! ```text
//! DexRegistry ─┐
//! PriceFeeds ──┼─→ QuoteManager → PathValidator → PathFinder → Path
//! TokenRegistry┘                        ↑                        ↓
//!                                       └── MultiPathArbitrage ←─┘
//!                                                  ↑
//!                                           FlashLoanManager
//! ```
//!
//! - **Registries** ([`registry`]): owner-gated DEX, price-feed and token metadata
//! - **Quotes** ([`quote_manager`]): one normalized quote shape for V2 and V3 pools
//! - **Validation** ([`path_validator`]): per-hop policy, gas budget, profit bounds
//! - **Search** ([`path_finder`]): bounded DFS over an arena token graph
//! - **Execution** ([`executor`], [`flash_loan`]): staged, all-or-nothing settlement
//!
//! Every decision reads one immutable [`market::MarketSnapshot`], so quotes
//! feeding the same decision never mix blocks.

#[macro_use]
pub mod logging;

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod flash_loan;
pub mod ledger;
pub mod market;
pub mod path_finder;
pub mod path_validator;
pub mod pool_loader;
pub mod quote_manager;
pub mod registry;
pub mod strategy_engine;
pub mod trade;

pub use config::{FlashArbitrageConfig, ParameterStore, SearchLimits, SearchParameters};
pub use error::{ArbitrageError, ArbitrageResult};
pub use events::{ArbitrageEvent, EventBus};
pub use executor::{ExecutionState, MultiPathArbitrage};
pub use flash_loan::{FlashLoanManager, LendingPool, LoanPlan, StaticLendingPool};
pub use ledger::{ExecutionVenue, SimulatedVenue, StagedTransaction};
pub use market::{LiveMarket, MarketSnapshot, MarketSource, PoolKey};
pub use path_finder::{PathFinder, SearchReport};
pub use path_validator::{PathValidator, ValidationResult};
pub use quote_manager::{Quote, QuoteManager};
pub use trade::{Path, TradeExecution};
