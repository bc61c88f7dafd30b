//! Events published to external observers (dashboards, indexers)
//!
//! Publishing never blocks and never fails the operation that produced the
//! event: with no subscribers the event is dropped, and slow subscribers see
//! `RecvError::Lagged` instead of back-pressuring the core.

use crate::config::SearchParameters;
use crate::trade::{Path, TradeExecution};
use serde::Serialize;
use tokio::sync::broadcast;
use torq_amm::DexProtocol;
use tracing::trace;
use types::{AccountAddress, DexAddress, OracleAddress, TokenAddress};

const DEFAULT_CAPACITY: usize = 1024;

/// Observer-facing events; serialized as JSON objects tagged by `event`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ArbitrageEvent {
    DexRegistered {
        dex: DexAddress,
        name: String,
        protocol: DexProtocol,
    },
    DexDeactivated {
        dex: DexAddress,
    },
    PairAdded {
        dex: DexAddress,
        token_a: TokenAddress,
        token_b: TokenAddress,
    },
    PriceFeedRegistered {
        base: TokenAddress,
        quote: TokenAddress,
        oracle: OracleAddress,
        stale_threshold_secs: u64,
    },
    SearchParametersUpdated {
        parameters: SearchParameters,
    },
    PathFound {
        path: Path,
        net_profit: i128,
    },
    TradeExecuted {
        execution: TradeExecution,
    },
    TradeRolledBack {
        execution: TradeExecution,
    },
    Paused {
        by: AccountAddress,
    },
    Unpaused {
        by: AccountAddress,
    },
    CircuitBreakerTripped {
        failures: u32,
    },
    CircuitBreakerReset {
        by: AccountAddress,
    },
    EmergencyWithdrawalRequested {
        id: u64,
        token: TokenAddress,
        amount: u128,
        unlock_at: u64,
    },
    EmergencyWithdrawalExecuted {
        id: u64,
        token: TokenAddress,
        amount: u128,
        recipient: AccountAddress,
    },
}

impl ArbitrageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ArbitrageEvent::DexRegistered { .. } => "dex_registered",
            ArbitrageEvent::DexDeactivated { .. } => "dex_deactivated",
            ArbitrageEvent::PairAdded { .. } => "pair_added",
            ArbitrageEvent::PriceFeedRegistered { .. } => "price_feed_registered",
            ArbitrageEvent::SearchParametersUpdated { .. } => "search_parameters_updated",
            ArbitrageEvent::PathFound { .. } => "path_found",
            ArbitrageEvent::TradeExecuted { .. } => "trade_executed",
            ArbitrageEvent::TradeRolledBack { .. } => "trade_rolled_back",
            ArbitrageEvent::Paused { .. } => "paused",
            ArbitrageEvent::Unpaused { .. } => "unpaused",
            ArbitrageEvent::CircuitBreakerTripped { .. } => "circuit_breaker_tripped",
            ArbitrageEvent::CircuitBreakerReset { .. } => "circuit_breaker_reset",
            ArbitrageEvent::EmergencyWithdrawalRequested { .. } => "emergency_withdrawal_requested",
            ArbitrageEvent::EmergencyWithdrawalExecuted { .. } => "emergency_withdrawal_executed",
        }
    }
}

/// Broadcast fan-out of [`ArbitrageEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ArbitrageEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArbitrageEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event
    pub fn publish(&self, event: ArbitrageEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(event = name, "No subscribers for event");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Publish if a bus is attached
pub(crate) fn emit(bus: &Option<EventBus>, event: ArbitrageEvent) {
    if let Some(bus) = bus {
        bus.publish(event);
    }
}
