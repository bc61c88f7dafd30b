//! # Multi-Path Arbitrage Executor - Atomic Trade Execution Engine
//!
//! ## Purpose
//!
//! Turns a validated [`Path`] into a settled trade, or into nothing at all.
//! Every hop runs inside one [`StagedTransaction`]; the transaction is
//! committed only once the final output clears the profit requirement, and is
//! dropped (discarding every staged hop) on any failure.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle → Validating → Executing → Committed
//!            ↓            ↓
//!            └────────→ RolledBack
//! ```
//!
//! Gate checks run before the state machine starts and do not count as
//! failures: operator authority, pause flag, circuit breaker, trade-size cap.
//! The cap is compared in 18-decimal normalized units, so one setting means
//! the same token quantity for USDC and WETH.
//! Everything after the gates (re-validation, hop execution, profit check,
//! loan repayment, commit) records a circuit-breaker failure when it fails.
//!
//! ## Profit Requirement
//!
//! Re-validation prices gas at the caller's `max_gas_price`, including the
//! loan overhead gas. A path whose expected profit no longer covers gas plus
//! the loan fee is refused before any hop runs. After the hops:
//!
//! ```text
//! output - loan_fee >= amount + max(amount * min_profit_bps / 10_000 + gas_cost, validated min_profit)
//! ```

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{CircuitBreakerConfig, ExecutorConfig, ParameterStore};
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::events::{emit, ArbitrageEvent, EventBus};
use crate::ledger::{ExecutionVenue, StagedTransaction};
use crate::logging::LogEmoji;
use crate::path_validator::PathValidator;
use crate::registry::Authority;
use crate::trade::{LoanTerms, Path, TradeExecution, TxOutcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use torq_amm::BPS_DENOMINATOR;
use tracing::{debug, info, warn};
use types::precision::normalize_amount;
use types::{AccountAddress, TokenAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Validating,
    Executing,
    Committed,
    RolledBack,
}

/// Time-locked withdrawal of engine funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyWithdrawal {
    pub id: u64,
    pub token: TokenAddress,
    pub amount: u128,
    pub recipient: AccountAddress,
    pub requested_at: u64,
    pub unlock_at: u64,
}

/// One staged execution: the path, the trader's own input and an optional loan
#[derive(Debug, Clone)]
pub(crate) struct StagedRun<'a> {
    pub path: &'a Path,
    pub own_amount: u128,
    pub max_gas_price: u128,
    pub loan: Option<LoanTerms>,
    pub extra_gas: u64,
}

impl StagedRun<'_> {
    fn trade_amount(&self) -> u128 {
        self.own_amount
            .saturating_add(self.loan.as_ref().map(|loan| loan.principal).unwrap_or_default())
    }

    fn loan_fee(&self) -> u128 {
        self.loan.as_ref().map(|loan| loan.fee).unwrap_or_default()
    }
}

struct EngineState {
    state: ExecutionState,
    breaker: CircuitBreaker,
    withdrawals: BTreeMap<u64, EmergencyWithdrawal>,
    next_withdrawal_id: u64,
}

pub struct MultiPathArbitrage {
    operator: Authority,
    /// Account whose balances fund trades
    account: AccountAddress,
    config: ExecutorConfig,
    validator: Arc<PathValidator>,
    venue: Arc<dyn ExecutionVenue>,
    parameters: Arc<ParameterStore>,
    paused: AtomicBool,
    inner: Mutex<EngineState>,
    /// Serializes executions and withdrawals against the venue
    exec_lock: Mutex<()>,
    events: Option<EventBus>,
}

impl MultiPathArbitrage {
    pub fn new(
        operator: AccountAddress,
        account: AccountAddress,
        config: ExecutorConfig,
        breaker: CircuitBreakerConfig,
        validator: Arc<PathValidator>,
        venue: Arc<dyn ExecutionVenue>,
        parameters: Arc<ParameterStore>,
    ) -> Self {
        Self {
            operator: Authority::new(operator),
            account,
            config,
            validator,
            venue,
            parameters,
            paused: AtomicBool::new(false),
            inner: Mutex::new(EngineState {
                state: ExecutionState::Idle,
                breaker: CircuitBreaker::new(breaker),
                withdrawals: BTreeMap::new(),
                next_withdrawal_id: 1,
            }),
            exec_lock: Mutex::new(()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.lock().state
    }

    pub fn account(&self) -> AccountAddress {
        self.account
    }

    pub fn operator(&self) -> AccountAddress {
        self.operator.owner()
    }

    pub fn venue(&self) -> &Arc<dyn ExecutionVenue> {
        &self.venue
    }

    pub fn validator(&self) -> &Arc<PathValidator> {
        &self.validator
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_circuit_breaker_tripped(&self) -> bool {
        self.inner.lock().breaker.is_tripped()
    }

    /// Execute `path` with `amount_in` of the engine's own funds
    pub fn execute_multi_path_arbitrage(
        &self,
        caller: AccountAddress,
        path: &Path,
        amount_in: u128,
        max_gas_price: u128,
    ) -> ArbitrageResult<TradeExecution> {
        self.execute_staged(
            caller,
            StagedRun {
                path,
                own_amount: amount_in,
                max_gas_price,
                loan: None,
                extra_gas: 0,
            },
        )
    }

    pub(crate) fn execute_staged(&self, caller: AccountAddress, run: StagedRun<'_>) -> ArbitrageResult<TradeExecution> {
        self.check_gates(caller, run.path.start_token(), run.trade_amount())?;
        let _exclusive = self.exec_lock.lock();

        let mut execution = TradeExecution {
            path: run.path.clone(),
            committed_amount: run.trade_amount(),
            realized_output: 0,
            realized_profit: 0,
            gas_used: run.path.total_gas_estimate().saturating_add(run.extra_gas),
            outcome: TxOutcome::Committed,
            block_number: 0,
            loan: run.loan.clone(),
        };

        match self.run_staged(&run, &mut execution) {
            Ok(tx) => match self.venue.commit(tx) {
                Ok(()) => {
                    self.set_state(ExecutionState::Committed);
                    self.inner.lock().breaker.record_success();
                    log_profit!(
                        "Committed {} hops at block {}: output {} profit {}",
                        run.path.hops(),
                        execution.block_number,
                        execution.realized_output,
                        execution.realized_profit
                    );
                    emit(
                        &self.events,
                        ArbitrageEvent::TradeExecuted {
                            execution: execution.clone(),
                        },
                    );
                    Ok(execution)
                }
                Err(err) => Err(self.roll_back(execution, err)),
            },
            Err(err) => Err(self.roll_back(execution, err)),
        }
    }

    fn check_gates(&self, caller: AccountAddress, token: TokenAddress, amount: u128) -> ArbitrageResult<()> {
        self.operator.ensure(caller)?;
        if self.is_paused() {
            return Err(ArbitrageError::SystemPaused);
        }
        self.inner.lock().breaker.check()?;
        let decimals = self.validator.quote_manager().tokens().decimals(&token)?;
        let normalized = normalize_amount(amount, decimals);
        if normalized > self.config.max_trade_size {
            return Err(ArbitrageError::ExceedsMaxTradeSize {
                amount: normalized,
                max: self.config.max_trade_size,
            });
        }
        Ok(())
    }

    /// Validate and run every hop; the returned transaction is ready to commit
    fn run_staged(&self, run: &StagedRun<'_>, execution: &mut TradeExecution) -> ArbitrageResult<StagedTransaction> {
        self.set_state(ExecutionState::Validating);
        let amount = run.trade_amount();
        let snapshot = self.venue.snapshot();
        execution.block_number = snapshot.block_number;

        let validation = self
            .validator
            .validate_path(
                &snapshot,
                run.path.tokens(),
                run.path.dexes(),
                amount,
                run.max_gas_price,
                &self.parameters.current(),
            )
            .into_result()?;
        execution.gas_used = validation.total_gas.saturating_add(run.extra_gas);

        let start = run.path.start_token();
        let overhead_wei = (run.extra_gas as u128).saturating_mul(run.max_gas_price);
        let gas_cost = validation
            .gas_cost
            .saturating_add(self.validator.gas_cost_in_token(&snapshot, &start, overhead_wei)?);
        let costs = gas_cost.saturating_add(run.loan_fee());
        if validation.max_profit <= signed(costs) {
            return Err(ArbitrageError::UnprofitableAfterGas {
                expected_profit: validation.max_profit,
                costs,
            });
        }

        self.set_state(ExecutionState::Executing);
        log_execution!(
            "Executing {} hops with {} in (block {})",
            run.path.hops(),
            amount,
            snapshot.block_number
        );

        let mut tx = self.venue.begin(self.account);
        execution.block_number = tx.block_number();
        if let Some(loan) = &run.loan {
            debug!("{} Borrowing {} from {}", LogEmoji::LOAN, loan.principal, loan.provider);
            tx.credit(self.account, start, loan.principal);
        }

        let mut amount_hop = amount;
        for (hop, dex) in run.path.tokens().windows(2).zip(run.path.dexes()) {
            amount_hop = self.venue.swap(&mut tx, *dex, hop[0], hop[1], amount_hop)?;
        }
        execution.realized_output = amount_hop;

        let fee = run.loan_fee();
        execution.realized_profit = signed(amount_hop)
            .saturating_sub(signed(amount))
            .saturating_sub(signed(fee));

        if let Some(loan) = &run.loan {
            if amount_hop < loan.repayment() {
                return Err(ArbitrageError::RepaymentFailed {
                    owed: loan.repayment(),
                    available: amount_hop,
                });
            }
            tx.debit(self.account, start, loan.repayment())?;
        }

        let by_bps = amount.saturating_mul(self.config.min_profit_bps as u128) / BPS_DENOMINATOR as u128;
        let by_validation = u128::try_from(validation.min_profit.max(0)).unwrap_or_default();
        let required = amount.saturating_add(by_bps.saturating_add(gas_cost).max(by_validation));
        let realized = amount_hop.saturating_sub(fee);
        if realized < required {
            return Err(ArbitrageError::ProfitShortfall { realized, required });
        }
        Ok(tx)
    }

    fn roll_back(&self, mut execution: TradeExecution, err: ArbitrageError) -> ArbitrageError {
        execution.outcome = TxOutcome::RolledBack {
            code: err.code().to_string(),
            reason: err.to_string(),
        };
        let now = self.venue.snapshot().block_timestamp;
        let tripped = {
            let mut inner = self.inner.lock();
            inner.state = ExecutionState::RolledBack;
            let tripped = inner.breaker.record_failure(now);
            tripped.then(|| inner.breaker.consecutive_failures())
        };

        log_error!("Execution rolled back [{}]: {}", err.code(), err);
        emit(&self.events, ArbitrageEvent::TradeRolledBack { execution });
        if let Some(failures) = tripped {
            warn!("{} Circuit breaker tripped after {} failures", LogEmoji::BREAKER, failures);
            emit(&self.events, ArbitrageEvent::CircuitBreakerTripped { failures });
        }
        err
    }

    fn set_state(&self, state: ExecutionState) {
        self.inner.lock().state = state;
    }

    pub fn pause(&self, caller: AccountAddress) -> ArbitrageResult<()> {
        self.operator.ensure(caller)?;
        if !self.paused.swap(true, Ordering::SeqCst) {
            warn!("{} Trading paused by {}", LogEmoji::WARNING, caller.short());
            emit(&self.events, ArbitrageEvent::Paused { by: caller });
        }
        Ok(())
    }

    pub fn unpause(&self, caller: AccountAddress) -> ArbitrageResult<()> {
        self.operator.ensure(caller)?;
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("Trading resumed by {}", caller.short());
            emit(&self.events, ArbitrageEvent::Unpaused { by: caller });
        }
        Ok(())
    }

    pub fn reset_circuit_breaker(&self, caller: AccountAddress) -> ArbitrageResult<()> {
        self.operator.ensure(caller)?;
        {
            let mut inner = self.inner.lock();
            inner.breaker.reset();
            inner.state = ExecutionState::Idle;
        }
        info!("Circuit breaker reset by {}", caller.short());
        emit(&self.events, ArbitrageEvent::CircuitBreakerReset { by: caller });
        Ok(())
    }

    /// Queue a withdrawal that unlocks after the configured delay
    pub fn request_emergency_withdrawal(
        &self,
        caller: AccountAddress,
        token: TokenAddress,
        amount: u128,
        recipient: AccountAddress,
    ) -> ArbitrageResult<EmergencyWithdrawal> {
        self.operator.ensure(caller)?;
        let now = self.venue.snapshot().block_timestamp;
        let request = {
            let mut inner = self.inner.lock();
            let request = EmergencyWithdrawal {
                id: inner.next_withdrawal_id,
                token,
                amount,
                recipient,
                requested_at: now,
                unlock_at: now.saturating_add(self.config.emergency_withdrawal_delay_secs),
            };
            inner.next_withdrawal_id += 1;
            inner.withdrawals.insert(request.id, request.clone());
            request
        };

        warn!(
            id = request.id,
            amount = request.amount as f64,
            unlock_at = request.unlock_at,
            "Emergency withdrawal requested"
        );
        emit(
            &self.events,
            ArbitrageEvent::EmergencyWithdrawalRequested {
                id: request.id,
                token,
                amount,
                unlock_at: request.unlock_at,
            },
        );
        Ok(request)
    }

    /// Transfer a queued withdrawal once its delay has passed
    pub fn execute_emergency_withdrawal(&self, caller: AccountAddress, id: u64) -> ArbitrageResult<EmergencyWithdrawal> {
        self.operator.ensure(caller)?;
        let _exclusive = self.exec_lock.lock();

        let request = self
            .inner
            .lock()
            .withdrawals
            .get(&id)
            .cloned()
            .ok_or(ArbitrageError::UnknownWithdrawal(id))?;
        let now = self.venue.snapshot().block_timestamp;
        if now < request.unlock_at {
            return Err(ArbitrageError::WithdrawalLocked {
                id,
                remaining_secs: request.unlock_at - now,
            });
        }

        let mut tx = self.venue.begin(self.account);
        tx.transfer(self.account, request.recipient, request.token, request.amount)?;
        self.venue.commit(tx)?;
        self.inner.lock().withdrawals.remove(&id);

        warn!(id, recipient = %request.recipient.short(), "Emergency withdrawal executed");
        emit(
            &self.events,
            ArbitrageEvent::EmergencyWithdrawalExecuted {
                id,
                token: request.token,
                amount: request.amount,
                recipient: request.recipient,
            },
        );
        Ok(request)
    }

    pub fn pending_withdrawals(&self) -> Vec<EmergencyWithdrawal> {
        self.inner.lock().withdrawals.values().cloned().collect()
    }
}

fn signed(amount: u128) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}
