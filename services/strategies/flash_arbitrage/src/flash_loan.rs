//! # Flash Loan Manager
//!
//! Sizes and executes trades that borrow part of their input for the
//! duration of one staged transaction.
//!
//! ## Sizing
//!
//! Cyclic profit is concave in trade size, and the loan fee is linear in the
//! borrowed amount, so `profit(S) - fee(S - own)` is concave too. For each
//! eligible lending pool the manager runs a ternary search over
//! `[own, own + pool liquidity]` and keeps the loan only when it beats the
//! best own-capital-only size: the borrowed portion has to earn more than it
//! costs.
//!
//! ## Execution
//!
//! The principal is credited inside the engine's staged transaction, the
//! hops run on `own + principal`, and `principal + fee` is debited from the
//! output before the profit check. Output short of the repayment fails with
//! `RepaymentFailed` and the whole transaction is discarded.

use crate::config::{FlashLoanConfig, SearchParameters};
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::executor::{MultiPathArbitrage, StagedRun};
use crate::logging::LogEmoji;
use crate::trade::{LoanTerms, Path, TradeExecution};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use torq_amm::{OptimalSizeCalculator, SizingConfig, BPS_DENOMINATOR};
use tracing::{debug, info};
use types::{AccountAddress, TokenAddress};

/// Source of flash liquidity
pub trait LendingPool: Send + Sync {
    fn name(&self) -> &str;

    fn available_liquidity(&self, token: &TokenAddress) -> u128;

    fn fee_bps(&self) -> u32;
}

/// Lending pool with fixed, operator-set liquidity
#[derive(Debug)]
pub struct StaticLendingPool {
    name: String,
    fee_bps: u32,
    liquidity: RwLock<HashMap<TokenAddress, u128>>,
}

impl StaticLendingPool {
    pub fn new(name: impl Into<String>, fee_bps: u32) -> Self {
        Self {
            name: name.into(),
            fee_bps,
            liquidity: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_liquidity(self, token: TokenAddress, amount: u128) -> Self {
        self.set_liquidity(token, amount);
        self
    }

    pub fn set_liquidity(&self, token: TokenAddress, amount: u128) {
        self.liquidity.write().insert(token, amount);
    }
}

impl LendingPool for StaticLendingPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_liquidity(&self, token: &TokenAddress) -> u128 {
        self.liquidity.read().get(token).copied().unwrap_or_default()
    }

    fn fee_bps(&self) -> u32 {
        self.fee_bps
    }
}

/// Fee on `principal`, rounded up as lenders do
pub fn loan_fee(principal: u128, fee_bps: u32) -> u128 {
    let denominator = BPS_DENOMINATOR as u128;
    match principal.checked_mul(fee_bps as u128) {
        Some(scaled) => scaled.div_ceil(denominator),
        None => (principal / denominator).saturating_mul(fee_bps as u128).saturating_add(fee_bps as u128),
    }
}

/// Sizing decision for one opportunity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPlan {
    pub token: TokenAddress,
    pub own_capital: u128,
    /// Own capital plus loan
    pub total_size: u128,
    pub loan_amount: u128,
    pub loan_fee: u128,
    pub provider: Option<String>,
    /// Profit at `total_size`, net of the loan fee
    pub expected_profit: i128,
    /// Best profit achievable with own capital alone
    pub own_capital_profit: i128,
}

impl LoanPlan {
    pub fn use_flash_loan(&self) -> bool {
        self.loan_amount > 0
    }
}

/// Path plus the trader's own contribution
#[derive(Debug, Clone)]
pub struct PathParams<'a> {
    pub path: &'a Path,
    pub own_amount: u128,
    pub max_gas_price: u128,
}

pub struct FlashLoanManager {
    engine: Arc<MultiPathArbitrage>,
    lenders: Vec<Arc<dyn LendingPool>>,
    config: FlashLoanConfig,
    sizing: OptimalSizeCalculator,
}

impl FlashLoanManager {
    pub fn new(engine: Arc<MultiPathArbitrage>, config: FlashLoanConfig) -> Self {
        Self {
            engine,
            lenders: Vec::new(),
            config,
            sizing: OptimalSizeCalculator::new(SizingConfig::default()),
        }
    }

    pub fn with_lender(mut self, lender: Arc<dyn LendingPool>) -> Self {
        self.lenders.push(lender);
        self
    }

    pub fn engine(&self) -> &Arc<MultiPathArbitrage> {
        &self.engine
    }

    fn eligible_lenders(&self) -> impl Iterator<Item = &Arc<dyn LendingPool>> {
        self.lenders
            .iter()
            .filter(|lender| lender.fee_bps() <= self.config.max_fee_bps)
    }

    /// Best total size for `expected_profit`, borrowing only when it pays
    ///
    /// `expected_profit(size)` is the profit curve of the opportunity in
    /// `token` base units, `None` where the pools cannot fill the size.
    pub fn calculate_optimal_loan_amount<F>(&self, token: TokenAddress, own_capital: u128, expected_profit: F) -> LoanPlan
    where
        F: Fn(u128) -> Option<i128>,
    {
        let own_only = self.sizing.find_optimal_amount(0, own_capital, &expected_profit);
        let mut plan = LoanPlan {
            token,
            own_capital,
            total_size: own_only.amount_in,
            loan_amount: 0,
            loan_fee: 0,
            provider: None,
            expected_profit: own_only.expected_profit,
            own_capital_profit: own_only.expected_profit,
        };

        for lender in self.eligible_lenders() {
            let liquidity = lender.available_liquidity(&token);
            if liquidity == 0 {
                continue;
            }
            let fee_bps = lender.fee_bps();
            let high = own_capital.saturating_add(liquidity);
            let position = self.sizing.find_optimal_amount(own_capital, high, |size| {
                let fee = loan_fee(size - own_capital, fee_bps);
                expected_profit(size).map(|profit| profit.saturating_sub(i128::try_from(fee).unwrap_or(i128::MAX)))
            });
            let loan_amount = position.amount_in.saturating_sub(own_capital);

            debug!(
                lender = lender.name(),
                loan_amount = loan_amount as f64,
                profit = position.expected_profit as f64,
                "Loan sizing candidate"
            );
            if loan_amount > 0 && position.is_profitable && position.expected_profit > plan.expected_profit {
                plan.total_size = position.amount_in;
                plan.loan_amount = loan_amount;
                plan.loan_fee = loan_fee(loan_amount, fee_bps);
                plan.provider = Some(lender.name().to_string());
                plan.expected_profit = position.expected_profit;
            }
        }

        if plan.use_flash_loan() {
            info!(
                "{} Borrowing {} from {} lifts profit {} -> {}",
                LogEmoji::LOAN,
                plan.loan_amount,
                plan.provider.as_deref().unwrap_or_default(),
                plan.own_capital_profit,
                plan.expected_profit
            );
        }
        plan
    }

    /// Size a loan for `path` against the engine's current venue state
    pub fn plan_for_path(
        &self,
        path: &Path,
        own_capital: u128,
        max_gas_price: u128,
        params: &SearchParameters,
    ) -> LoanPlan {
        let snapshot = self.engine.venue().snapshot();
        let validator = self.engine.validator();
        self.calculate_optimal_loan_amount(path.start_token(), own_capital, |size| {
            if size == 0 {
                return Some(0);
            }
            let validation = validator.validate_path(&snapshot, path.tokens(), path.dexes(), size, max_gas_price, params);
            validation.is_valid.then(|| validation.net_profit())
        })
    }

    /// Borrow `loan_amount` of `token` and run the path inside one staged transaction
    pub fn execute_with_flash_loan(
        &self,
        caller: AccountAddress,
        token: TokenAddress,
        loan_amount: u128,
        params: PathParams<'_>,
    ) -> ArbitrageResult<TradeExecution> {
        if params.path.start_token() != token {
            return Err(ArbitrageError::InvalidPath(format!(
                "loan token {} is not the path's start token {}",
                token.short(),
                params.path.start_token().short()
            )));
        }
        if loan_amount == 0 {
            return self
                .engine
                .execute_multi_path_arbitrage(caller, params.path, params.own_amount, params.max_gas_price);
        }

        let lender = self
            .eligible_lenders()
            .filter(|lender| lender.available_liquidity(&token) >= loan_amount)
            .min_by_key(|lender| lender.fee_bps())
            .ok_or_else(|| {
                ArbitrageError::InsufficientLiquidity(format!(
                    "no lending pool within {} bps can lend {} of {}",
                    self.config.max_fee_bps,
                    loan_amount,
                    token.short()
                ))
            })?;

        let terms = LoanTerms {
            provider: lender.name().to_string(),
            principal: loan_amount,
            fee: loan_fee(loan_amount, lender.fee_bps()),
        };
        let path = params.path.clone().with_flash_loan(true);
        self.engine.execute_staged(
            caller,
            StagedRun {
                path: &path,
                own_amount: params.own_amount,
                max_gas_price: params.max_gas_price,
                loan: Some(terms),
                extra_gas: self.config.loan_gas_overhead,
            },
        )
    }
}
