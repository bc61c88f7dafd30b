//! # Path Validator
//!
//! Re-derives a candidate path's realized output hop by hop and checks it
//! against the [`SearchParameters`] policy. Structural problems (empty path,
//! length mismatch, non-cyclic route) are rejected before a single quote is
//! computed.
//!
//! Profit bounds, in start-token base units:
//!
//! - `max_profit = output - amount_in`
//! - `min_profit = output * Π(1 - max_slippage_i) - amount_in`, where each
//!   DEX's registered slippage tolerance is applied in turn
//!
//! Gas is priced at `max_gas_price` and converted into the start token
//! through the native-token oracle feed, falling back to the best live DEX
//! quote for native → start.

use crate::config::SearchParameters;
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::logging::LogEmoji;
use crate::market::MarketSnapshot;
use crate::quote_manager::{Quote, QuoteManager};
use crate::registry::{DexRegistry, PriceFeedRegistry, TokenRegistry};
use crate::trade::check_structure;
use std::sync::Arc;
use torq_amm::full_math::{mul_div_rounding_up, u256_to_u128};
use torq_amm::{BPS_DENOMINATOR, U256};
use tracing::debug;
use types::{DexAddress, TokenAddress};

/// Verdict on one path at one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub min_profit: i128,
    pub max_profit: i128,
    pub total_gas: u64,
    pub gas_cost_wei: u128,
    /// Gas cost in start-token base units
    pub gas_cost: u128,
    pub final_output: u128,
    pub hop_quotes: Vec<Quote>,
    pub failure_reason: Option<ArbitrageError>,
    pub block_number: u64,
}

impl ValidationResult {
    fn rejected(reason: ArbitrageError, block_number: u64) -> Self {
        Self {
            is_valid: false,
            min_profit: 0,
            max_profit: 0,
            total_gas: 0,
            gas_cost_wei: 0,
            gas_cost: 0,
            final_output: 0,
            hop_quotes: Vec::new(),
            failure_reason: Some(reason),
            block_number,
        }
    }

    /// Expected profit after gas
    pub fn net_profit(&self) -> i128 {
        self.max_profit
            .saturating_sub(i128::try_from(self.gas_cost).unwrap_or(i128::MAX))
    }

    /// `Err(reason)` for rejected paths
    pub fn into_result(self) -> ArbitrageResult<Self> {
        match self.failure_reason {
            Some(reason) => Err(reason),
            None => Ok(self),
        }
    }
}

pub struct PathValidator {
    quotes: Arc<QuoteManager>,
    price_feeds: Arc<PriceFeedRegistry>,
    native_token: TokenAddress,
}

impl PathValidator {
    pub fn new(quotes: Arc<QuoteManager>, price_feeds: Arc<PriceFeedRegistry>, native_token: TokenAddress) -> Self {
        Self {
            quotes,
            price_feeds,
            native_token,
        }
    }

    pub fn quote_manager(&self) -> &Arc<QuoteManager> {
        &self.quotes
    }

    pub fn native_token(&self) -> TokenAddress {
        self.native_token
    }

    fn dex_registry(&self) -> &Arc<DexRegistry> {
        self.quotes.dex_registry()
    }

    fn tokens(&self) -> &Arc<TokenRegistry> {
        self.quotes.tokens()
    }

    pub fn validate_path(
        &self,
        snapshot: &MarketSnapshot,
        tokens: &[TokenAddress],
        dexes: &[DexAddress],
        amount_in: u128,
        max_gas_price: u128,
        params: &SearchParameters,
    ) -> ValidationResult {
        let block = snapshot.block_number;
        if let Err(reason) = check_structure(tokens, dexes, amount_in) {
            return ValidationResult::rejected(reason, block);
        }

        let hop_quotes = match self.quotes.quote_path(snapshot, tokens, dexes, amount_in) {
            Ok(quotes) => quotes,
            Err(reason) => return ValidationResult::rejected(reason, block),
        };

        let mut total_gas: u64 = 0;
        for quote in &hop_quotes {
            if let Err(reason) = self.check_hop(quote, params) {
                return ValidationResult::rejected(reason, block);
            }
            total_gas = total_gas.saturating_add(quote.gas_estimate);
            if total_gas > params.max_gas_per_path {
                return ValidationResult::rejected(
                    ArbitrageError::ExcessiveGas {
                        gas: total_gas,
                        max_gas: params.max_gas_per_path,
                    },
                    block,
                );
            }
        }

        let final_output = hop_quotes.last().map(|q| q.output_amount).unwrap_or_default();
        let max_profit = signed_diff(final_output, amount_in);
        let min_profit = signed_diff(worst_case_output(&hop_quotes, self.dex_registry()), amount_in);

        let gas_cost_wei = (total_gas as u128).saturating_mul(max_gas_price);
        let gas_cost = match self.gas_cost_in_token(snapshot, &tokens[0], gas_cost_wei) {
            Ok(cost) => cost,
            Err(reason) => return ValidationResult::rejected(reason, block),
        };

        debug!(
            hops = hop_quotes.len(),
            total_gas,
            max_profit = max_profit as f64,
            min_profit = min_profit as f64,
            gas_cost = gas_cost as f64,
            "Path validated"
        );

        ValidationResult {
            is_valid: true,
            min_profit,
            max_profit,
            total_gas,
            gas_cost_wei,
            gas_cost,
            final_output,
            hop_quotes,
            failure_reason: None,
            block_number: block,
        }
    }

    /// Per-hop liquidity and price-impact policy
    pub fn check_hop(&self, quote: &Quote, params: &SearchParameters) -> ArbitrageResult<()> {
        let decimals = self.tokens().decimals(&quote.token_out)?;
        let depth = types::precision::normalize_amount(quote.available_liquidity, decimals);
        if depth < params.min_liquidity_required {
            return Err(ArbitrageError::InsufficientLiquidity(format!(
                "hop via {} has depth {} below required {}",
                quote.dex.short(),
                depth,
                params.min_liquidity_required
            )));
        }
        if quote.price_impact_bps > params.max_price_impact_bps {
            return Err(ArbitrageError::ExcessivePriceImpact {
                impact_bps: quote.price_impact_bps,
                max_bps: params.max_price_impact_bps,
            });
        }
        Ok(())
    }

    /// Convert a wei amount of the native token into `token` base units
    pub fn gas_cost_in_token(&self, snapshot: &MarketSnapshot, token: &TokenAddress, gas_wei: u128) -> ArbitrageResult<u128> {
        if gas_wei == 0 || *token == self.native_token {
            return Ok(gas_wei);
        }

        let oracle_error = match self
            .price_feeds
            .get_oriented_price(self.native_token, *token, snapshot.block_timestamp)
        {
            Ok(reading) => {
                let native_decimals = self.tokens().decimals(&self.native_token)? as u32;
                let token_decimals = self.tokens().decimals(token)? as u32;
                // wei * price * 10^dec_token / (10^dec_native * 10^price_dec)
                let numerator = U256::from(reading.price.answer) * U256::exp10(token_decimals as usize);
                let denominator = U256::exp10((native_decimals + reading.price.decimals as u32) as usize);
                let cost = mul_div_rounding_up(U256::from(gas_wei), numerator, denominator)?;
                return Ok(u256_to_u128(cost, "gas cost")?);
            }
            Err(err) => err,
        };

        let quotes = self
            .quotes
            .get_quotes(snapshot, &self.native_token, token, gas_wei, 0);
        match quotes.first() {
            Some(best) => {
                debug!("{} Gas priced from DEX quote ({})", LogEmoji::GAS, oracle_error);
                Ok(best.quote.output_amount)
            }
            None => Err(oracle_error),
        }
    }
}

/// Output after every hop gives up its DEX's full slippage tolerance
fn worst_case_output(hop_quotes: &[Quote], registry: &DexRegistry) -> u128 {
    let Some(last) = hop_quotes.last() else {
        return 0;
    };
    hop_quotes.iter().fold(last.output_amount, |amount, quote| {
        let slippage = registry
            .get_dex_info(&quote.dex)
            .map(|entry| entry.max_slippage_bps)
            .unwrap_or(BPS_DENOMINATOR);
        apply_slippage(amount, slippage)
    })
}

fn apply_slippage(amount: u128, slippage_bps: u32) -> u128 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps) as u128;
    match amount.checked_mul(keep) {
        Some(scaled) => scaled / BPS_DENOMINATOR as u128,
        None => (amount / BPS_DENOMINATOR as u128) * keep,
    }
}

fn signed_diff(a: u128, b: u128) -> i128 {
    let a = i128::try_from(a).unwrap_or(i128::MAX);
    let b = i128::try_from(b).unwrap_or(i128::MAX);
    a.saturating_sub(b)
}
