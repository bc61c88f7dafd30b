//! Optimal position sizing for arbitrage opportunities
//!
//! Cyclic arbitrage profit as a function of trade size is concave: it rises
//! while the price gap pays for the slippage and falls once slippage
//! dominates. The calculator finds the maximum with a ternary search over
//! integer base units, so it works for any mix of V2/V3 hops and for profit
//! curves that include loan fees.

use tracing::debug;

/// Configuration for position sizing
#[derive(Debug, Clone)]
pub struct SizingConfig {
    /// Upper bound on search iterations
    pub max_iterations: u32,
    /// Stop once the bracket is this narrow (base units)
    pub resolution: u128,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            resolution: 1,
        }
    }
}

/// Result of optimal position calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimalPosition {
    pub amount_in: u128,
    /// Profit at `amount_in` in the same units the profit curve returns
    pub expected_profit: i128,
    pub evaluations: u32,
    pub is_profitable: bool,
}

impl OptimalPosition {
    pub fn no_opportunity() -> Self {
        Self {
            amount_in: 0,
            expected_profit: 0,
            evaluations: 0,
            is_profitable: false,
        }
    }

    /// Profit as basis points of the traded amount
    pub fn profit_margin_bps(&self) -> i128 {
        if self.amount_in == 0 {
            return 0;
        }
        let amount = i128::try_from(self.amount_in).unwrap_or(i128::MAX);
        self.expected_profit.saturating_mul(10_000) / amount
    }
}

/// Calculates optimal trade sizes for arbitrage
pub struct OptimalSizeCalculator {
    config: SizingConfig,
}

impl OptimalSizeCalculator {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Maximize `profit` over `[low, high]`
    ///
    /// `profit` returns `None` for sizes the pools cannot fill; those are
    /// treated as infinitely bad so the search moves toward smaller sizes.
    pub fn find_optimal_amount<F>(&self, low: u128, high: u128, mut profit: F) -> OptimalPosition
    where
        F: FnMut(u128) -> Option<i128>,
    {
        if high < low || high == 0 {
            return OptimalPosition::no_opportunity();
        }
        let resolution = self.config.resolution.max(2);
        let mut evaluations = 0u32;
        let mut evaluate = |amount: u128, evaluations: &mut u32| {
            *evaluations += 1;
            profit(amount).unwrap_or(i128::MIN)
        };

        let (mut lo, mut hi) = (low, high);
        let mut iterations = 0;
        while hi - lo > resolution && iterations < self.config.max_iterations {
            let third = (hi - lo) / 3;
            let m1 = lo + third;
            let m2 = hi - third;
            if evaluate(m1, &mut evaluations) < evaluate(m2, &mut evaluations) {
                lo = m1;
            } else {
                hi = m2;
            }
            iterations += 1;
        }

        let mut best = OptimalPosition::no_opportunity();
        let mut best_profit = i128::MIN;
        for candidate in [lo, lo + (hi - lo) / 2, hi] {
            let candidate_profit = evaluate(candidate, &mut evaluations);
            if candidate_profit > best_profit {
                best_profit = candidate_profit;
                best.amount_in = candidate;
            }
        }
        best.expected_profit = if best_profit == i128::MIN { 0 } else { best_profit };
        best.is_profitable = best_profit > 0 && best.amount_in > 0;
        best.evaluations = evaluations;

        debug!(
            amount_in = best.amount_in,
            expected_profit = best.expected_profit,
            evaluations,
            "Optimal size search finished"
        );
        best
    }
}
