//! # Path Finder - Bounded Cyclic Route Search
//!
//! ## Algorithm
//!
//! 1. Build an arena graph from the active DEXes: tokens are indexed by
//!    `usize`, every supported pair contributes two directed edges
//!    `(dex_idx, from, to)`, and cycle closure is an index comparison.
//! 2. Depth-first search from the start token over simple cycles of
//!    `2..=max_hops` hops. Prefix quotes are computed incrementally on a pool
//!    overlay so a pool used twice sees its own earlier trade.
//! 3. Prune before quoting: inactive DEXes never enter the graph, and an edge
//!    whose DEX spot price deviates from the oracle reference by more than the
//!    tolerance is skipped. A stale oracle makes the edge unverifiable, so it
//!    is skipped too.
//! 4. Prune after quoting: hops breaking the impact or liquidity policy, gas
//!    over budget, and closing hops that return less than the input.
//! 5. Validate each surviving cycle with the [`PathValidator`] and rank by
//!    `expected_profit - gas_cost`. A cycle is kept only when its net profit
//!    is positive and its worst-case output, with every DEX giving up its full
//!    registered slippage tolerance, still returns the input
//!    (`min_profit >= 0`). Loose slippage settings therefore hide cycles that
//!    would pay after gas at quoted prices.
//!
//! The search is bounded by a quote-call budget and a wall-clock budget and
//! returns the best paths found so far when either runs out. All quotes come
//! from one snapshot; if the live block height moves mid-search the search
//! restarts on the new snapshot.

use crate::config::{SearchLimits, SearchParameters};
use crate::error::{ArbitrageError, ArbitrageResult};
use crate::events::{emit, ArbitrageEvent, EventBus};
use crate::market::{MarketSnapshot, MarketSource};
use crate::path_validator::PathValidator;
use crate::quote_manager::{PoolOverlay, QuoteManager};
use crate::registry::{DexEntry, PriceFeedRegistry};
use crate::trade::{Path, MAX_PATH_HOPS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use types::{DexAddress, TokenAddress};

/// Directed swap edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub dex_idx: usize,
    pub from: usize,
    pub to: usize,
}

/// Arena of tokens and directed DEX edges
#[derive(Debug, Default)]
pub struct TokenGraph {
    tokens: Vec<TokenAddress>,
    index: HashMap<TokenAddress, usize>,
    dexes: Vec<DexAddress>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
}

impl TokenGraph {
    pub fn build(active_dexes: &[DexEntry]) -> Self {
        let mut graph = Self::default();
        for entry in active_dexes.iter().filter(|entry| entry.is_active) {
            let dex_idx = graph.dexes.len();
            graph.dexes.push(entry.address);
            for pair in &entry.supported_pairs {
                let a = graph.intern(pair.token0);
                let b = graph.intern(pair.token1);
                graph.add_edge(Edge { dex_idx, from: a, to: b });
                graph.add_edge(Edge { dex_idx, from: b, to: a });
            }
        }
        graph
    }

    fn intern(&mut self, token: TokenAddress) -> usize {
        if let Some(idx) = self.index.get(&token) {
            return *idx;
        }
        let idx = self.tokens.len();
        self.tokens.push(token);
        self.index.insert(token, idx);
        self.adjacency.push(Vec::new());
        idx
    }

    fn add_edge(&mut self, edge: Edge) {
        self.adjacency[edge.from].push(self.edges.len());
        self.edges.push(edge);
    }

    pub fn index_of(&self, token: &TokenAddress) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn token(&self, idx: usize) -> TokenAddress {
        self.tokens[idx]
    }

    pub fn dex(&self, edge: &Edge) -> DexAddress {
        self.dexes[edge.dex_idx]
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Counters for one search invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub quote_calls: u32,
    pub cycles_validated: u32,
    pub edges_filtered: u32,
    pub restarts: u32,
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Profitable paths, best net profit first
    pub paths: Vec<Path>,
    pub stats: SearchStats,
    pub block_number: u64,
}

pub struct PathFinder {
    quotes: Arc<QuoteManager>,
    validator: Arc<PathValidator>,
    price_feeds: Arc<PriceFeedRegistry>,
    market: Arc<dyn MarketSource>,
    limits: SearchLimits,
    events: Option<EventBus>,
}

impl PathFinder {
    pub fn new(
        validator: Arc<PathValidator>,
        price_feeds: Arc<PriceFeedRegistry>,
        market: Arc<dyn MarketSource>,
        limits: SearchLimits,
    ) -> Self {
        Self {
            quotes: validator.quote_manager().clone(),
            validator,
            price_feeds,
            market,
            limits,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// Most profitable cycle through any registered tokens
    pub fn find_best_path(
        &self,
        start: TokenAddress,
        amount_in: u128,
        max_gas_price: u128,
        params: &SearchParameters,
    ) -> ArbitrageResult<Path> {
        let report = self.search(start, None, amount_in, max_gas_price, params)?;
        let best = report.paths.into_iter().next().ok_or_else(|| {
            ArbitrageError::NoPathFound(format!(
                "no cycle from {} clears gas at block {} ({} quotes)",
                self.quotes.tokens().symbol(&start),
                report.block_number,
                report.stats.quote_calls
            ))
        })?;

        log_profit!(
            "Best path {} nets {} after gas",
            best.describe(|t| self.quotes.tokens().symbol(t)),
            best.net_profit()
        );
        emit(
            &self.events,
            ArbitrageEvent::PathFound {
                net_profit: best.net_profit(),
                path: best.clone(),
            },
        );
        Ok(best)
    }

    /// Profitable cycles whose intermediate tokens all come from `candidates`
    pub fn find_paths_with_tokens(
        &self,
        start: TokenAddress,
        candidates: &[TokenAddress],
        amount_in: u128,
        max_gas_price: u128,
        params: &SearchParameters,
    ) -> ArbitrageResult<Vec<Path>> {
        Ok(self
            .search(start, Some(candidates), amount_in, max_gas_price, params)?
            .paths)
    }

    /// Run the search, restarting when the block height changes underneath it
    pub fn search(
        &self,
        start: TokenAddress,
        candidates: Option<&[TokenAddress]>,
        amount_in: u128,
        max_gas_price: u128,
        params: &SearchParameters,
    ) -> ArbitrageResult<SearchReport> {
        self.quotes.tokens().get(&start)?;
        if amount_in == 0 {
            return Err(ArbitrageError::InvalidPath("input amount must be positive".to_string()));
        }

        let graph = TokenGraph::build(&self.quotes.dex_registry().get_active_dexes());
        let Some(start_idx) = graph.index_of(&start) else {
            return Ok(SearchReport {
                paths: Vec::new(),
                stats: SearchStats::default(),
                block_number: self.market.block_number(),
            });
        };
        let allowed: Vec<bool> = match candidates {
            Some(list) => (0..graph.token_count())
                .map(|idx| list.contains(&graph.token(idx)))
                .collect(),
            None => vec![true; graph.token_count()],
        };
        let max_hops = self.limits.max_hops.clamp(2, MAX_PATH_HOPS);
        let deadline = Instant::now() + Duration::from_millis(self.limits.time_budget_ms);

        log_search!(
            "Searching cycles from {} ({} tokens, {} edges, up to {} hops)",
            self.quotes.tokens().symbol(&start),
            graph.token_count(),
            graph.edge_count(),
            max_hops
        );

        for restarts in 0..=self.limits.max_restarts {
            let snapshot = self.market.snapshot();
            let mut dfs = Dfs {
                finder: self,
                snapshot: &snapshot,
                graph: &graph,
                params,
                allowed: &allowed,
                start: start_idx,
                amount_in,
                max_gas_price,
                max_hops,
                deadline,
                overlay: PoolOverlay::new(&snapshot),
                nodes: vec![start_idx],
                edges: Vec::with_capacity(max_hops),
                gas_used: 0,
                on_path: vec![false; graph.token_count()],
                edge_verdicts: HashMap::new(),
                stats: SearchStats {
                    restarts,
                    ..SearchStats::default()
                },
                found: Vec::new(),
            };
            dfs.on_path[start_idx] = true;

            match dfs.visit(start_idx, amount_in) {
                Ok(()) => {
                    let Dfs { mut found, stats, .. } = dfs;
                    found.sort_by(|a, b| {
                        b.net_profit()
                            .cmp(&a.net_profit())
                            .then(a.hops().cmp(&b.hops()))
                    });
                    debug!(
                        block = snapshot.block_number,
                        found = found.len(),
                        quote_calls = stats.quote_calls,
                        cycles_validated = stats.cycles_validated,
                        edges_filtered = stats.edges_filtered,
                        budget_exhausted = stats.budget_exhausted,
                        "Search finished"
                    );
                    return Ok(SearchReport {
                        paths: found,
                        stats,
                        block_number: snapshot.block_number,
                    });
                }
                Err(BlockChanged) => {
                    log_warning!(
                        "Block moved {} -> {} mid-search, restarting",
                        snapshot.block_number,
                        self.market.block_number()
                    );
                }
            }
        }

        Err(ArbitrageError::BlockHeightChanged {
            restarts: self.limits.max_restarts,
        })
    }

    /// Whether the edge's DEX spot price agrees with the oracle reference
    fn verify_edge(&self, snapshot: &MarketSnapshot, dex: &DexAddress, from: &TokenAddress, to: &TokenAddress) -> bool {
        let reference = match self
            .price_feeds
            .get_oriented_price(*from, *to, snapshot.block_timestamp)
        {
            Ok(reading) => reading.price,
            Err(ArbitrageError::NoPriceFeed { .. }) => return !self.limits.require_price_feed,
            Err(err) => {
                debug!(dex = %dex.short(), error = %err, "Edge unverifiable");
                return false;
            }
        };
        let spot = match self.quotes.spot_price(snapshot, dex, from, to) {
            Ok(spot) => spot,
            Err(err) => {
                debug!(dex = %dex.short(), error = %err, "No spot price for edge");
                return false;
            }
        };
        match spot.deviation_bps(reference) {
            Ok(deviation) if deviation <= self.limits.price_deviation_tolerance_bps => true,
            Ok(deviation) => {
                debug!(dex = %dex.short(), deviation, "Edge deviates from oracle");
                false
            }
            Err(_) => false,
        }
    }
}

/// The live block moved past the snapshot being searched
struct BlockChanged;

struct Dfs<'a> {
    finder: &'a PathFinder,
    snapshot: &'a MarketSnapshot,
    graph: &'a TokenGraph,
    params: &'a SearchParameters,
    allowed: &'a [bool],
    start: usize,
    amount_in: u128,
    max_gas_price: u128,
    max_hops: usize,
    deadline: Instant,
    overlay: PoolOverlay<'a>,
    nodes: Vec<usize>,
    edges: Vec<usize>,
    gas_used: u64,
    on_path: Vec<bool>,
    edge_verdicts: HashMap<usize, bool>,
    stats: SearchStats,
    found: Vec<Path>,
}

impl<'a> Dfs<'a> {
    fn visit(&mut self, node: usize, amount: u128) -> Result<(), BlockChanged> {
        if self.finder.market.block_number() != self.snapshot.block_number {
            return Err(BlockChanged);
        }
        let graph = self.graph;
        let depth = self.edges.len();

        for &edge_idx in &graph.adjacency[node] {
            if self.stats.budget_exhausted || Instant::now() >= self.deadline {
                self.stats.budget_exhausted = true;
                return Ok(());
            }
            let edge = graph.edges[edge_idx];
            let closes = edge.to == self.start;

            if closes {
                if depth + 1 < 2 {
                    continue;
                }
            } else if depth + 1 >= self.max_hops || self.on_path[edge.to] || !self.allowed[edge.to] {
                continue;
            }
            // Straight back through the pool we just used only pays fees twice
            if let Some(&last) = self.edges.last() {
                let previous = graph.edges[last];
                if previous.dex_idx == edge.dex_idx && previous.from == edge.to {
                    continue;
                }
            }
            if !self.edge_verified(edge_idx) {
                continue;
            }
            if !self.spend(1) {
                return Ok(());
            }

            let dex = graph.dex(&edge);
            let (from, to) = (graph.token(edge.from), graph.token(edge.to));
            let quote = match self.finder.quotes.quote_in_overlay(&self.overlay, &dex, &from, &to, amount) {
                Ok(quote) => quote,
                Err(err) => {
                    debug!(dex = %dex.short(), error = %err, "Edge quote failed");
                    continue;
                }
            };
            if self.finder.validator.check_hop(&quote, self.params).is_err() {
                continue;
            }
            let gas = self.gas_used.saturating_add(quote.gas_estimate);
            if gas > self.params.max_gas_per_path {
                continue;
            }

            if closes {
                if quote.output_amount <= self.amount_in {
                    continue;
                }
                self.edges.push(edge_idx);
                self.record_cycle();
                self.edges.pop();
                continue;
            }

            let stage = self.overlay.depth();
            self.overlay.stage(&quote);
            self.edges.push(edge_idx);
            self.nodes.push(edge.to);
            self.on_path[edge.to] = true;
            let saved_gas = self.gas_used;
            self.gas_used = gas;

            let result = self.visit(edge.to, quote.output_amount);

            self.gas_used = saved_gas;
            self.on_path[edge.to] = false;
            self.nodes.pop();
            self.edges.pop();
            self.overlay.unwind(stage);
            result?;
        }
        Ok(())
    }

    /// Take `calls` from the quote budget
    fn spend(&mut self, calls: u32) -> bool {
        if self.stats.quote_calls.saturating_add(calls) > self.finder.limits.max_quote_calls {
            self.stats.budget_exhausted = true;
            return false;
        }
        self.stats.quote_calls += calls;
        true
    }

    fn edge_verified(&mut self, edge_idx: usize) -> bool {
        if let Some(verdict) = self.edge_verdicts.get(&edge_idx) {
            return *verdict;
        }
        let edge = self.graph.edges[edge_idx];
        let verdict = self.finder.verify_edge(
            self.snapshot,
            &self.graph.dex(&edge),
            &self.graph.token(edge.from),
            &self.graph.token(edge.to),
        );
        if !verdict {
            self.stats.edges_filtered += 1;
        }
        self.edge_verdicts.insert(edge_idx, verdict);
        verdict
    }

    /// Validate the cycle on the edge stack and keep it if it pays
    fn record_cycle(&mut self) {
        let hops = self.edges.len() as u32;
        if !self.spend(hops) {
            return;
        }
        self.stats.cycles_validated += 1;

        let mut tokens: Vec<TokenAddress> = self.nodes.iter().map(|idx| self.graph.token(*idx)).collect();
        tokens.push(self.graph.token(self.start));
        let dexes: Vec<DexAddress> = self
            .edges
            .iter()
            .map(|idx| self.graph.dex(&self.graph.edges[*idx]))
            .collect();

        let validation = self.finder.validator.validate_path(
            self.snapshot,
            &tokens,
            &dexes,
            self.amount_in,
            self.max_gas_price,
            self.params,
        );
        if !validation.is_valid || validation.min_profit < 0 || validation.net_profit() <= 0 {
            debug!(
                hops,
                reason = ?validation.failure_reason,
                net_profit = validation.net_profit() as f64,
                "Cycle rejected"
            );
            return;
        }

        match Path::new(
            tokens,
            dexes,
            validation.total_gas,
            validation.max_profit,
            validation.gas_cost,
            validation.block_number,
        ) {
            Ok(path) => self.found.push(path),
            Err(err) => debug!(error = %err, "Malformed cycle"),
        }
    }
}
