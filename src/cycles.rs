//! Cycle Finder. Bounded-depth DFS over a `PoolGraph` snapshot,
//! enumerating simple cycles rooted at a base mint whose summed edge
//! weight is strictly negative.
//!
//! A pure, weight-accumulating enumerator that never touches a quote
//! and only ever borrows the graph — exact re-pricing happens
//! downstream in the validator, not here.

use crate::graph::PoolGraph;
use crate::token::{PoolAddress, TokenId};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct CycleFinderConfig {
    /// K: max edge-length of an emitted cycle, 2..=5.
    pub max_hops: usize,
    /// Edges older than `freshest_slot - max_slot_lag` are excluded.
    pub max_slot_lag: u64,
    /// Results per scan are capped; excess is dropped, not queued.
    pub output_cap: usize,
}

impl Default for CycleFinderConfig {
    fn default() -> Self {
        Self {
            max_hops: 4,
            max_slot_lag: 5,
            output_cap: 64,
        }
    }
}

/// A candidate cycle `base -> v1 -> ... -> base`, produced by the cycle
/// finder and consumed by validation/scoring. Borrows nothing from the
/// graph — every field is a copy, so the value outlives the scan that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// Length `L`, `3 <= L <= K+1`; first and last entries equal `base`.
    pub mints: Vec<TokenId>,
    /// Length `L-1`, one pool per leg in traversal order.
    pub pool_addresses: Vec<PoolAddress>,
    pub theoretical_profit_pct: f64,
    pub min_liquidity: u64,
    pub total_fee_bps: u32,
    pub source_slot: u64,
}

pub struct CycleFinder;

impl CycleFinder {
    /// Enumerates negative-weight simple cycles through `base`. Pure
    /// function over the snapshot — cannot fail; an empty result means
    /// no arbitrage was found this tick, not an error.
    pub fn find(graph: &PoolGraph, base: TokenId, config: &CycleFinderConfig) -> Vec<Cycle> {
        let freshest = graph.freshest_slot();
        let min_slot_allowed = freshest.saturating_sub(config.max_slot_lag);
        let best_edge_weight = graph
            .edges()
            .filter(|e| !e.stale && e.last_update_slot >= min_slot_allowed)
            .map(|e| e.weight)
            .fold(f64::INFINITY, f64::min);

        let mut out = Vec::new();
        if !best_edge_weight.is_finite() {
            return out;
        }

        let mut path = vec![base];
        let mut pool_trail = Vec::new();
        let mut pools_used = HashSet::new();

        Self::dfs(
            graph,
            base,
            base,
            &mut path,
            &mut pool_trail,
            &mut pools_used,
            0.0,
            u64::MAX,
            0,
            u64::MAX,
            min_slot_allowed,
            best_edge_weight,
            config,
            &mut out,
        );
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        graph: &PoolGraph,
        base: TokenId,
        current: TokenId,
        path: &mut Vec<TokenId>,
        pool_trail: &mut Vec<PoolAddress>,
        pools_used: &mut HashSet<PoolAddress>,
        weight_sum: f64,
        min_liquidity: u64,
        total_fee_bps: u32,
        min_slot: u64,
        min_slot_allowed: u64,
        best_edge_weight: f64,
        config: &CycleFinderConfig,
        out: &mut Vec<Cycle>,
    ) {
        if out.len() >= config.output_cap {
            return;
        }
        let hops_so_far = pool_trail.len();

        for edge in graph.outbound(current) {
            if out.len() >= config.output_cap {
                return;
            }
            if edge.stale || edge.last_update_slot < min_slot_allowed {
                continue;
            }
            if pools_used.contains(&edge.pool_address) {
                continue;
            }

            let new_weight = weight_sum + edge.weight;
            let new_hops = hops_so_far + 1;
            let remaining_after_closing = config.max_hops.saturating_sub(new_hops);
            // Optimistic bound: even if every remaining hop (after this
            // one) were as good as the best edge anywhere in the fresh
            // graph, could the total still go negative? If not, prune.
            let optimistic = new_weight + remaining_after_closing as f64 * best_edge_weight;
            if optimistic >= 0.0 {
                continue;
            }

            let new_min_liquidity = min_liquidity.min(edge.liquidity);
            let new_total_fee_bps = total_fee_bps + edge.fee_bps as u32;
            let new_min_slot = min_slot.min(edge.last_update_slot);

            if edge.target_mint == base {
                if new_hops >= 2 && new_weight < 0.0 {
                    let mut mints = path.clone();
                    mints.push(base);
                    let mut pools = pool_trail.clone();
                    pools.push(edge.pool_address);
                    out.push(Cycle {
                        mints,
                        pool_addresses: pools,
                        theoretical_profit_pct: (-new_weight).exp_m1() * 100.0,
                        min_liquidity: new_min_liquidity,
                        total_fee_bps: new_total_fee_bps,
                        source_slot: new_min_slot,
                    });
                }
                continue;
            }

            if new_hops >= config.max_hops || path.contains(&edge.target_mint) {
                continue;
            }

            path.push(edge.target_mint);
            pool_trail.push(edge.pool_address);
            pools_used.insert(edge.pool_address);

            Self::dfs(
                graph,
                base,
                edge.target_mint,
                path,
                pool_trail,
                pools_used,
                new_weight,
                new_min_liquidity,
                new_total_fee_bps,
                new_min_slot,
                min_slot_allowed,
                best_edge_weight,
                config,
                out,
            );

            path.pop();
            pool_trail.pop();
            pools_used.remove(&edge.pool_address);
        }
    }
}
