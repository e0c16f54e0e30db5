//! Pool Graph. Mutable directed multigraph: nodes are token mints,
//! edges are pool sides carrying the current exchange rate, fee,
//! liquidity and slot.
//!
//! A `TokenId`-keyed adjacency list plus a pool-index map that owns both
//! directions of each physical pool, so an update to one pool's
//! reported price can locate and mutate both edges in O(1) and keep
//! them in lockstep.

use crate::error::EngineError;
use crate::token::{PoolAddress, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Closed enum of AMM families the engine knows how to price exactly.
/// Dispatch to the per-variant pricing routine lives in `crate::venues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueKind {
    AmmConstantProduct,
    AmmStable,
    Clmm,
    Dlmm,
}

/// A single directed pool side. Two of these (one each direction) exist
/// per physical pool, sharing `pool_address` and `last_update_slot`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEdge {
    pub source_mint: TokenId,
    pub target_mint: TokenId,
    pub pool_address: PoolAddress,
    pub venue: VenueKind,
    pub exchange_rate: f64,
    pub fee_bps: u16,
    pub liquidity: u64,
    pub last_update_slot: u64,
    pub weight: f64,
    pub stale: bool,
}

impl PoolEdge {
    fn new(
        source_mint: TokenId,
        target_mint: TokenId,
        pool_address: PoolAddress,
        venue: VenueKind,
        exchange_rate: f64,
        fee_bps: u16,
        liquidity: u64,
        last_update_slot: u64,
    ) -> Self {
        let weight = edge_weight(exchange_rate, fee_bps);
        Self {
            source_mint,
            target_mint,
            pool_address,
            venue,
            exchange_rate,
            fee_bps,
            liquidity,
            last_update_slot,
            weight,
            stale: false,
        }
    }

    fn apply_update(&mut self, exchange_rate: f64, fee_bps: u16, liquidity: u64, slot: u64) {
        self.exchange_rate = exchange_rate;
        self.fee_bps = fee_bps;
        self.liquidity = liquidity;
        self.last_update_slot = slot;
        self.weight = edge_weight(exchange_rate, fee_bps);
    }
}

/// `weight = -ln(exchange_rate * (1 - fee_bps / 10_000))`. A negative
/// weight means the leg is net-profitable in isolation; a
/// negative-weight cycle is the arbitrage signal the cycle finder
/// searches for.
pub fn edge_weight(exchange_rate: f64, fee_bps: u16) -> f64 {
    let net_rate = exchange_rate * (1.0 - fee_bps as f64 / 10_000.0);
    if net_rate > 0.0 {
        -net_rate.ln()
    } else {
        f64::INFINITY
    }
}

/// One accepted upsert, as handed to `PoolGraph::upsert_edge` by the
/// tick loop's drain step. Mirrors the ingress event shape.
#[derive(Debug, Clone)]
pub struct PoolUpdate {
    pub pool_address: PoolAddress,
    pub venue: VenueKind,
    pub source_mint: TokenId,
    pub target_mint: TokenId,
    pub new_rate: f64,
    pub new_fee_bps: u16,
    pub new_liquidity: u64,
    pub slot: u64,
}

/// Position of one directed edge within the adjacency list, for O(1)
/// in-place mutation.
#[derive(Debug, Clone, Copy)]
struct EdgeSlot {
    node: TokenId,
    index: usize,
}

/// A physical pool's identity, venue, and slot — the subset of
/// `PoolEdge` state persisted across restarts by `snapshot.rs`.
#[derive(Debug, Clone, Copy)]
pub struct PoolSummary {
    pub pool_address: PoolAddress,
    pub venue: VenueKind,
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub last_update_slot: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub pool_count: usize,
    pub rejected_mutations: u64,
}

/// The authoritative snapshot of reachable liquidity. Exclusively owned
/// and mutated by the engine task; every other component holds
/// borrowed, read-only views for the duration of one scan.
pub struct PoolGraph {
    adjacency: HashMap<TokenId, Vec<PoolEdge>>,
    pool_index: HashMap<PoolAddress, (EdgeSlot, EdgeSlot)>,
    nodes: HashSet<TokenId>,
    liquidity_floor: u64,
    rejected_mutations: u64,
}

impl PoolGraph {
    pub fn new(liquidity_floor: u64) -> Self {
        Self {
            adjacency: HashMap::new(),
            pool_index: HashMap::new(),
            nodes: HashSet::new(),
            liquidity_floor,
            rejected_mutations: 0,
        }
    }

    /// Creates missing `TokenId`s, locates or creates the forward/backward
    /// edge pair by `pool_address`, replaces rate/fee/liquidity/slot, and
    /// recomputes `weight` for both sides atomically.
    ///
    /// The backward edge's marginal rate is the reciprocal of the
    /// forward rate: at marginal trade size the two directions of an
    /// AMM quote the same price, just inverted.
    pub fn upsert_edge(&mut self, update: &PoolUpdate) -> Result<(), EngineError> {
        if update.source_mint == update.target_mint {
            self.rejected_mutations += 1;
            return Err(EngineError::InvariantViolation {
                invariant: 4,
                detail: "source_mint == target_mint".into(),
            });
        }
        if !(update.new_rate > 0.0) || !update.new_rate.is_finite() {
            self.rejected_mutations += 1;
            return Err(EngineError::InvariantViolation {
                invariant: 4,
                detail: format!("non-positive exchange_rate {}", update.new_rate),
            });
        }

        self.nodes.insert(update.source_mint);
        self.nodes.insert(update.target_mint);

        if let Some((fwd, bwd)) = self.pool_index.get(&update.pool_address).copied() {
            let prev_slot = self.adjacency[&fwd.node][fwd.index].last_update_slot;
            if update.slot <= prev_slot {
                self.rejected_mutations += 1;
                return Err(EngineError::InvariantViolation {
                    invariant: 3,
                    detail: format!("slot {} <= previous {}", update.slot, prev_slot),
                });
            }
            self.adjacency.get_mut(&fwd.node).unwrap()[fwd.index].apply_update(
                update.new_rate,
                update.new_fee_bps,
                update.new_liquidity,
                update.slot,
            );
            self.adjacency.get_mut(&bwd.node).unwrap()[bwd.index].apply_update(
                1.0 / update.new_rate,
                update.new_fee_bps,
                update.new_liquidity,
                update.slot,
            );
        } else {
            let fwd_edge = PoolEdge::new(
                update.source_mint,
                update.target_mint,
                update.pool_address,
                update.venue,
                update.new_rate,
                update.new_fee_bps,
                update.new_liquidity,
                update.slot,
            );
            let bwd_edge = PoolEdge::new(
                update.target_mint,
                update.source_mint,
                update.pool_address,
                update.venue,
                1.0 / update.new_rate,
                update.new_fee_bps,
                update.new_liquidity,
                update.slot,
            );

            let fwd_vec = self.adjacency.entry(update.source_mint).or_default();
            let fwd_idx = fwd_vec.len();
            fwd_vec.push(fwd_edge);

            let bwd_vec = self.adjacency.entry(update.target_mint).or_default();
            let bwd_idx = bwd_vec.len();
            bwd_vec.push(bwd_edge);

            self.pool_index.insert(
                update.pool_address,
                (
                    EdgeSlot {
                        node: update.source_mint,
                        index: fwd_idx,
                    },
                    EdgeSlot {
                        node: update.target_mint,
                        index: bwd_idx,
                    },
                ),
            );
        }

        self.apply_stale_flag(update.pool_address);
        Ok(())
    }

    fn apply_stale_flag(&mut self, pool_address: PoolAddress) {
        let Some((fwd, bwd)) = self.pool_index.get(&pool_address).copied() else {
            return;
        };
        let liquidity = self.adjacency[&fwd.node][fwd.index].liquidity;
        let stale = liquidity < self.liquidity_floor;
        self.adjacency.get_mut(&fwd.node).unwrap()[fwd.index].stale = stale;
        self.adjacency.get_mut(&bwd.node).unwrap()[bwd.index].stale = stale;
    }

    /// Sets the `stale` flag on both sides of a pool explicitly (e.g. on
    /// an upstream-reported halt), independent of the liquidity floor.
    pub fn mark_stale(&mut self, pool_address: PoolAddress) {
        if let Some((fwd, bwd)) = self.pool_index.get(&pool_address).copied() {
            self.adjacency.get_mut(&fwd.node).unwrap()[fwd.index].stale = true;
            self.adjacency.get_mut(&bwd.node).unwrap()[bwd.index].stale = true;
        }
    }

    /// Read-only view of a mint's outbound edges, stable for the
    /// duration of a scan since nothing mutates the graph between
    /// snapshot and scan completion.
    pub fn outbound(&self, source_mint: TokenId) -> &[PoolEdge] {
        self.adjacency
            .get(&source_mint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All edges in the graph, forward and backward sides alike, in no
    /// particular order. Used by the cycle finder to compute a global
    /// optimistic pruning bound once per scan rather than per recursion
    /// step.
    pub fn edges(&self) -> impl Iterator<Item = &PoolEdge> {
        self.adjacency.values().flat_map(|edges| edges.iter())
    }

    pub fn edge_by_pool(&self, pool_address: PoolAddress) -> Option<&PoolEdge> {
        let (fwd, _) = self.pool_index.get(&pool_address)?;
        self.adjacency.get(&fwd.node)?.get(fwd.index)
    }

    pub fn pool_count(&self) -> usize {
        self.pool_index.len()
    }

    /// One summary per physical pool, for `snapshot.rs` to persist on
    /// shutdown. Order is unspecified.
    pub fn pool_summaries(&self) -> Vec<PoolSummary> {
        self.pool_index
            .iter()
            .filter_map(|(pool_address, (fwd, _))| {
                self.adjacency
                    .get(&fwd.node)
                    .and_then(|edges| edges.get(fwd.index))
                    .map(|edge| PoolSummary {
                        pool_address: *pool_address,
                        venue: edge.venue,
                        token_a: edge.source_mint,
                        token_b: edge.target_mint,
                        last_update_slot: edge.last_update_slot,
                    })
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            pool_count: self.pool_count(),
            rejected_mutations: self.rejected_mutations,
        }
    }

    pub fn freshest_slot(&self) -> u64 {
        self.adjacency
            .values()
            .flat_map(|edges| edges.iter().map(|e| e.last_update_slot))
            .max()
            .unwrap_or(0)
    }

    /// Checks the four graph invariants against current state; used by
    /// tests and as an assertion hook in debug builds.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        for (pool_address, (fwd, bwd)) in &self.pool_index {
            let fwd_edge = self
                .adjacency
                .get(&fwd.node)
                .and_then(|v| v.get(fwd.index));
            let bwd_edge = self
                .adjacency
                .get(&bwd.node)
                .and_then(|v| v.get(bwd.index));
            let (Some(fwd_edge), Some(bwd_edge)) = (fwd_edge, bwd_edge) else {
                return Err(EngineError::InvariantViolation {
                    invariant: 1,
                    detail: format!("pool {pool_address} missing an edge side"),
                });
            };
            if fwd_edge.last_update_slot != bwd_edge.last_update_slot {
                return Err(EngineError::InvariantViolation {
                    invariant: 3,
                    detail: format!("pool {pool_address} sides disagree on slot"),
                });
            }
            for edge in [fwd_edge, bwd_edge] {
                if edge.exchange_rate <= 0.0 {
                    return Err(EngineError::InvariantViolation {
                        invariant: 4,
                        detail: format!("pool {pool_address} has non-positive rate"),
                    });
                }
                let expected = edge_weight(edge.exchange_rate, edge.fee_bps);
                if (edge.weight - expected).abs() > 1e-9 {
                    return Err(EngineError::InvariantViolation {
                        invariant: 2,
                        detail: format!("pool {pool_address} weight out of sync"),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(
        pool: u8,
        src: [u8; 32],
        dst: [u8; 32],
        rate: f64,
        fee_bps: u16,
        liquidity: u64,
        slot: u64,
    ) -> PoolUpdate {
        PoolUpdate {
            pool_address: PoolAddress(solana_sdk::pubkey::Pubkey::new_from_array([pool; 32])),
            venue: VenueKind::AmmConstantProduct,
            source_mint: TokenId::new(src),
            target_mint: TokenId::new(dst),
            new_rate: rate,
            new_fee_bps: fee_bps,
            new_liquidity: liquidity,
            slot,
        }
    }

    #[test]
    fn upsert_creates_both_directions() {
        let mut graph = PoolGraph::new(0);
        graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.01, 30, 1_000_000, 10))
            .unwrap();

        assert_eq!(graph.pool_count(), 1);
        assert_eq!(graph.node_count(), 2);

        let fwd = graph.outbound(TokenId::new([1; 32]));
        assert_eq!(fwd.len(), 1);
        assert!((fwd[0].exchange_rate - 1.01).abs() < 1e-12);

        let bwd = graph.outbound(TokenId::new([2; 32]));
        assert_eq!(bwd.len(), 1);
        assert!((bwd[0].exchange_rate - 1.0 / 1.01).abs() < 1e-12);

        graph.check_invariants().unwrap();
    }

    #[test]
    fn upsert_rejects_non_increasing_slot() {
        let mut graph = PoolGraph::new(0);
        graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.0, 30, 1_000, 10))
            .unwrap();
        let err = graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.02, 30, 1_000, 10))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { invariant: 3, .. }));
    }

    #[test]
    fn weight_recomputed_on_every_update() {
        let mut graph = PoolGraph::new(0);
        graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.0, 30, 1_000, 1))
            .unwrap();
        graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.05, 30, 1_000, 2))
            .unwrap();
        let edge = graph.edge_by_pool(graph.pool_index_for_test()).unwrap();
        let expected = edge_weight(1.05, 30);
        assert!((edge.weight - expected).abs() < 1e-12);
    }

    #[test]
    fn low_liquidity_marks_stale() {
        let mut graph = PoolGraph::new(10_000);
        graph
            .upsert_edge(&update(1, [1; 32], [2; 32], 1.0, 30, 500, 1))
            .unwrap();
        let edge = &graph.outbound(TokenId::new([1; 32]))[0];
        assert!(edge.stale);
    }

    impl PoolGraph {
        fn pool_index_for_test(&self) -> PoolAddress {
            *self.pool_index.keys().next().unwrap()
        }
    }
}
