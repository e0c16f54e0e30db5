//! End-to-end scenarios S1-S6, each exercising the public pipeline
//! (ingress -> graph -> C3 -> C4 -> C5) against a small fixed graph, one
//! assertion per documented outcome.

use arb_engine::cycles::{Cycle, CycleFinder, CycleFinderConfig};
use arb_engine::emitter::{apply_feedback, FailureRateEstimator};
use arb_engine::error::GateKind;
use arb_engine::graph::{PoolGraph, PoolUpdate, VenueKind};
use arb_engine::ingress::{IngressAggregator, IngressEvent};
use arb_engine::scorer::{
    GateConfig, Gates, ReliabilityTracker, ScoreClass, Scorer, ScorerConfig, SlippageController,
    TipController,
};
use arb_engine::token::{PoolAddress, TokenId};
use arb_engine::validator::{CostModelConfig, CycleValidator, ValidatorConfig, VenueQuoteSource};
use arb_engine::venues::{ConstantProductQuoter, VenueQuote};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

fn mint(b: u8) -> TokenId {
    TokenId::new([b; 32])
}

fn pool(b: u8) -> PoolAddress {
    PoolAddress(Pubkey::new_from_array([b; 32]))
}

struct ReserveQuoteSource {
    reserves: HashMap<PoolAddress, (u128, u128, u16)>,
}

impl VenueQuoteSource for ReserveQuoteSource {
    fn quote_for(
        &self,
        pool_address: PoolAddress,
        _venue: VenueKind,
        _source_mint: TokenId,
    ) -> Option<VenueQuote> {
        let (reserve_in, reserve_out, fee_bps) = *self.reserves.get(&pool_address)?;
        Some(VenueQuote::ConstantProduct(ConstantProductQuoter {
            reserve_in,
            reserve_out,
            fee_bps,
        }))
    }
}

fn upsert(graph: &mut PoolGraph, pool_id: u8, src: u8, dst: u8, rate: f64, fee_bps: u16, liquidity: u64, slot: u64) {
    graph
        .upsert_edge(&PoolUpdate {
            pool_address: pool(pool_id),
            venue: VenueKind::AmmConstantProduct,
            source_mint: mint(src),
            target_mint: mint(dst),
            new_rate: rate,
            new_fee_bps: fee_bps,
            new_liquidity: liquidity,
            slot,
        })
        .unwrap();
}

/// Net rate 1.01 at 30 bp fee: `exchange_rate * (1 - 0.003) == 1.01`.
const TRIANGLE_RATE: f64 = 1.01 / (1.0 - 0.003);

fn triangle_graph() -> PoolGraph {
    let mut graph = PoolGraph::new(0);
    upsert(&mut graph, 1, 0, 1, TRIANGLE_RATE, 30, 1_000_000_000, 100);
    upsert(&mut graph, 2, 1, 2, TRIANGLE_RATE, 30, 1_000_000_000, 100);
    upsert(&mut graph, 3, 2, 0, TRIANGLE_RATE, 30, 1_000_000_000, 100);
    graph
}

fn triangle_reserves() -> ReserveQuoteSource {
    // Reserves deep enough that a multi-billion-lamport trade barely
    // moves the marginal price away from TRIANGLE_RATE.
    let mut reserves = HashMap::new();
    for (pool_id, rate) in [(1u8, TRIANGLE_RATE), (2, TRIANGLE_RATE), (3, TRIANGLE_RATE)] {
        let reserve_in = 1_000_000_000_000_000u128;
        let reserve_out = (reserve_in as f64 * rate) as u128;
        reserves.insert(pool(pool_id), (reserve_in, reserve_out, 30u16));
    }
    ReserveQuoteSource { reserves }
}

/// S1 - Triangle profit: exactly one cycle found, validated, and
/// classified GO.
#[test]
fn s1_triangle_profit_is_go() {
    let graph = triangle_graph();
    let quotes = triangle_reserves();

    let cycles = CycleFinder::find(
        &graph,
        mint(0),
        &CycleFinderConfig {
            max_hops: 3,
            max_slot_lag: 5,
            output_cap: 64,
        },
    );
    assert_eq!(cycles.len(), 1);
    let cycle = &cycles[0];
    assert_eq!(cycle.mints, vec![mint(0), mint(1), mint(2), mint(0)]);

    let validator_config = ValidatorConfig {
        input_min: 100_000_000,
        input_max: 10_000_000_000,
        ..ValidatorConfig::default()
    };
    let priced = CycleValidator::validate(
        &graph,
        &quotes,
        cycle,
        &validator_config,
        &CostModelConfig::default(),
        50,
        1.0,
        150.0,
    )
    .expect("triangle should validate as profitable");
    assert!(priced.input_amount >= validator_config.input_min);
    assert!(priced.input_amount <= validator_config.input_max);

    let scorer = Scorer::new(ScorerConfig::default());
    let reliability = ReliabilityTracker::new();
    let opportunity = scorer.score(
        priced,
        &[
            VenueKind::AmmConstantProduct,
            VenueKind::AmmConstantProduct,
            VenueKind::AmmConstantProduct,
        ],
        graph.freshest_slot(),
        &reliability,
        0,
    );
    assert_eq!(opportunity.score_class, ScoreClass::Go);
}

/// S2 - Stale leg rejection: the B/C edge lags the fresh slot by more
/// than `max_slot_lag`, so no cycle is emitted.
#[test]
fn s2_stale_leg_yields_no_cycles() {
    let mut graph = PoolGraph::new(0);
    upsert(&mut graph, 1, 0, 1, TRIANGLE_RATE, 30, 1_000_000_000, 100);
    upsert(&mut graph, 2, 1, 2, TRIANGLE_RATE, 30, 1_000_000_000, 90); // freshest - 10
    upsert(&mut graph, 3, 2, 0, TRIANGLE_RATE, 30, 1_000_000_000, 100);

    let cycles = CycleFinder::find(
        &graph,
        mint(0),
        &CycleFinderConfig {
            max_hops: 3,
            max_slot_lag: 5,
            output_cap: 64,
        },
    );
    assert!(cycles.is_empty());
}

/// S3 - Negative net after tip: tip set to 60% of gross profit trips the
/// tip-to-profit gate and blocks emission.
#[test]
fn s3_excessive_tip_blocks_via_gate() {
    let mut gates = Gates::new(GateConfig::default());
    let profit_usd = 10.0;
    let tip_usd = 0.6 * profit_usd;
    let err = gates.check(0, 0, tip_usd, profit_usd).unwrap_err();
    assert_eq!(err, GateKind::TipToProfit);
}

/// S4 - Congestion escalation: five execution-lag samples over 1000ms
/// push the tip multiplier to its 5x ceiling.
#[test]
fn s4_congestion_escalates_tip_to_5x() {
    use arb_engine::emitter::{ExecutionResult, FailureReason, FeedbackEvent};

    let mut reliability = ReliabilityTracker::new();
    let mut tip = TipController::new(0.01, 1.0);
    let mut slippage = SlippageController::new(200, 100, 800, 50, 64);
    let mut failure_rate = FailureRateEstimator::new(0.05);

    for _ in 0..5 {
        let event = FeedbackEvent {
            pool_addresses: vec![pool(1)],
            expected_output: 1_000_000,
            result: ExecutionResult {
                success: true,
                tx_signature: None,
                realized_output: Some(1_000_000),
                execution_lag_ms: 1_200,
                failure_reason: None::<FailureReason>,
            },
        };
        apply_feedback(&event, &mut reliability, &mut tip, &mut slippage, &mut failure_rate);
    }

    assert!((tip.current_tip_usd() - 0.05).abs() < 1e-9);
}

/// S5 - Dedup under flood: 10,000 events for one pool spanning 100 slots
/// in shuffled arrival order yield exactly 100 accepted, strictly
/// increasing-slot events.
#[test]
fn s5_dedup_under_flood() {
    let mut aggregator = IngressAggregator::new();
    let mut accepted_slots = Vec::new();
    let mut seed = 0xD1B5_4A32u64;

    fn next(seed: &mut u64) -> u64 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed
    }

    for slot in 0..100u64 {
        let mut batch: Vec<IngressEvent> = (0..100u64)
            .map(|copy| IngressEvent {
                pool_address: pool(1),
                venue: VenueKind::AmmConstantProduct,
                source_mint: mint(0),
                target_mint: mint(1),
                new_rate: 1.0,
                new_fee_bps: 30,
                new_liquidity: 1_000,
                slot,
                arrival_ns: copy,
            })
            .collect();
        seed = seed.wrapping_mul(2_654_435_761).wrapping_add(slot);
        for i in (1..batch.len()).rev() {
            let j = (next(&mut seed) as usize) % (i + 1);
            batch.swap(i, j);
        }
        for event in batch {
            if let Some(update) = aggregator.submit(event) {
                accepted_slots.push(update.slot);
            }
        }
    }

    assert_eq!(aggregator.stats().accepted, 100);
    assert_eq!(accepted_slots.len(), 100);
    for window in accepted_slots.windows(2) {
        assert!(window[1] > window[0]);
    }
}

/// S6 - Conflict resolution: two GO-classed cycles share `pool(2)`; only
/// the higher-confidence one stays GO, the other is demoted.
#[test]
fn s6_conflicting_go_opportunities_resolve_to_one() {
    fn make_cycle(pools: Vec<PoolAddress>, min_liquidity: u64) -> Cycle {
        Cycle {
            mints: vec![mint(0), mint(1), mint(0)],
            pool_addresses: pools,
            theoretical_profit_pct: 1.0,
            min_liquidity,
            total_fee_bps: 60,
            source_slot: 100,
        }
    }

    let scorer = Scorer::new(ScorerConfig::default());
    let reliability = ReliabilityTracker::new();

    let priced_a = arb_engine::validator::PricedCycle {
        cycle: make_cycle(vec![pool(1), pool(2)], 50_000_000),
        input_amount: 1_000_000,
        expected_output: 1_100_000,
        expected_net_profit_usd: 10.0,
    };
    let priced_b = arb_engine::validator::PricedCycle {
        cycle: make_cycle(vec![pool(2), pool(3)], 40_000_000),
        input_amount: 1_000_000,
        expected_output: 1_090_000,
        expected_net_profit_usd: 8.0,
    };

    let mut a = scorer.score(
        priced_a,
        &[VenueKind::AmmConstantProduct, VenueKind::AmmStable],
        100,
        &reliability,
        0,
    );
    let mut b = scorer.score(
        priced_b,
        &[VenueKind::AmmConstantProduct, VenueKind::AmmStable],
        100,
        &reliability,
        0,
    );
    a.score_class = ScoreClass::Go;
    b.score_class = ScoreClass::Go;
    assert!(a.confidence >= b.confidence);

    let mut opportunities = vec![a, b];
    Scorer::resolve_conflicts(&mut opportunities);

    let go_count = opportunities
        .iter()
        .filter(|o| o.score_class == ScoreClass::Go)
        .count();
    assert_eq!(go_count, 1);
    assert_eq!(opportunities[0].score_class, ScoreClass::Go);
    assert_eq!(opportunities[1].score_class, ScoreClass::Borderline);
}
