//! Scorer / Gate. Confidence scoring, GO/BORDERLINE/BLOCK
//! classification, the four global emission gates, and the adaptive tip
//! and slippage controllers fed by the emitter's feedback channel.
//!
//! The gates and controllers below reject instead of trusting a result
//! that looks too good, and size tips to observed congestion, turning
//! that instinct into closed-form triage instead of an ad hoc filter
//! folded into the search loop.

use crate::error::GateKind;
use crate::graph::VenueKind;
use crate::token::PoolAddress;
use crate::validator::PricedCycle;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreClass {
    Go,
    Borderline,
    Block,
}

/// Output of validation plus scoring, input to the emitter.
#[derive(Debug, Clone)]
pub struct ValidatedOpportunity {
    pub priced: PricedCycle,
    pub confidence: f64,
    pub score_class: ScoreClass,
    pub created_at_ns: u64,
}

/// EWMA success rate per pool over roughly the last 64 execution
/// attempts, fed by the emitter's feedback write-back.
pub struct ReliabilityTracker {
    rate: HashMap<PoolAddress, f64>,
}

const RELIABILITY_ALPHA: f64 = 1.0 / 64.0;

impl Default for ReliabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliabilityTracker {
    pub fn new() -> Self {
        Self {
            rate: HashMap::new(),
        }
    }

    pub fn record_outcome(&mut self, pool: PoolAddress, success: bool) {
        let sample = if success { 1.0 } else { 0.0 };
        let entry = self.rate.entry(pool).or_insert(1.0);
        *entry = *entry * (1.0 - RELIABILITY_ALPHA) + sample * RELIABILITY_ALPHA;
    }

    /// Unseen pools default to a neutral 1.0 — we have no evidence
    /// against them yet, so confidence shouldn't be penalized.
    pub fn rate(&self, pool: PoolAddress) -> f64 {
        *self.rate.get(&pool).unwrap_or(&1.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScorerConfig {
    pub max_slot_lag: u64,
    pub liquidity_threshold: u64,
    pub liquidity_logistic_k: f64,
    pub go_threshold: f64,
    pub borderline_threshold: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_slot_lag: 5,
            liquidity_threshold: 1_000_000,
            liquidity_logistic_k: 0.000005,
            go_threshold: 0.75,
            borderline_threshold: 0.55,
        }
    }
}

pub struct Scorer {
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Scores one priced cycle into a classified opportunity. `leg_venues`
    /// is the venue kind of each leg in traversal order (the validator
    /// already resolved these while pricing); `freshest_slot` is the
    /// graph's current high-water mark, used for the freshness term.
    pub fn score(
        &self,
        priced: PricedCycle,
        leg_venues: &[VenueKind],
        freshest_slot: u64,
        reliability: &ReliabilityTracker,
        created_at_ns: u64,
    ) -> ValidatedOpportunity {
        let lag = freshest_slot.saturating_sub(priced.cycle.source_slot);
        let freshness = if lag == 0 {
            1.0
        } else {
            (1.0 - 0.5 * (lag as f64 / self.config.max_slot_lag.max(1) as f64)).max(0.5)
        };

        let x = priced.cycle.min_liquidity as f64 - self.config.liquidity_threshold as f64;
        let liquidity_headroom = 1.0 / (1.0 + (-self.config.liquidity_logistic_k * x).exp());

        let success = if priced.cycle.pool_addresses.is_empty() {
            1.0
        } else {
            priced
                .cycle
                .pool_addresses
                .iter()
                .map(|pool| reliability.rate(*pool))
                .sum::<f64>()
                / priced.cycle.pool_addresses.len() as f64
        };

        let mut confidence = 0.4 * freshness + 0.35 * liquidity_headroom + 0.25 * success;

        let distinct_venues: HashSet<VenueKind> = leg_venues.iter().copied().collect();
        if !leg_venues.is_empty() && distinct_venues.len() == leg_venues.len() {
            confidence += 0.05;
        }
        confidence = confidence.clamp(0.0, 1.0);

        let score_class = if confidence >= self.config.go_threshold {
            ScoreClass::Go
        } else if confidence >= self.config.borderline_threshold {
            ScoreClass::Borderline
        } else {
            ScoreClass::Block
        };

        ValidatedOpportunity {
            priced,
            confidence,
            score_class,
            created_at_ns,
        }
    }

    /// Among simultaneously GO-classed opportunities whose pool sets
    /// intersect, keeps only the highest-confidence one as GO and
    /// demotes the rest to BORDERLINE.
    pub fn resolve_conflicts(opportunities: &mut [ValidatedOpportunity]) {
        let mut order: Vec<usize> = (0..opportunities.len())
            .filter(|&i| opportunities[i].score_class == ScoreClass::Go)
            .collect();
        order.sort_by(|&a, &b| {
            opportunities[b]
                .confidence
                .partial_cmp(&opportunities[a].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut claimed: HashSet<PoolAddress> = HashSet::new();
        for i in order {
            let pools = &opportunities[i].priced.cycle.pool_addresses;
            if pools.iter().any(|p| claimed.contains(p)) {
                opportunities[i].score_class = ScoreClass::Borderline;
            } else {
                claimed.extend(pools.iter().copied());
            }
        }
    }
}

/// Adaptive priority-tip sizing, tiered by recent execution lag. Fed by
/// the emitter's feedback channel, read by the validator each tick.
pub struct TipController {
    base_usd: f64,
    cap_usd: f64,
    multiplier: f64,
}

impl TipController {
    pub fn new(base_usd: f64, cap_usd: f64) -> Self {
        Self {
            base_usd,
            cap_usd,
            multiplier: 1.0,
        }
    }

    pub fn on_execution_lag_sample(&mut self, lag_ms: f64) {
        self.multiplier = if lag_ms < 100.0 {
            1.0
        } else if lag_ms < 500.0 {
            2.0
        } else if lag_ms < 1_000.0 {
            3.0
        } else {
            5.0
        };
    }

    pub fn current_tip_usd(&self) -> f64 {
        (self.base_usd * self.multiplier).min(self.cap_usd)
    }
}

/// Adaptive per-venue slippage tolerance, widened or tightened every
/// `batch_size` feedback samples based on mean realized drift.
pub struct SlippageController {
    tolerance_bps: u32,
    floor_bps: u32,
    cap_bps: u32,
    adjust_step_bps: u32,
    batch_size: usize,
    pending: Vec<f64>,
}

impl SlippageController {
    pub fn new(
        initial_bps: u32,
        floor_bps: u32,
        cap_bps: u32,
        adjust_step_bps: u32,
        batch_size: usize,
    ) -> Self {
        Self {
            tolerance_bps: initial_bps,
            floor_bps,
            cap_bps,
            adjust_step_bps,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
        }
    }

    /// `drift_pct` is the realized-vs-quoted output drift, signed. Widens
    /// by the full configured step on large drift, tightens by half of it
    /// on small drift, so tolerance relaxes faster than it recovers.
    pub fn record_drift_sample(&mut self, drift_pct: f64) {
        self.pending.push(drift_pct);
        if self.pending.len() < self.batch_size {
            return;
        }
        let mean = self.pending.iter().sum::<f64>() / self.pending.len() as f64;
        self.pending.clear();

        if mean.abs() > 1.5 {
            self.tolerance_bps = (self.tolerance_bps + self.adjust_step_bps).min(self.cap_bps);
        } else if mean.abs() < 0.5 {
            self.tolerance_bps = self
                .tolerance_bps
                .saturating_sub(self.adjust_step_bps / 2)
                .max(self.floor_bps);
        }
    }

    pub fn tolerance_bps(&self) -> u32 {
        self.tolerance_bps
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub max_latency_ms: f64,
    pub balance_floor: u64,
    pub max_emissions_per_sec: f64,
    pub tip_to_profit_max_fraction: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: 500.0,
            balance_floor: 0,
            max_emissions_per_sec: 5.0,
            tip_to_profit_max_fraction: 0.5,
        }
    }
}

/// The four global gates: any failure suppresses emission for the
/// tick. `check` both evaluates and (on success) consumes one
/// throughput-bucket token, so it must be called at most once per
/// opportunity actually emitted.
pub struct Gates {
    config: GateConfig,
    latency_ewma_ms: f64,
    bucket_level: f64,
    last_refill_ns: Option<u64>,
}

impl Gates {
    pub fn new(config: GateConfig) -> Self {
        let bucket_level = config.max_emissions_per_sec;
        Self {
            config,
            latency_ewma_ms: 0.0,
            bucket_level,
            last_refill_ns: None,
        }
    }

    pub fn record_latency_sample_ms(&mut self, sample_ms: f64) {
        const ALPHA: f64 = 0.2;
        self.latency_ewma_ms = self.latency_ewma_ms * (1.0 - ALPHA) + sample_ms * ALPHA;
    }

    fn refill(&mut self, now_ns: u64) {
        if let Some(last) = self.last_refill_ns {
            let dt_s = now_ns.saturating_sub(last) as f64 / 1_000_000_000.0;
            self.bucket_level =
                (self.bucket_level + dt_s * self.config.max_emissions_per_sec)
                    .min(self.config.max_emissions_per_sec);
        }
        self.last_refill_ns = Some(now_ns);
    }

    pub fn check(
        &mut self,
        now_ns: u64,
        base_mint_balance: u64,
        priority_tip_usd: f64,
        expected_net_profit_usd: f64,
    ) -> Result<(), GateKind> {
        if self.latency_ewma_ms > self.config.max_latency_ms {
            return Err(GateKind::Latency);
        }
        if base_mint_balance < self.config.balance_floor {
            return Err(GateKind::Balance);
        }
        self.refill(now_ns);
        if self.bucket_level < 1.0 {
            return Err(GateKind::Throughput);
        }
        if priority_tip_usd > self.config.tip_to_profit_max_fraction * expected_net_profit_usd {
            return Err(GateKind::TipToProfit);
        }
        self.bucket_level -= 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::Cycle;
    use crate::token::TokenId;
    use solana_sdk::pubkey::Pubkey;

    fn pool(b: u8) -> PoolAddress {
        PoolAddress(Pubkey::new_from_array([b; 32]))
    }

    fn priced(pools: Vec<PoolAddress>, min_liquidity: u64, source_slot: u64) -> PricedCycle {
        PricedCycle {
            cycle: Cycle {
                mints: vec![TokenId::new([0; 32]), TokenId::new([1; 32]), TokenId::new([0; 32])],
                pool_addresses: pools,
                theoretical_profit_pct: 1.0,
                min_liquidity,
                total_fee_bps: 60,
                source_slot,
            },
            input_amount: 1_000_000,
            expected_output: 1_010_000,
            expected_net_profit_usd: 5.0,
        }
    }

    #[test]
    fn fresh_deep_cycle_scores_high() {
        let scorer = Scorer::new(ScorerConfig::default());
        let reliability = ReliabilityTracker::new();
        let opp = scorer.score(
            priced(vec![pool(1), pool(2)], 10_000_000, 100),
            &[VenueKind::AmmConstantProduct, VenueKind::AmmStable],
            100,
            &reliability,
            0,
        );
        assert_eq!(opp.score_class, ScoreClass::Go);
        assert!(opp.confidence > 0.75);
    }

    #[test]
    fn stale_thin_cycle_scores_low() {
        let scorer = Scorer::new(ScorerConfig::default());
        let mut reliability = ReliabilityTracker::new();
        reliability.record_outcome(pool(1), false);
        reliability.record_outcome(pool(1), false);
        let opp = scorer.score(
            priced(vec![pool(1)], 100, 50),
            &[VenueKind::AmmConstantProduct],
            100,
            &reliability,
            0,
        );
        assert_ne!(opp.score_class, ScoreClass::Go);
    }

    #[test]
    fn conflicting_go_opportunities_keep_only_the_best() {
        let scorer = Scorer::new(ScorerConfig::default());
        let reliability = ReliabilityTracker::new();
        let mut a = scorer.score(
            priced(vec![pool(1), pool(2)], 50_000_000, 100),
            &[VenueKind::AmmConstantProduct, VenueKind::AmmStable],
            100,
            &reliability,
            0,
        );
        a.confidence = 0.9;
        a.score_class = ScoreClass::Go;

        let mut b = scorer.score(
            priced(vec![pool(2), pool(3)], 50_000_000, 100),
            &[VenueKind::AmmConstantProduct, VenueKind::AmmStable],
            100,
            &reliability,
            0,
        );
        b.confidence = 0.8;
        b.score_class = ScoreClass::Go;

        let mut opportunities = vec![a, b];
        Scorer::resolve_conflicts(&mut opportunities);

        assert_eq!(opportunities[0].score_class, ScoreClass::Go);
        assert_eq!(opportunities[1].score_class, ScoreClass::Borderline);
    }

    #[test]
    fn throughput_gate_trips_after_bucket_exhausted() {
        let mut gates = Gates::new(GateConfig {
            max_emissions_per_sec: 1.0,
            ..Default::default()
        });
        assert!(gates.check(0, 0, 0.0, 10.0).is_ok());
        assert_eq!(gates.check(0, 0, 0.0, 10.0).unwrap_err(), GateKind::Throughput);
    }

    #[test]
    fn tip_to_profit_gate_rejects_excessive_tip() {
        let mut gates = Gates::new(GateConfig::default());
        let err = gates.check(0, 0, 100.0, 50.0).unwrap_err();
        assert_eq!(err, GateKind::TipToProfit);
    }

    #[test]
    fn tip_controller_tiers_by_lag() {
        let mut tip = TipController::new(0.01, 1.0);
        assert!((tip.current_tip_usd() - 0.01).abs() < 1e-9);
        tip.on_execution_lag_sample(750.0);
        assert!((tip.current_tip_usd() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn slippage_controller_widens_on_large_drift() {
        let mut controller = SlippageController::new(200, 100, 800, 50, 2);
        controller.record_drift_sample(2.0);
        controller.record_drift_sample(2.5);
        assert_eq!(controller.tolerance_bps(), 250);
    }
}
