//! The tick loop: a single cooperative engine task that owns
//! `PoolGraph` and every adaptive controller, wiring ingress through
//! cycle-finding, validation, scoring, and submission every
//! `scan_interval_ms`, with a non-blocking, spawn-but-don't-await
//! discipline for outbound submissions so one slow executor call never
//! stalls the next scan.

use crate::config::{EmitMode, EngineConfig};
use crate::cycles::{Cycle, CycleFinder, CycleFinderConfig};
use crate::emitter::{self, Executor, FailureRateEstimator, FeedbackEvent};
use crate::error::EngineError;
use crate::graph::{PoolGraph, VenueKind};
use crate::ingress::IngressAggregator;
use crate::metrics::{EngineMetrics, TickMetrics};
use crate::scorer::{
    GateConfig, Gates, ReliabilityTracker, ScoreClass, Scorer, ScorerConfig, SlippageController,
    TipController, ValidatedOpportunity,
};
use crate::snapshot::{PoolRecord, SnapshotFile, TokenRecord};
use crate::token::TokenId;
use crate::validator::{CostModelConfig, CycleValidator, ValidatorConfig, VenueQuoteSource};
use futures_util::future::FutureExt;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

pub struct EngineDeps {
    pub ingress_rx: mpsc::Receiver<crate::ingress::IngressEvent>,
    pub quote_source: Arc<dyn VenueQuoteSource + Send + Sync>,
    pub live_executor: Arc<dyn Executor>,
    pub base_mint_usd_price: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    pub sol_usd_price: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    pub base_mint_balance: Arc<dyn Fn() -> u64 + Send + Sync>,
}

pub struct Engine {
    graph: PoolGraph,
    ingress: IngressAggregator,
    ingress_rx: mpsc::Receiver<crate::ingress::IngressEvent>,
    ingress_drain_bound: usize,

    base_mint: TokenId,
    cycle_config: CycleFinderConfig,
    validator_config: ValidatorConfig,
    cost_config: CostModelConfig,
    min_profit_bps: u32,
    cycles_per_scan_cap: usize,

    scorer: Scorer,
    reliability: ReliabilityTracker,
    tip_controller: TipController,
    slippage_controller: SlippageController,
    gates: Gates,
    failure_rate: FailureRateEstimator,

    quote_source: Arc<dyn VenueQuoteSource + Send + Sync>,
    executor: Arc<dyn Executor>,
    base_mint_usd_price: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    sol_usd_price: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    base_mint_balance: Arc<dyn Fn() -> u64 + Send + Sync>,

    executor_timeout: Duration,
    scan_interval: Duration,
    in_flight: FuturesUnordered<JoinHandle<FeedbackEvent>>,
    metrics: EngineMetrics,
}

impl Engine {
    pub fn new(config: &EngineConfig, deps: EngineDeps) -> Result<Self, EngineError> {
        let base_mint: TokenId = config
            .base_mint
            .parse()
            .map_err(|_| EngineError::InvariantViolation {
                invariant: 0,
                detail: format!("base_mint {} is not a valid mint address", config.base_mint),
            })?;

        let executor: Arc<dyn Executor> = match config.emit_mode {
            EmitMode::Live => deps.live_executor,
            EmitMode::DryRun => Arc::new(crate::emitter::DryRunExecutor),
        };

        Ok(Self {
            graph: PoolGraph::new(config.min_liquidity),
            ingress: IngressAggregator::new(),
            ingress_rx: deps.ingress_rx,
            ingress_drain_bound: 4_096,

            base_mint,
            cycle_config: CycleFinderConfig {
                max_hops: config.max_hops,
                max_slot_lag: config.max_slot_lag,
                output_cap: config.cycles_per_scan_cap,
            },
            validator_config: ValidatorConfig {
                input_min: config.input_min_base,
                input_max: config.input_max_base,
                ..ValidatorConfig::default()
            },
            cost_config: CostModelConfig::default(),
            min_profit_bps: config.min_profit_bps,
            cycles_per_scan_cap: config.cycles_per_scan_cap,

            scorer: Scorer::new(ScorerConfig {
                max_slot_lag: config.max_slot_lag,
                ..ScorerConfig::default()
            }),
            reliability: ReliabilityTracker::new(),
            tip_controller: TipController::new(
                config.priority_tip.base_usd,
                config.priority_tip.cap_usd,
            ),
            slippage_controller: SlippageController::new(
                config.slippage.min_bps,
                config.slippage.min_bps,
                config.slippage.max_bps,
                config.slippage.adjust_step_bps,
                config.slippage.window_size,
            ),
            gates: Gates::new(GateConfig {
                max_latency_ms: config.latency_kill_ms as f64,
                balance_floor: config.balance_floor,
                max_emissions_per_sec: config.throughput_cap_per_sec,
                tip_to_profit_max_fraction: 0.5,
            }),
            failure_rate: FailureRateEstimator::new(0.05),

            quote_source: deps.quote_source,
            executor,
            base_mint_usd_price: deps.base_mint_usd_price,
            sol_usd_price: deps.sol_usd_price,
            base_mint_balance: deps.base_mint_balance,

            executor_timeout: Duration::from_secs(30),
            scan_interval: Duration::from_millis(config.scan_interval_ms),
            in_flight: FuturesUnordered::new(),
            metrics: EngineMetrics::default(),
        })
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.metrics
    }

    pub fn graph(&self) -> &PoolGraph {
        &self.graph
    }

    /// Builds the token/pool registry to persist on graceful shutdown.
    /// Decimals aren't tracked by `PoolGraph` (the engine only ever
    /// moves raw base-unit amounts), so every `TokenRecord` carries 0;
    /// `first_seen_slot` is approximated by the pool's last-seen slot
    /// since no earlier sighting is retained.
    pub fn snapshot(&self) -> SnapshotFile {
        let pools = self.graph.pool_summaries();

        let mut tokens_seen = std::collections::HashSet::new();
        let mut tokens = Vec::new();
        for pool in &pools {
            for mint in [pool.token_a, pool.token_b] {
                if tokens_seen.insert(mint) {
                    tokens.push(TokenRecord {
                        mint,
                        decimals: 0,
                        first_seen_slot: pool.last_update_slot,
                    });
                }
            }
        }

        let pools = pools
            .into_iter()
            .map(|pool| PoolRecord {
                pool_address: pool.pool_address,
                venue: pool.venue,
                token_a: pool.token_a,
                token_b: pool.token_b,
                last_seen_slot: pool.last_update_slot,
            })
            .collect();

        SnapshotFile::new(tokens, pools)
    }

    /// Restores ingress dedup state from a snapshot loaded at startup.
    /// The registry carries pool identity and last-seen slots only, not
    /// reserves/rates, so `PoolGraph` itself starts empty and is rebuilt
    /// from live ingress events as usual.
    pub fn seed_from_snapshot(&mut self, snapshot: &SnapshotFile) {
        for pool in &snapshot.pools {
            self.ingress.seed_high_water(pool.pool_address, pool.last_seen_slot);
        }
    }

    /// Runs the tick loop until `shutdown` is signalled, then drains
    /// outstanding submissions up to `grace` before returning.
    pub async fn run(
        &mut self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        grace: Duration,
    ) -> Result<(), EngineError> {
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.tick().await?;

            tokio::select! {
                _ = tokio::time::sleep(self.scan_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.drain_outstanding(grace).await;
        Ok(())
    }

    async fn tick(&mut self) -> Result<(), EngineError> {
        self.drain_ingress().await?;
        self.graph.check_invariants()?;

        let opportunities = self.scan();
        let now = now_ns();
        let emitted = self.emit(opportunities, now);
        self.drain_feedback();

        self.metrics.record_tick(
            TickMetrics {
                opportunities_emitted: emitted,
                ..TickMetrics::default()
            },
            self.ingress.stats(),
            self.graph.stats(),
        );
        Ok(())
    }

    /// Step 1: waits briefly for at least one ingress event, then drains
    /// whatever else is already queued up to the bound. The only point
    /// in the loop where the graph mutates.
    async fn drain_ingress(&mut self) -> Result<usize, EngineError> {
        let mut applied = 0usize;

        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(5), self.ingress_rx.recv()).await
        {
            self.accept_event(event)?;
            applied += 1;
        }

        while applied < self.ingress_drain_bound {
            match self.ingress_rx.try_recv() {
                Ok(event) => {
                    self.accept_event(event)?;
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        Ok(applied)
    }

    /// Pool-graph invariant violations unwind out of the tick loop fatally
    /// (see `bin/engine.rs`'s handling of `EngineError::InvariantViolation`)
    /// rather than being logged and skipped, since they mean the graph's
    /// own bookkeeping is no longer trustworthy.
    fn accept_event(&mut self, event: crate::ingress::IngressEvent) -> Result<(), EngineError> {
        if let Some(update) = self.ingress.submit(event) {
            self.graph.upsert_edge(&update)?;
        }
        Ok(())
    }

    /// Steps 2-3: a read-only scan of the current graph snapshot through
    /// cycle-finding, validation, and scoring. No `.await` anywhere in
    /// this call tree — these steps must not suspend.
    fn scan(&mut self) -> Vec<ValidatedOpportunity> {
        let cycles: Vec<Cycle> = CycleFinder::find(&self.graph, self.base_mint, &self.cycle_config);
        let freshest_slot = self.graph.freshest_slot();

        let mut cost = self.cost_config;
        cost.priority_tip_usd = self.tip_controller.current_tip_usd();
        cost.failure_rate = self.failure_rate.failure_rate();

        let slippage_bps = self.slippage_controller.tolerance_bps();
        let base_price = (self.base_mint_usd_price)(freshest_slot);
        let sol_price = (self.sol_usd_price)(freshest_slot);

        let mut opportunities = Vec::new();
        for cycle in cycles.iter().take(self.cycles_per_scan_cap) {
            let leg_venues: Vec<VenueKind> = cycle
                .pool_addresses
                .iter()
                .filter_map(|pool| self.graph.edge_by_pool(*pool).map(|edge| edge.venue))
                .collect();

            let priced = match CycleValidator::validate(
                &self.graph,
                self.quote_source.as_ref(),
                cycle,
                &self.validator_config,
                &cost,
                slippage_bps,
                base_price,
                sol_price,
            ) {
                Ok(priced) => priced,
                Err(reason) => {
                    log::debug!("cycle rejected: {reason}");
                    continue;
                }
            };

            let min_profit = priced.input_amount as f64 * self.min_profit_bps as f64 / 10_000.0;
            let realized_profit = priced.expected_output as f64 - priced.input_amount as f64;
            if realized_profit < min_profit {
                continue;
            }

            opportunities.push(self.scorer.score(
                priced,
                &leg_venues,
                freshest_slot,
                &self.reliability,
                now_ns(),
            ));
        }

        Scorer::resolve_conflicts(&mut opportunities);
        opportunities
    }

    /// Step 4: hands GO-classed opportunities to the executor, spawning
    /// each submission as an independent task the engine never awaits.
    fn emit(&mut self, opportunities: Vec<ValidatedOpportunity>, now: u64) -> usize {
        let balance = (self.base_mint_balance)();
        let mut emitted = 0usize;

        for opportunity in opportunities {
            if opportunity.score_class != ScoreClass::Go {
                continue;
            }
            let tip_usd = self.tip_controller.current_tip_usd();
            match self
                .gates
                .check(now, balance, tip_usd, opportunity.priced.expected_net_profit_usd)
            {
                Ok(()) => {
                    let executor = self.executor.clone();
                    let timeout = self.executor_timeout;
                    self.in_flight
                        .push(tokio::spawn(emitter::submit_opportunity(
                            executor,
                            opportunity,
                            timeout,
                        )));
                    emitted += 1;
                }
                Err(gate) => {
                    log::debug!("emission blocked by {gate} gate");
                }
            }
        }
        emitted
    }

    /// Step 5: non-blocking drain of whatever submissions already
    /// finished. `FuturesUnordered::next()` is only polled once per
    /// call, via `now_or_never`, so an un-finished future is left intact
    /// in the set rather than dropped.
    fn drain_feedback(&mut self) {
        while let Some(next) = self.in_flight.next().now_or_never() {
            match next {
                Some(Ok(event)) => {
                    emitter::apply_feedback(
                        &event,
                        &mut self.reliability,
                        &mut self.tip_controller,
                        &mut self.slippage_controller,
                        &mut self.failure_rate,
                    );
                }
                Some(Err(join_err)) => {
                    log::error!("submission task panicked: {join_err}");
                }
                None => break,
            }
        }
    }

    async fn drain_outstanding(&mut self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.in_flight.is_empty() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                next = self.in_flight.next() => {
                    if let Some(Ok(event)) = next {
                        emitter::apply_feedback(
                            &event,
                            &mut self.reliability,
                            &mut self.tip_controller,
                            &mut self.slippage_controller,
                            &mut self.failure_rate,
                        );
                    }
                }
            }
        }
    }
}
