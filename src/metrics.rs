//! Process-internal counters the engine exposes by message — dedup
//! counts, gate rejections, controller state. No dashboard or exporter
//! is built against these here; `engine.rs` logs a summary each tick at
//! `debug` and a caller can poll `Engine::metrics()`.

use crate::graph::GraphStats;
use crate::ingress::IngressStats;

#[derive(Debug, Clone, Copy, Default)]
pub struct TickMetrics {
    pub cycles_found: usize,
    pub cycles_validated: usize,
    pub cycles_rejected: usize,
    pub opportunities_emitted: usize,
    pub gate_blocks: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMetrics {
    pub ingress: IngressStats,
    pub graph: GraphStats,
    pub last_tick: TickMetrics,
    pub ticks_run: u64,
}

impl EngineMetrics {
    pub fn record_tick(&mut self, tick: TickMetrics, ingress: IngressStats, graph: GraphStats) {
        self.last_tick = tick;
        self.ingress = ingress;
        self.graph = graph;
        self.ticks_run += 1;
    }
}
