//! Engine configuration surface. Loaded from TOML: `serde` for the
//! shape, `anyhow::Context` at every fallible read/parse step so
//! failures carry the file path they came from.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    Live,
    DryRun,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriorityTipSettings {
    pub base_usd: f64,
    pub cap_usd: f64,
    /// Execution-lag thresholds in ms, ascending, one per multiplier
    /// tier: <100, 100-500, 500-1000, >1000.
    pub lag_tiers_ms: [u64; 4],
}

impl Default for PriorityTipSettings {
    fn default() -> Self {
        Self {
            base_usd: 0.01,
            cap_usd: 0.5,
            lag_tiers_ms: [100, 500, 1_000, u64::MAX],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlippageSettings {
    pub min_bps: u32,
    pub max_bps: u32,
    pub adjust_step_bps: u32,
    pub window_size: usize,
}

impl Default for SlippageSettings {
    fn default() -> Self {
        Self {
            min_bps: 100,
            max_bps: 800,
            adjust_step_bps: 50,
            window_size: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub base_mint: String,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_min_profit_bps")]
    pub min_profit_bps: u32,
    #[serde(default = "default_max_slot_lag")]
    pub max_slot_lag: u64,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default = "default_cycles_per_scan_cap")]
    pub cycles_per_scan_cap: usize,
    pub input_min_base: u128,
    pub input_max_base: u128,
    #[serde(default)]
    pub min_liquidity: u64,
    #[serde(default)]
    pub priority_tip: PriorityTipSettings,
    #[serde(default)]
    pub slippage: SlippageSettings,
    #[serde(default = "default_latency_kill_ms")]
    pub latency_kill_ms: u64,
    #[serde(default)]
    pub balance_floor: u64,
    #[serde(default = "default_throughput_cap_per_sec")]
    pub throughput_cap_per_sec: f64,
    #[serde(default = "default_emit_mode")]
    pub emit_mode: EmitMode,
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

fn default_max_hops() -> usize {
    4
}
fn default_min_profit_bps() -> u32 {
    20
}
fn default_max_slot_lag() -> u64 {
    5
}
fn default_scan_interval_ms() -> u64 {
    200
}
fn default_cycles_per_scan_cap() -> usize {
    64
}
fn default_latency_kill_ms() -> u64 {
    500
}
fn default_throughput_cap_per_sec() -> f64 {
    5.0
}
fn default_emit_mode() -> EmitMode {
    EmitMode::DryRun
}

/// Loads and validates the engine config from a TOML file at `path`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading engine config from {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("parsing engine config from {}", path.display()))?;
    validate(&config).with_context(|| format!("validating engine config from {}", path.display()))?;
    Ok(config)
}

/// Range checks on every tunable. A failure here maps to CLI exit code
/// `64` (`error::exit_code::CONFIG_INVALID`) at the binary's call site.
pub fn validate(config: &EngineConfig) -> Result<()> {
    anyhow::ensure!(
        (2..=5).contains(&config.max_hops),
        "max_hops must be in 2..=5, got {}",
        config.max_hops
    );
    anyhow::ensure!(
        config.max_slot_lag >= 1,
        "max_slot_lag must be >= 1, got {}",
        config.max_slot_lag
    );
    anyhow::ensure!(
        config.scan_interval_ms >= 10,
        "scan_interval_ms must be >= 10, got {}",
        config.scan_interval_ms
    );
    anyhow::ensure!(
        config.cycles_per_scan_cap >= 1,
        "cycles_per_scan_cap must be >= 1, got {}",
        config.cycles_per_scan_cap
    );
    anyhow::ensure!(
        config.input_min_base > 0 && config.input_min_base <= config.input_max_base,
        "input_min_base must be positive and <= input_max_base"
    );
    anyhow::ensure!(
        config.slippage.min_bps <= config.slippage.max_bps,
        "slippage.min_bps must be <= slippage.max_bps"
    );
    anyhow::ensure!(
        config.throughput_cap_per_sec > 0.0,
        "throughput_cap_per_sec must be positive"
    );
    config
        .base_mint
        .parse::<crate::token::TokenId>()
        .with_context(|| format!("base_mint {} is not a valid mint address", config.base_mint))?;
    Ok(())
}
