//! CLI entry point. Loads `EngineConfig` from a TOML file, applies flag
//! overrides, wires the pluggable seams the crate leaves external (venue
//! quote cache, executor, price oracle, balance query), and runs the
//! tick loop until Ctrl-C.

use arb_engine::config::{load_config, EmitMode};
use arb_engine::emitter::{ExecutionResult, Executor};
use arb_engine::engine::{Engine, EngineDeps};
use arb_engine::error::exit_code;
use arb_engine::graph::VenueKind;
use arb_engine::scorer::ValidatedOpportunity;
use arb_engine::snapshot;
use arb_engine::token::{PoolAddress, TokenId};
use arb_engine::validator::VenueQuoteSource;
use arb_engine::venues::VenueQuote;
use async_trait::async_trait;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the engine's TOML config file.
    #[clap(short, long, default_value = "config/engine.toml")]
    config: PathBuf,

    /// Override emit_mode from the config file (live|dry_run).
    #[clap(long)]
    emit_mode: Option<String>,

    /// Seconds to wait for outstanding submissions to finish on shutdown.
    #[clap(long, default_value = "10")]
    shutdown_grace_secs: u64,
}

/// Quote source placeholder: venue SDK wrappers are out of scope for
/// this crate, so the binary wires a source that reports no depth for
/// every pool until a real one is supplied.
struct NoDepthQuoteSource;

impl VenueQuoteSource for NoDepthQuoteSource {
    fn quote_for(
        &self,
        _pool_address: PoolAddress,
        _venue: VenueKind,
        _source_mint: TokenId,
    ) -> Option<VenueQuote> {
        None
    }
}

/// Executor placeholder used only when `emit_mode = live` without a real
/// wallet/signer wired in. Logs and fails closed rather than guessing at
/// a wire protocol for submission; wallet/signer management is external
/// to this crate.
struct UnconfiguredExecutor;

#[async_trait]
impl Executor for UnconfiguredExecutor {
    async fn submit(&self, opportunity: &ValidatedOpportunity) -> ExecutionResult {
        error!(
            "emit_mode is live but no executor is wired in; dropping opportunity with expected_net_profit_usd {:.4}",
            opportunity.priced.expected_net_profit_usd
        );
        ExecutionResult {
            success: false,
            tx_signature: None,
            realized_output: None,
            execution_lag_ms: 0,
            failure_reason: Some(arb_engine::emitter::FailureReason::Unknown),
        }
    }
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = Args::parse();

    let mut config = match load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load config from {}: {err:#}", args.config.display());
            std::process::exit(exit_code::CONFIG_INVALID);
        }
    };

    if let Some(mode) = args.emit_mode.as_deref() {
        config.emit_mode = match mode {
            "live" => EmitMode::Live,
            "dry_run" => EmitMode::DryRun,
            other => {
                error!("invalid --emit-mode {other}, expected live|dry_run");
                std::process::exit(exit_code::CONFIG_INVALID);
            }
        };
    }

    info!(
        "starting engine: base_mint={} emit_mode={:?} scan_interval_ms={}",
        config.base_mint, config.emit_mode, config.scan_interval_ms
    );

    // The ingress channel's producer (venue adapters / WSS listeners) is
    // external to this crate; nothing sends on `_ingress_tx` here.
    let (_ingress_tx, ingress_rx) = mpsc::channel(4_096);

    let deps = EngineDeps {
        ingress_rx,
        quote_source: Arc::new(NoDepthQuoteSource),
        live_executor: Arc::new(UnconfiguredExecutor),
        base_mint_usd_price: Arc::new(|_slot| 1.0),
        sol_usd_price: Arc::new(|_slot| 150.0),
        base_mint_balance: Arc::new(|| u64::MAX),
    };

    let mut engine = match Engine::new(&config, deps) {
        Ok(engine) => engine,
        Err(err) => {
            error!("failed to construct engine: {err}");
            std::process::exit(exit_code::CONFIG_INVALID);
        }
    };

    if let Some(path) = config.snapshot_path.as_deref() {
        let path = std::path::Path::new(path);
        if path.exists() {
            match snapshot::load(path) {
                Ok(loaded) => {
                    info!(
                        "loaded snapshot from {}: {} tokens, {} pools",
                        path.display(),
                        loaded.tokens.len(),
                        loaded.pools.len()
                    );
                    engine.seed_from_snapshot(&loaded);
                }
                Err(err) => {
                    error!("failed to load snapshot from {}: {err:#}", path.display());
                    std::process::exit(exit_code::CONFIG_INVALID);
                }
            }
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, draining outstanding submissions");
            let _ = shutdown_tx.send(true);
        }
    });

    let run_result = engine
        .run(shutdown_rx, Duration::from_secs(args.shutdown_grace_secs))
        .await;

    if let Some(path) = config.snapshot_path.as_deref() {
        let path = std::path::Path::new(path);
        if let Err(err) = snapshot::save(path, &engine.snapshot()) {
            error!("failed to save snapshot to {}: {err:#}", path.display());
        }
    }

    match run_result {
        Ok(()) => {
            info!("engine shut down cleanly, ticks_run={}", engine.metrics().ticks_run);
            std::process::exit(exit_code::CLEAN_SHUTDOWN);
        }
        Err(err) => {
            error!("engine exited with error: {err}");
            std::process::exit(exit_code::INVARIANT_VIOLATED);
        }
    }
}
