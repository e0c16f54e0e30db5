//! Opportunity Emitter. Presents selected opportunities to an external
//! `Executor` and turns the outcome into feedback samples for the
//! adaptive controllers in `scorer`.
//!
//! `Executor` is an `async_trait` boundary so the engine can hold
//! `Arc<dyn Executor>` without knowing the concrete wallet/signer stack
//! behind it; submission runs under a timeout and the engine spawns and
//! polls the result non-blockingly rather than awaiting it inline.

use crate::scorer::{ReliabilityTracker, SlippageController, TipController, ValidatedOpportunity};
use crate::token::PoolAddress;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoLanding,
    SlippageExceeded,
    RevertedOnChain,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub tx_signature: Option<[u8; 64]>,
    pub realized_output: Option<u128>,
    pub execution_lag_ms: u64,
    pub failure_reason: Option<FailureReason>,
}

/// The outbound contract every executor implements. Kept as an
/// `async_trait` object so the engine can hold `Arc<dyn Executor>`
/// without knowing the concrete wallet/signer stack behind it.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn submit(&self, opportunity: &ValidatedOpportunity) -> ExecutionResult;
}

/// Short-circuits submission entirely — used when `emit_mode` is
/// `dry_run`. Logs what would have been submitted at info level and
/// fabricates a successful result without touching a wrapped
/// implementation.
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    async fn submit(&self, opportunity: &ValidatedOpportunity) -> ExecutionResult {
        info!(
            "dry run: input {} expected_output {} expected_net_profit_usd {:.4}",
            opportunity.priced.input_amount,
            opportunity.priced.expected_output,
            opportunity.priced.expected_net_profit_usd
        );
        ExecutionResult {
            success: true,
            tx_signature: None,
            realized_output: Some(opportunity.priced.expected_output),
            execution_lag_ms: 0,
            failure_reason: None,
        }
    }
}

/// Result of one submission, carrying everything the feedback write-back
/// needs without holding onto the opportunity itself.
pub struct FeedbackEvent {
    pub pool_addresses: Vec<PoolAddress>,
    pub expected_output: u128,
    pub result: ExecutionResult,
}

/// Submits `opportunity` to `executor` under a timeout, synthesizing an
/// `UNKNOWN`-failure result if it doesn't resolve in time; the engine
/// does not retry. Intended to be `tokio::spawn`ed by the engine tick
/// loop, never awaited inline.
pub async fn submit_opportunity(
    executor: Arc<dyn Executor>,
    opportunity: ValidatedOpportunity,
    timeout: Duration,
) -> FeedbackEvent {
    let pool_addresses = opportunity.priced.cycle.pool_addresses.clone();
    let expected_output = opportunity.priced.expected_output;

    let result = match tokio::time::timeout(timeout, executor.submit(&opportunity)).await {
        Ok(result) => result,
        Err(_) => ExecutionResult {
            success: false,
            tx_signature: None,
            realized_output: None,
            execution_lag_ms: timeout.as_millis() as u64,
            failure_reason: Some(FailureReason::Unknown),
        },
    };

    FeedbackEvent {
        pool_addresses,
        expected_output,
        result,
    }
}

/// Rolling estimate of the transaction-failure rate `P_fail` the cost
/// model reads from.
pub struct FailureRateEstimator {
    ewma: f64,
}

const FAILURE_RATE_ALPHA: f64 = 0.05;

impl FailureRateEstimator {
    pub fn new(initial: f64) -> Self {
        Self { ewma: initial }
    }

    pub fn record(&mut self, success: bool) {
        let sample = if success { 0.0 } else { 1.0 };
        self.ewma = self.ewma * (1.0 - FAILURE_RATE_ALPHA) + sample * FAILURE_RATE_ALPHA;
    }

    pub fn failure_rate(&self) -> f64 {
        self.ewma
    }
}

/// Applies one feedback event to every adaptive controller it feeds.
/// Called by the engine tick loop's non-blocking feedback drain.
pub fn apply_feedback(
    event: &FeedbackEvent,
    reliability: &mut ReliabilityTracker,
    tip: &mut TipController,
    slippage: &mut SlippageController,
    failure_rate: &mut FailureRateEstimator,
) {
    for pool in &event.pool_addresses {
        reliability.record_outcome(*pool, event.result.success);
    }
    failure_rate.record(event.result.success);
    tip.on_execution_lag_sample(event.result.execution_lag_ms as f64);

    if let Some(realized) = event.result.realized_output {
        if event.expected_output > 0 {
            let drift_pct = (realized as f64 - event.expected_output as f64)
                / event.expected_output as f64
                * 100.0;
            slippage.record_drift_sample(drift_pct);
        }
    }

    match (event.result.success, event.result.failure_reason) {
        (false, Some(reason)) => warn!("execution failed: {reason:?}"),
        (false, None) => warn!("execution failed with no reason reported"),
        (true, _) => debug!("execution succeeded, lag {}ms", event.result.execution_lag_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::Cycle;
    use crate::scorer::ScoreClass;
    use crate::token::TokenId;
    use crate::validator::PricedCycle;
    use solana_sdk::pubkey::Pubkey;

    fn opportunity() -> ValidatedOpportunity {
        ValidatedOpportunity {
            priced: PricedCycle {
                cycle: Cycle {
                    mints: vec![TokenId::new([0; 32]), TokenId::new([1; 32]), TokenId::new([0; 32])],
                    pool_addresses: vec![
                        PoolAddress(Pubkey::new_from_array([1; 32])),
                        PoolAddress(Pubkey::new_from_array([2; 32])),
                    ],
                    theoretical_profit_pct: 1.0,
                    min_liquidity: 1_000_000,
                    total_fee_bps: 60,
                    source_slot: 10,
                },
                input_amount: 1_000_000,
                expected_output: 1_010_000,
                expected_net_profit_usd: 5.0,
            },
            confidence: 0.9,
            score_class: ScoreClass::Go,
            created_at_ns: 0,
        }
    }

    #[tokio::test]
    async fn dry_run_executor_reports_success_without_side_effects() {
        let executor = DryRunExecutor;
        let result = executor.submit(&opportunity()).await;
        assert!(result.success);
        assert_eq!(result.realized_output, Some(1_010_000));
    }

    #[tokio::test]
    async fn slow_executor_times_out_as_unknown() {
        struct SlowExecutor;
        #[async_trait]
        impl Executor for SlowExecutor {
            async fn submit(&self, _opportunity: &ValidatedOpportunity) -> ExecutionResult {
                tokio::time::sleep(Duration::from_secs(10)).await;
                unreachable!("should be timed out before completing")
            }
        }

        let event = submit_opportunity(
            Arc::new(SlowExecutor),
            opportunity(),
            Duration::from_millis(10),
        )
        .await;

        assert!(!event.result.success);
        assert_eq!(event.result.failure_reason, Some(FailureReason::Unknown));
    }

    #[test]
    fn feedback_updates_reliability_and_failure_rate() {
        let mut reliability = ReliabilityTracker::new();
        let mut tip = TipController::new(0.01, 1.0);
        let mut slippage = SlippageController::new(200, 100, 800, 1);
        let mut failure_rate = FailureRateEstimator::new(0.05);

        let event = FeedbackEvent {
            pool_addresses: vec![PoolAddress(Pubkey::new_from_array([1; 32]))],
            expected_output: 1_000_000,
            result: ExecutionResult {
                success: false,
                tx_signature: None,
                realized_output: Some(990_000),
                execution_lag_ms: 600,
                failure_reason: Some(FailureReason::SlippageExceeded),
            },
        };

        apply_feedback(&event, &mut reliability, &mut tip, &mut slippage, &mut failure_rate);

        assert!(reliability.rate(PoolAddress(Pubkey::new_from_array([1; 32]))) < 1.0);
        assert!(failure_rate.failure_rate() > 0.05);
        assert!((tip.current_tip_usd() - 0.02).abs() < 1e-9);
    }
}
