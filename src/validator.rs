//! Cycle Validator. Converts a theoretical `Cycle` into a sized,
//! exactly-priced `PricedCycle`, or a typed rejection.
//!
//! Re-prices every leg exactly and binary-searches the input size that
//! maximizes net profit, rather than trading a single hard-coded size;
//! every rejection is a `RejectionReason` value, never an `anyhow::Error`.

use crate::cycles::Cycle;
use crate::error::RejectionReason;
use crate::graph::{PoolGraph, VenueKind};
use crate::token::{PoolAddress, TokenId};
use crate::venues::{VenueQuote, VenueQuoter};

/// Supplies the reserve/tick/bin state a leg needs for exact quoting.
/// Kept external to `PoolGraph`, which only tracks the marginal rate the
/// cycle finder scans over.
pub trait VenueQuoteSource {
    fn quote_for(
        &self,
        pool_address: PoolAddress,
        venue: VenueKind,
        source_mint: TokenId,
    ) -> Option<VenueQuote>;
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub input_min: u128,
    pub input_max: u128,
    pub max_iterations: u32,
    /// Halt the search once an iteration improves net profit by less
    /// than this fraction (1 bp).
    pub min_improvement_frac: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            input_min: 1_000,
            input_max: 10_000_000_000,
            max_iterations: 12,
            min_improvement_frac: 0.0001,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CostModelConfig {
    pub base_fee_lamports: u64,
    pub priority_tip_usd: f64,
    pub failure_rate: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            base_fee_lamports: 5_000,
            priority_tip_usd: 0.0,
            failure_rate: 0.05,
        }
    }
}

/// A cycle that has been re-priced leg-by-leg and sized, prior to the
/// scorer's confidence/classification pass.
#[derive(Debug, Clone)]
pub struct PricedCycle {
    pub cycle: Cycle,
    pub input_amount: u128,
    pub expected_output: u128,
    pub expected_net_profit_usd: f64,
}

pub struct CycleValidator;

impl CycleValidator {
    /// Re-prices every leg at a candidate input size, chaining each
    /// leg's exact output into the next leg's input.
    fn price_chain(
        graph: &PoolGraph,
        quotes: &dyn VenueQuoteSource,
        cycle: &Cycle,
        input_amount: u128,
    ) -> Result<u128, RejectionReason> {
        let mut amount = input_amount;
        for (i, pool_address) in cycle.pool_addresses.iter().enumerate() {
            let source_mint = cycle.mints[i];
            let edge = graph
                .edge_by_pool(*pool_address)
                .ok_or(RejectionReason::StaleLeg)?;
            if edge.stale {
                return Err(RejectionReason::StaleLeg);
            }
            let quote = quotes
                .quote_for(*pool_address, edge.venue, source_mint)
                .ok_or(RejectionReason::NoDepth)?;
            amount = quote.quote_exact_in(amount)?;
            if amount == 0 {
                return Err(RejectionReason::NoDepth);
            }
        }
        Ok(amount)
    }

    fn net_profit_usd(
        input_amount: u128,
        raw_output: u128,
        slippage_tolerance_bps: u32,
        cost: &CostModelConfig,
        base_mint_usd_price: f64,
        sol_usd_price: f64,
    ) -> f64 {
        let adjusted_output =
            raw_output as f64 * (1.0 - slippage_tolerance_bps as f64 / 10_000.0);
        let gross_profit_usd = (adjusted_output - input_amount as f64) * base_mint_usd_price;
        let gas_usd = (cost.base_fee_lamports as f64 / 1_000_000_000.0) * sol_usd_price;
        let net_before_failure = gross_profit_usd - gas_usd - cost.priority_tip_usd;
        net_before_failure * (1.0 - cost.failure_rate)
    }

    /// Binary search over `[input_min, input_max]` for the size that
    /// maximizes net USD profit, halting on the iteration/improvement
    /// bounds in `ValidatorConfig`.
    ///
    /// Net profit in input size is unimodal here (each leg's marginal
    /// rate only ever worsens with size, so output-minus-input rises
    /// then falls), so each iteration probes the midpoint and a point
    /// just above it: a positive slope means the maximum lies in the
    /// upper half, and the search discards the lower half; otherwise it
    /// discards the upper half. This halves the interval every
    /// iteration, same as a standard binary search over a monotonic
    /// predicate.
    #[allow(clippy::too_many_arguments)]
    fn size(
        graph: &PoolGraph,
        quotes: &dyn VenueQuoteSource,
        cycle: &Cycle,
        config: &ValidatorConfig,
        cost: &CostModelConfig,
        slippage_tolerance_bps: u32,
        base_mint_usd_price: f64,
        sol_usd_price: f64,
    ) -> Result<(u128, u128, f64), RejectionReason> {
        let eval = |amount: u128| -> Option<(u128, u128, f64)> {
            let out = Self::price_chain(graph, quotes, cycle, amount).ok()?;
            let profit = Self::net_profit_usd(
                amount,
                out,
                slippage_tolerance_bps,
                cost,
                base_mint_usd_price,
                sol_usd_price,
            );
            Some((amount, out, profit))
        };

        let mut lo = config.input_min as f64;
        let mut hi = config.input_max as f64;
        if lo >= hi {
            return Err(RejectionReason::SizeBelowMin);
        }

        let mut best: Option<(u128, u128, f64)> = None;
        let mut prev_best_profit = f64::NEG_INFINITY;

        for _ in 0..config.max_iterations {
            let mid = lo + (hi - lo) / 2.0;
            let probe = (mid + (hi - lo) / 100.0).min(hi);

            let mid_result = eval(mid.round().max(1.0) as u128);
            let probe_result = eval(probe.round().max(1.0) as u128);

            match (mid_result, probe_result) {
                (Some(v_mid), Some(v_probe)) if v_probe.2 > v_mid.2 => {
                    lo = mid;
                    Self::keep_better(&mut best, v_probe);
                    Self::keep_better(&mut best, v_mid);
                }
                (Some(v_mid), _) => {
                    hi = mid;
                    Self::keep_better(&mut best, v_mid);
                }
                (None, Some(v_probe)) => {
                    lo = mid;
                    Self::keep_better(&mut best, v_probe);
                }
                (None, None) => break,
            }

            let current_best = best.map(|b| b.2).unwrap_or(f64::NEG_INFINITY);
            if prev_best_profit.is_finite() {
                let denom = prev_best_profit.abs().max(1e-9);
                if ((current_best - prev_best_profit) / denom).abs() < config.min_improvement_frac
                {
                    break;
                }
            }
            prev_best_profit = current_best;
        }

        best.ok_or(RejectionReason::NoDepth)
    }

    fn keep_better(best: &mut Option<(u128, u128, f64)>, candidate: (u128, u128, f64)) {
        match best {
            Some(current) if current.2 >= candidate.2 => {}
            _ => *best = Some(candidate),
        }
    }

    /// Validates and sizes `cycle`, or reports why it can't be traded
    /// this tick. Never panics on degenerate input.
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        graph: &PoolGraph,
        quotes: &dyn VenueQuoteSource,
        cycle: &Cycle,
        config: &ValidatorConfig,
        cost: &CostModelConfig,
        slippage_tolerance_bps: u32,
        base_mint_usd_price: f64,
        sol_usd_price: f64,
    ) -> Result<PricedCycle, RejectionReason> {
        for pool_address in &cycle.pool_addresses {
            let edge = graph
                .edge_by_pool(*pool_address)
                .ok_or(RejectionReason::StaleLeg)?;
            if edge.stale {
                return Err(RejectionReason::StaleLeg);
            }
        }

        let (amount, output, net_profit_usd) = Self::size(
            graph,
            quotes,
            cycle,
            config,
            cost,
            slippage_tolerance_bps,
            base_mint_usd_price,
            sol_usd_price,
        )?;

        if amount < config.input_min {
            return Err(RejectionReason::SizeBelowMin);
        }
        if net_profit_usd <= 0.0 {
            return Err(RejectionReason::NegativeNet);
        }

        Ok(PricedCycle {
            cycle: cycle.clone(),
            input_amount: amount,
            expected_output: output,
            expected_net_profit_usd: net_profit_usd,
        })
    }
}
