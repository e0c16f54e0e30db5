//! AMM_STABLE exact quoting — two-asset StableSwap invariant, solved
//! numerically in two steps: find the `D` invariant via a fixed-point
//! Newton loop, then solve for the new balance given `D` and the
//! updated input reserve. The standard StableSwap construction.

use super::VenueQuoter;
use crate::error::RejectionReason;
use roots::{find_root_newton_raphson, SimpleConvergency};

const RELATIVE_TOLERANCE: f64 = 1e-9;
const MAX_ITERATIONS: usize = 32;

pub struct StableQuoter {
    pub reserve_in: u128,
    pub reserve_out: u128,
    pub amplification: u64,
    pub fee_bps: u16,
}

impl VenueQuoter for StableQuoter {
    fn quote_exact_in(&self, input_amount: u128) -> Result<u128, RejectionReason> {
        if self.reserve_in == 0 || self.reserve_out == 0 {
            return Err(RejectionReason::NoDepth);
        }
        if input_amount == 0 {
            return Ok(0);
        }

        let x0 = self.reserve_in as f64;
        let y0 = self.reserve_out as f64;
        let amp = self.amplification as f64;

        let d = invariant_d(amp, x0, y0)?;
        let x1 = x0 + input_amount as f64;
        let y1 = solve_y(amp, d, x1)?;

        let gross_out = y0 - y1;
        if !(gross_out > 0.0) || !gross_out.is_finite() {
            return Err(RejectionReason::NoDepth);
        }
        let net_out = gross_out * (1.0 - self.fee_bps as f64 / 10_000.0);
        Ok(net_out.floor().max(0.0) as u128)
    }
}

/// Fixed-point solve of `Ann*S + D_P*n == D*((Ann-1) + (n+1)*D_P/D)` for
/// two coins (`n = 2`, `Ann = 4*A`), the classic Curve `get_D` loop.
fn invariant_d(amp: f64, x: f64, y: f64) -> Result<f64, RejectionReason> {
    let s = x + y;
    if s <= 0.0 {
        return Err(RejectionReason::NoDepth);
    }
    let ann = amp * 4.0;
    let mut d = s;
    for _ in 0..MAX_ITERATIONS {
        let d_p = d * d * d / (4.0 * x * y);
        let d_next = (ann * s + d_p * 2.0) * d / ((ann - 1.0) * d + d_p * 3.0);
        if (d_next - d).abs() <= RELATIVE_TOLERANCE * d_next.abs().max(1.0) {
            return Ok(d_next);
        }
        d = d_next;
    }
    Err(RejectionReason::NoDepth)
}

/// Given the invariant `D` and the new balance of one side (`x_new`),
/// solves `y^2 + (b - D)*y - c == 0` for the other side's new balance via
/// Newton's method (`roots` crate, 1e-9 relative tolerance, 32 iteration
/// cap).
fn solve_y(amp: f64, d: f64, x_new: f64) -> Result<f64, RejectionReason> {
    if x_new <= 0.0 {
        return Err(RejectionReason::NoDepth);
    }
    let ann = amp * 4.0;
    let c = d * d * d / (4.0 * x_new * ann);
    let b = x_new + d / ann;

    let f = move |y: f64| y * y + (b - d) * y - c;
    let f_prime = move |y: f64| 2.0 * y + (b - d);

    let mut convergency = SimpleConvergency {
        eps: RELATIVE_TOLERANCE,
        max_iter: MAX_ITERATIONS,
    };
    find_root_newton_raphson(d, &f, &f_prime, &mut convergency)
        .map_err(|_| RejectionReason::NoDepth)
}
