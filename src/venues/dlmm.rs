//! DLMM exact quoting — discretized-bin traversal. Bins are walked in
//! the order the venue-quote cache presents them
//! (closest-to-current-price first), consuming each one's input-side
//! depth before moving to the next.

use super::VenueQuoter;
use crate::error::RejectionReason;

/// One bin's input-side depth and the output-per-input price it fills
/// at. Bins are consumed in the order given.
pub struct DlmmBin {
    pub price: f64,
    pub depth_in: u128,
}

pub struct DlmmQuoter {
    pub bins: Vec<DlmmBin>,
    pub fee_bps: u16,
}

impl VenueQuoter for DlmmQuoter {
    fn quote_exact_in(&self, input_amount: u128) -> Result<u128, RejectionReason> {
        if self.bins.is_empty() {
            return Err(RejectionReason::NoDepth);
        }
        if input_amount == 0 {
            return Ok(0);
        }

        let fee_mult = 1.0 - self.fee_bps as f64 / 10_000.0;
        let mut remaining = input_amount as f64;
        let mut output = 0.0f64;

        for bin in &self.bins {
            if remaining <= 0.0 {
                break;
            }
            let consume = remaining.min(bin.depth_in as f64);
            output += consume * bin.price * fee_mult;
            remaining -= consume;
        }

        if remaining > 0.0 {
            return Err(RejectionReason::NoDepth);
        }
        Ok(output.floor().max(0.0) as u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_bins_in_order_until_filled() {
        let q = DlmmQuoter {
            bins: vec![
                DlmmBin { price: 1.0, depth_in: 500 },
                DlmmBin { price: 0.98, depth_in: 1_000 },
            ],
            fee_bps: 0,
        };
        let out = q.quote_exact_in(800).unwrap();
        // 500 @ 1.0 + 300 @ 0.98
        let expected = (500.0 + 300.0 * 0.98).floor() as u128;
        assert_eq!(out, expected);
    }

    #[test]
    fn insufficient_total_depth_fails() {
        let q = DlmmQuoter {
            bins: vec![DlmmBin { price: 1.0, depth_in: 100 }],
            fee_bps: 0,
        };
        assert_eq!(
            q.quote_exact_in(1_000).unwrap_err(),
            RejectionReason::NoDepth
        );
    }
}
