//! CLMM exact quoting — concentrated-liquidity tick traversal, single
//! active range. Standard Uniswap-v3-family sqrt-price accounting.

use super::VenueQuoter;
use crate::error::RejectionReason;

/// Current tick's liquidity and sqrt-price bounds. A leg that would
/// cross out of `sqrt_price_lower` fails outright rather than walking
/// into the next tick, since the engine has no cross-tick liquidity
/// data to traverse.
pub struct ClmmQuoter {
    pub liquidity: u128,
    pub sqrt_price_current: f64,
    pub sqrt_price_lower: f64,
    pub fee_bps: u16,
}

impl VenueQuoter for ClmmQuoter {
    fn quote_exact_in(&self, input_amount: u128) -> Result<u128, RejectionReason> {
        if self.liquidity == 0 || self.sqrt_price_current <= self.sqrt_price_lower {
            return Err(RejectionReason::NoDepth);
        }
        if input_amount == 0 {
            return Ok(0);
        }

        let liquidity = self.liquidity as f64;
        let in_after_fee = input_amount as f64 * (1.0 - self.fee_bps as f64 / 10_000.0);

        let delta_sqrt_price = in_after_fee / liquidity;
        let sqrt_price_next = self.sqrt_price_current - delta_sqrt_price;
        if sqrt_price_next <= self.sqrt_price_lower {
            return Err(RejectionReason::NoDepth);
        }

        let out = liquidity * (1.0 / sqrt_price_next - 1.0 / self.sqrt_price_current);
        if !(out > 0.0) || !out.is_finite() {
            return Err(RejectionReason::NoDepth);
        }
        Ok(out.floor() as u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_swap_quotes_positive_output() {
        let q = ClmmQuoter {
            liquidity: 1_000_000_000,
            sqrt_price_current: 1.2,
            sqrt_price_lower: 0.8,
            fee_bps: 5,
        };
        let out = q.quote_exact_in(1_000_000).unwrap();
        assert!(out > 0);
    }

    #[test]
    fn swap_exceeding_range_has_no_depth() {
        let q = ClmmQuoter {
            liquidity: 10,
            sqrt_price_current: 1.0,
            sqrt_price_lower: 0.99,
            fee_bps: 5,
        };
        assert_eq!(
            q.quote_exact_in(1_000_000).unwrap_err(),
            RejectionReason::NoDepth
        );
    }
}
