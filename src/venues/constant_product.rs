//! AMM_CONSTANT_PRODUCT exact quoting — `x * y = k` with a proportional
//! fee taken out of the input leg. Uses `spl_math`'s big-integer `U256`
//! so the multiply-then-divide never overflows a `u128` intermediate.

use super::VenueQuoter;
use crate::error::RejectionReason;
use spl_math::uint::U256;

pub struct ConstantProductQuoter {
    pub reserve_in: u128,
    pub reserve_out: u128,
    pub fee_bps: u16,
}

impl VenueQuoter for ConstantProductQuoter {
    fn quote_exact_in(&self, input_amount: u128) -> Result<u128, RejectionReason> {
        if self.reserve_in == 0 || self.reserve_out == 0 {
            return Err(RejectionReason::NoDepth);
        }
        if input_amount == 0 {
            return Ok(0);
        }

        let fee_num = 10_000u128.saturating_sub(self.fee_bps as u128);
        let in_after_fee = U256::from(input_amount) * U256::from(fee_num);
        let numerator = U256::from(self.reserve_out) * in_after_fee;
        let denominator = U256::from(self.reserve_in) * U256::from(10_000u128) + in_after_fee;

        if denominator.is_zero() {
            return Err(RejectionReason::NoDepth);
        }
        let out = numerator / denominator;
        if out >= U256::from(self.reserve_out) {
            // Can't drain the whole pool in one hop — same depth failure
            // as an empty reserve.
            return Err(RejectionReason::NoDepth);
        }
        Ok(out.as_u128())
    }
}
