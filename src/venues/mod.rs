//! Per-`VenueKind` exact pricing.
//!
//! `VenueQuote` carries the external reserve/tick/bin state the
//! validator needs to re-price a leg exactly — kept separate from
//! `PoolEdge` since `PoolGraph` only tracks the marginal rate the cycle
//! finder scans over, not the full depth model each venue family needs
//! for an exact quote. Dispatch is a flat `enum_dispatch` table rather
//! than a trait object, since the venue set is closed and known at
//! compile time.

mod clmm;
mod constant_product;
mod dlmm;
mod stable;

pub use clmm::ClmmQuoter;
pub use constant_product::ConstantProductQuoter;
pub use dlmm::{DlmmBin, DlmmQuoter};
pub use stable::StableQuoter;

use crate::error::RejectionReason;
use enum_dispatch::enum_dispatch;

/// Exact-math quoting contract every venue family implements.
/// Implementations never panic on degenerate input — zero reserves, an
/// exhausted tick range, or an under-filled bin ladder are all reported
/// as `RejectionReason::NoDepth`, never a singularity.
#[enum_dispatch]
pub trait VenueQuoter {
    fn quote_exact_in(&self, input_amount: u128) -> Result<u128, RejectionReason>;
}

/// Closed dispatch over the four venue families in `VenueKind`. One of
/// these is built from the venue-quote cache per leg per sizing
/// iteration in `validator.rs`.
#[enum_dispatch(VenueQuoter)]
pub enum VenueQuote {
    ConstantProduct(ConstantProductQuoter),
    Stable(StableQuoter),
    Clmm(ClmmQuoter),
    Dlmm(DlmmQuoter),
}
