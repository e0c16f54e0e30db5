//! Typed error kinds recognized by the engine core.
//!
//! `EngineError` covers the kinds that can surface out of a tick
//! (`InvariantViolation`, `ShutdownRequested`) plus the ones that are
//! recorded/logged without unwinding. Per-candidate validator rejections
//! use the smaller `RejectionReason` enum instead, since those are
//! values returned from a pure function, never raised.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("malformed ingress event for pool {pool}")]
    MalformedEvent { pool: String },

    #[error("stale event for pool {pool}: slot {slot} <= high-water mark")]
    StaleEvent { pool: String, slot: u64 },

    #[error("pool graph invariant {invariant} violated: {detail}")]
    InvariantViolation { invariant: u8, detail: String },

    #[error("gate blocked emission: {0}")]
    GateBlocked(GateKind),

    #[error("executor call timed out after {0:?}")]
    ExecutorTimeout(std::time::Duration),

    #[error("executor call failed: {0}")]
    ExecutorFailed(String),

    #[error("shutdown requested")]
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Latency,
    Balance,
    Throughput,
    TipToProfit,
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GateKind::Latency => "latency",
            GateKind::Balance => "balance",
            GateKind::Throughput => "throughput",
            GateKind::TipToProfit => "tip_to_profit",
        };
        write!(f, "{name}")
    }
}

/// Per-candidate validator disposition. Returned as a value, never
/// raised, so rejecting a cycle is exactly as cheap as accepting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NoDepth,
    NegativeNet,
    StaleLeg,
    SizeBelowMin,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RejectionReason::NoDepth => "NO_DEPTH",
            RejectionReason::NegativeNet => "NEGATIVE_NET",
            RejectionReason::StaleLeg => "STALE_LEG",
            RejectionReason::SizeBelowMin => "SIZE_BELOW_MIN",
        };
        write!(f, "{name}")
    }
}

/// Process exit codes for the engine binary's own surface.
pub mod exit_code {
    pub const CLEAN_SHUTDOWN: i32 = 0;
    pub const CONFIG_INVALID: i32 = 64;
    pub const INGRESS_CLOSED_BEFORE_READY: i32 = 65;
    pub const INVARIANT_VIOLATED: i32 = 70;
}
