//! Error taxonomy for the access-mediation core.
//!
//! Mirrors the kinds enumerated in the design's error-handling section: the
//! core never panics on user-space misbehavior, it bounds damage and reports
//! a typed, recoverable error that the caller (a hook adapter) degrades from
//! fail-open.

use thiserror::Error;

/// Errors the core can produce. None of these are fatal to the process; every
/// call site that can observe one has a documented fail-open behavior.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Allocation or capacity failure; the adapter degrades to ALLOW.
    #[error("no resources available")]
    NoResources,

    /// The stall table or stall mode is globally disabled.
    #[error("stall table disabled")]
    Disabled,

    /// `request_id` collision. Can only happen if the monotonic counter
    /// wrapped or was misused; treated as a bug.
    #[error("duplicate request id {0}")]
    Duplicate(u64),

    /// A non-stall enqueue could not be admitted (count or byte high-water
    /// mark reached). The caller must free the event.
    #[error("queue full")]
    QueueFull,

    /// `resolve` referenced a request id with no live stall entry. The
    /// waiter has likely already timed out; this is not treated as an error
    /// by the delivery surface, only by direct callers of the table.
    #[error("unknown request id {0}")]
    NotFound(u64),

    /// A clamp helper rejected a value outright rather than clamping it.
    /// Never observed by `configure()` itself (out-of-range values there are
    /// clamped, per the control-request contract), kept for the clamp
    /// helper's own unit tests.
    #[error("config value out of range: {0}")]
    InvalidConfig(&'static str),

    /// A `std::sync` primitive was poisoned. Unreachable in practice since
    /// the core uses `parking_lot`, which does not poison; kept so a future
    /// caller of a std-backed seam never has to `unwrap()`.
    #[error("lock poisoned")]
    Poisoned,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
