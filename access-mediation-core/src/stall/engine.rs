//! The stall engine: `stall(event) -> Verdict`, the core's single blocking
//! entry point.

use std::time::Duration;

use tracing::{trace, warn};

use crate::config::{Config, MAX_CONTINUATIONS};
use crate::event::{Response, Verdict};
use crate::metrics::Metrics;

use super::entry::WaitOutcome;
use super::table::StallTable;

/// How the task signal check (an OS concept, supplied by the embedding
/// adapter) is consulted during a wait. The core treats "interrupted"
/// identically to "timed out": the originating task is going away and must
/// not be blocked indefinitely.
pub trait InterruptSource: Send + Sync {
    fn is_interrupted(&self, tid: u32) -> bool;
}

/// Default source for callers (tests, or adapters with no signal-pending
/// concept) that never interrupts a wait.
pub struct NeverInterrupted;

impl InterruptSource for NeverInterrupted {
    fn is_interrupted(&self, _tid: u32) -> bool {
        false
    }
}

/// How long a single wait slice may block before re-checking the interrupt
/// source and the table's enabled flag. The spec's only true suspension
/// point; slicing it keeps "global disable" and "task signal pending"
/// externally observable within a bounded latency instead of only at the
/// full per-round timeout.
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Distinguishes an aborted wait (table/stall mode disabled mid-wait) from
/// an ordinary verdict, so the hook can skip any post-processing tied to a
/// real user-space decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallResult {
    Verdict(Verdict),
    Aborted,
}

/// Run the stall algorithm for one stalling event and return the verdict
/// the hook adapter should return to the OS.
///
/// `event` must already carry its assigned `request_id` (i.e. it is the
/// event returned by `StallTable::insert`, not a fresh one) — the engine
/// does not itself call `insert`; that is left to the hook adapter layer so
/// callers can choose to check caches between insert and stall. See
/// `hooks::run_adapter` for the composed, spec-shaped entry point.
pub fn stall(
    table: &StallTable,
    config: &Config,
    metrics: &Metrics,
    request_id: u64,
    tid: u32,
    interrupt: &dyn InterruptSource,
) -> StallResult {
    Metrics::inc(&metrics.stalls_started);

    let mut timeout = Duration::from_millis(config.stall_timeout_ms as u64);
    let mut continues: u32 = 0;
    let default_response = config.default_response();

    let result = loop {
        match wait_with_poll(table, request_id, tid, timeout, interrupt) {
            WaitBreak::Disabled => {
                warn!(request_id, "stall aborted: stall table disabled mid-wait");
                Metrics::inc(&metrics.stalls_disabled_abort);
                break Outcome::Aborted;
            }
            WaitBreak::Interrupted => {
                trace!(request_id, "stall wait interrupted by pending task signal");
                Metrics::inc(&metrics.stalls_interrupted);
                break Outcome::Response(default_response);
            }
            WaitBreak::TimedOut => {
                trace!(request_id, "stall wait timed out");
                Metrics::inc(&metrics.stalls_timed_out);
                break Outcome::Response(default_response);
            }
            WaitBreak::Released(response, continuation_timeout_ms) => {
                Metrics::inc(&metrics.stalls_resolved);
                if response == Response::Continue {
                    continues += 1;
                    if continues >= MAX_CONTINUATIONS {
                        Metrics::inc(&metrics.continuations_capped);
                        break Outcome::Response(Response::Deny);
                    }
                    Metrics::inc(&metrics.continuations_granted);
                    timeout = Duration::from_millis(
                        continuation_timeout_ms
                            .unwrap_or(config.continue_timeout_ms)
                            as u64,
                    );
                    continue;
                }
                break Outcome::Response(response);
            }
        }
    };

    table.remove(request_id);

    match result {
        Outcome::Aborted => StallResult::Aborted,
        Outcome::Response(response) => StallResult::Verdict(response.into()),
    }
}

enum Outcome {
    Response(Response),
    Aborted,
}

enum WaitBreak {
    Released(Response, Option<u32>),
    TimedOut,
    Interrupted,
    Disabled,
}

/// One full round of waiting (bounded by `timeout`), sliced into
/// `POLL_SLICE`-sized condvar waits so the table-disabled and interrupt
/// checks happen with bounded latency instead of only at round boundaries.
fn wait_with_poll(
    table: &StallTable,
    request_id: u64,
    tid: u32,
    timeout: Duration,
    interrupt: &dyn InterruptSource,
) -> WaitBreak {
    let Some(entry) = table.entry(request_id) else {
        return WaitBreak::TimedOut;
    };

    let mut remaining = timeout;
    loop {
        if !table.enabled() {
            return WaitBreak::Disabled;
        }
        if interrupt.is_interrupted(tid) {
            return WaitBreak::Interrupted;
        }

        let slice = remaining.min(POLL_SLICE);
        match entry.wait_round(slice) {
            WaitOutcome::Released(response, continuation) => {
                return WaitBreak::Released(response, continuation);
            }
            WaitOutcome::TimedOut => {
                if slice >= remaining {
                    return WaitBreak::TimedOut;
                }
                remaining -= slice;
            }
        }
    }
}
