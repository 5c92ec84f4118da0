//! The per-event rendezvous object: one `StallEntry` per in-flight stalling
//! event, shared between the blocked originator and the response path.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::event::Response;

/// Whether the originating task is still waiting or has been handed a
/// verdict it hasn't consumed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stall,
    Released,
}

struct EntryState {
    mode: Mode,
    response: Response,
    continuation_timeout_ms: Option<u32>,
}

/// The rendezvous object for one in-flight stalling event. Created by
/// `StallTable::insert`, destroyed by `StallTable::remove`, which the
/// waiter calls on every exit path (verdict, timeout, interrupt, shutdown).
/// `remove` is idempotent by construction: it simply unlinks this entry
/// from the table, and the entry itself has no "already removed" state to
/// get wrong.
pub struct StallEntry {
    pub request_id: u64,
    pub tid: u32,
    state: Mutex<EntryState>,
    wait: Condvar,
}

/// Why a wait round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A response was observed; carries the response and any per-round
    /// continuation timeout override supplied with it.
    Released(Response, Option<u32>),
    TimedOut,
}

impl StallEntry {
    pub fn new(request_id: u64, tid: u32, default_response: Response) -> Self {
        Self {
            request_id,
            tid,
            state: Mutex::new(EntryState {
                mode: Mode::Stall,
                response: default_response,
                continuation_timeout_ms: None,
            }),
            wait: Condvar::new(),
        }
    }

    /// Called from the response path (`StallTable::resolve`). Updates the
    /// response and continuation override, flips to `Released`, and wakes
    /// the single waiter.
    pub fn release(&self, response: Response, continuation_timeout_ms: Option<u32>) {
        let mut state = self.state.lock();
        state.response = response;
        state.continuation_timeout_ms = continuation_timeout_ms;
        state.mode = Mode::Released;
        self.wait.notify_one();
    }

    /// Block for up to `timeout`, waking early if released. On return, if
    /// released, re-arms `mode = Stall` so a subsequent CONTINUE round has
    /// somewhere to land without the response path needing to know whether
    /// the waiter is already back asleep.
    ///
    /// `Condvar::wait_for` can wake spuriously; a single wait call is not
    /// enough to tell a spurious wake apart from a real timeout. Loop on the
    /// remaining time until `mode` actually flips to `Released` or the
    /// deadline passes, per §4.1 step 4 ("wait … until `entry.mode !=
    /// STALL`").
    pub fn wait_round(&self, timeout: Duration) -> WaitOutcome {
        let mut state = self.state.lock();
        let deadline = Instant::now() + timeout;
        while state.mode == Mode::Stall {
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let result = self.wait.wait_for(&mut state, deadline - now);
            if result.timed_out() && state.mode == Mode::Stall {
                return WaitOutcome::TimedOut;
            }
        }
        let response = state.response;
        let continuation = state.continuation_timeout_ms;
        state.mode = Mode::Stall;
        WaitOutcome::Released(response, continuation)
    }

    /// Non-blocking peek, used by the engine's interrupt-poll loop to avoid
    /// re-locking twice per slice.
    pub fn is_released(&self) -> bool {
        self.state.lock().mode == Mode::Released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn release_wakes_waiter_with_response() {
        let entry = Arc::new(StallEntry::new(1, 42, Response::Allow));
        let waiter = entry.clone();
        let handle = thread::spawn(move || waiter.wait_round(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        entry.release(Response::Deny, None);

        assert_eq!(
            handle.join().unwrap(),
            WaitOutcome::Released(Response::Deny, None)
        );
    }

    #[test]
    fn times_out_with_default_response_when_unreleased() {
        let entry = StallEntry::new(2, 1, Response::Allow);
        let outcome = entry.wait_round(Duration::from_millis(20));
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn re_arms_to_stall_after_release_for_next_round() {
        let entry = StallEntry::new(3, 1, Response::Allow);
        entry.release(Response::Continue, Some(500));
        let outcome = entry.wait_round(Duration::from_millis(1));
        assert_eq!(outcome, WaitOutcome::Released(Response::Continue, Some(500)));
        // Having consumed the release, a fresh wait with nothing further
        // queued must time out rather than immediately firing again.
        let outcome2 = entry.wait_round(Duration::from_millis(20));
        assert_eq!(outcome2, WaitOutcome::TimedOut);
    }

    #[test]
    fn spurious_wake_does_not_end_the_stall_early() {
        // Notify without releasing, simulating a spurious condvar wake: the
        // waiter must keep waiting for the remainder of the timeout rather
        // than returning with the still-unreleased default response.
        let entry = Arc::new(StallEntry::new(4, 1, Response::Allow));
        let notifier = entry.clone();
        let handle = thread::spawn(move || notifier.wait.notify_one());

        let start = Instant::now();
        let outcome = entry.wait_round(Duration::from_millis(60));
        handle.join().unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
