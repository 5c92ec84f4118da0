//! Property-based checks of the invariants §8 states in quantified form:
//! monotonic, never-reused request ids; config clamping into range; and
//! the enqueue/dequeue round-trip law for non-stall events.

use proptest::prelude::*;

use access_mediation_core::config::{Config, MAX_EXTENDED_MS, MAX_WAIT_MS, MIN_WAIT_MS};
use access_mediation_core::event::{Event, EventKind, Payload, ReportFlags, Response};
use access_mediation_core::metrics::Metrics;
use access_mediation_core::stall::{DequeueCursor, StallTable};

fn sample_event(tid: u32, low_priority: bool) -> Event {
    let mut flags = ReportFlags::AUDIT;
    if low_priority {
        flags |= ReportFlags::LOW_PRIORITY;
    }
    Event {
        request_id: 0,
        tid,
        pgid: tid,
        kind: EventKind::Exec,
        hook_id: 0,
        report_flags: flags,
        inode: None,
        payload: Payload::Exec {
            path: b"/bin/true".to_vec(),
        },
    }
}

proptest! {
    /// Request ids assigned by a sequence of inserts on a single table are
    /// strictly increasing and never repeat, whatever shard count or
    /// insertion order is used.
    #[test]
    fn request_ids_are_monotonic_and_unique(
        shard_pow in 0u32..5,
        count in 1usize..64,
    ) {
        let shards = 1usize << shard_pow;
        let table = StallTable::new(shards, count + 1, 1 << 20);
        let metrics = Metrics::default();

        let mut seen = Vec::with_capacity(count);
        for tid in 0..count {
            let entry = table
                .insert(sample_event(tid as u32, false), Response::Allow, &metrics)
                .unwrap();
            seen.push(entry.request_id);
        }

        for window in seen.windows(2) {
            prop_assert!(window[1] > window[0]);
        }
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), seen.len());
    }

    /// `Config::clamp` always lands every bounded field inside its
    /// documented interval, regardless of how far out of range the inputs
    /// were to start with.
    #[test]
    fn clamp_always_lands_in_range(
        stall_timeout_ms in any::<u32>(),
        continue_timeout_ms in any::<u32>(),
    ) {
        let cfg = Config {
            stall_timeout_ms,
            continue_timeout_ms,
            ..Config::default()
        }
        .clamp();

        prop_assert!(cfg.stall_timeout_ms >= MIN_WAIT_MS);
        prop_assert!(cfg.stall_timeout_ms <= MAX_WAIT_MS);
        prop_assert!(cfg.continue_timeout_ms >= cfg.stall_timeout_ms);
        prop_assert!(cfg.continue_timeout_ms <= MAX_EXTENDED_MS);
    }

    /// enqueue_nonstall(e) then dequeue_batch yields e back unchanged,
    /// provided the table has room and the batch budget is unbounded.
    #[test]
    fn enqueue_then_dequeue_round_trips(
        tids in prop::collection::vec(0u32..1000, 1..32),
        low_priority in prop::collection::vec(any::<bool>(), 1..32),
    ) {
        let n = tids.len().min(low_priority.len());
        let table = StallTable::new(4, n + 1, 1 << 30);
        let metrics = Metrics::default();

        let mut sent = Vec::with_capacity(n);
        for i in 0..n {
            let event = sample_event(tids[i], low_priority[i]);
            table.enqueue_nonstall(event.clone(), &metrics).unwrap();
            sent.push(event);
        }

        let mut cursor = DequeueCursor::default();
        let mut received = Vec::with_capacity(n);
        // Shard count is fixed and small; a handful of calls drains
        // everything regardless of how dequeue_batch round-robins shards.
        for _ in 0..(4 * n + 8) {
            let batch = table.dequeue_batch(&mut cursor, 1 << 30);
            received.extend(batch);
        }

        prop_assert_eq!(received.len(), sent.len());
        for event in &sent {
            prop_assert!(received.iter().any(|r| r.tid == event.tid && r.payload == event.payload));
        }
    }
}
