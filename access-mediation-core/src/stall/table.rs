//! The stall table: a sharded hash keyed by `request_id` holding live stall
//! entries, plus a per-shard pair of FIFOs (normal, low-priority) that the
//! delivery surface drains. Entry lookup uses `DashMap`, which is already
//! internally sharded and lock-striped (the same structure `knhk-consensus`'s
//! `pbft`/`state` modules use for their prepare/commit/log maps); the FIFOs
//! are kept as an explicit, enumerable shard array so `dequeue_batch` can
//! round-robin across them for fairness, mirroring the hot/warm `ArrayQueue`
//! pair in `knhk-kernel::hot_path`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use dashmap::DashMap;

use crate::error::{CoreError, Result};
use crate::event::{Event, Response};
use crate::metrics::Metrics;

use super::entry::StallEntry;

/// Per-shard queue capacity, in number of events. Bounding by count keeps
/// `ArrayQueue`'s lock-free push/pop; the byte-based high-water mark below
/// is enforced separately before a push is even attempted.
const QUEUE_CAPACITY: usize = 4096;

struct Shard {
    normal: ArrayQueue<Event>,
    low: ArrayQueue<Event>,
    queued_bytes: AtomicU64,
}

impl Shard {
    fn new() -> Self {
        Self {
            normal: ArrayQueue::new(QUEUE_CAPACITY),
            low: ArrayQueue::new(QUEUE_CAPACITY),
            queued_bytes: AtomicU64::new(0),
        }
    }

    fn try_push(&self, event: Event, high_water_bytes: u64) -> std::result::Result<(), Event> {
        let size = event.approx_wire_size();
        if self.queued_bytes.load(Ordering::Relaxed) + size > high_water_bytes {
            return Err(event);
        }
        let queue = if event.is_low_priority() {
            &self.low
        } else {
            &self.normal
        };
        match queue.push(event) {
            Ok(()) => {
                self.queued_bytes.fetch_add(size, Ordering::Relaxed);
                Ok(())
            }
            Err(event) => Err(event),
        }
    }

    fn pop_one(&self) -> Option<Event> {
        let event = self.normal.pop().or_else(|| self.low.pop())?;
        self.queued_bytes
            .fetch_sub(event.approx_wire_size(), Ordering::Relaxed);
        Some(event)
    }
}

/// Opaque cursor threading fairness across successive `dequeue_batch` calls:
/// each call starts one shard past where the previous call left off.
#[derive(Debug, Default)]
pub struct DequeueCursor {
    next_shard: usize,
}

/// The sharded stall table.
pub struct StallTable {
    entries: DashMap<u64, Arc<StallEntry>>,
    entry_count: AtomicUsize,
    shards: Vec<Shard>,
    next_request_id: AtomicU64,
    capacity: usize,
    high_water_bytes: u64,
    enabled: AtomicBool,
}

impl StallTable {
    pub fn new(num_shards: usize, capacity: usize, high_water_bytes: u64) -> Self {
        assert!(num_shards.is_power_of_two(), "shard count must be a power of two");
        Self {
            entries: DashMap::new(),
            entry_count: AtomicUsize::new(0),
            shards: (0..num_shards).map(|_| Shard::new()).collect(),
            next_request_id: AtomicU64::new(0),
            capacity,
            high_water_bytes,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, value: bool) {
        self.enabled.store(value, Ordering::Release);
    }

    fn assign_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn shard_for(&self, request_id: u64) -> &Shard {
        let index = (request_id as usize) & (self.shards.len() - 1);
        &self.shards[index]
    }

    /// Publish a stalling event: assigns its `request_id`, creates a live
    /// `StallEntry`, and best-effort enqueues the event itself onto the
    /// shard's delivery FIFO. A failed delivery enqueue does not fail the
    /// insert — the entry still exists so the waiter has something to wait
    /// on, it will simply time out with the default response, which is the
    /// documented best-effort behavior for queued delivery.
    pub fn insert(
        &self,
        mut event: Event,
        default_response: Response,
        metrics: &Metrics,
    ) -> Result<Arc<StallEntry>> {
        if !self.enabled() {
            return Err(CoreError::Disabled);
        }
        if self.entry_count.load(Ordering::Relaxed) >= self.capacity {
            return Err(CoreError::NoResources);
        }

        let request_id = self.assign_request_id();
        event.request_id = request_id;
        let tid = event.tid;

        let entry = Arc::new(StallEntry::new(request_id, tid, default_response));
        if self
            .entries
            .insert(request_id, entry.clone())
            .is_some()
        {
            // Unreachable given a monotonic, never-reused counter; treated
            // as a bug rather than unwound.
            Metrics::inc(&metrics.duplicate_request_id_total);
            return Err(CoreError::Duplicate(request_id));
        }
        self.entry_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(request_id);
        if shard.try_push(event, self.high_water_bytes).is_err() {
            // Counted, not fatal: see doc comment above.
            Metrics::inc(&metrics.queue_drops_normal);
        }

        Ok(entry)
    }

    /// Publish a non-stalling (audit-only) event. Assigns a `request_id`
    /// purely for log correlation; there is no stall entry for it.
    pub fn enqueue_nonstall(&self, mut event: Event, metrics: &Metrics) -> Result<u64> {
        if !self.enabled() {
            return Err(CoreError::Disabled);
        }
        let request_id = self.assign_request_id();
        event.request_id = request_id;
        let size = event.approx_wire_size();
        let low_priority = event.is_low_priority();
        let shard = self.shard_for(request_id);
        match shard.try_push(event, self.high_water_bytes) {
            Ok(()) => Ok(size),
            Err(_dropped) => {
                if low_priority {
                    Metrics::inc(&metrics.queue_drops_low_priority);
                } else {
                    Metrics::inc(&metrics.queue_drops_normal);
                }
                Err(CoreError::QueueFull)
            }
        }
    }

    /// Deliver a user-space verdict to the entry waiting on `request_id`.
    /// Silently accepted if the entry no longer exists (the waiter may have
    /// already timed out) — matches the delivery surface's "unknown
    /// request_id" contract; callers that need to distinguish this return
    /// `CoreError::NotFound`.
    pub fn resolve(
        &self,
        request_id: u64,
        response: Response,
        continuation_timeout_ms: Option<u32>,
    ) -> Result<()> {
        match self.entries.get(&request_id) {
            Some(entry) => {
                entry.release(response, continuation_timeout_ms);
                Ok(())
            }
            None => Err(CoreError::NotFound(request_id)),
        }
    }

    /// Idempotent removal, called by the waiter on every exit path.
    pub fn remove(&self, request_id: u64) {
        if self.entries.remove(&request_id).is_some() {
            self.entry_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Look up the live entry for a request id, used by the stall engine to
    /// wait on it. Returns `None` once the entry has been removed.
    pub fn entry(&self, request_id: u64) -> Option<Arc<StallEntry>> {
        self.entries.get(&request_id).map(|e| e.clone())
    }

    pub fn live_entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Drain up to `max_bytes` worth of events, round-robining across
    /// shards starting one past wherever the previous call left off. Within
    /// a shard, every available normal-priority event is drained before any
    /// low-priority event.
    ///
    /// Fairness here is per-shard only, as §5 documents: two events from the
    /// same task that land in different shards (shard is chosen by
    /// `request_id`, not by task) can be drained in either order depending
    /// on where `cursor.next_shard` happens to start. This does not provide
    /// a global per-task ordering guarantee across shards, only within one.
    pub fn dequeue_batch(&self, cursor: &mut DequeueCursor, max_bytes: u64) -> Vec<Event> {
        let mut out = Vec::new();
        let mut consumed = 0u64;
        let shard_count = self.shards.len();
        if shard_count == 0 {
            return out;
        }

        for offset in 0..shard_count {
            if consumed >= max_bytes {
                break;
            }
            let shard = &self.shards[(cursor.next_shard + offset) % shard_count];
            while consumed < max_bytes {
                let Some(event) = shard.pop_one() else {
                    break;
                };
                consumed += event.approx_wire_size();
                out.push(event);
            }
        }
        cursor.next_shard = (cursor.next_shard + 1) % shard_count;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Payload, ReportFlags};

    fn sample_event(flags: ReportFlags) -> Event {
        Event {
            request_id: 0,
            tid: 1,
            pgid: 1,
            kind: EventKind::Exec,
            hook_id: 0,
            report_flags: flags,
            inode: None,
            payload: Payload::Exec {
                path: b"/bin/true".to_vec(),
            },
        }
    }

    #[test]
    fn insert_assigns_monotonic_ids() {
        let table = StallTable::new(4, 1024, 1 << 20);
        let metrics = Metrics::default();
        let e1 = table
            .insert(sample_event(ReportFlags::STALL), Response::Allow, &metrics)
            .unwrap();
        let e2 = table
            .insert(sample_event(ReportFlags::STALL), Response::Allow, &metrics)
            .unwrap();
        assert!(e2.request_id > e1.request_id);
    }

    #[test]
    fn resolve_unknown_id_is_not_found() {
        let table = StallTable::new(4, 1024, 1 << 20);
        assert_eq!(table.resolve(999, Response::Allow, None), Err(CoreError::NotFound(999)));
    }

    #[test]
    fn resolve_then_remove_leaves_no_entry() {
        let table = StallTable::new(4, 1024, 1 << 20);
        let metrics = Metrics::default();
        let entry = table
            .insert(sample_event(ReportFlags::STALL), Response::Allow, &metrics)
            .unwrap();
        assert!(table.resolve(entry.request_id, Response::Allow, None).is_ok());
        table.remove(entry.request_id);
        assert_eq!(table.live_entry_count(), 0);
        // Idempotent.
        table.remove(entry.request_id);
        assert_eq!(table.live_entry_count(), 0);
    }

    #[test]
    fn enqueue_then_dequeue_round_trips_by_value() {
        let table = StallTable::new(4, 1024, 1 << 20);
        let metrics = Metrics::default();
        let event = sample_event(ReportFlags::AUDIT);
        table.enqueue_nonstall(event.clone(), &metrics).unwrap();

        let mut cursor = DequeueCursor::default();
        let batch = table.dequeue_batch(&mut cursor, 1 << 20);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].tid, event.tid);
        assert_eq!(batch[0].payload, event.payload);
    }

    #[test]
    fn normal_priority_drains_before_low_priority_within_a_shard() {
        let table = StallTable::new(1, 1024, 1 << 20);
        let metrics = Metrics::default();
        table
            .enqueue_nonstall(sample_event(ReportFlags::LOW_PRIORITY), &metrics)
            .unwrap();
        table
            .enqueue_nonstall(sample_event(ReportFlags::AUDIT), &metrics)
            .unwrap();

        let mut cursor = DequeueCursor::default();
        let batch = table.dequeue_batch(&mut cursor, 1 << 20);
        assert_eq!(batch.len(), 2);
        assert!(!batch[0].is_low_priority());
        assert!(batch[1].is_low_priority());
    }

    #[test]
    fn disabled_table_rejects_new_work() {
        let table = StallTable::new(4, 1024, 1 << 20);
        table.set_enabled(false);
        let metrics = Metrics::default();
        assert_eq!(
            table.insert(sample_event(ReportFlags::STALL), Response::Allow, &metrics),
            Err(CoreError::Disabled)
        );
    }
}
