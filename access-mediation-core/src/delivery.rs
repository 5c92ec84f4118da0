//! The Delivery Surface: pulls queued audit events out of the Stall Table
//! for user-space consumption and routes verdicts back in. The actual
//! transport (character device, socket, in-process channel) is an external
//! collaborator; this module only owns the contract such a transport must
//! satisfy, expressed as two small traits plus the `configure()` control
//! request.

use std::sync::Arc;

use tracing::debug;

use crate::agent::AgentRegistry;
use crate::cache::inode_cache::InodeCache;
use crate::cache::task_cache::TaskCache;
use crate::config::{Config, ConfigStore, ConfigUpdate};
use crate::event::{Event, Response};
use crate::stall::{DequeueCursor, StallTable};

/// Where drained audit events go. Implemented by the embedding adapter's
/// real transport; a test or in-process caller can implement it trivially
/// (e.g. over an `mpsc` channel).
pub trait EventSink: Send + Sync {
    fn deliver(&self, batch: Vec<Event>);
}

/// Where a verdict for a previously delivered event comes from. The
/// administrative path simply forwards to `StallTable::resolve`; this trait
/// exists so the adapter can plug a transport-specific read loop in front of
/// it without the core depending on that transport.
pub trait ResponseSource: Send + Sync {
    fn respond(&self, request_id: u64, response: Response, continuation_timeout_ms: Option<u32>);
}

/// Boot-time producer of the initial `Config`, distinct from the runtime
/// `configure()` control request: this only runs once, before the first
/// event, and is specified separately in `boot`.
pub trait ConfigSource {
    fn load(&self) -> crate::error::Result<Config>;
}

/// Drains queued (non-stall) events from the table and hands them to an
/// `EventSink`. Carries its own cursor so repeated calls round-robin shards
/// the way `StallTable::dequeue_batch` is documented to.
pub struct DeliverySurface<'a> {
    table: &'a StallTable,
    cursor: DequeueCursor,
}

impl<'a> DeliverySurface<'a> {
    pub fn new(table: &'a StallTable) -> Self {
        Self {
            table,
            cursor: DequeueCursor::default(),
        }
    }

    /// One blocking-read cycle from the caller's point of view: drains up to
    /// `max_bytes` worth of queued events and hands them to `sink`. Draining
    /// is best-effort for queued audit events (they may be dropped earlier,
    /// at enqueue time, under memory pressure) but never drops an event it
    /// has already dequeued here.
    pub fn poll(&mut self, max_bytes: u64, sink: &dyn EventSink) {
        let batch = self.table.dequeue_batch(&mut self.cursor, max_bytes);
        if !batch.is_empty() {
            sink.deliver(batch);
        }
    }
}

/// The administrative response path: forwards a verdict to the table,
/// accepting an unknown `request_id` silently (the waiter may have already
/// timed out), per the delivery surface's write contract.
pub struct TableResponseSource<'a> {
    table: &'a StallTable,
}

impl<'a> TableResponseSource<'a> {
    pub fn new(table: &'a StallTable) -> Self {
        Self { table }
    }
}

impl<'a> ResponseSource for TableResponseSource<'a> {
    fn respond(&self, request_id: u64, response: Response, continuation_timeout_ms: Option<u32>) {
        let _ = self.table.resolve(request_id, response, continuation_timeout_ms);
    }
}

/// The `configure()` control request: applies a batch of updates to the
/// shared `ConfigStore`, and, when `stall_mode` transitions, flushes both
/// verdict caches so a hook never acts on a verdict recorded under a
/// different policy.
pub fn configure(
    store: &ConfigStore,
    updates: &[ConfigUpdate],
    task_cache: &TaskCache,
    inode_cache: &InodeCache,
) -> Arc<Config> {
    let (before, after) = store.update(updates);
    if before.stall_mode != after.stall_mode {
        debug!(
            from = before.stall_mode,
            to = after.stall_mode,
            "stall_mode transitioned, flushing verdict caches"
        );
        task_cache.flush();
        inode_cache.flush();
    }
    after
}

/// Administrative "register self" call: the agent announces its own process
/// group so hooks stop stalling it and cache consultation is skipped for
/// its own operations (the cache feedback-loop guard).
pub fn register_agent(registry: &AgentRegistry, pgid: u32) {
    registry.register(pgid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Payload, ReportFlags};
    use crate::metrics::Metrics;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct CollectingSink {
        received: StdMutex<Vec<Event>>,
    }

    impl EventSink for CollectingSink {
        fn deliver(&self, batch: Vec<Event>) {
            self.received.lock().unwrap().extend(batch);
        }
    }

    fn sample_event() -> Event {
        Event {
            request_id: 0,
            tid: 1,
            pgid: 1,
            kind: EventKind::Exec,
            hook_id: 0,
            report_flags: ReportFlags::AUDIT,
            inode: None,
            payload: Payload::Exec {
                path: b"/bin/true".to_vec(),
            },
        }
    }

    #[test]
    fn poll_delivers_queued_events_to_the_sink() {
        let table = StallTable::new(1, 16, 1 << 20);
        let metrics = Metrics::default();
        table.enqueue_nonstall(sample_event(), &metrics).unwrap();

        let sink = CollectingSink {
            received: StdMutex::new(Vec::new()),
        };
        let mut surface = DeliverySurface::new(&table);
        surface.poll(1 << 20, &sink);

        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn response_to_unknown_request_id_is_silently_accepted() {
        let table = StallTable::new(1, 16, 1 << 20);
        let source = TableResponseSource::new(&table);
        source.respond(12345, Response::Allow, None);
    }

    #[test]
    fn configure_flips_stall_mode_and_flushes_caches() {
        let store = ConfigStore::new(Config::default());
        let metrics = Arc::new(Metrics::default());
        let task_cache = TaskCache::new(8, Duration::from_secs(60), metrics.clone());
        let inode_cache = InodeCache::new(8, Duration::from_secs(60), metrics);
        task_cache.insert(1, Response::Allow);
        assert!(task_cache.lookup(1).is_some());

        let after = configure(&store, &[ConfigUpdate::StallMode(false)], &task_cache, &inode_cache);
        assert!(!after.stall_mode);
        assert!(task_cache.lookup(1).is_none());
    }
}
