//! A kernel-resident access-mediation core: intercepts security-sensitive
//! operations (exec, file mutation, open/close, executable mmap, process
//! lifecycle, signalling, ptrace) and routes them through a user-space
//! decision agent that may stall the originating task until a verdict
//! arrives, or audit the event asynchronously without blocking it.
//!
//! This crate is the engine only. OS-specific hook registration, the
//! on-wire event codec, and the transport that carries events to and
//! responses from user space are external collaborators, supplied by the
//! embedding adapter through the trait seams in [`delivery`].

pub mod agent;
pub mod boot;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod factory;
pub mod hooks;
pub mod metrics;
pub mod stall;

pub use error::{CoreError, Result};
pub use event::{Event, Response, Verdict};

use std::sync::Arc;
use std::time::Duration;

use agent::AgentRegistry;
use cache::inode_cache::InodeCache;
use cache::task_cache::TaskCache;
use config::{Config, ConfigHandle, ConfigStore};
use hooks::AdapterContext;
use metrics::{Metrics, MetricsSnapshot};
use stall::{InterruptSource, NeverInterrupted, StallTable};

/// Default verdict cache capacity, per cache. Modest: these caches exist to
/// suppress a burst of repeated identical operations, not to remember
/// process history.
pub const DEFAULT_CACHE_CAPACITY: usize = 4_096;
/// Default verdict cache TTL: long enough to absorb a repeat within the same
/// burst of activity, short enough that a stale verdict cannot linger.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);
/// Default stall table shard count. Must stay a power of two.
pub const DEFAULT_SHARDS: usize = 16;
/// Default per-entry capacity across the whole table.
pub const DEFAULT_TABLE_CAPACITY: usize = 65_536;
/// Default per-shard queued-byte high-water mark.
pub const DEFAULT_HIGH_WATER_BYTES: u64 = 4 << 20;

/// The composed core: every piece of process-wide state a hook adapter
/// needs, assembled once at startup and shared by reference from there.
/// This is the "thin process-level accessor" the design notes call for in
/// place of ad hoc global singletons — one explicit handle, constructed
/// once, rather than statics scattered across modules.
pub struct Core {
    pub config: ConfigStore,
    pub table: StallTable,
    pub metrics: Arc<Metrics>,
    pub agent: AgentRegistry,
    pub task_cache: TaskCache,
    pub inode_cache: InodeCache,
    interrupt: Box<dyn InterruptSource>,
}

impl Core {
    /// Build a core from an already-loaded boot `Config` (see [`boot`] for
    /// how to produce one) using the default sizing constants above.
    pub fn new(initial: Config) -> Self {
        Self::with_sizing(
            initial,
            DEFAULT_SHARDS,
            DEFAULT_TABLE_CAPACITY,
            DEFAULT_HIGH_WATER_BYTES,
            DEFAULT_CACHE_CAPACITY,
            DEFAULT_CACHE_TTL,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_sizing(
        initial: Config,
        shards: usize,
        table_capacity: usize,
        high_water_bytes: u64,
        cache_capacity: usize,
        cache_ttl: Duration,
    ) -> Self {
        let metrics = Arc::new(Metrics::default());
        Self {
            config: ConfigStore::new(initial),
            table: StallTable::new(shards, table_capacity, high_water_bytes),
            metrics: metrics.clone(),
            agent: AgentRegistry::new(),
            task_cache: TaskCache::new(cache_capacity, cache_ttl, metrics.clone()),
            inode_cache: InodeCache::new(cache_capacity, cache_ttl, metrics),
            interrupt: Box::new(NeverInterrupted),
        }
    }

    /// Swap in a real interrupt source (the embedding adapter's view of
    /// "does this task have a pending signal"), replacing the no-op default
    /// used by tests and by adapters with no such concept.
    pub fn with_interrupt_source(mut self, source: Box<dyn InterruptSource>) -> Self {
        self.interrupt = source;
        self
    }

    /// A capability-gated handle for the administrative `configure()` path.
    pub fn config_handle(&self) -> ConfigHandle<'_> {
        ConfigHandle::new(&self.config)
    }

    /// Everything a hook adapter function needs, bound to this core's state
    /// and the currently-loaded config snapshot. Callers take a snapshot
    /// once per call (not once per access) so a single hook invocation
    /// observes one consistent `Config` even if it is updated concurrently.
    pub fn adapter_context(&self) -> (Arc<Config>, AdapterCall<'_>) {
        let config = self.config.snapshot();
        (
            config.clone(),
            AdapterCall {
                table: &self.table,
                metrics: self.metrics.clone(),
                agent: &self.agent,
                interrupt: self.interrupt.as_ref(),
                config,
            },
        )
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Bundles a live `Config` snapshot together with a borrowed `AdapterContext`
/// whose `config` field points at it, so call sites don't need to manage the
/// snapshot's lifetime themselves. Built by [`Core::adapter_context`].
pub struct AdapterCall<'a> {
    table: &'a StallTable,
    metrics: Arc<Metrics>,
    agent: &'a AgentRegistry,
    interrupt: &'a dyn InterruptSource,
    config: Arc<Config>,
}

impl<'a> AdapterCall<'a> {
    pub fn context(&self) -> AdapterContext<'_> {
        AdapterContext {
            table: self.table,
            config: &self.config,
            metrics: &*self.metrics,
            agent: self.agent,
            interrupt: self.interrupt,
        }
    }
}
