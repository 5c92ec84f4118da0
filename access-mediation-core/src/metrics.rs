//! Process-local counters, incremented with `Relaxed` ordering on the hot
//! path (no writer-to-writer ordering requirement, only eventual visibility
//! to a diagnostics reader), following the counter style
//! `knhk-kernel::hot_path::HotPathStats` uses for its own per-execution
//! statistics.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($name:ident),+ $(,)?) => {
        /// Monotonic counters for the core's observability surface.
        #[derive(Default)]
        pub struct Metrics {
            $(pub $name: AtomicU64,)+
        }

        /// Point-in-time read of every counter. Never blocks a writer.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct MetricsSnapshot {
            $(pub $name: u64,)+
        }

        impl Metrics {
            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)+
                }
            }
        }
    };
}

counters!(
    stalls_started,
    stalls_resolved,
    stalls_timed_out,
    stalls_interrupted,
    stalls_disabled_abort,
    continuations_granted,
    continuations_capped,
    cache_hits_task,
    cache_misses_task,
    cache_evictions_task,
    cache_hits_inode,
    cache_misses_inode,
    cache_evictions_inode,
    queue_drops_normal,
    queue_drops_low_priority,
    no_resources_total,
    duplicate_request_id_total,
);

impl Metrics {
    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
