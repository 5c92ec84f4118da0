//! Task-keyed verdict cache: "has this task already gotten a verdict for an
//! operation we can treat as equivalent?"

use std::sync::Arc;
use std::time::Duration;

use super::{CacheHit, VerdictCache};
use crate::event::Response;
use crate::metrics::Metrics;

/// Task identity used as the cache key. `tid` alone is enough here since the
/// stall table and hook adapters already scope lookups to a single kind of
/// operation per call site.
pub type TaskKey = u32;

pub struct TaskCache {
    inner: VerdictCache<TaskKey>,
    metrics: Arc<Metrics>,
}

impl TaskCache {
    pub fn new(capacity: usize, ttl: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: VerdictCache::new(capacity, ttl),
            metrics,
        }
    }

    pub fn lookup(&self, tid: TaskKey) -> Option<CacheHit> {
        self.inner.lookup(
            &tid,
            &self.metrics,
            &self.metrics.cache_hits_task,
            &self.metrics.cache_misses_task,
        )
    }

    pub fn insert(&self, tid: TaskKey, verdict: Response) {
        self.inner
            .insert(tid, verdict, &self.metrics.cache_evictions_task);
    }

    pub fn flush(&self) {
        self.inner.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_recalls_a_verdict() {
        let cache = TaskCache::new(8, Duration::from_secs(30), Arc::new(Metrics::default()));
        assert!(cache.lookup(42).is_none());
        cache.insert(42, Response::Allow);
        assert_eq!(cache.lookup(42).unwrap().verdict, Response::Allow);
    }
}
