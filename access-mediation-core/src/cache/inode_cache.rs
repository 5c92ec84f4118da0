//! Inode-keyed verdict cache: "has this task already gotten a verdict for an
//! operation on this same file?"

use std::sync::Arc;
use std::time::Duration;

use super::{CacheHit, VerdictCache};
use crate::event::{InodeId, Response};
use crate::metrics::Metrics;

/// Composite key: inode identity plus the task acting on it, since a
/// verdict for one task touching a file says nothing about another task
/// touching the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeKey {
    pub inode: InodeId,
    pub tid: u32,
}

pub struct InodeCache {
    inner: VerdictCache<InodeKey>,
    metrics: Arc<Metrics>,
}

impl InodeCache {
    pub fn new(capacity: usize, ttl: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            inner: VerdictCache::new(capacity, ttl),
            metrics,
        }
    }

    pub fn lookup(&self, key: InodeKey) -> Option<CacheHit> {
        self.inner.lookup(
            &key,
            &self.metrics,
            &self.metrics.cache_hits_inode,
            &self.metrics.cache_misses_inode,
        )
    }

    pub fn insert(&self, key: InodeKey, verdict: Response) {
        self.inner
            .insert(key, verdict, &self.metrics.cache_evictions_inode);
    }

    pub fn flush(&self) {
        self.inner.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_tasks_on_same_inode_are_distinct_keys() {
        let cache = InodeCache::new(8, Duration::from_secs(30), Arc::new(Metrics::default()));
        let inode = InodeId { dev: 1, ino: 99 };
        cache.insert(InodeKey { inode, tid: 1 }, Response::Allow);
        assert!(cache.lookup(InodeKey { inode, tid: 1 }).is_some());
        assert!(cache.lookup(InodeKey { inode, tid: 2 }).is_none());
    }
}
