//! Bounded, associative verdict caches (`TaskCache`, `InodeCache`).
//!
//! Both are instances of the same generic, capacity-bounded map with
//! clock-style (second-chance) eviction: a `DashMap` gives the lock-free,
//! per-shard-locked read/write path (the same structure `knhk-consensus`'s
//! `pbft`/`validator` modules use for their own small hot verdict maps), and
//! a `parking_lot::Mutex`-guarded ring of keys drives eviction order without
//! needing a separate LRU list threaded through the map entries.

pub mod inode_cache;
pub mod task_cache;

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::event::Response;
use crate::metrics::Metrics;

/// A single cached verdict: the response itself, when it was recorded, and
/// a "referenced since last eviction sweep" bit used for second-chance
/// eviction.
#[derive(Debug, Clone, Copy)]
struct CacheRecord {
    verdict: Response,
    inserted_at: Instant,
    referenced: bool,
}

/// What a cache lookup reports back to the caller: presence, the verdict if
/// present and not expired, and its age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHit {
    pub verdict: Response,
    pub age: Duration,
}

/// Generic bounded verdict cache with clock eviction, parameterized over the
/// key type so `TaskCache` and `InodeCache` can share one implementation.
pub struct VerdictCache<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    records: DashMap<K, CacheRecord>,
    clock: Mutex<VecDeque<K>>,
    capacity: usize,
    ttl: Duration,
}

impl<K> VerdictCache<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            clock: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            ttl,
        }
    }

    /// Look up a prior verdict. A hit older than the configured TTL is
    /// treated as a miss and evicted eagerly, since an expired verdict must
    /// never silently short-circuit a hook that should have re-consulted
    /// the agent.
    pub fn lookup(&self, key: &K, metrics: &Metrics, hit: &std::sync::atomic::AtomicU64, miss: &std::sync::atomic::AtomicU64) -> Option<CacheHit> {
        if let Some(mut record) = self.records.get_mut(key) {
            let age = record.inserted_at.elapsed();
            if age > self.ttl {
                drop(record);
                self.records.remove(key);
                Metrics::inc(miss);
                return None;
            }
            record.referenced = true;
            Metrics::inc(hit);
            Some(CacheHit {
                verdict: record.verdict,
                age,
            })
        } else {
            Metrics::inc(miss);
            None
        }
    }

    /// Record a verdict observed from user space. Evicts via clock
    /// second-chance if the cache is at capacity.
    pub fn insert(&self, key: K, verdict: Response, evictions: &std::sync::atomic::AtomicU64) {
        if !self.records.contains_key(&key) {
            self.evict_if_needed(evictions);
            self.clock.lock().push_back(key.clone());
        }
        self.records.insert(
            key,
            CacheRecord {
                verdict,
                inserted_at: Instant::now(),
                referenced: false,
            },
        );
    }

    fn evict_if_needed(&self, evictions: &std::sync::atomic::AtomicU64) {
        if self.records.len() < self.capacity {
            return;
        }
        let mut clock = self.clock.lock();
        // Second-chance sweep: give a referenced entry one more lap before
        // evicting it, bounded by the ring's own length so a fully "hot"
        // cache cannot spin forever.
        for _ in 0..clock.len() {
            let Some(candidate) = clock.pop_front() else {
                break;
            };
            let Some(mut record) = self.records.get_mut(&candidate) else {
                // Already gone (e.g. TTL-expired by a lookup); ring entry
                // was stale, drop it and keep sweeping.
                continue;
            };
            if record.referenced {
                record.referenced = false;
                drop(record);
                clock.push_back(candidate);
                continue;
            }
            drop(record);
            self.records.remove(&candidate);
            Metrics::inc(evictions);
            return;
        }
    }

    /// Full flush, used when stall mode transitions to avoid acting on
    /// stale verdicts recorded under a different policy.
    pub fn flush(&self) {
        self.records.clear();
        self.clock.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
