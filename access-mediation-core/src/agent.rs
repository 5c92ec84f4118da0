//! Process-wide registry of "agent" process groups, consulted on the hot
//! path by every hook adapter to decide STALL vs. SELF-bypass. Read-mostly,
//! rare-write: modeled as a copy-on-write snapshot rather than a locked set,
//! the same shape `knhk-closed-loop`'s snapshot types use for configuration
//! that is read far more often than it changes.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// The set of process-group ids recognized as belonging to the decision
/// agent. Events whose originator is in this set never stall (see the
/// `SELF` report flag) and skip cache consultation, which is what prevents
/// an agent-stalls-on-itself deadlock.
pub struct AgentRegistry {
    pgids: ArcSwap<HashSet<u32>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            pgids: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    /// Administrative call made once (or a handful of times) by the agent
    /// at startup. Not on the hot path.
    pub fn register(&self, pgid: u32) {
        let mut next = (**self.pgids.load()).clone();
        if next.insert(pgid) {
            self.pgids.store(Arc::new(next));
        }
    }

    /// Administrative call for agent shutdown/restart.
    pub fn unregister(&self, pgid: u32) {
        let mut next = (**self.pgids.load()).clone();
        if next.remove(&pgid) {
            self.pgids.store(Arc::new(next));
        }
    }

    /// Hot-path lookup: allocation-free, lock-free.
    #[inline]
    pub fn contains(&self, pgid: u32) -> bool {
        self.pgids.load().contains(&pgid)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_contains() {
        let reg = AgentRegistry::new();
        assert!(!reg.contains(42));
        reg.register(42);
        assert!(reg.contains(42));
    }

    #[test]
    fn unregister_removes() {
        let reg = AgentRegistry::new();
        reg.register(7);
        reg.unregister(7);
        assert!(!reg.contains(7));
    }
}
