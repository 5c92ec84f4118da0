//! SIGNAL hook adapter: audit-only. By the time a signal is about to be
//! delivered, stalling the sender buys nothing — the interesting fact is
//! that the delivery happened, not a chance to veto it.

use crate::config::EnabledHooks;
use crate::event::{EventKind, Verdict};
use crate::factory;

use super::{classify, run, AdapterContext, CacheSelector};

pub fn signal(ctx: &AdapterContext, tid: u32, pgid: u32, signum: u32, target_pid: u32) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Signal as u16, true);
    let event = factory::signal(base, signum, target_pid);
    run(ctx, EnabledHooks::SIGNAL, Some(event), CacheSelector::None)
}
