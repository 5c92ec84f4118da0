//! EXEC hook adapter: the paradigm stalling hook, no kind-specific filter.

use crate::cache::task_cache::TaskCache;
use crate::config::EnabledHooks;
use crate::event::{EventKind, Verdict};
use crate::factory;

use super::{classify, run, AdapterContext, CacheSelector};

pub fn exec(ctx: &AdapterContext, tid: u32, pgid: u32, path: Vec<u8>, cache: &TaskCache) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Exec as u16, false);
    let event = factory::exec(base, path);
    run(ctx, EnabledHooks::EXEC, Some(event), CacheSelector::Task(cache, tid))
}
