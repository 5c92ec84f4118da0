//! Hook adapters: the thin per-operation entry points from the OS into the
//! engine. Every kind-specific module in this directory implements only
//! step 2 of the shared skeleton below (the kind-specific filter that drops
//! uninteresting events before allocation); everything else is common and
//! lives in [`run`].

pub mod exec;
pub mod file;
pub mod lifecycle;
pub mod mmap;
pub mod ptrace;
pub mod signal;

use crate::agent::AgentRegistry;
use crate::cache::inode_cache::{InodeCache, InodeKey};
use crate::cache::task_cache::TaskCache;
use crate::config::{Config, EnabledHooks};
use crate::event::{Event, Response, ReportFlags, Verdict};
use crate::factory::EventBase;
use crate::metrics::Metrics;
use crate::stall::{stall, InterruptSource, StallResult, StallTable};

/// Everything the shared skeleton needs, threaded through from the facade
/// in `lib.rs` so individual hook functions stay free functions rather than
/// methods on a God object.
pub struct AdapterContext<'a> {
    pub table: &'a StallTable,
    pub config: &'a Config,
    pub metrics: &'a Metrics,
    pub agent: &'a AgentRegistry,
    pub interrupt: &'a dyn InterruptSource,
}

/// Which cache, if any, a hook is permitted to consult. `SETATTR`-shaped
/// events and a few others never consult a cache because their payload must
/// always be reported for audit even when a prior verdict exists.
pub enum CacheSelector<'a> {
    Task(&'a TaskCache, u32),
    Inode(&'a InodeCache, InodeKey),
    None,
}

/// Build the `EventBase` a kind-specific module passes to the factory,
/// applying the SELF/STALL determination from step 3 of the skeleton:
/// "always AUDIT; add STALL unless the originator is the agent itself; some
/// hooks additionally refuse to stall regardless".
pub fn classify(ctx: &AdapterContext, tid: u32, pgid: u32, hook_id: u16, hook_refuses_stall: bool) -> EventBase {
    let mut flags = ReportFlags::AUDIT;
    if ctx.agent.contains(pgid) {
        flags |= ReportFlags::SELF;
    } else if !hook_refuses_stall {
        flags |= ReportFlags::STALL;
    }
    EventBase {
        tid,
        pgid,
        hook_id,
        report_flags: flags,
        inode: None,
    }
}

/// Steps 4-6 of the shared skeleton: cache consult, dispatch to the stall
/// engine or the non-stall queue, and cache population from an observed
/// verdict. `event` is `None` when the factory determined "not applicable"
/// or a kind-specific filter already dropped the event — either way the
/// hook returns ALLOW without ever reaching the stall table.
pub fn run(ctx: &AdapterContext, hook_bit: EnabledHooks, event: Option<Event>, cache: CacheSelector<'_>) -> Verdict {
    if !ctx.config.hook_enabled(hook_bit) {
        return Verdict::Allow;
    }
    let Some(event) = event else {
        return Verdict::Allow;
    };

    if event.is_ignorable() && ctx.config.ignore_mode {
        return Verdict::Allow;
    }

    let consult_cache = !event.report_flags.contains(ReportFlags::SELF);
    if consult_cache {
        match &cache {
            CacheSelector::Task(c, key) => {
                if let Some(hit) = c.lookup(*key) {
                    return hit.verdict.into();
                }
            }
            CacheSelector::Inode(c, key) => {
                if let Some(hit) = c.lookup(*key) {
                    return hit.verdict.into();
                }
            }
            CacheSelector::None => {}
        }
    }

    if event.is_stall() {
        let entry = match ctx.table.insert(event, ctx.config.default_response(), ctx.metrics) {
            Ok(entry) => entry,
            Err(_) => return Verdict::Allow,
        };
        let request_id = entry.request_id;
        let tid = entry.tid;
        let verdict = match stall(ctx.table, ctx.config, ctx.metrics, request_id, tid, ctx.interrupt) {
            StallResult::Verdict(v) => v,
            StallResult::Aborted => Verdict::Allow,
        };
        if consult_cache {
            let response = match verdict {
                Verdict::Allow => Response::Allow,
                Verdict::Deny => Response::Deny,
            };
            match cache {
                CacheSelector::Task(c, key) => c.insert(key, response),
                CacheSelector::Inode(c, key) => c.insert(key, response),
                CacheSelector::None => {}
            }
        }
        verdict
    } else {
        let _ = ctx.table.enqueue_nonstall(event, ctx.metrics);
        Verdict::Allow
    }
}
