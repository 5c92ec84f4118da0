//! Task lifecycle hook adapters: clone, exit, task_free. All audit-only —
//! none of them gates anything, they exist so the agent can track process
//! trees. `clone`/`exit` additionally filter out thread-level events: a new
//! thread within an already-known process, or one thread of a multithreaded
//! process exiting, is not a process lifecycle transition the agent needs.

use crate::config::EnabledHooks;
use crate::event::{EventKind, Verdict};
use crate::factory;

use super::{classify, run, AdapterContext, CacheSelector};

pub fn clone_event(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    parent_pid: u32,
    child_pid: u32,
    is_thread: bool,
) -> Verdict {
    if is_thread {
        return Verdict::Allow;
    }
    let base = classify(ctx, tid, pgid, EventKind::Clone as u16, true);
    let event = factory::clone_event(base, parent_pid, child_pid, is_thread);
    run(ctx, EnabledHooks::CLONE, Some(event), CacheSelector::None)
}

pub fn exit(ctx: &AdapterContext, tid: u32, pgid: u32, pid: u32, is_thread: bool) -> Verdict {
    if is_thread {
        return Verdict::Allow;
    }
    let base = classify(ctx, tid, pgid, EventKind::Exit as u16, true);
    let event = factory::exit(base, pid, is_thread);
    run(ctx, EnabledHooks::EXIT, Some(event), CacheSelector::None)
}

pub fn task_free(ctx: &AdapterContext, tid: u32, pgid: u32, pid: u32) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::TaskFree as u16, true);
    let event = factory::task_free(base, pid);
    run(ctx, EnabledHooks::TASK_FREE, Some(event), CacheSelector::None)
}
