//! PTRACE hook adapter: only an attach request is ever interesting (a
//! running trace that's already attached produces no further events), and a
//! loop guard refuses to stall when the tracee is itself a member of the
//! agent's process groups — otherwise the agent attaching its own debugger
//! to inspect a stalled task would deadlock on itself.

use crate::config::EnabledHooks;
use crate::event::{EventKind, PtraceMode, Verdict};
use crate::factory;

use super::{classify, run, AdapterContext, CacheSelector};

pub fn ptrace(ctx: &AdapterContext, tid: u32, pgid: u32, mode: PtraceMode, child_pgid: u32) -> Verdict {
    if mode != PtraceMode::Attach {
        return Verdict::Allow;
    }
    let refuses_stall = ctx.agent.contains(child_pgid);
    let base = classify(ctx, tid, pgid, EventKind::Ptrace as u16, refuses_stall);
    let event = factory::ptrace(base, mode, child_pgid);
    run(ctx, EnabledHooks::PTRACE, Some(event), CacheSelector::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRegistry;
    use crate::config::Config;
    use crate::metrics::Metrics;
    use crate::stall::{NeverInterrupted, StallTable};

    #[test]
    fn non_attach_request_is_not_interesting() {
        let table = StallTable::new(1, 4, 1 << 20);
        let config = Config::default();
        let metrics = Metrics::default();
        let agent = AgentRegistry::new();
        let interrupt = NeverInterrupted;
        let ctx = AdapterContext {
            table: &table,
            config: &config,
            metrics: &metrics,
            agent: &agent,
            interrupt: &interrupt,
        };
        let verdict = ptrace(&ctx, 1, 1, PtraceMode::Other, 2);
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(table.live_entry_count(), 0);
    }

    #[test]
    fn attach_onto_the_agent_never_blocks() {
        let table = StallTable::new(1, 4, 1 << 20);
        let config = Config::default();
        let metrics = Metrics::default();
        let agent = AgentRegistry::new();
        agent.register(2);
        let interrupt = NeverInterrupted;
        let ctx = AdapterContext {
            table: &table,
            config: &config,
            metrics: &metrics,
            agent: &agent,
            interrupt: &interrupt,
        };
        // Non-stalling (audit-only) but still reported: must return promptly.
        let verdict = ptrace(&ctx, 1, 1, PtraceMode::Attach, 2);
        assert_eq!(verdict, Verdict::Allow);
    }
}
