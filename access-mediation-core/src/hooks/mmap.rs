//! MMAP hook adapter: only executable mappings are ever interesting, and the
//! mmap sub-policy further splits the stall decision by target class (main
//! executable, dynamic loader, or everything else).

use crate::config::EnabledHooks;
use crate::event::{EventKind, MmapProt, MmapTargetClass, Verdict};
use crate::factory;

use super::{classify, run, AdapterContext, CacheSelector};

pub fn mmap(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    path: Vec<u8>,
    prot: MmapProt,
    target_class: MmapTargetClass,
) -> Verdict {
    if !prot.contains(MmapProt::EXEC) {
        return Verdict::Allow;
    }

    let policy = &ctx.config.mmap_policy;
    let (stall_allowed, report_allowed) = match target_class {
        MmapTargetClass::Exec => (policy.stall_on_exec, true),
        MmapTargetClass::Ldso => (policy.stall_on_ldso, true),
        MmapTargetClass::Misc => (policy.stall_misc, policy.report_misc),
    };
    if !report_allowed {
        return Verdict::Allow;
    }

    let base = classify(ctx, tid, pgid, EventKind::Mmap as u16, !stall_allowed);
    let event = factory::mmap(base, path, prot, target_class);
    run(ctx, EnabledHooks::MMAP, Some(event), CacheSelector::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRegistry;
    use crate::config::{Config, MmapPolicy};
    use crate::metrics::Metrics;
    use crate::stall::{NeverInterrupted, StallTable};

    #[test]
    fn non_exec_mapping_is_not_interesting() {
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
        let verdict = mmap(
            &ctx,
            1,
            1,
            b"/lib/libc.so".to_vec(),
            MmapProt::READ | MmapProt::WRITE,
            MmapTargetClass::Misc,
        );
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(table.live_entry_count(), 0);
    }

    #[test]
    fn misc_target_with_reporting_disabled_is_dropped() {
        let table = StallTable::new(1, 4, 1 << 20);
        let mut config = Config::default();
        config.mmap_policy = MmapPolicy {
            stall_on_exec: true,
            stall_on_ldso: true,
            stall_misc: false,
            report_misc: false,
        };
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
        let verdict = mmap(
            &ctx,
            1,
            1,
            b"/lib/libplugin.so".to_vec(),
            MmapProt::EXEC,
            MmapTargetClass::Misc,
        );
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(table.live_entry_count(), 0);
    }
}
