//! Process-global configuration: a small record of modes and timeouts,
//! mutated only under its own lock, read lock-free via an `ArcSwap`
//! snapshot — the same layering `knhk-closed-loop`'s `doctrine`/`promoter`
//! modules use for their own hot-swappable descriptors.

use std::sync::Arc;

use arc_swap::ArcSwap;
use bitflags::bitflags;
use parking_lot::Mutex;

/// Lower bound on `stall_timeout_ms`. Below this the agent would never have
/// a realistic chance to answer.
pub const MIN_WAIT_MS: u32 = 1;
/// Upper bound on `stall_timeout_ms`.
pub const MAX_WAIT_MS: u32 = 60_000;
/// Upper bound on `continue_timeout_ms` (and on any per-round continuation
/// timeout supplied in a response).
pub const MAX_EXTENDED_MS: u32 = 300_000;
/// Hard cap on the number of CONTINUE rounds a single stall may use.
pub const MAX_CONTINUATIONS: u32 = 256;

bitflags! {
    /// Hooks the engine will produce events for. Bit position per
    /// `EventKind` discriminant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnabledHooks: u32 {
        const EXEC      = 1 << 0;
        const UNLINK    = 1 << 1;
        const RMDIR     = 1 << 2;
        const RENAME    = 1 << 3;
        const SETATTR   = 1 << 4;
        const MKDIR     = 1 << 5;
        const CREATE    = 1 << 6;
        const LINK      = 1 << 7;
        const SYMLINK   = 1 << 8;
        const OPEN      = 1 << 9;
        const CLOSE     = 1 << 10;
        const MMAP      = 1 << 11;
        const PTRACE    = 1 << 12;
        const SIGNAL    = 1 << 13;
        const CLONE     = 1 << 14;
        const EXIT      = 1 << 15;
        const TASK_FREE = 1 << 16;

        const ALL = u32::MAX;
    }
}

/// The mmap sub-policy. Named as process-global mutable booleans in the
/// source this was ported from; folded into `Config` so they participate in
/// the same snapshot/clamp discipline as everything else (see design notes
/// open question on this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapPolicy {
    pub stall_on_exec: bool,
    pub stall_on_ldso: bool,
    pub stall_misc: bool,
    pub report_misc: bool,
}

impl Default for MmapPolicy {
    fn default() -> Self {
        Self {
            stall_on_exec: true,
            stall_on_ldso: true,
            stall_misc: false,
            report_misc: true,
        }
    }
}

/// The live configuration record consulted by the stall engine, stall
/// table, and hook adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub stall_mode: bool,
    pub bypass_mode: bool,
    pub ignore_mode: bool,
    pub stall_timeout_ms: u32,
    pub continue_timeout_ms: u32,
    pub deny_on_timeout: bool,
    pub enabled_hooks: EnabledHooks,
    pub mmap_policy: MmapPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stall_mode: true,
            bypass_mode: false,
            ignore_mode: true,
            stall_timeout_ms: 2_000,
            continue_timeout_ms: 2_000,
            deny_on_timeout: false,
            enabled_hooks: EnabledHooks::ALL,
            mmap_policy: MmapPolicy::default(),
        }
    }
}

impl Config {
    /// Clamp every range-bound field into its valid interval. Out-of-range
    /// control requests are accepted with the nearest valid value, never
    /// rejected (see the control-request contract).
    pub fn clamp(mut self) -> Self {
        self.stall_timeout_ms = self.stall_timeout_ms.clamp(MIN_WAIT_MS, MAX_WAIT_MS);
        self.continue_timeout_ms = self
            .continue_timeout_ms
            .clamp(self.stall_timeout_ms, MAX_EXTENDED_MS);
        self
    }

    /// The response a stall resolves to when it times out, is interrupted,
    /// or is aborted because stalling was globally disabled mid-wait.
    pub fn default_response(&self) -> crate::event::Response {
        if self.deny_on_timeout {
            crate::event::Response::Deny
        } else {
            crate::event::Response::Allow
        }
    }

    pub fn hook_enabled(&self, bit: EnabledHooks) -> bool {
        self.enabled_hooks.contains(bit)
    }
}

/// A single field of a control request, matching the `configure(flags,
/// values)` contract in the external-interfaces section.
#[derive(Debug, Clone, Copy)]
pub enum ConfigUpdate {
    StallMode(bool),
    BypassMode(bool),
    IgnoreMode(bool),
    DefaultTimeoutMs(u32),
    ContinueTimeoutMs(u32),
    DefaultDeny(bool),
    EnabledHooks(EnabledHooks),
    MmapPolicy(MmapPolicy),
}

/// Readers load `Config` through this without ever blocking on a writer;
/// writers serialize through `write_lock` before publishing a new snapshot,
/// matching "mutated only under its own lock; readers may snapshot without
/// locking".
pub struct ConfigStore {
    current: ArcSwap<Config>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(initial: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial.clamp()),
            write_lock: Mutex::new(()),
        }
    }

    /// Lock-free snapshot of the current configuration.
    pub fn snapshot(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Apply a batch of updates atomically, clamping as needed. Returns the
    /// previous snapshot so the caller can decide whether `stall_mode`
    /// transitioned (the trigger for a cache flush, per the delivery
    /// surface's `configure` contract).
    pub fn update(&self, updates: &[ConfigUpdate]) -> (Arc<Config>, Arc<Config>) {
        let _guard = self.write_lock.lock();
        let before = self.current.load_full();
        let mut next = (*before).clone();
        for update in updates {
            match *update {
                ConfigUpdate::StallMode(v) => next.stall_mode = v,
                ConfigUpdate::BypassMode(v) => next.bypass_mode = v,
                ConfigUpdate::IgnoreMode(v) => next.ignore_mode = v,
                ConfigUpdate::DefaultTimeoutMs(v) => next.stall_timeout_ms = v,
                ConfigUpdate::ContinueTimeoutMs(v) => next.continue_timeout_ms = v,
                ConfigUpdate::DefaultDeny(v) => next.deny_on_timeout = v,
                ConfigUpdate::EnabledHooks(v) => next.enabled_hooks = v,
                ConfigUpdate::MmapPolicy(v) => next.mmap_policy = v,
            }
        }
        let next = next.clamp();
        let after = Arc::new(next);
        self.current.store(after.clone());
        (before, after)
    }
}

/// A capability the embedding adapter must hold to call `configure()`. The
/// core does not authenticate callers (a credential concern, out of scope)
/// but it does make it a type error to mutate configuration without proving
/// you obtained one, e.g. from a privileged control-file open.
pub struct ConfigHandle<'a> {
    store: &'a ConfigStore,
}

impl<'a> ConfigHandle<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    pub fn apply(&self, updates: &[ConfigUpdate]) -> (Arc<Config>, Arc<Config>) {
        self.store.update(updates)
    }
}
