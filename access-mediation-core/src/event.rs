//! Event data model: the immutable descriptor created at hook time and
//! carried through the stall table to either a waiter or the delivery
//! surface.

use bitflags::bitflags;

bitflags! {
    /// Per-event reporting disposition, set by the hook adapter before the
    /// event ever reaches the stall table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReportFlags: u16 {
        /// Always report the event for audit, stalling or not.
        const AUDIT        = 0b0000_0001;
        /// Block the originating task until a verdict or timeout.
        const STALL        = 0b0000_0010;
        /// The originator is the decision agent itself; never stalls.
        const SELF         = 0b0000_0100;
        /// Drop the event outright when ignore mode is on.
        const IGNORE       = 0b0000_1000;
        /// Deliver behind normal-priority traffic; may be starved.
        const LOW_PRIORITY = 0b0001_0000;
    }
}

/// The kind of security-sensitive operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    Exec = 0,
    Unlink,
    Rmdir,
    Rename,
    Setattr,
    Mkdir,
    Create,
    Link,
    Symlink,
    Open,
    Close,
    Mmap,
    Ptrace,
    Signal,
    Clone,
    Exit,
    TaskFree,
}

/// `setattr` field mask, mirroring the subset of attribute bits the filter
/// table in the design cares about.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrMask: u32 {
        const MODE = 0b0001;
        const UID  = 0b0010;
        const GID  = 0b0100;
        const SIZE = 0b1000;
    }
}

/// `mmap` protection/flags, just enough to drive the kind-specific filter.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MmapProt: u32 {
        const READ  = 0b001;
        const WRITE = 0b010;
        const EXEC  = 0b100;
    }
}

/// Whether an mmap target is the main executable, the dynamic loader, or
/// something else (the mmap sub-policy distinguishes these three).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MmapTargetClass {
    Exec,
    Ldso,
    Misc,
}

/// Ptrace request class, reduced to attach vs. everything else per the
/// filter table (only attach is ever interesting to the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PtraceMode {
    Attach,
    Other,
}

/// Kind-specific payload. Paths are owned byte strings (no assumption of
/// UTF-8 validity, matching how paths arrive from the kernel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Exec {
        path: Vec<u8>,
    },
    Unlink {
        path: Vec<u8>,
    },
    Rmdir {
        path: Vec<u8>,
    },
    Rename {
        old_path: Vec<u8>,
        new_path: Vec<u8>,
    },
    Setattr {
        path: Vec<u8>,
        mask: AttrMask,
        mode: u32,
        uid: u32,
        gid: u32,
        size: u64,
    },
    Mkdir {
        path: Vec<u8>,
        mode: u32,
    },
    Create {
        path: Vec<u8>,
        mode: u32,
    },
    Link {
        old_path: Vec<u8>,
        new_path: Vec<u8>,
    },
    Symlink {
        target: Vec<u8>,
        link_path: Vec<u8>,
    },
    Open {
        path: Vec<u8>,
        writable: bool,
        no_notify: bool,
    },
    Close {
        path: Vec<u8>,
    },
    Mmap {
        path: Vec<u8>,
        prot: MmapProt,
        target_class: MmapTargetClass,
    },
    Ptrace {
        mode: PtraceMode,
        child_pgid: u32,
    },
    Signal {
        signum: u32,
        target_pid: u32,
    },
    Clone {
        parent_pid: u32,
        child_pid: u32,
        is_thread: bool,
    },
    Exit {
        pid: u32,
        is_thread: bool,
    },
    TaskFree {
        pid: u32,
    },
}

/// Inode identity, used both for the inode cache key and for the setattr
/// "did anything actually change" filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeId {
    pub dev: u64,
    pub ino: u64,
}

/// An immutable event descriptor. Single owner at any time: it is created by
/// the factory, moves into the stall table, and from there into either a
/// stall entry's delivery slot or a non-stall delivery queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Assigned by `StallTable::insert`/`enqueue_nonstall`, not by the
    /// factory. Zero until assigned.
    pub request_id: u64,
    pub tid: u32,
    pub pgid: u32,
    pub kind: EventKind,
    pub hook_id: u16,
    pub report_flags: ReportFlags,
    pub inode: Option<InodeId>,
    pub payload: Payload,
}

impl Event {
    /// Approximate on-wire size, used only for the stall table's byte-based
    /// high-water mark accounting. The actual wire codec is an external
    /// collaborator (see design notes); this is a sizing estimate, not a
    /// serialization.
    pub fn approx_wire_size(&self) -> u64 {
        const HEADER_BYTES: u64 = 8 + 4 + 2 + 2 + 2 + 2;
        let payload_bytes: u64 = match &self.payload {
            Payload::Exec { path } | Payload::Unlink { path } | Payload::Rmdir { path } => {
                path.len() as u64 + 1
            }
            Payload::Rename { old_path, new_path } | Payload::Link { old_path, new_path } => {
                old_path.len() as u64 + new_path.len() as u64 + 2
            }
            Payload::Setattr { path, .. } => path.len() as u64 + 1 + 20,
            Payload::Mkdir { path, .. } | Payload::Create { path, .. } => path.len() as u64 + 1 + 4,
            Payload::Symlink { target, link_path } => {
                target.len() as u64 + link_path.len() as u64 + 2
            }
            Payload::Open { path, .. } | Payload::Close { path } => path.len() as u64 + 1 + 2,
            Payload::Mmap { path, .. } => path.len() as u64 + 1 + 8,
            Payload::Ptrace { .. } => 8,
            Payload::Signal { .. } => 8,
            Payload::Clone { .. } => 12,
            Payload::Exit { .. } => 8,
            Payload::TaskFree { .. } => 4,
        };
        HEADER_BYTES + payload_bytes
    }

    pub fn is_ignorable(&self) -> bool {
        self.report_flags.contains(ReportFlags::IGNORE)
    }

    pub fn is_stall(&self) -> bool {
        self.report_flags.contains(ReportFlags::STALL)
    }

    pub fn is_low_priority(&self) -> bool {
        self.report_flags.contains(ReportFlags::LOW_PRIORITY)
    }
}

/// The user-space verdict for a stalled event, and the entry's working
/// state while stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Response {
    Allow = 0,
    Deny = 1,
    Continue = 2,
}

/// What the hook adapter returns to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl From<Response> for Verdict {
    fn from(r: Response) -> Self {
        match r {
            Response::Deny => Verdict::Deny,
            Response::Allow | Response::Continue => Verdict::Allow,
        }
    }
}
