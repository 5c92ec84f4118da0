//! The event factory: allocates the correctly-shaped `Event` for a hook.
//! Every filler is infallible in its output *shape*, but a handful (setattr
//! being the spec's own example) may determine the event is not actually
//! interesting and return `None`, instructing the adapter to discard it
//! without ever publishing it to the stall table.

use crate::event::{AttrMask, Event, EventKind, InodeId, MmapProt, MmapTargetClass, Payload, PtraceMode, ReportFlags};

/// Everything the factory needs that isn't kind-specific. Built by the hook
/// adapter, which has already decided `report_flags` (SELF/STALL/AUDIT/
/// IGNORE/LOW_PRIORITY) before handing off to the factory.
#[derive(Debug, Clone)]
pub struct EventBase {
    pub tid: u32,
    pub pgid: u32,
    pub hook_id: u16,
    pub report_flags: ReportFlags,
    pub inode: Option<InodeId>,
}

fn shape(base: EventBase, kind: EventKind, payload: Payload) -> Event {
    Event {
        request_id: 0,
        tid: base.tid,
        pgid: base.pgid,
        kind,
        hook_id: base.hook_id,
        report_flags: base.report_flags,
        inode: base.inode,
        payload,
    }
}

pub fn exec(base: EventBase, path: Vec<u8>) -> Event {
    shape(base, EventKind::Exec, Payload::Exec { path })
}

pub fn unlink(base: EventBase, path: Vec<u8>) -> Event {
    shape(base, EventKind::Unlink, Payload::Unlink { path })
}

pub fn rmdir(base: EventBase, path: Vec<u8>) -> Event {
    shape(base, EventKind::Rmdir, Payload::Rmdir { path })
}

pub fn rename(base: EventBase, old_path: Vec<u8>, new_path: Vec<u8>) -> Event {
    shape(base, EventKind::Rename, Payload::Rename { old_path, new_path })
}

/// The attributes a `setattr` call is requesting, and the attributes the
/// inode currently has. Used to filter out a request that would change
/// nothing (the spec's own worked example: `ATTR_MODE` with `ia_mode`
/// already equal to the current mode, no other bit set).
#[derive(Debug, Clone, Copy)]
pub struct SetattrRequest {
    pub mask: AttrMask,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SetattrCurrent {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

/// Build a setattr event, or `None` if every requested field is already
/// equal to its current value (nothing would actually change).
pub fn setattr(
    base: EventBase,
    path: Vec<u8>,
    requested: SetattrRequest,
    current: SetattrCurrent,
) -> Option<Event> {
    let mut effective = AttrMask::empty();
    if requested.mask.contains(AttrMask::MODE) && requested.mode != current.mode {
        effective |= AttrMask::MODE;
    }
    if requested.mask.contains(AttrMask::UID) && requested.uid != current.uid {
        effective |= AttrMask::UID;
    }
    if requested.mask.contains(AttrMask::GID) && requested.gid != current.gid {
        effective |= AttrMask::GID;
    }
    if requested.mask.contains(AttrMask::SIZE) && requested.size != current.size {
        effective |= AttrMask::SIZE;
    }

    if effective.is_empty() {
        return None;
    }

    Some(shape(
        base,
        EventKind::Setattr,
        Payload::Setattr {
            path,
            mask: effective,
            mode: requested.mode,
            uid: requested.uid,
            gid: requested.gid,
            size: requested.size,
        },
    ))
}

pub fn mkdir(base: EventBase, path: Vec<u8>, mode: u32) -> Event {
    shape(base, EventKind::Mkdir, Payload::Mkdir { path, mode })
}

pub fn create(base: EventBase, path: Vec<u8>, mode: u32) -> Event {
    shape(base, EventKind::Create, Payload::Create { path, mode })
}

pub fn link(base: EventBase, old_path: Vec<u8>, new_path: Vec<u8>) -> Event {
    shape(base, EventKind::Link, Payload::Link { old_path, new_path })
}

pub fn symlink(base: EventBase, target: Vec<u8>, link_path: Vec<u8>) -> Event {
    shape(base, EventKind::Symlink, Payload::Symlink { target, link_path })
}

pub fn open(base: EventBase, path: Vec<u8>, writable: bool, no_notify: bool) -> Event {
    shape(
        base,
        EventKind::Open,
        Payload::Open {
            path,
            writable,
            no_notify,
        },
    )
}

pub fn close(base: EventBase, path: Vec<u8>) -> Event {
    shape(base, EventKind::Close, Payload::Close { path })
}

pub fn mmap(base: EventBase, path: Vec<u8>, prot: MmapProt, target_class: MmapTargetClass) -> Event {
    shape(
        base,
        EventKind::Mmap,
        Payload::Mmap {
            path,
            prot,
            target_class,
        },
    )
}

pub fn ptrace(base: EventBase, mode: PtraceMode, child_pgid: u32) -> Event {
    shape(base, EventKind::Ptrace, Payload::Ptrace { mode, child_pgid })
}

pub fn signal(base: EventBase, signum: u32, target_pid: u32) -> Event {
    shape(base, EventKind::Signal, Payload::Signal { signum, target_pid })
}

pub fn clone_event(base: EventBase, parent_pid: u32, child_pid: u32, is_thread: bool) -> Event {
    shape(
        base,
        EventKind::Clone,
        Payload::Clone {
            parent_pid,
            child_pid,
            is_thread,
        },
    )
}

pub fn exit(base: EventBase, pid: u32, is_thread: bool) -> Event {
    shape(base, EventKind::Exit, Payload::Exit { pid, is_thread })
}

pub fn task_free(base: EventBase, pid: u32) -> Event {
    shape(base, EventKind::TaskFree, Payload::TaskFree { pid })
}
