//! Filesystem hook adapters: unlink, rmdir, rename, setattr, mkdir, create,
//! link, symlink, open, close.
//!
//! `unlink`/`rmdir`/`rename` share a file-type filter: the caller (which has
//! the inode in hand) decides whether the target is a kind of file this
//! engine cares about at all (regular files, directories, symlinks) before
//! paying for an `Event` allocation — sockets, device nodes, and the like
//! are never interesting here.

use crate::cache::inode_cache::{InodeCache, InodeKey};
use crate::config::EnabledHooks;
use crate::event::{EventKind, InodeId, Verdict};
use crate::factory::{self, SetattrCurrent, SetattrRequest};

use super::{classify, run, AdapterContext, CacheSelector};

fn inode_cache_key(inode: InodeId, tid: u32) -> InodeKey {
    InodeKey { inode, tid }
}

pub fn unlink(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    inode: InodeId,
    path: Vec<u8>,
    file_type_is_interesting: bool,
    cache: &InodeCache,
) -> Verdict {
    if !file_type_is_interesting {
        return Verdict::Allow;
    }
    let mut base = classify(ctx, tid, pgid, EventKind::Unlink as u16, false);
    base.inode = Some(inode);
    let event = factory::unlink(base, path);
    run(
        ctx,
        EnabledHooks::UNLINK,
        Some(event),
        CacheSelector::Inode(cache, inode_cache_key(inode, tid)),
    )
}

pub fn rmdir(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    inode: InodeId,
    path: Vec<u8>,
    file_type_is_interesting: bool,
    cache: &InodeCache,
) -> Verdict {
    if !file_type_is_interesting {
        return Verdict::Allow;
    }
    let mut base = classify(ctx, tid, pgid, EventKind::Rmdir as u16, false);
    base.inode = Some(inode);
    let event = factory::rmdir(base, path);
    run(
        ctx,
        EnabledHooks::RMDIR,
        Some(event),
        CacheSelector::Inode(cache, inode_cache_key(inode, tid)),
    )
}

pub fn rename(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    inode: InodeId,
    old_path: Vec<u8>,
    new_path: Vec<u8>,
    file_type_is_interesting: bool,
    cache: &InodeCache,
) -> Verdict {
    if !file_type_is_interesting {
        return Verdict::Allow;
    }
    let mut base = classify(ctx, tid, pgid, EventKind::Rename as u16, false);
    base.inode = Some(inode);
    let event = factory::rename(base, old_path, new_path);
    run(
        ctx,
        EnabledHooks::RENAME,
        Some(event),
        CacheSelector::Inode(cache, inode_cache_key(inode, tid)),
    )
}

/// `setattr` never consults a cache: the factory's redundancy filter already
/// decides, per call, whether anything would actually change, so a stale
/// cached verdict could hide an attribute change a prior lookup never saw.
pub fn setattr(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    inode: InodeId,
    path: Vec<u8>,
    requested: SetattrRequest,
    current: SetattrCurrent,
) -> Verdict {
    let mut base = classify(ctx, tid, pgid, EventKind::Setattr as u16, false);
    base.inode = Some(inode);
    let event = factory::setattr(base, path, requested, current);
    run(ctx, EnabledHooks::SETATTR, event, CacheSelector::None)
}

pub fn mkdir(ctx: &AdapterContext, tid: u32, pgid: u32, path: Vec<u8>, mode: u32) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Mkdir as u16, false);
    let event = factory::mkdir(base, path, mode);
    run(ctx, EnabledHooks::MKDIR, Some(event), CacheSelector::None)
}

pub fn create(ctx: &AdapterContext, tid: u32, pgid: u32, path: Vec<u8>, mode: u32) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Create as u16, false);
    let event = factory::create(base, path, mode);
    run(ctx, EnabledHooks::CREATE, Some(event), CacheSelector::None)
}

pub fn link(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    old_path: Vec<u8>,
    new_path: Vec<u8>,
) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Link as u16, false);
    let event = factory::link(base, old_path, new_path);
    run(ctx, EnabledHooks::LINK, Some(event), CacheSelector::None)
}

pub fn symlink(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    target: Vec<u8>,
    link_path: Vec<u8>,
) -> Verdict {
    let base = classify(ctx, tid, pgid, EventKind::Symlink as u16, false);
    let event = factory::symlink(base, target, link_path);
    run(ctx, EnabledHooks::SYMLINK, Some(event), CacheSelector::None)
}

/// `open` drops a no-notify open unless it is also writable: a read-only
/// open under a policy that only cares about writable opens carries nothing
/// an agent needs to see, but a writable open is always interesting
/// regardless of the no-notify flag.
pub fn open(
    ctx: &AdapterContext,
    tid: u32,
    pgid: u32,
    inode: InodeId,
    path: Vec<u8>,
    writable: bool,
    no_notify: bool,
    cache: &InodeCache,
) -> Verdict {
    if no_notify && !writable {
        return Verdict::Allow;
    }
    let mut base = classify(ctx, tid, pgid, EventKind::Open as u16, false);
    base.inode = Some(inode);
    let event = factory::open(base, path, writable, no_notify);
    run(
        ctx,
        EnabledHooks::OPEN,
        Some(event),
        CacheSelector::Inode(cache, inode_cache_key(inode, tid)),
    )
}

/// `close` is audit-only: by the time a task closes a descriptor, blocking
/// it on a verdict can no longer prevent anything.
pub fn close(ctx: &AdapterContext, tid: u32, pgid: u32, inode: InodeId, path: Vec<u8>) -> Verdict {
    let mut base = classify(ctx, tid, pgid, EventKind::Close as u16, true);
    base.inode = Some(inode);
    let event = factory::close(base, path);
    run(ctx, EnabledHooks::CLOSE, Some(event), CacheSelector::None)
}
