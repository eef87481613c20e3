/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! A small in-memory virtual filesystem: one rootfs, backed by [`tmpfs`],
//! reached through a `Dentry`/`VNode` tree and a pair of operation
//! vtables (`VnodeOps`, `FileOps`) rather than the raw function-pointer
//! structs the design this is grounded on uses.
//!
//! Everything lives in two flat arenas (`dentries`, `vnodes`) indexed by
//! [`DentryId`]/[`VnodeId`]; nothing is ever freed, matching the
//! single-boot lifetime the rest of the kernel already assumes for rootfs
//! objects. A real multi-mount VFS would need reference counting or an
//! arena allocator with reuse; this one doesn't outlive a single boot.

pub mod tmpfs;

use {
    crate::{KernelError, Result},
    alloc::{string::String, vec::Vec},
    core::cell::UnsafeCell,
    machine::{console::interface::ConsoleOps, exception::asynchronous::exec_with_irq_masked},
};

/// Index into [`Vfs::dentries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DentryId(usize);

/// Index into [`Vfs::vnodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VnodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DentryType {
    Dir,
    File,
}

/// A name in the tree: its type, its parent/children and the vnode that
/// carries its data and operations.
pub struct Dentry {
    name: String,
    dtype: DentryType,
    parent: Option<DentryId>,
    children: Vec<DentryId>,
    vnode: VnodeId,
    /// Non-`None` only on a mount point; traversal switches to this
    /// dentry's vnode instead of descending into `children`. Only the
    /// root mount exists in this revision, but the switch is implemented
    /// for real.
    mount: Option<DentryId>,
}

/// The operations a filesystem implements to resolve and populate names
/// under a directory vnode.
pub trait VnodeOps: Sync {
    fn lookup(&self, vfs: &Vfs, dir: VnodeId, name: &str) -> Result<VnodeId>;
    fn create(&self, vfs: &mut Vfs, dir: VnodeId, name: &str) -> Result<VnodeId>;
    fn mkdir(&self, vfs: &mut Vfs, dir: VnodeId, name: &str) -> Result<VnodeId>;
}

/// The operations a filesystem implements on an already-open file.
pub trait FileOps: Sync {
    fn open(&self, vfs: &Vfs, vnode: VnodeId) -> Result<File>;
    fn read(&self, vfs: &mut Vfs, file: &mut File, buf: &mut [u8]) -> Result<usize>;
    fn write(&self, vfs: &mut Vfs, file: &mut File, buf: &[u8]) -> Result<usize>;
    fn close(&self, _file: &File) -> Result<()> {
        Ok(())
    }
}

/// A filesystem node: its dentry back-reference, the vtables that
/// dispatch its operations, and whatever per-file data its filesystem
/// attaches (a block chain, for tmpfs; `None` for directories).
pub struct VNode {
    dentry: DentryId,
    v_ops: &'static dyn VnodeOps,
    f_ops: &'static dyn FileOps,
    data: Option<tmpfs::Inode>,
}

/// An open file handle: which vnode it refers to and the read/write
/// cursor into it.
pub struct File {
    pub(crate) vnode: VnodeId,
    pub(crate) pos: usize,
}

struct Vfs {
    dentries: Vec<Dentry>,
    vnodes: Vec<VNode>,
    root: DentryId,
}

impl Vfs {
    fn dentry(&self, id: DentryId) -> &Dentry {
        &self.dentries[id.0]
    }

    fn dentry_mut(&mut self, id: DentryId) -> &mut Dentry {
        &mut self.dentries[id.0]
    }

    fn vnode(&self, id: VnodeId) -> &VNode {
        &self.vnodes[id.0]
    }

    fn vnode_mut(&mut self, id: VnodeId) -> &mut VNode {
        &mut self.vnodes[id.0]
    }

    /// Allocates a dentry/vnode pair and links the dentry into its
    /// parent's child list, if it has one.
    fn new_node(
        &mut self,
        name: &str,
        dtype: DentryType,
        parent: Option<DentryId>,
        v_ops: &'static dyn VnodeOps,
        f_ops: &'static dyn FileOps,
    ) -> DentryId {
        let vnode_id = VnodeId(self.vnodes.len());
        let dentry_id = DentryId(self.dentries.len());

        self.vnodes.push(VNode {
            dentry: dentry_id,
            v_ops,
            f_ops,
            data: None,
        });
        self.dentries.push(Dentry {
            name: String::from(name),
            dtype,
            parent,
            children: Vec::new(),
            vnode: vnode_id,
            mount: None,
        });

        if let Some(parent) = parent {
            self.dentry_mut(parent).children.push(dentry_id);
        }

        dentry_id
    }

    /// Follows a dentry's mount point, if it has one; otherwise returns
    /// the dentry unchanged.
    fn mount_target(&self, dentry: DentryId) -> DentryId {
        match self.dentry(dentry).mount {
            Some(root) => root,
            None => dentry,
        }
    }
}

struct VfsCell(UnsafeCell<Vfs>);

// Single core; all access goes through `with_vfs`, which masks IRQs.
unsafe impl Sync for VfsCell {}

static VFS: VfsCell = VfsCell(UnsafeCell::new(Vfs {
    dentries: Vec::new(),
    vnodes: Vec::new(),
    root: DentryId(0),
}));

fn with_vfs<R>(f: impl FnOnce(&mut Vfs) -> R) -> R {
    exec_with_irq_masked(|| f(unsafe { &mut *VFS.0.get() }))
}

/// Mounts the root TmpFS. Must run once, before any other `vfs` call.
pub fn init() {
    with_vfs(|vfs| {
        vfs.root = vfs.new_node("/", DentryType::Dir, None, &tmpfs::TMPFS, &tmpfs::TMPFS);
    });
    machine::info!("vfs: mounted / (tmpfs)");
}

/// Splits off everything up to the next `/` (or the end of the string).
fn next_component(rest: &str) -> (&str, &str) {
    match rest.find('/') {
        Some(i) => (&rest[..i], rest[i + 1..].trim_start_matches('/')),
        None => (rest, ""),
    }
}

/// Walks `path` one component at a time, starting at the root (absolute
/// paths) or the root cursor (relative paths; this kernel never changes
/// it, so the two coincide in practice).
///
/// Mirrors the lookup this is grounded on: a failed lookup is remembered,
/// and if another component follows it, the whole resolution fails — a
/// missing intermediate directory can never be created implicitly, only
/// the final component may be absent (for `O_CREAT`/`mkdir`).
///
/// Returns the parent directory's vnode and, if found, the final
/// component's own vnode, plus its name for the caller to use with
/// `create`/`mkdir`.
fn resolve(vfs: &Vfs, path: &str) -> Result<(VnodeId, Option<VnodeId>, String)> {
    let path = path.trim_start_matches('/');

    let mut dir = vfs.mount_target(vfs.root);
    let mut rest = path;
    let mut name = String::new();
    let mut found: Option<VnodeId> = None;
    let mut lookup_failed = false;

    loop {
        let (component, tail) = next_component(rest);
        if component.is_empty() {
            break;
        }
        if lookup_failed {
            return Err(KernelError::NotFound);
        }

        let dir_vnode = vfs.dentry(dir).vnode;
        let v_ops = vfs.vnode(dir_vnode).v_ops;
        match v_ops.lookup(vfs, dir_vnode, component) {
            Ok(next_vnode) => {
                let next_dentry = vfs.vnode(next_vnode).dentry;
                dir = vfs.mount_target(next_dentry);
                found = Some(vfs.dentry(dir).vnode);
            }
            Err(_) => {
                found = None;
                lookup_failed = true;
            }
        }

        name = String::from(component);
        rest = tail;
    }

    let parent_vnode = vfs.dentry(dir).vnode;
    Ok((parent_vnode, found, name))
}

/// Opens `path`. Creates a new regular file if nothing is found and
/// `create` is set; fails the same way the lookup it's built on does
/// otherwise.
pub fn open(path: &str, create: bool) -> Result<File> {
    with_vfs(|vfs| {
        let (parent, found, name) = resolve(vfs, path)?;
        let vnode = match found {
            Some(vnode) => {
                if vfs.dentry(vfs.vnode(vnode).dentry).dtype == DentryType::Dir {
                    return Err(KernelError::IsDirectory);
                }
                vnode
            }
            None if create => {
                let v_ops = vfs.vnode(parent).v_ops;
                v_ops.create(vfs, parent, &name)?
            }
            None => return Err(KernelError::NotFound),
        };
        let f_ops = vfs.vnode(vnode).f_ops;
        f_ops.open(vfs, vnode)
    })
}

/// Releases a file handle. The underlying vnode persists.
pub fn close(file: File) -> Result<()> {
    with_vfs(|vfs| {
        let f_ops = vfs.vnode(file.vnode).f_ops;
        f_ops.close(&file)
    })
}

/// Reads up to `buf.len()` bytes, advancing `file`'s cursor.
pub fn read(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    with_vfs(|vfs| {
        let f_ops = vfs.vnode(file.vnode).f_ops;
        f_ops.read(vfs, file, buf)
    })
}

/// Writes `buf`, advancing `file`'s cursor.
pub fn write(file: &mut File, buf: &[u8]) -> Result<usize> {
    with_vfs(|vfs| {
        let f_ops = vfs.vnode(file.vnode).f_ops;
        f_ops.write(vfs, file, buf)
    })
}

/// Creates an empty directory at `path`. Fails if `path` already exists.
pub fn mkdir(path: &str) -> Result<()> {
    with_vfs(|vfs| mkdir_in(vfs, path))
}

fn mkdir_in(vfs: &mut Vfs, path: &str) -> Result<()> {
    let (parent, found, name) = resolve(vfs, path)?;
    if found.is_some() {
        return Err(KernelError::AlreadyExists);
    }
    let v_ops = vfs.vnode(parent).v_ops;
    v_ops.mkdir(vfs, parent, &name)?;
    Ok(())
}

/// Lists the immediate children of the directory at `path`, tagged
/// `[DIR]`/`[FILE]`, to the console.
pub fn ls(path: &str) -> Result<()> {
    with_vfs(|vfs| {
        let dir_dentry = if path.trim_start_matches('/').is_empty() {
            vfs.mount_target(vfs.root)
        } else {
            let (_, found, _) = resolve(vfs, path)?;
            let vnode = found.ok_or(KernelError::NotFound)?;
            vfs.vnode(vnode).dentry
        };

        let console = machine::console::console();
        for &child in &vfs.dentry(dir_dentry).children {
            let d = vfs.dentry(child);
            console.write_string(&d.name);
            match d.dtype {
                DentryType::Dir => console.write_string(" [DIR]\n"),
                DentryType::File => console.write_string(" [FILE]\n"),
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Vfs {
        let mut vfs = Vfs {
            dentries: Vec::new(),
            vnodes: Vec::new(),
            root: DentryId(0),
        };
        vfs.root = vfs.new_node("/", DentryType::Dir, None, &tmpfs::TMPFS, &tmpfs::TMPFS);
        vfs
    }

    #[test_case]
    fn mkdir_then_lookup_finds_it() {
        let mut vfs = fresh();
        let (parent, found, name) = resolve(&vfs, "/etc").unwrap();
        assert!(found.is_none());
        let v_ops = vfs.vnode(parent).v_ops;
        v_ops.mkdir(&mut vfs, parent, &name).unwrap();

        let (_, found, _) = resolve(&vfs, "/etc").unwrap();
        assert!(found.is_some());
    }

    #[test_case]
    fn mkdir_existing_name_is_rejected() {
        let mut vfs = fresh();
        mkdir_in(&mut vfs, "/etc").unwrap();

        assert_eq!(mkdir_in(&mut vfs, "/etc"), Err(KernelError::AlreadyExists));
    }

    #[test_case]
    fn dot_and_dotdot_resolve() {
        let mut vfs = fresh();
        let (parent, _, name) = resolve(&vfs, "/etc").unwrap();
        let v_ops = vfs.vnode(parent).v_ops;
        let etc = v_ops.mkdir(&mut vfs, parent, &name).unwrap();

        let dot = tmpfs::TMPFS.lookup(&vfs, etc, ".").unwrap();
        assert_eq!(dot, etc);

        let dotdot = tmpfs::TMPFS.lookup(&vfs, etc, "..").unwrap();
        assert_eq!(dotdot, vfs.dentry(vfs.root).vnode);
    }

    #[test_case]
    fn missing_intermediate_component_fails_even_with_create() {
        let vfs = fresh();
        // "/nope/file" — "nope" doesn't exist, so the whole path fails,
        // matching the "a missing intermediate cannot be created" rule.
        assert!(resolve(&vfs, "/nope/file").is_err());
    }

    #[test_case]
    fn write_then_read_round_trips_within_one_block() {
        let mut vfs = fresh();
        let (parent, _, name) = resolve(&vfs, "hello.txt").unwrap();
        let v_ops = vfs.vnode(parent).v_ops;
        let vnode = v_ops.create(&mut vfs, parent, &name).unwrap();
        let f_ops = vfs.vnode(vnode).f_ops;
        let mut file = f_ops.open(&vfs, vnode).unwrap();

        let n = f_ops.write(&mut vfs, &mut file, b"hello").unwrap();
        assert_eq!(n, 5);

        file.pos = 0;
        let mut buf = [0u8; 5];
        let n = f_ops.read(&mut vfs, &mut file, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }
}
