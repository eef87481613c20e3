/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The only filesystem this kernel mounts: directories and files that
//! exist purely in the kernel heap, gone on reboot.
//!
//! A file's content is a chain of fixed-size [`Block`]s, grown one block
//! at a time as writes reach past the current tail — the same shape as
//! the design this is grounded on, with the block chain held as a plain
//! `Vec` (indexable, reuses the global allocator) rather than an
//! intrusive linked list, and each block's populated length tracked as a
//! plain count instead of a sentinel byte value.

use {
    super::{DentryId, DentryType, File, FileOps, Vfs, VnodeId, VnodeOps},
    crate::{KernelError, Result},
    alloc::{boxed::Box, vec::Vec},
};

/// Bytes of file content held per block before the chain grows another.
pub const BLOCK_SIZE: usize = 512;

struct Block {
    data: Box<[u8; BLOCK_SIZE]>,
    /// How many leading bytes of `data` are real content.
    filled: usize,
}

impl Block {
    fn new() -> Self {
        Self {
            data: Box::new([0u8; BLOCK_SIZE]),
            filled: 0,
        }
    }
}

/// A regular file's content, as held by its vnode.
pub struct Inode {
    blocks: Vec<Block>,
}

impl Inode {
    fn new() -> Self {
        Self { blocks: Vec::new() }
    }
}

/// Zero-sized vtable; all state lives in the `Vfs` arenas, not here.
pub struct TmpFs;

pub static TMPFS: TmpFs = TmpFs;

impl VnodeOps for TmpFs {
    fn lookup(&self, vfs: &Vfs, dir: VnodeId, name: &str) -> Result<VnodeId> {
        let dentry = vfs.vnode(dir).dentry;
        match name {
            "." => Ok(dir),
            // Root's parent resolves to itself.
            ".." => match vfs.dentry(dentry).parent {
                Some(parent) => Ok(vfs.dentry(parent).vnode),
                None => Ok(dir),
            },
            _ => vfs
                .dentry(dentry)
                .children
                .iter()
                .find(|&&child| vfs.dentry(child).name == name)
                .map(|&child| vfs.dentry(child).vnode)
                .ok_or(KernelError::NotFound),
        }
    }

    fn create(&self, vfs: &mut Vfs, dir: VnodeId, name: &str) -> Result<VnodeId> {
        let parent = vfs.vnode(dir).dentry;
        let child = vfs.new_node(name, DentryType::File, Some(parent), &TMPFS, &TMPFS);
        let vnode = vfs.dentry(child).vnode;
        vfs.vnode_mut(vnode).data = Some(Inode::new());
        Ok(vnode)
    }

    fn mkdir(&self, vfs: &mut Vfs, dir: VnodeId, name: &str) -> Result<VnodeId> {
        let parent = vfs.vnode(dir).dentry;
        let child = vfs.new_node(name, DentryType::Dir, Some(parent), &TMPFS, &TMPFS);
        Ok(vfs.dentry(child).vnode)
    }
}

impl FileOps for TmpFs {
    fn open(&self, _vfs: &Vfs, vnode: VnodeId) -> Result<File> {
        Ok(File { vnode, pos: 0 })
    }

    fn read(&self, vfs: &mut Vfs, file: &mut File, buf: &mut [u8]) -> Result<usize> {
        let inode = vfs
            .vnode_mut(file.vnode)
            .data
            .as_mut()
            .ok_or(KernelError::InvalidArgument)?;

        let mut done = 0;
        while done < buf.len() {
            let block_idx = file.pos / BLOCK_SIZE;
            let offset = file.pos % BLOCK_SIZE;
            let Some(block) = inode.blocks.get(block_idx) else {
                break;
            };
            if offset >= block.filled {
                break;
            }
            let n = (block.filled - offset).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&block.data[offset..offset + n]);
            done += n;
            file.pos += n;
        }

        if done == 0 && !buf.is_empty() {
            return Err(KernelError::EndOfFile);
        }
        Ok(done)
    }

    fn write(&self, vfs: &mut Vfs, file: &mut File, buf: &[u8]) -> Result<usize> {
        let inode = vfs
            .vnode_mut(file.vnode)
            .data
            .as_mut()
            .ok_or(KernelError::InvalidArgument)?;

        let mut done = 0;
        while done < buf.len() {
            let block_idx = file.pos / BLOCK_SIZE;
            let offset = file.pos % BLOCK_SIZE;
            while inode.blocks.len() <= block_idx {
                inode.blocks.push(Block::new());
            }
            let block = &mut inode.blocks[block_idx];
            let n = (BLOCK_SIZE - offset).min(buf.len() - done);
            block.data[offset..offset + n].copy_from_slice(&buf[done..done + n]);
            block.filled = block.filled.max(offset + n);
            done += n;
            file.pos += n;
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn write_spanning_two_blocks_then_read_back() {
        let mut vfs = Vfs {
            dentries: Vec::new(),
            vnodes: Vec::new(),
            root: DentryId(0),
        };
        let root = vfs.new_node("/", DentryType::Dir, None, &TMPFS, &TMPFS);
        vfs.root = root;

        let root_vnode = vfs.dentry(root).vnode;
        let vnode = TMPFS.create(&mut vfs, root_vnode, "big").unwrap();
        let mut file = TMPFS.open(&vfs, vnode).unwrap();

        let payload: Vec<u8> = (0..(BLOCK_SIZE + 100) as u32).map(|i| i as u8).collect();
        let n = TMPFS.write(&mut vfs, &mut file, &payload).unwrap();
        assert_eq!(n, payload.len());

        file.pos = 0;
        let mut out = alloc::vec![0u8; payload.len()];
        let n = TMPFS.read(&mut vfs, &mut file, &mut out).unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(out, payload);
    }

    #[test_case]
    fn read_past_end_of_fresh_file_is_end_of_file() {
        let mut vfs = Vfs {
            dentries: Vec::new(),
            vnodes: Vec::new(),
            root: DentryId(0),
        };
        let root = vfs.new_node("/", DentryType::Dir, None, &TMPFS, &TMPFS);
        vfs.root = root;
        let root_vnode = vfs.dentry(root).vnode;
        let vnode = TMPFS.create(&mut vfs, root_vnode, "empty").unwrap();
        let mut file = TMPFS.open(&vfs, vnode).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(TMPFS.read(&mut vfs, &mut file, &mut buf), Err(KernelError::EndOfFile));
    }
}
