/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Kernel memory management: a bootstrap bump arena feeding a buddy
//! allocator, with a chunk cache in front of it for small requests.
//!
//! This module backs `#[global_allocator]`; the rest of the kernel just
//! uses `alloc`'s `Vec`/`Box`/`String` rather than calling into it
//! directly. That also gives the "kmalloc facade" its size-for-free
//! bookkeeping for free: `GlobalAlloc::dealloc` is always handed back the
//! `Layout` it was allocated with.

pub mod buddy;
pub mod bump_allocator;
pub mod chunk;

pub use bump_allocator::BumpAllocator;
pub use buddy::BuddyAllocator;

use {
    buddy::PAGE_SIZE,
    chunk::{ChunkCache, MAX_CLASS},
    core::{
        alloc::{Allocator, GlobalAlloc, Layout},
        cell::UnsafeCell,
    },
    machine::exception::asynchronous::exec_with_irq_masked,
};

/// Bytes reserved for bootstrapping the allocator's own bookkeeping (the
/// buddy freelists and the per-page class table) before the buddy pool
/// itself exists. Generous on purpose: it's carved once, at boot, out of
/// hundreds of megabytes of RAM, and never reclaimed.
const BOOTSTRAP_ARENA_SIZE: usize = 8 * 1024 * 1024;

enum Stage {
    /// Before [`init`]: everything goes through the one-way bump arena,
    /// including the buddy/chunk bookkeeping `init` itself builds.
    Bootstrap(BumpAllocator),
    /// After [`init`]: chunk cache in front of the buddy allocator.
    Online {
        buddy: BuddyAllocator,
        chunks: ChunkCache,
    },
}

struct KernelHeap {
    stage: UnsafeCell<Stage>,
}

// Single core, no preemption inside a masked section: exclusive access to
// `stage` is established by `exec_with_irq_masked`, not by this impl.
unsafe impl Sync for KernelHeap {}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        exec_with_irq_masked(|| match &mut *self.stage.get() {
            Stage::Bootstrap(bump) => match bump.allocate(layout) {
                Ok(p) => p.as_non_null_ptr().as_ptr(),
                Err(_) => core::ptr::null_mut(),
            },
            Stage::Online { buddy, chunks } => {
                let size = layout.size().max(layout.align());
                if size <= MAX_CLASS {
                    chunks.alloc(buddy, size).unwrap_or(0) as *mut u8
                } else {
                    match buddy.alloc_bytes(size) {
                        Some((frame, _order)) => buddy.frame_to_addr(frame) as *mut u8,
                        None => core::ptr::null_mut(),
                    }
                }
            }
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        exec_with_irq_masked(|| match &mut *self.stage.get() {
            // The bump arena never frees.
            Stage::Bootstrap(_) => {}
            Stage::Online { buddy, chunks } => {
                let size = layout.size().max(layout.align());
                if size <= MAX_CLASS {
                    chunks.free(buddy, ptr as usize);
                } else {
                    let frame = buddy.addr_to_frame(ptr as usize);
                    let mut order = 0;
                    while (PAGE_SIZE << order) < size {
                        order += 1;
                    }
                    buddy.free(frame, order);
                }
            }
        })
    }
}

#[global_allocator]
static GLOBAL_HEAP: KernelHeap = KernelHeap {
    stage: UnsafeCell::new(Stage::Bootstrap(BumpAllocator::new(0, 0, "heap (uninitialized)"))),
};

/// Brings the kernel heap online: carves a small bootstrap arena out of
/// the RAM past `.bss`, builds the buddy allocator and chunk cache over
/// the rest using that arena for their own bookkeeping, then switches the
/// global allocator over to them.
///
/// # Safety
///
/// Must be called exactly once, before any other subsystem allocates.
pub unsafe fn init() {
    let (heap_start, heap_end) = machine::platform::memory::kernel_heap_range();
    let heap_start = align_up(heap_start as u64, PAGE_SIZE) as usize;
    let bootstrap_end = heap_start + BOOTSTRAP_ARENA_SIZE;
    assert!(bootstrap_end < heap_end, "not enough RAM left for a kernel heap");

    *GLOBAL_HEAP.stage.get() = Stage::Bootstrap(BumpAllocator::new(
        heap_start,
        bootstrap_end,
        "heap bootstrap",
    ));

    let pool_base = align_up(bootstrap_end as u64, PAGE_SIZE) as usize;
    let num_frames = (heap_end - pool_base) / PAGE_SIZE;
    let buddy = BuddyAllocator::new(pool_base, num_frames);
    let chunks = ChunkCache::new();

    exec_with_irq_masked(|| {
        *GLOBAL_HEAP.stage.get() = Stage::Online { buddy, chunks };
    });

    machine::info!(
        "kmalloc: {} frames online ({} MiB)",
        num_frames,
        num_frames * PAGE_SIZE / (1024 * 1024)
    );
}

/// Align address downwards.
///
/// Returns the greatest x with alignment `align` so that x <= addr.
/// The alignment must be a power of 2.
pub fn align_down(addr: u64, align: usize) -> u64 {
    assert!(align.is_power_of_two(), "`align` must be a power of two");
    addr & !(align as u64 - 1)
}

/// Align address upwards.
///
/// Returns the smallest x with alignment `align` so that x >= addr.
/// The alignment must be a power of 2.
pub fn align_up(addr: u64, align: usize) -> u64 {
    assert!(align.is_power_of_two(), "`align` must be a power of two");
    let align_mask = align as u64 - 1;
    if addr & align_mask == 0 {
        addr // already aligned
    } else {
        (addr | align_mask) + 1
    }
}

/// Calculate the next possible aligned address without sanity checking the
/// input parameters.
#[inline]
fn aligned_addr_unchecked(addr: usize, alignment: usize) -> usize {
    (addr + (alignment - 1)) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    pub fn test_align_up() {
        // align 1
        assert_eq!(align_up(0, 1), 0);
        assert_eq!(align_up(1234, 1), 1234);
        assert_eq!(align_up(0xffff_ffff_ffff_ffff, 1), 0xffff_ffff_ffff_ffff);
        // align 2
        assert_eq!(align_up(0, 2), 0);
        assert_eq!(align_up(1233, 2), 1234);
        assert_eq!(align_up(0xffff_ffff_ffff_fffe, 2), 0xffff_ffff_ffff_fffe);
        // address 0
        assert_eq!(align_up(0, 128), 0);
        assert_eq!(align_up(0, 1), 0);
        assert_eq!(align_up(0, 2), 0);
        assert_eq!(align_up(0, 0x8000_0000_0000_0000), 0);
    }
}
