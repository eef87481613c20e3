/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! One-way linear allocator carved out of a reserved region, used before
//! the buddy allocator is brought up. Never frees.

use core::{
    alloc::{AllocError, Allocator, Layout},
    cell::Cell,
    ptr::NonNull,
};

pub struct BumpAllocator {
    next: Cell<usize>,
    pool_end: usize,
    name: &'static str,
}

unsafe impl Allocator for BumpAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let start = super::aligned_addr_unchecked(self.next.get(), layout.align());
        let end = start + layout.size();

        if end > self.pool_end {
            return Err(AllocError);
        }
        self.next.set(end);

        machine::info!(
            "{}: allocated {:#x} bytes at {:#010x}",
            self.name,
            layout.size(),
            start
        );

        Ok(NonNull::slice_from_raw_parts(
            unsafe { NonNull::new_unchecked(start as *mut u8) },
            layout.size(),
        ))
    }

    /// A bump allocator doesn't care about releasing memory.
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}

impl BumpAllocator {
    /// Creates a named bump allocator between `pool_start` and `pool_end`.
    pub const fn new(pool_start: usize, pool_end: usize, name: &'static str) -> Self {
        Self {
            next: Cell::new(pool_start),
            pool_end,
            name,
        }
    }

    /// Bytes remaining before the arena is exhausted.
    pub fn remaining(&self) -> usize {
        self.pool_end.saturating_sub(self.next.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_allocates_within_init_range() {
        let allocator = BumpAllocator::new(256, 512, "Test allocator 1");
        let result1 = allocator.allocate(unsafe { Layout::from_size_align_unchecked(128, 1) });
        assert!(result1.is_ok());
        let result2 = allocator.allocate(unsafe { Layout::from_size_align_unchecked(128, 32) });
        assert!(result2.is_ok());
        let result3 = allocator.allocate(unsafe { Layout::from_size_align_unchecked(1, 1) });
        assert!(result3.is_err());
    }

    #[test_case]
    fn test_bad_allocator() {
        let bad_allocator = BumpAllocator::new(512, 256, "Test allocator 2");
        let result1 = bad_allocator.allocate(unsafe { Layout::from_size_align_unchecked(1, 1) });
        assert!(result1.is_err());
    }
}
