/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Per-size-class freelists over buddy-provided pages.
//!
//! A page carved for class `c` holds `PAGE_SIZE / c` cells, handed out one
//! at a time. When the last live cell of a page is freed, the whole page
//! is returned to the buddy allocator immediately rather than kept around
//! for future same-class requests; this revision doesn't speculate about
//! reuse locality.

use {
    super::buddy::{BuddyAllocator, PAGE_SIZE},
    alloc::{collections::BTreeMap, vec::Vec},
};

/// Cells above this size bypass the cache and go straight to the buddy
/// allocator.
pub const MAX_CLASS: usize = 2048;

const CLASSES: [usize; 8] = [16, 32, 64, 128, 256, 512, 1024, 2048];

fn class_for(n: usize) -> Option<usize> {
    CLASSES.iter().position(|&c| n <= c)
}

struct PageInfo {
    class: usize,
    live: usize,
}

pub struct ChunkCache {
    free: [Vec<usize>; CLASSES.len()],
    pages: BTreeMap<usize, PageInfo>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self {
            free: core::array::from_fn(|_| Vec::new()),
            pages: BTreeMap::new(),
        }
    }

    /// Hands out one cell of at least `n` bytes, carving a fresh page from
    /// `buddy` if the class freelist is empty. Returns `None` if `n`
    /// exceeds [`MAX_CLASS`] (the caller should go to buddy directly) or
    /// the buddy allocator is out of frames.
    pub fn alloc(&mut self, buddy: &mut BuddyAllocator, n: usize) -> Option<usize> {
        let class_idx = class_for(n)?;
        let size = CLASSES[class_idx];

        if self.free[class_idx].is_empty() {
            let frame = buddy.alloc_order(0)?;
            let addr = buddy.frame_to_addr(frame);
            let cells = PAGE_SIZE / size;
            for i in 0..cells {
                self.free[class_idx].push(addr + i * size);
            }
            self.pages.insert(frame, PageInfo { class: class_idx, live: 0 });
        }

        let cell = self.free[class_idx].pop()?;
        let frame = buddy.addr_to_frame(cell - (cell % PAGE_SIZE));
        if let Some(info) = self.pages.get_mut(&frame) {
            info.live += 1;
        }
        Some(cell)
    }

    /// Returns a cell to its class. If this was the page's last live cell,
    /// the page goes straight back to `buddy`.
    pub fn free(&mut self, buddy: &mut BuddyAllocator, addr: usize) {
        let page_base = addr - (addr % PAGE_SIZE);
        let frame = buddy.addr_to_frame(page_base);
        let Some(info) = self.pages.get_mut(&frame) else {
            return;
        };
        let class_idx = info.class;
        info.live -= 1;

        if info.live == 0 {
            self.free[class_idx].retain(|&cell| cell - (cell % PAGE_SIZE) != page_base);
            self.pages.remove(&frame);
            buddy.free(frame, 0);
        } else {
            self.free[class_idx].push(addr);
        }
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn alloc_rounds_up_to_smallest_class() {
        let mut buddy = BuddyAllocator::new(0, 4);
        let mut cache = ChunkCache::new();

        let a = cache.alloc(&mut buddy, 10).unwrap();
        let b = cache.alloc(&mut buddy, 10).unwrap();
        assert_ne!(a, b);
        // Both cells should come from the same carved page.
        assert_eq!(a - (a % PAGE_SIZE), b - (b % PAGE_SIZE));
    }

    #[test_case]
    fn freeing_last_live_cell_returns_page_to_buddy() {
        let mut buddy = BuddyAllocator::new(0, 4);
        let before = buddy.free_frame_count();
        let mut cache = ChunkCache::new();

        let a = cache.alloc(&mut buddy, 16).unwrap();
        assert_eq!(buddy.free_frame_count(), before - 1);

        cache.free(&mut buddy, a);
        assert_eq!(buddy.free_frame_count(), before);
    }

    #[test_case]
    fn oversized_request_is_rejected() {
        let mut buddy = BuddyAllocator::new(0, 4);
        let mut cache = ChunkCache::new();
        assert!(cache.alloc(&mut buddy, MAX_CLASS + 1).is_none());
    }
}
