/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Buddy allocator over a contiguous pool of `PAGE_SIZE` frames.
//!
//! Frames are tracked by index, not by address; `frame_to_addr`/
//! `addr_to_frame` convert at the edges. Free runs are kept on a
//! freelist per order, LIFO, so repeated small allocations reuse
//! cache-hot frames. A run always splits towards its lower-addressed
//! half, and merges only with its precise XOR buddy.

use alloc::vec::Vec;

pub const PAGE_SIZE: usize = 4096;

pub struct BuddyAllocator {
    pool_base: usize,
    num_frames: usize,
    max_order: usize,
    /// `free_lists[k]` holds the frame indices currently free at order `k`.
    free_lists: Vec<Vec<usize>>,
    /// The order of the run a frame currently heads, whether allocated or
    /// free. `None` for frames that aren't (or are no longer) a head.
    order_of: Vec<Option<u8>>,
    /// Whether the head at this frame index is on a freelist right now.
    is_free: Vec<bool>,
}

impl BuddyAllocator {
    /// Builds an allocator over `[pool_base, pool_base + num_frames *
    /// PAGE_SIZE)`. `pool_base` must be page-aligned.
    pub fn new(pool_base: usize, num_frames: usize) -> Self {
        assert_eq!(pool_base % PAGE_SIZE, 0, "pool base must be page-aligned");

        let max_order = Self::highest_order_not_exceeding(num_frames);

        let mut free_lists = Vec::with_capacity(max_order + 1);
        for _ in 0..=max_order {
            free_lists.push(Vec::new());
        }

        let mut allocator = Self {
            pool_base,
            num_frames,
            max_order,
            free_lists,
            order_of: alloc::vec![None; num_frames],
            is_free: alloc::vec![false; num_frames],
        };

        allocator.seed_initial_free_runs();
        allocator
    }

    fn highest_order_not_exceeding(frames: usize) -> usize {
        let mut order = 0;
        while frames >> (order + 1) > 0 {
            order += 1;
        }
        order
    }

    /// Covers the whole pool with maximal, power-of-two-aligned free runs.
    fn seed_initial_free_runs(&mut self) {
        let mut idx = 0;
        while idx < self.num_frames {
            let mut order = 0;
            while order < self.max_order {
                let run = 1usize << (order + 1);
                if idx % run != 0 || idx + run > self.num_frames {
                    break;
                }
                order += 1;
            }
            self.push_free(idx, order);
            idx += 1 << order;
        }
    }

    fn push_free(&mut self, idx: usize, order: usize) {
        self.order_of[idx] = Some(order as u8);
        self.is_free[idx] = true;
        self.free_lists[order].push(idx);
    }

    fn remove_free(&mut self, idx: usize, order: usize) {
        let list = &mut self.free_lists[order];
        let pos = list.iter().position(|&x| x == idx).expect("buddy freelist corrupt");
        list.remove(pos);
        self.is_free[idx] = false;
    }

    pub fn frame_to_addr(&self, frame: usize) -> usize {
        self.pool_base + frame * PAGE_SIZE
    }

    pub fn addr_to_frame(&self, addr: usize) -> usize {
        (addr - self.pool_base) / PAGE_SIZE
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// Allocates a run of `2^order` contiguous frames. Returns the lowest
    /// frame index of the run.
    pub fn alloc_order(&mut self, order: usize) -> Option<usize> {
        if order > self.max_order {
            return None;
        }
        if let Some(idx) = self.free_lists[order].pop() {
            self.is_free[idx] = false;
            return Some(idx);
        }
        let parent = self.alloc_order(order + 1)?;
        let upper = parent + (1 << order);
        self.push_free(upper, order);
        self.order_of[parent] = Some(order as u8);
        self.is_free[parent] = false;
        Some(parent)
    }

    /// Allocates enough contiguous frames to cover `bytes`, rounded up to a
    /// power-of-two page count.
    pub fn alloc_bytes(&mut self, bytes: usize) -> Option<(usize, usize)> {
        let pages = ((bytes + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
        let mut order = 0;
        while (1usize << order) < pages {
            order += 1;
        }
        self.alloc_order(order).map(|frame| (frame, order))
    }

    /// Frees a run of `2^order` frames starting at `frame`, merging with
    /// its buddy as far up the order ladder as possible.
    pub fn free(&mut self, frame: usize, order: usize) {
        let mut idx = frame;
        let mut order = order;

        while order < self.max_order {
            let buddy = idx ^ (1 << order);
            if buddy >= self.num_frames {
                break;
            }
            if self.order_of[buddy] == Some(order as u8) && self.is_free[buddy] {
                self.remove_free(buddy, order);
                idx = idx.min(buddy);
                order += 1;
            } else {
                break;
            }
        }

        self.push_free(idx, order);
    }

    /// Total frames currently sitting on a freelist, for tests and
    /// diagnostics.
    pub fn free_frame_count(&self) -> usize {
        self.free_lists
            .iter()
            .enumerate()
            .map(|(order, list)| list.len() * (1 << order))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn alloc_and_free_conserve_frame_count() {
        let mut buddy = BuddyAllocator::new(0, 16);
        assert_eq!(buddy.free_frame_count(), 16);

        let a = buddy.alloc_order(0).unwrap();
        let b = buddy.alloc_order(2).unwrap();
        assert_eq!(buddy.free_frame_count(), 16 - 1 - 4);

        buddy.free(a, 0);
        buddy.free(b, 2);
        assert_eq!(buddy.free_frame_count(), 16);
    }

    #[test_case]
    fn freeing_both_buddies_merges_to_higher_order() {
        let mut buddy = BuddyAllocator::new(0, 4);
        let a = buddy.alloc_order(0).unwrap();
        let b = buddy.alloc_order(0).unwrap();
        assert_eq!(a ^ b, 1);

        buddy.free(a, 0);
        buddy.free(b, 0);

        // Both order-0 buddies are back, so they must have merged into a
        // single order-1 (or higher) free head.
        assert!(buddy.free_lists[0].is_empty());
        assert!(buddy.free_frame_count() == 4);
    }

    #[test_case]
    fn exhausted_pool_returns_none() {
        let mut buddy = BuddyAllocator::new(0, 2);
        assert!(buddy.alloc_order(1).is_some());
        assert!(buddy.alloc_order(0).is_none());
    }
}
