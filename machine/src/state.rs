/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Global, core-wide kernel state.
//!
//! Tracked so that [`crate::synchronization::InitStateLock`] can assert its
//! write-half is only ever used during the single-threaded init phase, before
//! IRQs are unmasked and other cores (if any) are released.

use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Copy, Clone, Eq, PartialEq)]
enum State {
    /// Kernel init code is running. Single core, IRQs masked.
    Init,
    /// Init has finished; the kernel is running its main loop(s).
    SingleCoreMain,
}

/// Core-wide kernel init state.
pub struct StateManager(AtomicU8);

static STATE_MANAGER: StateManager = StateManager::new();

/// Returns a reference to the global state manager.
pub fn state_manager() -> &'static StateManager {
    &STATE_MANAGER
}

impl StateManager {
    const fn new() -> Self {
        Self(AtomicU8::new(State::Init as u8))
    }

    /// True while the kernel is still in its single-threaded init phase.
    pub fn is_init(&self) -> bool {
        self.0.load(Ordering::Relaxed) == State::Init as u8
    }

    /// Leaves the init phase. Idempotent.
    ///
    /// # Safety
    ///
    /// Must only be called once, after all `InitStateLock`-protected data has
    /// been written for the last time.
    pub unsafe fn transition_to_single_core_main(&self) {
        self.0.store(State::SingleCoreMain as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn starts_in_init() {
        let sm = StateManager::new();
        assert!(sm.is_init());
    }

    #[test_case]
    fn transitions_out_of_init() {
        let sm = StateManager::new();
        unsafe { sm.transition_to_single_core_main() };
        assert!(!sm.is_init());
    }
}
