/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Architectural timer driver, backed by the AArch64 generic timer
//! (`CNTPCT_EL0`/`CNTFRQ_EL0`), the same counter `nucleus`'s timer wheel
//! keys its deadlines on.

use {aarch64_cpu::registers::*, core::time::Duration, tock_registers::interfaces::Readable};

const NS_PER_S: u64 = 1_000_000_000;

struct TimeManager;

static TIME_MANAGER: TimeManager = TimeManager;

/// Returns a reference to the global time manager.
pub fn time_manager() -> &'static impl interface::TimeManager {
    &TIME_MANAGER
}

/// Time management functions.
pub mod interface {
    use core::time::Duration;

    /// Interface for a timer.
    pub trait TimeManager {
        /// The timer's resolution.
        fn resolution(&self) -> Duration;

        /// The uptime since the timer was initialized.
        fn uptime(&self) -> Duration;

        /// Spins until `duration` has elapsed.
        fn spin_for(&self, duration: Duration);
    }
}

impl TimeManager {
    fn frequency(&self) -> u64 {
        CNTFRQ_EL0.get()
    }

    fn counter(&self) -> u64 {
        CNTPCT_EL0.get()
    }
}

impl interface::TimeManager for TimeManager {
    fn resolution(&self) -> Duration {
        Duration::from_nanos(NS_PER_S / self.frequency())
    }

    fn uptime(&self) -> Duration {
        let ticks = self.counter();
        let freq = self.frequency();
        let secs = ticks / freq;
        let sub_ticks = ticks % freq;
        let nanos = (sub_ticks * NS_PER_S) / freq;
        Duration::new(secs, nanos as u32)
    }

    fn spin_for(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let freq = self.frequency() as u128;
        let wait_ticks = (duration.as_nanos() * freq) / NS_PER_S as u128;
        let start = self.counter() as u128;

        while (self.counter() as u128) - start < wait_ticks {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn uptime_is_monotonic() {
        let a = time_manager().uptime();
        let b = time_manager().uptime();
        assert!(b >= a);
    }
}
