/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! A software timer wheel keyed off `machine::time::time_manager()`.
//!
//! There is no hardware timer IRQ wired into this kernel (the platform's
//! interrupt controller doesn't route the core timer here), so timers fire
//! at reschedule points instead of being interrupt-driven: [`tick`] is
//! called from the shell's main loop and from [`super::schedule`]. For a
//! single-core, mostly-idle teaching kernel that keeps `setTimeout`-style
//! deadlines close enough to on-time without needing a real timer IRQ.

use {
    alloc::{boxed::Box, vec::Vec},
    core::time::Duration,
    machine::exception::asynchronous::exec_with_irq_masked,
};

struct TimerEntry {
    deadline: Duration,
    callback: Box<dyn FnOnce()>,
}

struct TimerWheel {
    pending: Vec<TimerEntry>,
}

// Single core, mutated only with IRQs masked.
unsafe impl Sync for Wheel {}

struct Wheel(core::cell::UnsafeCell<TimerWheel>);

static WHEEL: Wheel = Wheel(core::cell::UnsafeCell::new(TimerWheel {
    pending: Vec::new(),
}));

/// Schedules `callback` to run no earlier than `seconds` from now.
///
/// Delivery happens the next time [`tick`] runs, so actual latency is
/// bounded by how often the kernel reaches a reschedule point, not just by
/// `seconds`.
pub fn add_timer(seconds: u64, callback: impl FnOnce() + 'static) {
    let deadline = machine::time::time_manager().uptime() + Duration::from_secs(seconds);
    exec_with_irq_masked(|| {
        let wheel = unsafe { &mut *WHEEL.0.get() };
        // Insertion-sort into place so `pending` stays sorted by
        // non-decreasing deadline; ties keep insertion order since we insert
        // after every entry with an equal or earlier deadline.
        let pos = wheel
            .pending
            .iter()
            .position(|e| e.deadline > deadline)
            .unwrap_or(wheel.pending.len());
        wheel.pending.insert(
            pos,
            TimerEntry {
                deadline,
                callback: Box::new(callback),
            },
        );
    });
}

/// Runs every timer whose deadline has passed, earliest deadline first.
pub fn tick() {
    let now = machine::time::time_manager().uptime();
    loop {
        let due = exec_with_irq_masked(|| {
            let wheel = unsafe { &mut *WHEEL.0.get() };
            match wheel.pending.first() {
                Some(entry) if entry.deadline <= now => Some(wheel.pending.remove(0)),
                _ => None,
            }
        });
        match due {
            Some(entry) => (entry.callback)(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};

    #[test_case]
    fn fires_once_deadline_has_passed() {
        static FIRED: AtomicBool = AtomicBool::new(false);
        add_timer(0, || FIRED.store(true, Ordering::SeqCst));
        // A zero-second timer's deadline is already <= uptime() by the time
        // tick() reads it.
        tick();
        assert!(FIRED.load(Ordering::SeqCst));
    }

    #[test_case]
    fn fires_in_deadline_order_not_insertion_order() {
        static ORDER: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);
        static FIRST: AtomicBool = AtomicBool::new(false);
        static SECOND: AtomicBool = AtomicBool::new(false);

        let now = machine::time::time_manager().uptime();

        // Insert the later deadline first: a naive insertion-order wheel
        // would fire this one first too. Deadlines are constructed directly
        // so the test doesn't depend on real time passing.
        exec_with_irq_masked(|| {
            let wheel = unsafe { &mut *WHEEL.0.get() };
            wheel.pending.clear();
        });
        add_timer_with_deadline(now, || {
            if ORDER.fetch_add(1, Ordering::SeqCst) == 1 {
                SECOND.store(true, Ordering::SeqCst);
            }
        });
        add_timer_with_deadline(now.saturating_sub(Duration::from_secs(1)), || {
            if ORDER.fetch_add(1, Ordering::SeqCst) == 0 {
                FIRST.store(true, Ordering::SeqCst);
            }
        });

        // Both timers are already due; tick() must drain the earlier
        // deadline before the later one, regardless of insertion order.
        tick();
        tick();

        assert!(FIRST.load(Ordering::SeqCst));
        assert!(SECOND.load(Ordering::SeqCst));
    }

    fn add_timer_with_deadline(deadline: Duration, callback: impl FnOnce() + 'static) {
        exec_with_irq_masked(|| {
            let wheel = unsafe { &mut *WHEEL.0.get() };
            let pos = wheel
                .pending
                .iter()
                .position(|e| e.deadline > deadline)
                .unwrap_or(wheel.pending.len());
            wheel.pending.insert(
                pos,
                TimerEntry {
                    deadline,
                    callback: Box::new(callback),
                },
            );
        });
    }
}
