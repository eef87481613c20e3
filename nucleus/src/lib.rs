/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The kernel core: memory management, scheduling, trap dispatch and the VFS.
//!
//! Everything hardware-facing (boot assembly, exception vectors, MMIO device
//! drivers, console plumbing) lives in the `machine` crate; this crate builds
//! the kernel on top of it.

#![no_std]
#![feature(allocator_api)]
#![feature(nonnull_slice_from_raw_parts)]
#![feature(slice_ptr_get)]
#![feature(custom_test_frameworks)]
#![test_runner(crate::tests::test_runner)]
#![reexport_test_harness_main = "test_main"]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::enum_variant_names)]

extern crate alloc;

pub mod boot;
pub mod error;
pub mod mailbox;
pub mod mm;
pub mod sched;
pub mod shell;
pub mod tests;
pub mod trap;
pub mod uart_io;
pub mod vfs;

pub use error::{KernelError, Result};

/// Runs kernel-wide initialization: sets up exception handling, device
/// drivers, the kernel's memory allocators and the root TmpFS, then returns
/// control to the caller (the `kmain` entry point in `main.rs`, or the test
/// harness).
///
/// # Safety
///
/// May only be called once, early in boot, before interrupts are unmasked.
pub unsafe fn init() -> ! {
    machine::exception::handling_init();

    if let Err(e) = machine::platform::drivers::init() {
        panic!("Error registering platform drivers: {}", e);
    }
    machine::drivers::driver_manager().init_drivers_and_irqs();

    mm::init();
    vfs::init();

    machine::info!("Booting on: {}", machine::platform::BcmHost::board_name());

    machine::state::state_manager().transition_to_single_core_main();

    kmain()
}

/// Kernel main loop, reached after all subsystems are initialized.
fn kmain() -> ! {
    #[cfg(test)]
    test_main();

    shell::run()
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[panic_handler]
    fn panicked(info: &core::panic::PanicInfo) -> ! {
        machine::panic::handler_for_tests(info)
    }

    /// Entry point for `cargo test` binaries: a minimal machine bring-up
    /// followed by the `#[test_case]` harness, then exit via semihosting.
    #[no_mangle]
    pub unsafe fn main() -> ! {
        machine::exception::handling_init();
        machine::platform::drivers::qemu_bring_up_console();
        test_main();
        machine::qemu::semihosting::exit_success()
    }
}
