/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(nucleus::tests::test_runner)]
#![reexport_test_harness_main = "test_main"]

machine::entry!(kmain);

fn kmain(dtb: u32) -> ! {
    nucleus::boot::dtb::stash(dtb);

    unsafe { nucleus::init() }
}

#[panic_handler]
fn panicked(info: &core::panic::PanicInfo) -> ! {
    machine::panic::handler(info)
}
