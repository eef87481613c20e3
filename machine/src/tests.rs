/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Testing environment for libmachine's own unit tests.

pub trait TestFn {
    fn run(&self) -> ();
}

impl<T> TestFn for T
where
    T: Fn(),
{
    fn run(&self) {
        crate::print!("*TEST* {}...\t", core::any::type_name::<T>());
        self();
        crate::println!("[ok]\n");
    }
}

#[cfg(test)]
pub fn test_runner(tests: &[&dyn TestFn]) {
    crate::println!("Running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    crate::println!("\n[success]\n");
    crate::qemu::semihosting::exit_success();
}
