/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//============================================================================
// Testing environment
//============================================================================

pub trait TestFn {
    fn run(&self) -> ();
}

impl<T> TestFn for T
where
    T: Fn(),
{
    fn run(&self) {
        machine::print!("*TEST* {}...\t", core::any::type_name::<T>());
        self();
        machine::println!("[ok]\n");
    }
}

#[cfg(test)]
pub fn test_runner(tests: &[&dyn TestFn]) {
    machine::println!("Running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    machine::println!("\n[success]\n");
    machine::qemu::semihosting::exit_success();
}
