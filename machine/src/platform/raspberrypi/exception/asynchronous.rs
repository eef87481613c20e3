// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2020-2022 Andre Richter <andre.o.richter@gmail.com>

//! Platform asynchronous exception handling.

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Export for reuse in generic asynchronous.rs.
pub use crate::platform::device_driver::IRQNumber;

pub(in crate::platform) mod irq_map {
    use crate::platform::device_driver::{IRQNumber, PeripheralIRQ};

    pub const PL011_UART: IRQNumber = IRQNumber::Peripheral(PeripheralIRQ::new(57));
}

/// Return a reference to the platform's interrupt manager.
pub fn irq_manager(
) -> &'static impl crate::exception::asynchronous::interface::IRQManager<IRQNumberType = IRQNumber>
{
    crate::platform::drivers::interrupt_controller()
}
