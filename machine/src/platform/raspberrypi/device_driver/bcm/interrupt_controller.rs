/*
 * SPDX-License-Identifier: MIT OR BlueOak-1.0.0
 * Copyright (c) 2019-2022 Andre Richter <andre.o.richter@gmail.com>
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 * Original code distributed under MIT, additional changes are under BlueOak-1.0.0
 */

//! The BCM2837 peripheral interrupt controller.
//!
//! Descriptions taken from
//! <https://github.com/raspberrypi/documentation/files/1888662/BCM2837-ARM-Peripherals.-.Revised.-.V2-1.pdf>,
//! chapter 7.

use {
    crate::{
        exception::{self, asynchronous::IRQHandlerDescriptor},
        memory::{Address, Virtual},
        platform::device_driver::common::{BoundedUsize, MMIODerefWrapper},
        synchronization::{interface::Mutex, IRQSafeNullLock},
    },
    tock_registers::{
        interfaces::{Readable, Writeable},
        register_structs,
        registers::{ReadOnly, ReadWrite},
    },
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_structs! {
    #[allow(non_snake_case)]
    RegisterBlock {
        (0x00 => IRQ_BASIC_PENDING: ReadOnly<u32>),
        (0x04 => IRQ_PENDING_1: ReadOnly<u32>),
        (0x08 => IRQ_PENDING_2: ReadOnly<u32>),
        (0x0c => FIQ_CONTROL: ReadWrite<u32>),
        (0x10 => ENABLE_IRQS_1: ReadWrite<u32>),
        (0x14 => ENABLE_IRQS_2: ReadWrite<u32>),
        (0x18 => ENABLE_BASIC_IRQS: ReadWrite<u32>),
        (0x1c => DISABLE_IRQS_1: ReadWrite<u32>),
        (0x20 => DISABLE_IRQS_2: ReadWrite<u32>),
        (0x24 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

/// Peripheral IRQs span two 32-bit banks, numbered 0..=63.
const NUM_PERIPHERAL_IRQS: usize = 64;

type HandlerTable =
    [Option<IRQHandlerDescriptor<IRQNumber>>; NUM_PERIPHERAL_IRQS];

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Used to identify an interrupt local to a particular core (e.g. the core timer). This kernel
/// does not drive any local IRQ source, but the type is kept for API symmetry with the interrupt
/// number encoding used by the mainline Raspberry Pi kernels.
pub type LocalIRQ = BoundedUsize<{ InterruptController::MAX_LOCAL_IRQ_NUMBER }>;

/// Used to identify a peripheral IRQ, e.g. the one used by the PL011 UART.
pub type PeripheralIRQ = BoundedUsize<{ InterruptController::MAX_PERIPHERAL_IRQ_NUMBER }>;

/// Wraps a local or peripheral IRQ number.
#[derive(Copy, Clone)]
pub enum IRQNumber {
    Local(LocalIRQ),
    Peripheral(PeripheralIRQ),
}

impl core::fmt::Display for IRQNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Local(number) => write!(f, "Local({})", number),
            Self::Peripheral(number) => write!(f, "Peripheral({})", number),
        }
    }
}

/// Representation of the Interrupt Controller.
pub struct InterruptController {
    periph_registers: IRQSafeNullLock<Registers>,
    periph_handler_table: IRQSafeNullLock<HandlerTable>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl InterruptController {
    pub const MAX_LOCAL_IRQ_NUMBER: usize = 11;
    pub const MAX_PERIPHERAL_IRQ_NUMBER: usize = NUM_PERIPHERAL_IRQS - 1;

    pub const COMPATIBLE: &'static str = "BCM Interrupt Controller";

    /// # Safety
    ///
    /// The caller must provide the correct MMIO base address.
    pub const unsafe fn new(mmio_base_addr: Address<Virtual>) -> Self {
        Self {
            periph_registers: IRQSafeNullLock::new(Registers::new(mmio_base_addr)),
            periph_handler_table: IRQSafeNullLock::new([None; NUM_PERIPHERAL_IRQS]),
        }
    }

    /// Enable a peripheral IRQ at the controller, routing it through the correct bank.
    fn enable_peripheral(&self, irq: PeripheralIRQ) {
        self.periph_registers.lock(|regs| {
            let irq_number = irq.get();

            if irq_number < 32 {
                regs.ENABLE_IRQS_1.set(1 << irq_number);
            } else {
                regs.ENABLE_IRQS_2.set(1 << (irq_number - 32));
            }
        });
    }

    /// Query the pending peripheral IRQs from both banks.
    fn pending_peripherals(&self) -> u64 {
        self.periph_registers.lock(|regs| {
            let pending_1 = regs.IRQ_PENDING_1.get() as u64;
            let pending_2 = regs.IRQ_PENDING_2.get() as u64;

            pending_1 | (pending_2 << 32)
        })
    }
}

impl crate::drivers::interface::DeviceDriver for InterruptController {
    type IRQNumberType = IRQNumber;

    fn compatible(&self) -> &'static str {
        Self::COMPATIBLE
    }
}

impl exception::asynchronous::interface::IRQManager for InterruptController {
    type IRQNumberType = IRQNumber;

    fn register_handler(
        &self,
        descriptor: IRQHandlerDescriptor<Self::IRQNumberType>,
    ) -> Result<(), &'static str> {
        let number = match descriptor.number() {
            IRQNumber::Peripheral(number) => number,
            IRQNumber::Local(_) => return Err("Local IRQs are not handled by this driver"),
        };

        self.periph_handler_table.lock(|table| {
            let slot = &mut table[number.get()];

            if slot.is_some() {
                return Err("IRQ handler already registered");
            }

            *slot = Some(descriptor);

            Ok(())
        })
    }

    fn enable(&self, irq_number: &Self::IRQNumberType) {
        match irq_number {
            IRQNumber::Peripheral(number) => self.enable_peripheral(*number),
            IRQNumber::Local(_) => (),
        }
    }

    fn handle_pending_irqs<'irq_context>(
        &'irq_context self,
        _ic: &exception::asynchronous::IRQContext<'irq_context>,
    ) {
        let pending = self.pending_peripherals();

        for number in 0..NUM_PERIPHERAL_IRQS {
            if pending & (1 << number) == 0 {
                continue;
            }

            self.periph_handler_table.lock(|table| {
                match table[number] {
                    None => panic!("No handler registered for IRQ {}", number),
                    Some(descriptor) => {
                        if let Err(e) = descriptor.handler().handle() {
                            crate::warn!(
                                "Error handling IRQ {}: {}",
                                descriptor.name(),
                                e
                            );
                        }
                    }
                }
            });
        }
    }

    fn print_handler(&self) {
        crate::info!("      Peripheral handler:");

        self.periph_handler_table.lock(|table| {
            for descriptor in table.iter().flatten() {
                crate::info!(
                    "            {}. {}",
                    descriptor.number(),
                    descriptor.name()
                );
            }
        });
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_enable_sets_correct_bit_in_bank_2() {
        let mut reg = [0u32; 16];
        let mmio_base_addr = Address::<Virtual>::new(&mut reg as *mut _ as usize);
        let ic = unsafe { InterruptController::new(mmio_base_addr) };

        let irq = PeripheralIRQ::new(57);
        ic.enable_peripheral(irq);

        // ENABLE_IRQS_2 is at offset 0x14, i.e. word index 5.
        assert_eq!(reg[5], 1 << (57 - 32));
    }
}
