/*
 * SPDX-License-Identifier: MIT OR BlueOak-1.0.0
 * Copyright (c) 2018-2019 Andre Richter <andre.o.richter@gmail.com>
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 * Original code distributed under MIT, additional changes are under BlueOak-1.0.0
 */

use {
    crate::{
        memory::{Address, Virtual},
        platform::device_driver::common::MMIODerefWrapper,
    },
    tock_registers::{
        interfaces::{Readable, Writeable},
        register_structs,
        registers::ReadWrite,
    },
};

register_structs! {
    #[allow(non_snake_case)]
    RegisterBlock {
        (0x00 => __reserved_1),
        (0x1c => PM_RSTC: ReadWrite<u32>),
        (0x20 => PM_RSTS: ReadWrite<u32>),
        (0x24 => PM_WDOG: ReadWrite<u32>),
        (0x28 => @END),
    }
}

const PM_PASSWORD: u32 = 0x5a00_0000;
const PM_RSTC_WRCFG_CLR: u32 = 0xffff_ffcf;
const PM_RSTC_WRCFG_FULL_RESET: u32 = 0x0000_0020;

type Registers = MMIODerefWrapper<RegisterBlock>;

/// Public interface to the watchdog/power-management block: the only
/// hardware-backed way to actually reset the board, as opposed to just
/// halting the core.
pub struct Power {
    registers: Registers,
}

impl Power {
    /// # Safety
    ///
    /// Unsafe, duh!
    pub const unsafe fn new(mmio_base_addr: Address<Virtual>) -> Power {
        Power {
            registers: Registers::new(mmio_base_addr),
        }
    }

    /// Reboot, by arming the watchdog for a short timeout and requesting a
    /// full reset. Never returns: the watchdog fires before control would.
    pub fn reset(&self) -> ! {
        // use a timeout of 10 ticks (~150us)
        self.registers.PM_WDOG.set(PM_PASSWORD | 10);
        let mut val = self.registers.PM_RSTC.get();
        val &= PM_RSTC_WRCFG_CLR;
        val |= PM_PASSWORD | PM_RSTC_WRCFG_FULL_RESET;
        self.registers.PM_RSTC.set(val);

        crate::cpu::endless_sleep()
    }
}
