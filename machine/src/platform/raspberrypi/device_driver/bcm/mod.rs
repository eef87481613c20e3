// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2022 Andre Richter <andre.o.richter@gmail.com>

//! BCM driver top level.

pub mod gpio;
#[cfg(feature = "rpi3")]
pub mod interrupt_controller;
pub mod pl011_uart;
pub mod power;

#[cfg(feature = "rpi3")]
pub use interrupt_controller::*;
pub use {gpio::*, pl011_uart::*, power::*};
