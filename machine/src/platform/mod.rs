/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

#[cfg(feature = "rpi3")]
pub mod raspberrypi;

#[cfg(feature = "rpi3")]
pub use raspberrypi::*;
