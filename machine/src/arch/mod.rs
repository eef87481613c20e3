/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Architecture-specific code, selected by target.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
