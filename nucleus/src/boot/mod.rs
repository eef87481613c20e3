/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Boot-time glue: stashing the device-tree pointer the firmware hands us
//! in `x0`, and locating the initramfs it describes.

pub mod cpio;
pub mod dtb;
