/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Just enough flattened-device-tree parsing to find the initramfs.
//!
//! This is not a general FDT parser: it walks the structure block looking
//! for the `/chosen` node and reads `linux,initrd-start` /
//! `linux,initrd-end` out of it, then stops. Everything else the firmware
//! hands us in the blob (memory reservation map, `/memory`, `/cpus`, ...) is
//! ignored.

const FDT_MAGIC: u32 = 0xd00d_feed;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

#[repr(C)]
struct FdtHeader {
    magic: u32,
    totalsize: u32,
    off_dt_struct: u32,
    off_dt_strings: u32,
    off_mem_rsvmap: u32,
    version: u32,
    last_comp_version: u32,
    boot_cpuid_phys: u32,
    size_dt_strings: u32,
    size_dt_struct: u32,
}

static mut INITRD_RANGE: Option<(usize, usize)> = None;

/// Remembers the initramfs range found in the device-tree blob at `dtb`,
/// the physical address the firmware passed in `x0`.
///
/// # Safety
///
/// Must be called exactly once, early in boot, with `dtb` pointing at a
/// valid, firmware-supplied FDT blob.
pub fn stash(dtb: u32) {
    let range = unsafe { find_initrd_range(dtb as usize) };
    unsafe {
        INITRD_RANGE = range;
    }
    match range {
        Some((start, end)) => machine::info!("initramfs at [{:#x}, {:#x})", start, end),
        None => machine::warn!("no initramfs found in device tree at {:#x}", dtb),
    }
}

/// The `[start, end)` byte range of the initramfs, if one was found.
pub fn initrd_range() -> Option<(usize, usize)> {
    unsafe { INITRD_RANGE }
}

unsafe fn read_be32(addr: usize) -> u32 {
    u32::from_be(core::ptr::read_unaligned(addr as *const u32))
}

unsafe fn find_initrd_range(dtb: usize) -> Option<(usize, usize)> {
    let header = &*(dtb as *const FdtHeader);
    if u32::from_be(header.magic) != FDT_MAGIC {
        return None;
    }

    let struct_base = dtb + u32::from_be(header.off_dt_struct) as usize;
    let struct_size = u32::from_be(header.size_dt_struct) as usize;
    let strings_base = dtb + u32::from_be(header.off_dt_strings) as usize;

    let mut off = 0usize;
    let mut depth: i32 = 0;
    let mut chosen_depth: Option<i32> = None;
    let mut start: Option<usize> = None;
    let mut end: Option<usize> = None;

    while off < struct_size {
        let token = read_be32(struct_base + off);
        off += 4;

        match token {
            FDT_BEGIN_NODE => {
                let name_ptr = struct_base + off;
                let name = c_str(name_ptr);
                off += align4(name.len() + 1);
                depth += 1;
                if chosen_depth.is_none() && name == "chosen" {
                    chosen_depth = Some(depth);
                }
            }
            FDT_END_NODE => {
                if chosen_depth == Some(depth) {
                    // Leaving /chosen; we have everything we're going to get.
                    break;
                }
                depth -= 1;
            }
            FDT_PROP => {
                let len = read_be32(struct_base + off) as usize;
                let nameoff = read_be32(struct_base + off + 4) as usize;
                let data = struct_base + off + 8;
                off += 8 + align4(len);

                if chosen_depth == Some(depth) {
                    let name = c_str(strings_base + nameoff);
                    match name {
                        "linux,initrd-start" => start = Some(read_property_addr(data, len)),
                        "linux,initrd-end" => end = Some(read_property_addr(data, len)),
                        _ => {}
                    }
                }
            }
            FDT_NOP => {}
            FDT_END => break,
            _ => break,
        }

        if start.is_some() && end.is_some() {
            break;
        }
    }

    match (start, end) {
        (Some(s), Some(e)) if e >= s => Some((s, e)),
        _ => None,
    }
}

/// `linux,initrd-start/end` are encoded as either a 32-bit or 64-bit
/// big-endian cell depending on the producing bootloader.
unsafe fn read_property_addr(addr: usize, len: usize) -> usize {
    if len >= 8 {
        u64::from_be(core::ptr::read_unaligned(addr as *const u64)) as usize
    } else {
        read_be32(addr) as usize
    }
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

unsafe fn c_str<'a>(addr: usize) -> &'a str {
    let mut len = 0usize;
    while *((addr + len) as *const u8) != 0 {
        len += 1;
    }
    let slice = core::slice::from_raw_parts(addr as *const u8, len);
    core::str::from_utf8_unchecked(slice)
}
