//! Platform memory Management.
//!
//! The physical memory layout.
//!
//! The Raspberry's firmware copies the kernel binary to 0x8_0000. The preceding region will be used
//! as the boot core's stack.
//!
//! +---------------------------------------+
//! |                                       | boot_core_stack_start @ 0x0
//! |                                       |                                ^
//! | Boot-core Stack                       |                                | stack
//! |                                       |                                | growth
//! |                                       |                                | direction
//! +---------------------------------------+
//! |                                       | code_start @ 0x8_0000 == boot_core_stack_end_exclusive
//! | .text                                 |
//! | .rodata                               |
//! | .got                                  |
//! |                                       |
//! +---------------------------------------+
//! |                                       | data_start == code_end_exclusive
//! | .data                                 |
//! | .bss                                  |
//! |                                       |
//! +---------------------------------------+
//! |                                       | data_end_exclusive
//! |                                       |
//!
//!
//!
//!
//!
//! The virtual memory layout is as follows:
//!
//! +---------------------------------------+
//! |                                       | boot_core_stack_start @ 0x0
//! |                                       |                                ^
//! | Boot-core Stack                       |                                | stack
//! |                                       |                                | growth
//! |                                       |                                | direction
//! +---------------------------------------+
//! |                                       | code_start @ 0x8_0000 == boot_core_stack_end_exclusive
//! | .text                                 |
//! | .rodata                               |
//! | .got                                  |
//! |                                       |
//! +---------------------------------------+
//! |                                       | data_start == code_end_exclusive
//! | .data                                 |
//! | .bss                                  |
//! |                                       |
//! +---------------------------------------+
//! |                                       |  mmio_remap_start == data_end_exclusive
//! | VA region for MMIO remapping          |
//! |                                       |
//! +---------------------------------------+
//! |                                       |  mmio_remap_end_exclusive
//! |                                       |
//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

use {
    crate::memory::{Address, Physical},
    core::cell::UnsafeCell,
};

// Symbol from the linker script: the exclusive end of `.bss`, i.e. the start
// of RAM available to the kernel's own allocators.
extern "Rust" {
    static __data_end_exclusive: UnsafeCell<()>;
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The board's physical memory map.
/// This is a fixed memory map for Raspberry Pi,
/// @todo we need to infer the memory map from the provided DTB instead.
#[rustfmt::skip]
pub(super) mod map {
    use super::*;

    /// Beginning of memory.
    pub const START:                   usize =             0x0000_0000;
    /// End of memory - 8Gb RPi4
    pub const END_INCLUSIVE:           usize =             0x1_FFFF_FFFF;

    /// Physical RAM addresses.
    pub mod phys {
        /// Base address of video (VC) memory.
        pub const VIDEOMEM_BASE:       usize =             0x3e00_0000;
    }

    pub const VIDEOCORE_MBOX_OFFSET: usize = 0x0000_B880;
    pub const GPIO_OFFSET:           usize = 0x0020_0000;
    pub const UART_OFFSET:           usize = 0x0020_1000;
    pub const MINIUART_OFFSET:       usize = 0x0021_5000;

    /// Physical devices.
    pub mod mmio {
        use super::*;

        /// Base address of MMIO register range.
        pub const MMIO_BASE:           usize =             0x3F00_0000;

        /// Interrupt controller
        pub const PERIPHERAL_IC_BASE:  Address<Physical> = Address::new(MMIO_BASE + 0x0000_B200);
        pub const PERIPHERAL_IC_SIZE:  usize             =              0x24;

        /// Base address of ARM<->VC mailbox area.
        pub const VIDEOCORE_MBOX_BASE: Address<Physical> = Address::new(MMIO_BASE + VIDEOCORE_MBOX_OFFSET);

        /// Base address of GPIO registers.
        pub const GPIO_BASE:           Address<Physical> = Address::new(MMIO_BASE + GPIO_OFFSET);
        pub const GPIO_SIZE:           usize             =              0xA0;

        pub const PL011_UART_BASE:     Address<Physical> = Address::new(MMIO_BASE + UART_OFFSET);
        pub const PL011_UART_SIZE:     usize             =              0x48;

        /// Base address of the power management / watchdog block.
        pub const PM_BASE:             Address<Physical> = Address::new(MMIO_BASE + 0x0010_0000);
        pub const PM_SIZE:             usize             =              0x28;

        /// Base address of MiniUART.
        pub const MINI_UART_BASE:      Address<Physical> = Address::new(MMIO_BASE + MINIUART_OFFSET);

        /// End of MMIO memory region.
        pub const END:                 Address<Physical> = Address::new(0x4001_0000);
    }

    ///  End address of mapped memory.
    pub const END: Address<Physical> = mmio::END;

    //----
    // Unused?
    //----

    /// Virtual (mapped) addresses.
    pub mod virt {
        /// Start (top) of kernel stack.
        pub const KERN_STACK_START:    usize =             super::START;
        /// End (bottom) of kernel stack. SP starts at KERN_STACK_END + 1.
        pub const KERN_STACK_END:      usize =             0x0007_FFFF;

        /// Location of DMA-able memory region (in the second 2 MiB block).
        pub const DMA_HEAP_START:      usize =             0x0020_0000;
        /// End of DMA-able memory region.
        pub const DMA_HEAP_END:        usize =             0x005F_FFFF;
    }
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// `[start, end)` of the RAM available to the kernel's own allocators:
/// from the end of `.bss` up to the ARM/VideoCore memory split. There is
/// no MMU in play here, so these are both physical and virtual addresses.
#[inline(always)]
pub fn kernel_heap_range() -> (usize, usize) {
    let start = unsafe { __data_end_exclusive.get() as usize };
    (start, map::phys::VIDEOMEM_BASE)
}
