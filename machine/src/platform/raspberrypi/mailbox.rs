/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 *
 * Based on https://github.com/rust-embedded/rust-raspi3-tutorial/blob/master/04_mailboxes/src/mbox.rs
 * by Andre Richter of Tock OS.
 */

//! Broadcom mailbox interface between the VideoCore and the ARM Core.

#![allow(dead_code)]

use {
    super::BcmHost,
    crate::platform::device_driver::common::MMIODerefWrapper,
    core::{result::Result as CoreResult, sync::atomic::Ordering},
    aarch64_cpu::asm::barrier,
    core::sync::atomic::compiler_fence,
    snafu::Snafu,
    tock_registers::{
        interfaces::{Readable, Writeable},
        register_bitfields, register_structs,
        registers::{ReadOnly, WriteOnly},
    },
};

/// Public interface to the mailbox.
///
/// The buffer address needs to be 16-byte aligned so the VideoCore can tell
/// it apart from the channel number packed into the low 4 bits.
pub struct Mailbox<const N_SLOTS: usize> {
    registers: Registers,
    pub buffer: LocalMailboxStorage<N_SLOTS>,
}

/// Mailbox that is ready to be called.
/// This prevents invalid use of the mailbox until it is fully prepared.
pub struct PreparedMailbox<const N_SLOTS: usize>(Mailbox<N_SLOTS>);

/// We've identity mapped the MMIO register region on kernel start.
const MAILBOX_BASE: usize = BcmHost::get_peripheral_address() + 0xb880;
/// Lowest 4-bits are channel ID.
const CHANNEL_MASK: u32 = 0xf;

// Mailbox Peek  Read/Write  Status  Sender  Config
//    0    0x10  0x00        0x18    0x14    0x1c
//    1    0x30  0x20        0x38    0x34    0x3c
//
// Only mailbox 0's status can trigger interrupts on the ARM, so Mailbox 0 is
// always for communication from VC to ARM and Mailbox 1 is for ARM to VC.
// The ARM should never write Mailbox 0 or read Mailbox 1.

register_bitfields! {
    u32,

    STATUS [
        FULL  OFFSET(31) NUMBITS(1) [],
        EMPTY OFFSET(30) NUMBITS(1) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    pub RegisterBlock {
        (0x00 => READ: ReadOnly<u32>),
        (0x04 => __reserved_1),
        (0x18 => STATUS: ReadOnly<u32, STATUS::Register>),
        (0x1c => __reserved_2),
        (0x20 => WRITE: WriteOnly<u32>),
        (0x24 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

#[derive(Snafu, Debug)]
pub enum MailboxError {
    #[snafu(display("ResponseError"))]
    Response,
    #[snafu(display("UnknownError"))]
    Unknown,
    #[snafu(display("Timeout"))]
    Timeout,
}

pub type Result<T> = CoreResult<T, MailboxError>;

/// Typical operations with a mailbox.
pub trait MailboxOps {
    fn write(&self, channel: u32) -> Result<()>;
    fn read(&self, channel: u32) -> Result<()>;
    fn call(&self, channel: u32) -> Result<()> {
        self.write(channel)?;
        self.read(channel)
    }
}

/// A locally-allocated, 16-byte-aligned mailbox payload buffer.
#[repr(align(16))]
pub struct LocalMailboxStorage<const N_SLOTS: usize> {
    pub storage: [u32; N_SLOTS],
}

impl<const N_SLOTS: usize> LocalMailboxStorage<N_SLOTS> {
    const fn new() -> Self {
        Self {
            storage: [0u32; N_SLOTS],
        }
    }

    fn value_at(&self, index: usize) -> u32 {
        self.storage[index]
    }
}

/*
 * Source https://elinux.org/RPi_Framebuffer
 * Source for channels 8 and 9: https://github.com/raspberrypi/firmware/wiki/Mailboxes
 */
#[allow(non_upper_case_globals)]
pub mod channel {
    pub const Power: u32 = 0;
    pub const FrameBuffer: u32 = 1;
    pub const VirtualUart: u32 = 2;
    pub const VChiq: u32 = 3;
    pub const Leds: u32 = 4;
    pub const Buttons: u32 = 5;
    pub const TouchScreen: u32 = 6;
    pub const PropertyTagsArmToVc: u32 = 8;
    pub const PropertyTagsVcToArm: u32 = 9;
}

pub const REQUEST: u32 = 0;

pub mod response {
    pub const SUCCESS: u32 = 0x8000_0000;
    pub const ERROR: u32 = 0x8000_0001;
}

#[allow(non_upper_case_globals)]
pub mod tag {
    pub const GetBoardRev: u32 = 0x0001_0002;
    pub const GetBoardSerial: u32 = 0x0001_0004;
    pub const GetArmMemory: u32 = 0x0001_0005;
    pub const SetClockRate: u32 = 0x0003_8002;
    pub const End: u32 = 0;
}

pub mod clock {
    pub const UART: u32 = 2;
}

impl<const N_SLOTS: usize> Default for Mailbox<N_SLOTS> {
    fn default() -> Self {
        unsafe { Self::new(MAILBOX_BASE) }
    }
}

impl<const N_SLOTS: usize> Mailbox<N_SLOTS> {
    /// Create a new mailbox bound to the given MMIO base address.
    ///
    /// # Safety
    /// Caller is responsible for picking the correct MMIO register base address.
    pub unsafe fn new(base_addr: usize) -> Mailbox<N_SLOTS> {
        Mailbox {
            registers: Registers::new(base_addr),
            buffer: LocalMailboxStorage::new(),
        }
    }

    /// Start mailbox request.
    ///
    /// @returns index of the next available slot.
    #[inline]
    pub fn request(&mut self) -> usize {
        self.buffer.storage[1] = REQUEST;
        2
    }

    /// Mark mailbox payload as completed.
    /// Consumes the Mailbox and returns a PreparedMailbox that can be called.
    #[inline]
    pub fn end(mut self, index: usize) -> PreparedMailbox<N_SLOTS> {
        self.buffer.storage[index] = tag::End;
        self.buffer.storage[0] = (index as u32 + 1) * 4;
        PreparedMailbox(self)
    }

    #[inline]
    pub fn get_board_revision(&mut self, index: usize) -> usize {
        let buf = &mut self.buffer.storage;
        buf[index] = tag::GetBoardRev;
        buf[index + 1] = 4;
        buf[index + 2] = 4;
        buf[index + 3] = 0;
        index + 4
    }

    #[inline]
    pub fn get_arm_memory(&mut self, index: usize) -> usize {
        let buf = &mut self.buffer.storage;
        buf[index] = tag::GetArmMemory;
        buf[index + 1] = 8;
        buf[index + 2] = 8;
        buf[index + 3] = 0;
        buf[index + 4] = 0;
        index + 5
    }

    #[inline]
    pub fn set_clock_rate(&mut self, index: usize, channel: u32, rate: u32) -> usize {
        let buf = &mut self.buffer.storage;
        buf[index] = tag::SetClockRate;
        buf[index + 1] = 12;
        buf[index + 2] = 8;
        buf[index + 3] = channel;
        buf[index + 4] = rate;
        buf[index + 5] = 0; // skip turbo setting
        index + 6
    }

    /// See <https://github.com/raspberrypi/firmware/wiki/Accessing-mailboxes>:
    /// with the exception of the property tags channel, addresses passed as
    /// payload data must be bus addresses as seen from the VideoCore.
    pub fn do_write(&self, channel: u32) -> Result<()> {
        let buf_ptr = self.buffer.storage.as_ptr() as u32;
        let buf_ptr = if channel != self::channel::PropertyTagsArmToVc {
            BcmHost::phys2bus(buf_ptr as usize) as u32
        } else {
            buf_ptr
        };

        let mut count: u32 = 0;

        // Ensure all stores to the mailbox buffer complete before the GPU is
        // signaled, which itself is a store.
        compiler_fence(Ordering::Release);

        while self.registers.STATUS.is_set(STATUS::FULL) {
            count += 1;
            if count > (1 << 25) {
                return Err(MailboxError::Timeout);
            }
        }
        barrier::dmb(barrier::SY);
        self.registers
            .WRITE
            .set((buf_ptr & !CHANNEL_MASK) | (channel & CHANNEL_MASK));
        Ok(())
    }

    /// Perform the mailbox read.
    ///
    /// # Safety
    /// The buffer is mutated by the VideoCore before the read completes.
    pub unsafe fn do_read(&self, channel: u32, expected: u32) -> Result<()> {
        loop {
            let mut count: u32 = 0;
            while self.registers.STATUS.is_set(STATUS::EMPTY) {
                count += 1;
                if count > (1 << 25) {
                    return Err(MailboxError::Timeout);
                }
            }

            barrier::dmb(barrier::SY);
            let data: u32 = self.registers.READ.get();
            barrier::dmb(barrier::SY);

            if (data & CHANNEL_MASK) == channel && (data & !CHANNEL_MASK) == expected {
                return match self.buffer.value_at(1) {
                    response::SUCCESS => Ok(()),
                    response::ERROR => Err(MailboxError::Response),
                    _ => Err(MailboxError::Unknown),
                };
            }
            // Ignore responses addressed to a different channel and loop again.
        }
    }
}

impl<const N_SLOTS: usize> MailboxOps for PreparedMailbox<N_SLOTS> {
    fn write(&self, channel: u32) -> Result<()> {
        self.0.do_write(channel)
    }

    fn read(&self, channel: u32) -> Result<()> {
        unsafe { self.0.do_read(channel, self.0.buffer.storage.as_ptr() as u32) }
    }
}

impl<const N_SLOTS: usize> PreparedMailbox<N_SLOTS> {
    pub fn value_at(&self, index: usize) -> u32 {
        self.0.buffer.value_at(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn test_prepare_mailbox_board_rev() {
        let mut mailbox = Mailbox::<8>::default();
        let index = mailbox.request();
        let index = mailbox.get_board_revision(index);
        let mailbox = mailbox.end(index);
        assert_eq!(mailbox.0.buffer.storage[0] as usize, (index + 1) * 4);
        assert_eq!(mailbox.0.buffer.storage[1], REQUEST);
        assert_eq!(mailbox.0.buffer.storage[2], tag::GetBoardRev);
        assert_eq!(mailbox.0.buffer.storage[index], tag::End);
    }
}
