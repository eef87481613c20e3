/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The EL0 -> EL1 synchronous exception path: the kernel's syscall gate.
//!
//! `machine` owns the vector table and every handler that is either
//! fatal-by-design or genuinely board-agnostic (IRQ dispatch, aborts).
//! Lower EL using AArch64, synchronous is the one vector machine leaves
//! unimplemented: that's `svc`, the only way EL0 code reaches the kernel,
//! and syscalls are kernel policy, not HAL policy.

pub mod syscall;

use aarch64_cpu::registers::{ESR_EL1, SP_EL0};
use tock_registers::interfaces::{Readable, Writeable};

core::arch::global_asm!(include_str!("ret_from_fork.S"));

/// Mirrors the layout `vectors.S`'s `CALL_WITH_CONTEXT` macro pushes on the
/// kernel stack: 30 GPRs, `lr`, `elr_el1`, `spsr_el1`, `esr_el1`, in that
/// order. `SP_EL0` is not part of this layout -- the shared macro doesn't
/// save it, since most vectors never need it -- so it's read/written
/// through the live system register instead.
#[repr(C)]
struct RawContext {
    gpr: [u64; 30],
    lr: u64,
    elr_el1: u64,
    spsr_el1: u64,
    esr_el1: u64,
}

/// The canonical register snapshot nucleus passes around internally: fork
/// copies it, `kernel_exec` builds one from scratch, the syscall table
/// mutates it in place. Unlike [`RawContext`] it owns `sp_el0` as a plain
/// field, because nothing here is constrained by `vectors.S`'s layout --
/// `ret_from_fork` is nucleus's own trampoline and can expect whatever
/// layout this struct declares.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct TrapFrame {
    /// x0..x30. Syscall number arrives in `x[8]`, arguments in `x[0..6]`,
    /// the return value goes back out through `x[0]`.
    pub x: [u64; 31],
    pub spsr_el1: u64,
    pub elr_el1: u64,
    pub sp_el0: u64,
}

impl TrapFrame {
    /// A frame ready to `eret` into `entry` on a fresh user stack.
    pub fn for_entry(entry: u64, user_sp: u64) -> Self {
        Self {
            x: [0; 31],
            spsr_el1: 0, // EL0t, all interrupt masks clear
            elr_el1: entry,
            sp_el0: user_sp,
        }
    }

    fn from_raw(raw: &RawContext) -> Self {
        let mut x = [0u64; 31];
        x[..30].copy_from_slice(&raw.gpr);
        x[30] = raw.lr;
        Self {
            x,
            spsr_el1: raw.spsr_el1,
            elr_el1: raw.elr_el1,
            sp_el0: SP_EL0.get(),
        }
    }

    fn write_back(&self, raw: &mut RawContext) {
        raw.gpr.copy_from_slice(&self.x[..30]);
        raw.lr = self.x[30];
        raw.spsr_el1 = self.spsr_el1;
        raw.elr_el1 = self.elr_el1;
        SP_EL0.set(self.sp_el0);
    }
}

extern "C" {
    /// Resumes a thread whose kernel stack pointer was left pointing at a
    /// [`TrapFrame`] by [`crate::sched::do_fork`] -- restores it and
    /// `eret`s into EL0. Never returns.
    pub fn ret_from_fork() -> !;
}

#[no_mangle]
extern "C" fn lower_aarch64_synchronous(raw: &mut RawContext) {
    match ESR_EL1.read_as_enum(ESR_EL1::EC) {
        Some(ESR_EL1::EC::Value::SVC64) => {
            let mut frame = TrapFrame::from_raw(raw);
            syscall::dispatch(&mut frame);
            frame.write_back(raw);
        }
        _ => panic!(
            "Unhandled synchronous exception from EL0, ESR_EL1 = {:#x}",
            ESR_EL1.get()
        ),
    }
}
