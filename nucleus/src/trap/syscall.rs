/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The syscall table EL0 programs reach through `svc`.
//!
//! Convention matches the AAPCS64 argument registers: the syscall number
//! arrives in `x8`, arguments in `x0..x5`, and the return value goes back
//! out through `x0`. Numeric failures use the negative `KernelError::errno`
//! convention, except `exec`/`fork`, whose ABI promises a fixed `-1` on any
//! failure; `-38` (an unrecognized syscall number) mirrors POSIX's `ENOSYS`
//! rather than anything this kernel's own error type names.

use super::TrapFrame;

const ENOSYS: i64 = -38;

const SYS_GETPID: u64 = 0;
const SYS_UART_READ: u64 = 1;
const SYS_UART_WRITE: u64 = 2;
const SYS_EXEC: u64 = 3;
const SYS_FORK: u64 = 4;
const SYS_EXIT: u64 = 5;
const SYS_MBOX_CALL: u64 = 6;
const SYS_KILL: u64 = 7;

/// Dispatches on `frame.x[8]`, running the matching syscall and writing its
/// result back into `frame.x[0]`.
pub fn dispatch(frame: &mut TrapFrame) {
    let ret = match frame.x[8] {
        SYS_GETPID => sys_getpid(),
        SYS_UART_READ => sys_uart_read(frame),
        SYS_UART_WRITE => sys_uart_write(frame),
        SYS_EXEC => sys_exec(frame),
        SYS_FORK => sys_fork(frame),
        SYS_EXIT => sys_exit(),
        SYS_MBOX_CALL => sys_mbox_call(),
        SYS_KILL => sys_kill(),
        _ => ENOSYS,
    };
    frame.x[0] = ret as u64;
}

fn sys_getpid() -> i64 {
    match crate::sched::current() {
        Some(tid) => tid.raw() as i64,
        None => 0,
    }
}

fn sys_uart_read(frame: &TrapFrame) -> i64 {
    let buf_ptr = frame.x[0] as *mut u8;
    let size = frame.x[1] as usize;
    if buf_ptr.is_null() || size == 0 {
        return 0;
    }
    let buf = unsafe { core::slice::from_raw_parts_mut(buf_ptr, size) };
    crate::uart_io::read(buf) as i64
}

fn sys_uart_write(frame: &TrapFrame) -> i64 {
    let buf_ptr = frame.x[0] as *const u8;
    let size = frame.x[1] as usize;
    if buf_ptr.is_null() || size == 0 {
        return 0;
    }
    let buf = unsafe { core::slice::from_raw_parts(buf_ptr, size) };
    crate::uart_io::write(buf) as i64
}

/// `name` is a NUL-terminated path in the calling program's own address
/// space; `argv` is accepted for ABI compatibility but unused, matching the
/// kernel's fixed, argument-less initramfs programs.
///
/// Unlike `vfs_*`, this syscall's failure return is a fixed `-1` rather than
/// the general `KernelError::errno` table: the ABI contract only promises
/// `-1` here (missing file or allocation failure alike), matching the
/// original's uniform `-1` on any `exec` failure.
fn sys_exec(frame: &mut TrapFrame) -> i64 {
    let name_ptr = frame.x[0] as *const u8;
    let path = match unsafe { c_str(name_ptr) } {
        Some(p) => p,
        None => return -1,
    };

    match crate::sched::do_exec(path) {
        Ok((entry, user_sp)) => {
            frame.elr_el1 = entry;
            frame.sp_el0 = user_sp;
            0
        }
        Err(_) => -1,
    }
}

/// Same `-1`-on-any-error convention as [`sys_exec`]; see its doc comment.
fn sys_fork(frame: &mut TrapFrame) -> i64 {
    match crate::sched::do_fork(frame) {
        Ok(child_tid) => child_tid.raw() as i64,
        Err(_) => -1,
    }
}

fn sys_exit() -> i64 {
    crate::sched::do_exit()
}

fn sys_mbox_call() -> i64 {
    // The shell already exposes mailbox queries (`revision`, `memory`); no
    // EL0 program in this kernel's initramfs needs the raw property-tag
    // interface, so this stays a documented stub rather than a half-built
    // passthrough.
    ENOSYS
}

fn sys_kill() -> i64 {
    ENOSYS
}

unsafe fn c_str<'a>(ptr: *const u8) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
        if len > 4096 {
            return None;
        }
    }
    let slice = core::slice::from_raw_parts(ptr, len);
    core::str::from_utf8(slice).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn exec_of_missing_file_returns_minus_one() {
        let path = b"/nope\0";
        let mut frame = TrapFrame::default();
        frame.x[0] = path.as_ptr() as u64;

        assert_eq!(sys_exec(&mut frame), -1);
    }
}
