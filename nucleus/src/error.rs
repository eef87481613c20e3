/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The kernel's single error type, shared by memory management, the
//! scheduler, the syscall dispatcher and the VFS.

use snafu::Snafu;

/// Errors returned from kernel subsystems.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// An allocator (bump arena, buddy allocator or chunk cache) has no
    /// memory left to satisfy the request.
    #[snafu(display("out of memory"))]
    OutOfMemory,

    /// A lookup (VFS path, thread id, timer handle) found nothing.
    #[snafu(display("not found"))]
    NotFound,

    /// A create-style operation targeted a name that is already taken.
    #[snafu(display("already exists"))]
    AlreadyExists,

    /// An operation that requires a regular file was given a directory.
    #[snafu(display("is a directory"))]
    IsDirectory,

    /// A syscall or VFS argument failed validation.
    #[snafu(display("invalid argument"))]
    InvalidArgument,

    /// A read ran past the end of the available data.
    #[snafu(display("end of file"))]
    EndOfFile,
}

/// Convenience alias used throughout the kernel core.
pub type Result<T> = core::result::Result<T, KernelError>;

/// Maps a [`KernelError`] to the small, syscall-ABI-stable negative error
/// codes returned to user code in `x0`.
impl KernelError {
    pub const fn errno(self) -> i64 {
        match self {
            KernelError::OutOfMemory => -1,
            KernelError::NotFound => -2,
            KernelError::AlreadyExists => -3,
            KernelError::IsDirectory => -4,
            KernelError::InvalidArgument => -5,
            KernelError::EndOfFile => -6,
        }
    }
}
