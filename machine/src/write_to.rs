/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Formatting into a caller-supplied byte buffer, for call sites (the
//! semihosting print path) that can't go through the heap.

use core::{fmt, str};

struct WriteTo<'a> {
    buf: &'a mut [u8],
    used: usize,
}

impl<'a> WriteTo<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, used: 0 }
    }
}

impl<'a> fmt::Write for WriteTo<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.used;
        let n = bytes.len().min(remaining);
        self.buf[self.used..self.used + n].copy_from_slice(&bytes[..n]);
        self.used += n;
        if n < bytes.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

/// Formats `args` into `buf`, returning the written prefix as a `str`. If
/// `args` doesn't fit, returns whatever was written before truncation.
pub fn c_show<'a>(buf: &'a mut [u8], args: fmt::Arguments) -> Result<&'a str, str::Utf8Error> {
    use fmt::Write;

    let mut w = WriteTo::new(buf);
    let _ = w.write_fmt(args);
    let used = w.used;
    str::from_utf8(&buf[..used])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn formats_within_capacity() {
        let mut buf = [0u8; 32];
        let s = c_show(&mut buf, format_args!("x={}", 42)).unwrap();
        assert_eq!(s, "x=42");
    }

    #[test_case]
    fn truncates_past_capacity() {
        let mut buf = [0u8; 4];
        let s = c_show(&mut buf, format_args!("hello world")).unwrap();
        assert_eq!(s, "hell");
    }
}
