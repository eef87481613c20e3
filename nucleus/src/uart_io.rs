/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Buffered UART I/O for the `uart_read`/`uart_write` syscalls.
//!
//! The PL011 driver in `machine` exposes blocking byte-at-a-time
//! `read_byte`/`write_byte` primitives; there is no IRQ-fed ring buffer
//! behind them; every byte is fetched by polling the RX FIFO status flag.
//! Syscalls need to move runs of several bytes without holding IRQs masked
//! for the whole transfer (a slow human typing at the other end of the
//! serial line would otherwise starve the timer and stall the scheduler).
//! `read`/`write` below unmask IRQs for the duration of the transfer and
//! remask before returning, matching the trap dispatcher's entry/exit
//! discipline.

use machine::{
    console::{console, interface::ConsoleOps},
    exception::asynchronous::{local_irq_mask, local_irq_unmask},
};

/// Reads `buf.len()` bytes from the console, blocking until the whole
/// buffer is filled. Returns the number of bytes actually read, which is
/// always `buf.len()` unless `buf` is empty.
pub fn read(buf: &mut [u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }

    local_irq_unmask();
    for slot in buf.iter_mut() {
        *slot = console().read_char() as u8;
    }
    local_irq_mask();
    buf.len()
}

/// Writes `buf` to the console, blocking until every byte is handed to the
/// hardware FIFO.
pub fn write(buf: &[u8]) -> usize {
    local_irq_unmask();
    for &b in buf {
        console().write_char(b as char);
    }
    local_irq_mask();
    buf.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn write_reports_full_length() {
        assert_eq!(write(b"hello"), 5);
    }

    #[test_case]
    fn read_of_empty_buffer_is_a_no_op() {
        let mut buf: [u8; 0] = [];
        assert_eq!(read(&mut buf), 0);
    }

    #[test_case]
    fn read_fills_the_whole_buffer_in_one_call() {
        // The default test console has nothing registered and falls back
        // to `NullConsole`, whose `read_char` always yields a fixed byte;
        // what matters here is that `read` doesn't stop after the first
        // one, unlike the one-byte-then-break bug this guards against.
        let mut buf = [0u8; 4];
        assert_eq!(read(&mut buf), 4);
        assert!(buf.iter().all(|&b| b == buf[0]));
    }
}
