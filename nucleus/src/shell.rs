/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! The interactive shell reached once the kernel has finished booting.
//!
//! A minimal REPL over the UART: line editing is the terminal's job, this
//! just reads a line, splits off the command word and dispatches.

use {
    crate::{mailbox, vfs},
    alloc::{string::String, vec::Vec},
    machine::console::{console, interface::ConsoleOps},
};

const PROMPT: &str = "# ";

/// Runs the shell loop. Never returns: `exit`/`reboot` are the only ways
/// out, and both halt the core.
pub fn run() -> ! {
    print_welcome();
    loop {
        crate::sched::timer::tick();
        console().write_string(PROMPT);
        let line = read_line();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        dispatch(line);
    }
}

fn print_welcome() {
    console().write_string("******************************************************************\n");
    console().write_string("********************* rpi3-core shell *******************************\n");
    console().write_string("******************************************************************\n");
}

fn read_line() -> String {
    let mut line = String::new();
    loop {
        let c = console().read_char();
        match c {
            '\r' | '\n' => {
                console().write_char('\n');
                break;
            }
            '\u{8}' | '\u{7f}' => {
                if line.pop().is_some() {
                    console().write_string("\u{8} \u{8}");
                }
            }
            c => {
                line.push(c);
                console().write_char(c);
            }
        }
    }
    line
}

fn dispatch(line: &str) {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or("");
    let rest: Vec<&str> = words.collect();

    match command {
        "help" => print_help(),
        "hello" => console().write_string("Hello World!\n"),
        "revision" => print_revision(),
        "memory" => print_memory(),
        "reboot" => reboot(),
        "ls" => cmd_ls(&rest),
        "mkdir" => cmd_mkdir(&rest),
        "exec" => cmd_exec(&rest),
        "setTimeout" => cmd_set_timeout(&rest),
        other => {
            console().write_string("Unknown command: ");
            console().write_string(other);
            console().write_char('\n');
        }
    }
}

fn print_help() {
    console().write_string("-------------------------- Help Message --------------------------\n");
    console().write_string("help              : print this help menu\n");
    console().write_string("hello             : print Hello World!\n");
    console().write_string("revision          : print board revision\n");
    console().write_string("memory            : print ARM memory split\n");
    console().write_string("reboot            : reboot the device\n");
    console().write_string("ls PATH           : list directory contents\n");
    console().write_string("mkdir PATH        : create a directory\n");
    console().write_string("exec PATH         : run a program from the initramfs\n");
    console().write_string("setTimeout MSG N  : print MSG after N seconds\n");
}

fn print_revision() {
    match mailbox::query_board_info() {
        Some(info) => {
            console().write_string("Board Revision: 0x");
            print_hex(info.revision);
            console().write_char('\n');
        }
        None => console().write_string("Failed to get board revision\n"),
    }
}

fn print_memory() {
    match mailbox::query_board_info() {
        Some(info) => {
            console().write_string("ARM Memory Base Address: 0x");
            print_hex(info.arm_memory_base);
            console().write_char('\n');
            console().write_string("ARM Memory Size: 0x");
            print_hex(info.arm_memory_size);
            console().write_char('\n');
        }
        None => console().write_string("Failed to get memory info\n"),
    }
}

fn print_hex(v: u32) {
    machine::print!("{:08x}", v);
}

fn reboot() -> ! {
    console().write_string("Rebooting...\n");
    machine::platform::drivers::reboot()
}

fn cmd_ls(args: &[&str]) {
    let path = args.first().copied().unwrap_or("/");
    if let Err(e) = vfs::ls(path) {
        machine::println!("ls: {}", e);
    }
}

fn cmd_mkdir(args: &[&str]) {
    let Some(path) = args.first() else {
        console().write_string("usage: mkdir PATH\n");
        return;
    };
    if let Err(e) = vfs::mkdir(path) {
        machine::println!("mkdir: {}", e);
    }
}

fn cmd_exec(args: &[&str]) {
    let Some(path) = args.first() else {
        console().write_string("usage: exec PATH\n");
        return;
    };
    match crate::sched::kernel_exec(path) {
        Ok(tid) => machine::println!("started tid {}", tid),
        Err(_) => console().write_string("exec: file not found\n"),
    }
}

/// Grounded on the original `SetTimeOut`, which crashes on short input
/// because it blindly indexes past the separators it expects to find. This
/// version validates both fields before scheduling anything.
fn cmd_set_timeout(args: &[&str]) {
    if args.len() < 2 {
        console().write_string("usage: setTimeout MESSAGE SECONDS\n");
        return;
    }
    let message = args[0];
    let seconds: u64 = match args[1].parse() {
        Ok(n) => n,
        Err(_) => {
            console().write_string("setTimeout: seconds must be a number\n");
            return;
        }
    };

    let owned = String::from(message);
    crate::sched::timer::add_timer(seconds, move || {
        console().write_string(&owned);
        console().write_char('\n');
    });
}
