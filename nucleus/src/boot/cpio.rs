/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Reader for the "newc" CPIO archive format used to pack the initramfs.
//!
//! Each entry is a fixed 110-byte ASCII header (magic `070701` followed by
//! eight-digit hex fields), a NUL-terminated filename padded to a 4-byte
//! boundary, and the file's data, itself padded to a 4-byte boundary. The
//! archive ends with a zero-length entry named `TRAILER!!!`.

use crate::{KernelError, Result};

const MAGIC: &[u8; 6] = b"070701";
const HEADER_LEN: usize = 110;
const TRAILER_NAME: &str = "TRAILER!!!";

struct Header {
    namesize: usize,
    filesize: usize,
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn hex_field(raw: &[u8]) -> Result<usize> {
    let s = core::str::from_utf8(raw).map_err(|_| KernelError::InvalidArgument)?;
    usize::from_str_radix(s, 16).map_err(|_| KernelError::InvalidArgument)
}

fn parse_header(entry: &[u8]) -> Result<Header> {
    if entry.len() < HEADER_LEN || &entry[0..6] != MAGIC {
        return Err(KernelError::InvalidArgument);
    }
    Ok(Header {
        filesize: hex_field(&entry[54..62])?,
        namesize: hex_field(&entry[94..102])?,
    })
}

/// One entry walked out of the archive: its name and its data slice.
pub struct Entry<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// Iterates the entries of a newc CPIO archive in on-disk order, stopping
/// before the trailer entry.
pub struct Entries<'a> {
    archive: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Entries<'a> {
    pub fn new(archive: &'a [u8]) -> Self {
        Self {
            archive,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        if self.done || self.offset + HEADER_LEN > self.archive.len() {
            return None;
        }

        let header = parse_header(&self.archive[self.offset..]).ok()?;
        let name_start = self.offset + HEADER_LEN;
        let name_end = name_start + header.namesize;
        if name_end > self.archive.len() {
            return None;
        }
        // namesize includes the trailing NUL.
        let name = core::str::from_utf8(&self.archive[name_start..name_end - 1]).ok()?;

        let data_start = self.offset + align4(HEADER_LEN + header.namesize);
        let data_end = data_start + header.filesize;
        if data_end > self.archive.len() {
            return None;
        }
        let data = &self.archive[data_start..data_end];

        self.offset = align4(data_end);

        if name == TRAILER_NAME {
            self.done = true;
            return None;
        }

        Some(Entry { name, data })
    }
}

/// Looks a file up by name in a newc CPIO archive.
///
/// `name` may carry a leading `/`, which is stripped before comparison
/// since archive entries are stored relative to the archive root.
pub fn find_file<'a>(archive: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let name = name.strip_prefix('/').unwrap_or(name);
    Entries::new(archive)
        .find(|entry| entry.name == name)
        .map(|entry| entry.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_entry(buf: &mut alloc::vec::Vec<u8>, name: &str, data: &[u8]) {
        let namesize = name.len() + 1;
        let header = alloc::format!(
            "070701{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}",
            0, 0, 0, 0, 1, 0, data.len(), 0, 0, 0, 0, namesize
        );
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        buf.extend_from_slice(data);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    fn build_archive(files: &[(&str, &[u8])]) -> alloc::vec::Vec<u8> {
        let mut buf = alloc::vec::Vec::new();
        for (name, data) in files {
            push_entry(&mut buf, name, data);
        }
        push_entry(&mut buf, TRAILER_NAME, &[]);
        buf
    }

    #[test_case]
    fn finds_a_file_by_name() {
        let archive = build_archive(&[("echo", b"echo-binary"), ("init", b"init-binary")]);
        assert_eq!(find_file(&archive, "/echo"), Some(&b"echo-binary"[..]));
        assert_eq!(find_file(&archive, "init"), Some(&b"init-binary"[..]));
    }

    #[test_case]
    fn missing_file_returns_none() {
        let archive = build_archive(&[("echo", b"echo-binary")]);
        assert_eq!(find_file(&archive, "/nope"), None);
    }

    #[test_case]
    fn iterates_without_the_trailer() {
        let archive = build_archive(&[("a", b"1"), ("b", b"22")]);
        let names: alloc::vec::Vec<&str> = Entries::new(&archive).map(|e| e.name).collect();
        assert_eq!(names, alloc::vec!["a", "b"]);
    }
}
