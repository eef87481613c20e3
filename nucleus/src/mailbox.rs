/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Shell-visible queries against the VideoCore mailbox property interface.
//!
//! The wire protocol itself (register layout, tag encoding, request/response
//! framing) lives in `machine::platform::mailbox`; this module just builds
//! the two property requests the shell exposes (`revision`, `memory`).

use machine::platform::mailbox::{self, Mailbox, MailboxOps};

/// Board revision and ARM-side memory split, as reported by the firmware.
pub struct BoardInfo {
    pub revision: u32,
    pub arm_memory_base: u32,
    pub arm_memory_size: u32,
}

/// Queries the board revision and ARM memory split in a single mailbox
/// round trip.
pub fn query_board_info() -> Option<BoardInfo> {
    let mut mbox = Mailbox::<36>::default();
    let index = mbox.request();
    let index = mbox.get_board_revision(index);
    let index = mbox.get_arm_memory(index);
    let prepared = mbox.end(index);

    if prepared.call(mailbox::channel::PropertyTagsArmToVc).is_err() {
        return None;
    }

    Some(BoardInfo {
        revision: prepared.value_at(5),
        arm_memory_base: prepared.value_at(9),
        arm_memory_size: prepared.value_at(10),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn query_board_info_does_not_panic() {
        // No real mailbox hardware under the test harness; this exercises
        // the request-building path and tolerates a timeout response.
        let _ = query_board_info();
    }
}
