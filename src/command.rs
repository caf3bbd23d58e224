//! Host command processing.
//!
//! The device answers as a standard MF2 keyboard but keeps no command
//! state: multi-byte commands such as Set LEDs (0xED plus a data byte) are
//! acknowledged byte by byte and their payload ignored, since there is
//! nothing on the board to actuate. A host that sends 0xED 0x02 simply
//! gets two acknowledges back.

use tracing::trace;

use crate::fifo::Fifo;

/// Acknowledge, sent for every accepted command or data byte.
pub const ACK: u8 = 0xFA;
/// Self-test passed, sent after a reset.
pub const SELF_TEST_PASS: u8 = 0xAA;
/// MF2 keyboard identity.
pub const KEYBOARD_ID: [u8; 2] = [0xAB, 0x83];

/// Commands received from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// 0xFF: reset and run the basic assurance test.
    Reset,
    /// 0xF2: read the device identification.
    ReadId,
    /// Anything else, acknowledged and otherwise ignored.
    Other(u8),
}

impl From<u8> for HostCommand {
    fn from(byte: u8) -> Self {
        match byte {
            0xFF => HostCommand::Reset,
            0xF2 => HostCommand::ReadId,
            other => HostCommand::Other(other),
        }
    }
}

impl HostCommand {
    /// Reply bytes, queued behind any pending scan codes.
    pub fn response(&self) -> &'static [u8] {
        const RESET_REPLY: &[u8] = &[ACK, SELF_TEST_PASS];
        const READ_ID_REPLY: &[u8] = &[ACK, KEYBOARD_ID[0], KEYBOARD_ID[1]];
        const ACK_ONLY: &[u8] = &[ACK];
        match self {
            HostCommand::Reset => RESET_REPLY,
            HostCommand::ReadId => READ_ID_REPLY,
            HostCommand::Other(_) => ACK_ONLY,
        }
    }
}

/// Drain one received byte, as the foreground loop does between scan
/// passes, and queue its reply. Returns the decoded command, or `None`
/// when the inbound queue was empty.
pub fn process_one(rx: &Fifo, tx: &Fifo) -> Option<HostCommand> {
    let byte = rx.pop()?;
    let command = HostCommand::from(byte);
    trace!("host command {byte:02X} decoded as {command:?}");
    for &b in command.response() {
        tx.push(b);
    }
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(fifo: &Fifo) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = fifo.pop() {
            out.push(b);
        }
        out
    }

    #[test]
    fn reset_replies_ack_then_self_test() {
        let rx = Fifo::new();
        let tx = Fifo::new();
        rx.push(0xFF);
        assert_eq!(process_one(&rx, &tx), Some(HostCommand::Reset));
        assert_eq!(drain(&tx), vec![0xFA, 0xAA]);
    }

    #[test]
    fn read_id_replies_the_mf2_identity() {
        let rx = Fifo::new();
        let tx = Fifo::new();
        rx.push(0xF2);
        assert_eq!(process_one(&rx, &tx), Some(HostCommand::ReadId));
        assert_eq!(drain(&tx), vec![0xFA, 0xAB, 0x83]);
    }

    #[test]
    fn set_leds_is_acknowledged_byte_by_byte() {
        let rx = Fifo::new();
        let tx = Fifo::new();
        rx.push(0xED);
        rx.push(0x02);
        assert_eq!(process_one(&rx, &tx), Some(HostCommand::Other(0xED)));
        assert_eq!(process_one(&rx, &tx), Some(HostCommand::Other(0x02)));
        assert_eq!(process_one(&rx, &tx), None);
        assert_eq!(drain(&tx), vec![0xFA, 0xFA]);
    }

    #[test]
    fn one_byte_per_call() {
        let rx = Fifo::new();
        let tx = Fifo::new();
        rx.push(0xFF);
        rx.push(0xF2);
        assert_eq!(process_one(&rx, &tx), Some(HostCommand::Reset));
        assert_eq!(rx.len(), 1);
        assert_eq!(drain(&tx), vec![0xFA, 0xAA]);
    }
}
