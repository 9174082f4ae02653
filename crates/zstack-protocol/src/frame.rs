//! MT frame structure and FCS handling

use crate::commands::{cmd0, CommandType, Subsystem};
use crate::types::ProtocolError;

/// Start-of-frame marker on the wire
pub const START_OF_FRAME: u8 = 0xFE;

/// Maximum payload length the length byte can describe
pub const MAX_PAYLOAD: usize = 250;

/// MT protocol frame
///
/// Wire format:
/// ```text
/// [SOF: 0xFE]
/// [Length: 1 byte] (payload length, 0..=250)
/// [CMD0: 1 byte] (type in the top 3 bits, subsystem in the low 5)
/// [CMD1: 1 byte]
/// [Payload: variable]
/// [FCS: 1 byte] (XOR of length, CMD0, CMD1, payload)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtFrame {
    pub cmd0: u8,
    pub cmd1: u8,
    pub payload: Vec<u8>,
}

impl MtFrame {
    /// Create a frame from raw command bytes
    #[must_use]
    pub fn new(cmd0: u8, cmd1: u8, payload: Vec<u8>) -> Self {
        Self {
            cmd0,
            cmd1,
            payload,
        }
    }

    /// Create a frame from a typed command header
    #[must_use]
    pub fn command(kind: CommandType, subsystem: Subsystem, cmd1: u8, payload: Vec<u8>) -> Self {
        Self::new(cmd0(kind, subsystem), cmd1, payload)
    }

    /// Command type from the top bits of CMD0
    #[must_use]
    pub fn command_type(&self) -> CommandType {
        CommandType::from_cmd0(self.cmd0)
    }

    /// Subsystem from the low bits of CMD0
    #[must_use]
    pub fn subsystem(&self) -> Option<Subsystem> {
        Subsystem::from_cmd0(self.cmd0)
    }

    /// Serialize the frame to wire bytes
    ///
    /// A frame with payload length `n` occupies exactly `n + 5` bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge(self.payload.len()));
        }

        let len = self.payload.len() as u8;
        let mut data = Vec::with_capacity(self.payload.len() + 5);
        data.push(START_OF_FRAME);
        data.push(len);
        data.push(self.cmd0);
        data.push(self.cmd1);
        data.extend_from_slice(&self.payload);
        data.push(checksum(len, self.cmd0, self.cmd1, &self.payload));

        Ok(data)
    }
}

/// XOR frame-check sequence over length, command bytes, and payload.
///
/// The silicon computes exactly this; any other checksum would not round-trip.
#[must_use]
pub fn checksum(len: u8, cmd0: u8, cmd1: u8, payload: &[u8]) -> u8 {
    let mut fcs = len ^ cmd0 ^ cmd1;
    for &byte in payload {
        fcs ^= byte;
    }
    fcs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_empty_payload() {
        let frame = MtFrame::command(CommandType::Sreq, Subsystem::Sys, 0x02, vec![]);
        let bytes = frame.serialize().unwrap();
        // SYS_VERSION request: FE 00 21 02 23
        assert_eq!(bytes, vec![0xFE, 0x00, 0x21, 0x02, 0x23]);
    }

    #[test]
    fn test_serialize_with_payload() {
        let frame = MtFrame::new(0x41, 0x00, vec![0x01]);
        let bytes = frame.serialize().unwrap();
        assert_eq!(bytes, vec![0xFE, 0x01, 0x41, 0x00, 0x41]);
        assert_eq!(bytes.len(), frame.payload.len() + 5);
    }

    #[test]
    fn test_checksum_xor() {
        assert_eq!(checksum(0x00, 0x21, 0x02, &[]), 0x23);
        assert_eq!(checksum(0x01, 0x41, 0x00, &[0x01]), 0x41);
    }

    #[test]
    fn test_payload_too_large() {
        let frame = MtFrame::new(0x21, 0x00, vec![0u8; MAX_PAYLOAD + 1]);
        assert!(matches!(
            frame.serialize(),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
