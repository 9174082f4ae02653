//! Common types used throughout the protocol

use thiserror::Error;

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Payload too large: {0} bytes (max 250)")]
    PayloadTooLarge(usize),

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Serial port error: {0}")]
    SerialError(#[from] std::io::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Command rejected with status {0:#04X}")]
    CommandRejected(u8),
}

/// Radio firmware version, from SYS_VERSION
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysVersion {
    pub transport: u8,
    pub product: u8,
    pub major: u8,
    pub minor: u8,
    pub maint: u8,
    /// Build revision; zero when the firmware omits it
    pub revision: u32,
}

impl SysVersion {
    /// Parse from a SYS_VERSION SRSP payload
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 5 {
            return None;
        }

        let revision = if payload.len() >= 9 {
            u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]])
        } else {
            0
        };

        Some(Self {
            transport: payload[0],
            product: payload[1],
            major: payload[2],
            minor: payload[3],
            maint: payload[4],
            revision,
        })
    }
}

impl std::fmt::Display for SysVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{} (transport {}, product {}, rev {:#010X})",
            self.major, self.minor, self.maint, self.transport, self.product, self.revision
        )
    }
}

/// Network-layer state reported by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Initialized, not started
    Hold,
    /// Starting
    Init,
    /// Discovering networks
    Discovering,
    /// Joining
    Joining,
    /// Network formed, acting as coordinator
    Coordinator,
    /// Any other state byte
    Other(u8),
}

impl NetworkState {
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => NetworkState::Hold,
            0x01 => NetworkState::Init,
            0x02 => NetworkState::Discovering,
            0x03 => NetworkState::Joining,
            0x09 => NetworkState::Coordinator,
            v => NetworkState::Other(v),
        }
    }
}

/// Coordinator identity and state, from UTIL_GET_DEVICE_INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// IEEE address, little-endian as on the wire
    pub ieee: [u8; 8],
    pub short_addr: u16,
    pub device_type: u8,
    pub state: NetworkState,
}

impl DeviceInfo {
    /// Parse from a UTIL_GET_DEVICE_INFO SRSP payload
    ///
    /// Layout after the leading status byte: IEEE64 LE, short address LE,
    /// device type, state.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 13 {
            return None;
        }

        let mut ieee = [0u8; 8];
        ieee.copy_from_slice(&payload[1..9]);

        Some(Self {
            ieee,
            short_addr: u16::from_le_bytes([payload[9], payload[10]]),
            device_type: payload[11],
            state: NetworkState::from_u8(payload[12]),
        })
    }
}

/// Format a little-endian IEEE address for humans (big-endian, colon-separated)
#[must_use]
pub fn format_ieee(ieee: &[u8; 8]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        ieee[7], ieee[6], ieee[5], ieee[4], ieee[3], ieee[2], ieee[1], ieee[0]
    )
}

/// Assemble a little-endian IEEE byte slice into a u64
#[must_use]
pub fn ieee_to_u64(ieee: &[u8; 8]) -> u64 {
    u64::from_le_bytes(*ieee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sys_version_with_revision() {
        let payload = [0x02, 0x00, 0x02, 0x07, 0x01, 0xAA, 0xBB, 0xCC, 0xDD];
        let version = SysVersion::parse(&payload).unwrap();
        assert_eq!(version.transport, 2);
        assert_eq!(version.product, 0);
        assert_eq!(version.major, 2);
        assert_eq!(version.minor, 7);
        assert_eq!(version.maint, 1);
        assert_eq!(version.revision, 0xDDCC_BBAA);
    }

    #[test]
    fn test_sys_version_without_revision() {
        let version = SysVersion::parse(&[0x02, 0x01, 0x02, 0x07, 0x01]).unwrap();
        assert_eq!(version.revision, 0);
        assert!(SysVersion::parse(&[0x02, 0x01]).is_none());
    }

    #[test]
    fn test_device_info_parse() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0x23, 0xA1, 0xD8, 0x14, 0x00, 0x4B, 0x12, 0x00]);
        payload.extend_from_slice(&[0x00, 0x00]); // short addr 0x0000
        payload.push(0x07); // device type
        payload.push(0x09); // coordinator

        let info = DeviceInfo::parse(&payload).unwrap();
        assert_eq!(info.short_addr, 0x0000);
        assert_eq!(info.state, NetworkState::Coordinator);
        assert_eq!(ieee_to_u64(&info.ieee), 0x0012_4B00_14D8_A123);
    }

    #[test]
    fn test_format_ieee_reverses_bytes() {
        let ieee = [0x23, 0xA1, 0xD8, 0x14, 0x00, 0x4B, 0x12, 0x00];
        assert_eq!(format_ieee(&ieee), "00:12:4b:00:14:d8:a1:23");
    }

    #[test]
    fn test_network_state_from_u8() {
        assert_eq!(NetworkState::from_u8(0x09), NetworkState::Coordinator);
        assert_eq!(NetworkState::from_u8(0x00), NetworkState::Hold);
        assert_eq!(NetworkState::from_u8(0x42), NetworkState::Other(0x42));
    }
}
