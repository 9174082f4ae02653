//! MT protocol command definitions

/// Command type, carried in the top 3 bits of CMD0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    /// Polling (rare)
    Poll = 0x00,
    /// Synchronous request
    Sreq = 0x20,
    /// Asynchronous request / indication
    Areq = 0x40,
    /// Synchronous response
    Srsp = 0x60,
}

impl CommandType {
    #[must_use]
    pub fn from_cmd0(cmd0: u8) -> Self {
        match cmd0 & 0xE0 {
            0x20 => CommandType::Sreq,
            0x40 => CommandType::Areq,
            0x60 => CommandType::Srsp,
            _ => CommandType::Poll,
        }
    }
}

/// Subsystem, carried in the low 5 bits of CMD0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Subsystem {
    /// System interface (reset, ping, version)
    Sys = 0x01,
    /// MAC layer
    Mac = 0x02,
    /// Network layer
    Nwk = 0x03,
    /// Application framework (endpoint data)
    Af = 0x04,
    /// Zigbee Device Object (pairing, discovery, binding)
    Zdo = 0x05,
    /// Simple API
    Sapi = 0x06,
    /// Utilities
    Util = 0x07,
}

impl Subsystem {
    #[must_use]
    pub fn from_cmd0(cmd0: u8) -> Option<Self> {
        match cmd0 & 0x1F {
            0x01 => Some(Subsystem::Sys),
            0x02 => Some(Subsystem::Mac),
            0x03 => Some(Subsystem::Nwk),
            0x04 => Some(Subsystem::Af),
            0x05 => Some(Subsystem::Zdo),
            0x06 => Some(Subsystem::Sapi),
            0x07 => Some(Subsystem::Util),
            _ => None,
        }
    }
}

/// Pack a command type and subsystem into a CMD0 byte
#[must_use]
pub const fn cmd0(kind: CommandType, subsystem: Subsystem) -> u8 {
    kind as u8 | subsystem as u8
}

/// SYS subsystem command ids
pub mod sys {
    pub const RESET_REQ: u8 = 0x00;
    pub const PING: u8 = 0x01;
    pub const VERSION: u8 = 0x02;
    pub const SET_EXTADDR: u8 = 0x03;
    pub const GET_EXTADDR: u8 = 0x0D;
    pub const RESET_IND: u8 = 0x80;
}

/// AF subsystem command ids
pub mod af {
    pub const REGISTER: u8 = 0x00;
    pub const DATA_REQUEST: u8 = 0x01;
    pub const DATA_CONFIRM: u8 = 0x80;
    pub const INCOMING_MSG: u8 = 0x81;
}

/// ZDO subsystem command ids
pub mod zdo {
    pub const SIMPLE_DESC_REQ: u8 = 0x04;
    pub const ACTIVE_EP_REQ: u8 = 0x05;
    pub const BIND_REQ: u8 = 0x21;
    pub const UNBIND_REQ: u8 = 0x22;
    pub const MGMT_PERMIT_JOIN_REQ: u8 = 0x36;
    pub const STARTUP_FROM_APP: u8 = 0x40;
    pub const SIMPLE_DESC_RSP: u8 = 0x84;
    pub const ACTIVE_EP_RSP: u8 = 0x85;
    pub const BIND_RSP: u8 = 0xA1;
    pub const MGMT_PERMIT_JOIN_RSP: u8 = 0xB6;
    pub const STATE_CHANGE_IND: u8 = 0xC0;
    pub const END_DEVICE_ANNCE_IND: u8 = 0xC1;
    pub const TC_DEV_IND: u8 = 0xCA;
}

/// UTIL subsystem command ids
pub mod util {
    pub const GET_DEVICE_INFO: u8 = 0x00;
}

/// Human-readable name for a (cmd0, cmd1) pair, for log lines.
///
/// Unknown pairs render as raw hex.
#[must_use]
pub fn command_name(cmd0: u8, cmd1: u8) -> String {
    let name = match (Subsystem::from_cmd0(cmd0), cmd1) {
        (Some(Subsystem::Sys), sys::RESET_REQ) => Some("SYS_RESET_REQ"),
        (Some(Subsystem::Sys), sys::PING) => Some("SYS_PING"),
        (Some(Subsystem::Sys), sys::VERSION) => Some("SYS_VERSION"),
        (Some(Subsystem::Sys), sys::RESET_IND) => Some("SYS_RESET_IND"),
        (Some(Subsystem::Af), af::REGISTER) => Some("AF_REGISTER"),
        (Some(Subsystem::Af), af::DATA_REQUEST) => Some("AF_DATA_REQUEST"),
        (Some(Subsystem::Af), af::DATA_CONFIRM) => Some("AF_DATA_CONFIRM"),
        (Some(Subsystem::Af), af::INCOMING_MSG) => Some("AF_INCOMING_MSG"),
        (Some(Subsystem::Zdo), zdo::SIMPLE_DESC_REQ) => Some("ZDO_SIMPLE_DESC_REQ"),
        (Some(Subsystem::Zdo), zdo::ACTIVE_EP_REQ) => Some("ZDO_ACTIVE_EP_REQ"),
        (Some(Subsystem::Zdo), zdo::BIND_REQ) => Some("ZDO_BIND_REQ"),
        (Some(Subsystem::Zdo), zdo::UNBIND_REQ) => Some("ZDO_UNBIND_REQ"),
        (Some(Subsystem::Zdo), zdo::MGMT_PERMIT_JOIN_REQ) => Some("ZDO_MGMT_PERMIT_JOIN_REQ"),
        (Some(Subsystem::Zdo), zdo::STARTUP_FROM_APP) => Some("ZDO_STARTUP_FROM_APP"),
        (Some(Subsystem::Zdo), zdo::SIMPLE_DESC_RSP) => Some("ZDO_SIMPLE_DESC_RSP"),
        (Some(Subsystem::Zdo), zdo::ACTIVE_EP_RSP) => Some("ZDO_ACTIVE_EP_RSP"),
        (Some(Subsystem::Zdo), zdo::BIND_RSP) => Some("ZDO_BIND_RSP"),
        (Some(Subsystem::Zdo), zdo::MGMT_PERMIT_JOIN_RSP) => Some("ZDO_MGMT_PERMIT_JOIN_RSP"),
        (Some(Subsystem::Zdo), zdo::STATE_CHANGE_IND) => Some("ZDO_STATE_CHANGE_IND"),
        (Some(Subsystem::Zdo), zdo::END_DEVICE_ANNCE_IND) => Some("ZDO_END_DEVICE_ANNCE_IND"),
        (Some(Subsystem::Zdo), zdo::TC_DEV_IND) => Some("ZDO_TC_DEV_IND"),
        (Some(Subsystem::Util), util::GET_DEVICE_INFO) => Some("UTIL_GET_DEVICE_INFO"),
        _ => None,
    };

    match name {
        Some(n) => n.to_string(),
        None => format!("UNKNOWN ({cmd0:#04X}, {cmd1:#04X})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd0_packing() {
        assert_eq!(cmd0(CommandType::Sreq, Subsystem::Sys), 0x21);
        assert_eq!(cmd0(CommandType::Srsp, Subsystem::Zdo), 0x65);
        assert_eq!(cmd0(CommandType::Areq, Subsystem::Af), 0x44);
    }

    #[test]
    fn test_cmd0_unpacking() {
        assert_eq!(CommandType::from_cmd0(0x61), CommandType::Srsp);
        assert_eq!(Subsystem::from_cmd0(0x61), Some(Subsystem::Sys));
        assert_eq!(Subsystem::from_cmd0(0x45), Some(Subsystem::Zdo));
        assert_eq!(Subsystem::from_cmd0(0x40), None);
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name(0x21, 0x02), "SYS_VERSION");
        assert_eq!(command_name(0x45, 0xC1), "ZDO_END_DEVICE_ANNCE_IND");
        assert_eq!(command_name(0x48, 0x99), "UNKNOWN (0x48, 0x99)");
    }
}
