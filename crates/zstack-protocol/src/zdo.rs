//! ZDO packet decoder
//!
//! Interprets ZDO management frames into decoded packets. Unknown frames
//! are not errors; they are logged at debug and skipped.

use crate::commands::{cmd0, zdo, CommandType, Subsystem};
use crate::frame::MtFrame;
use crate::types::ieee_to_u64;

/// Decoded ZDO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZdoPacket {
    /// A device joined and announced itself
    DeviceAnnouncement {
        src: u16,
        nwk: u16,
        ieee: u64,
    },
    /// Answer to an active-endpoints query
    ActiveEndpoints {
        src: u16,
        nwk: u16,
        endpoints: Vec<u8>,
    },
    /// Answer to a simple-descriptor query
    SimpleDescriptor {
        src: u16,
        nwk: u16,
        endpoint: u8,
        profile_id: u16,
        device_id: u16,
        in_clusters: Vec<u16>,
        out_clusters: Vec<u16>,
    },
    /// Result of a bind request, from the bound device
    BindResponse {
        src: u16,
        success: bool,
    },
    /// Opaque acknowledgement of a permit-join request
    PermitJoinAck,
    /// Opaque trust-center notification of a securely joining device
    TrustCenterDeviceInd,
}

/// Decode a ZDO-subsystem frame
///
/// Returns `None` for acknowledgements that carry nothing of interest and
/// for unrecognized command pairs.
#[must_use]
pub fn decode(frame: &MtFrame) -> Option<ZdoPacket> {
    let areq = cmd0(CommandType::Areq, Subsystem::Zdo);
    let srsp = cmd0(CommandType::Srsp, Subsystem::Zdo);
    let p = &frame.payload;

    match (frame.cmd0, frame.cmd1) {
        (c, zdo::END_DEVICE_ANNCE_IND) if c == areq => {
            if p.len() < 12 {
                tracing::debug!("Truncated device announcement ({} bytes)", p.len());
                return None;
            }
            let mut ieee = [0u8; 8];
            ieee.copy_from_slice(&p[4..12]);
            Some(ZdoPacket::DeviceAnnouncement {
                src: u16::from_le_bytes([p[0], p[1]]),
                nwk: u16::from_le_bytes([p[2], p[3]]),
                ieee: ieee_to_u64(&ieee),
            })
        }

        (c, zdo::BIND_RSP) if c == areq => {
            if p.len() < 3 {
                tracing::debug!("Truncated bind response ({} bytes)", p.len());
                return None;
            }
            Some(ZdoPacket::BindResponse {
                src: u16::from_le_bytes([p[0], p[1]]),
                success: p[2] == 0,
            })
        }

        (c, zdo::ACTIVE_EP_RSP) if c == areq => {
            if p.len() < 6 {
                tracing::debug!("Truncated active-endpoints response ({} bytes)", p.len());
                return None;
            }
            let count = p[5] as usize;
            if p.len() < 6 + count {
                tracing::debug!("Active-endpoints list shorter than its count");
                return None;
            }
            Some(ZdoPacket::ActiveEndpoints {
                src: u16::from_le_bytes([p[0], p[1]]),
                nwk: u16::from_le_bytes([p[3], p[4]]),
                endpoints: p[6..6 + count].to_vec(),
            })
        }

        (c, zdo::SIMPLE_DESC_RSP) if c == areq => decode_simple_descriptor(p),

        (c, zdo::MGMT_PERMIT_JOIN_REQ) if c == srsp => Some(ZdoPacket::PermitJoinAck),
        (c, zdo::MGMT_PERMIT_JOIN_RSP) if c == areq => Some(ZdoPacket::PermitJoinAck),

        (c, zdo::TC_DEV_IND) if c == areq => Some(ZdoPacket::TrustCenterDeviceInd),

        // Plain SRSP acknowledgements; the synchronous waiter already saw
        // them when it cared.
        (c, zdo::BIND_REQ | zdo::ACTIVE_EP_REQ | zdo::SIMPLE_DESC_REQ | zdo::STARTUP_FROM_APP)
            if c == srsp =>
        {
            tracing::debug!("ZDO acknowledgement for cmd1 {:#04X}", frame.cmd1);
            None
        }

        _ => {
            tracing::debug!(
                "Unhandled ZDO frame: cmd0={:#04X} cmd1={:#04X}",
                frame.cmd0,
                frame.cmd1
            );
            None
        }
    }
}

fn decode_simple_descriptor(p: &[u8]) -> Option<ZdoPacket> {
    if p.len() < 13 {
        tracing::debug!("Truncated simple descriptor ({} bytes)", p.len());
        return None;
    }

    let src = u16::from_le_bytes([p[0], p[1]]);
    let status = p[2];
    let nwk = u16::from_le_bytes([p[3], p[4]]);
    if status != 0 {
        tracing::debug!("Simple descriptor query failed with status {:#04X}", status);
        return None;
    }

    let endpoint = p[6];
    let profile_id = u16::from_le_bytes([p[7], p[8]]);
    let device_id = u16::from_le_bytes([p[9], p[10]]);

    let in_count = p[12] as usize;
    let mut idx = 13;
    if p.len() < idx + in_count * 2 + 1 {
        tracing::debug!("Simple descriptor input-cluster list truncated");
        return None;
    }
    let mut in_clusters = Vec::with_capacity(in_count);
    for _ in 0..in_count {
        in_clusters.push(u16::from_le_bytes([p[idx], p[idx + 1]]));
        idx += 2;
    }

    let out_count = p[idx] as usize;
    idx += 1;
    if p.len() < idx + out_count * 2 {
        tracing::debug!("Simple descriptor output-cluster list truncated");
        return None;
    }
    let mut out_clusters = Vec::with_capacity(out_count);
    for _ in 0..out_count {
        out_clusters.push(u16::from_le_bytes([p[idx], p[idx + 1]]));
        idx += 2;
    }

    Some(ZdoPacket::SimpleDescriptor {
        src,
        nwk,
        endpoint,
        profile_id,
        device_id,
        in_clusters,
        out_clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_announcement() {
        let payload = vec![
            0xC5, 0x16, // src
            0xC5, 0x16, // nwk
            0x23, 0xA1, 0xD8, 0x14, 0x00, 0x4B, 0x12, 0x00, // IEEE LE
            0x8C, // capabilities
        ];
        let frame = MtFrame::new(0x45, zdo::END_DEVICE_ANNCE_IND, payload);
        assert_eq!(
            decode(&frame),
            Some(ZdoPacket::DeviceAnnouncement {
                src: 0x16C5,
                nwk: 0x16C5,
                ieee: 0x0012_4B00_14D8_A123,
            })
        );
    }

    #[test]
    fn test_bind_response() {
        let frame = MtFrame::new(0x45, zdo::BIND_RSP, vec![0xC5, 0x16, 0x00]);
        assert_eq!(
            decode(&frame),
            Some(ZdoPacket::BindResponse {
                src: 0x16C5,
                success: true,
            })
        );

        let frame = MtFrame::new(0x45, zdo::BIND_RSP, vec![0xC5, 0x16, 0x8C]);
        assert_eq!(
            decode(&frame),
            Some(ZdoPacket::BindResponse {
                src: 0x16C5,
                success: false,
            })
        );
    }

    #[test]
    fn test_active_endpoints() {
        let payload = vec![
            0xC5, 0x16, // src
            0x00, // status
            0xC5, 0x16, // nwk
            0x02, // count
            0x01, 0x0A,
        ];
        let frame = MtFrame::new(0x45, zdo::ACTIVE_EP_RSP, payload);
        assert_eq!(
            decode(&frame),
            Some(ZdoPacket::ActiveEndpoints {
                src: 0x16C5,
                nwk: 0x16C5,
                endpoints: vec![0x01, 0x0A],
            })
        );
    }

    #[test]
    fn test_simple_descriptor() {
        let payload = vec![
            0xC5, 0x16, // src
            0x00, // status
            0xC5, 0x16, // nwk
            0x0E, // descriptor length
            0x01, // endpoint
            0x04, 0x01, // profile 0x0104
            0x02, 0x03, // device id 0x0302
            0x00, // device version
            0x02, // in count
            0x02, 0x04, // 0x0402
            0x05, 0x04, // 0x0405
            0x01, // out count
            0x06, 0x00, // 0x0006
        ];
        let frame = MtFrame::new(0x45, zdo::SIMPLE_DESC_RSP, payload);
        assert_eq!(
            decode(&frame),
            Some(ZdoPacket::SimpleDescriptor {
                src: 0x16C5,
                nwk: 0x16C5,
                endpoint: 0x01,
                profile_id: 0x0104,
                device_id: 0x0302,
                in_clusters: vec![0x0402, 0x0405],
                out_clusters: vec![0x0006],
            })
        );
    }

    #[test]
    fn test_failed_simple_descriptor_yields_nothing() {
        let payload = vec![
            0xC5, 0x16, 0x80, 0xC5, 0x16, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let frame = MtFrame::new(0x45, zdo::SIMPLE_DESC_RSP, payload);
        assert_eq!(decode(&frame), None);
    }

    #[test]
    fn test_permit_join_ack() {
        let frame = MtFrame::new(0x65, zdo::MGMT_PERMIT_JOIN_REQ, vec![0x00]);
        assert_eq!(decode(&frame), Some(ZdoPacket::PermitJoinAck));
    }

    #[test]
    fn test_unknown_frame_ignored() {
        let frame = MtFrame::new(0x45, 0x7F, vec![0x01, 0x02]);
        assert_eq!(decode(&frame), None);
    }

    #[test]
    fn test_truncated_payloads_yield_nothing() {
        assert_eq!(
            decode(&MtFrame::new(0x45, zdo::END_DEVICE_ANNCE_IND, vec![0xC5])),
            None
        );
        assert_eq!(decode(&MtFrame::new(0x45, zdo::BIND_RSP, vec![0xC5])), None);
        assert_eq!(
            decode(&MtFrame::new(
                0x45,
                zdo::ACTIVE_EP_RSP,
                vec![0xC5, 0x16, 0x00, 0xC5, 0x16, 0x05, 0x01]
            )),
            None
        );
    }
}
