//! AF packet decoder
//!
//! Interprets AF_INCOMING_MSG frames: unwraps the AF header, then walks
//! the ZCL attribute stream inside, emitting typed sensor readings.

use crate::commands::{af, cmd0, CommandType, Subsystem};
use crate::frame::MtFrame;
use crate::zcl::{self, attr, cluster, command};

/// Offset of the ZCL payload within an AF_INCOMING_MSG payload
const ZCL_OFFSET: usize = 17;

/// Decoded AF packet
#[derive(Debug, Clone, PartialEq)]
pub enum AfPacket {
    /// An application message carrying a recognized reading
    IncomingMessage {
        src: u16,
        cluster_id: u16,
        reading: Reading,
    },
}

/// A typed sensor reading extracted from a ZCL attribute stream
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Temperature { src: u16, celsius: f32 },
    Humidity { src: u16, percent: f32 },
    Battery { src: u16, percent: f32 },
    OnOff { src: u16, is_on: bool },
    ActivePower { src: u16, watts: i16 },
    ButtonPress { src: u16 },
}

/// Decode an AF-subsystem frame
///
/// Only `AREQ|AF AF_INCOMING_MSG` produces packets; data confirms and
/// everything else are logged at debug and skipped.
#[must_use]
pub fn decode(frame: &MtFrame) -> Option<AfPacket> {
    if frame.cmd0 != cmd0(CommandType::Areq, Subsystem::Af) || frame.cmd1 != af::INCOMING_MSG {
        tracing::debug!(
            "Unhandled AF frame: cmd0={:#04X} cmd1={:#04X}",
            frame.cmd0,
            frame.cmd1
        );
        return None;
    }

    let p = &frame.payload;
    // AF header up to the ZCL length byte, plus the 3-byte ZCL header
    if p.len() < ZCL_OFFSET + 3 {
        tracing::debug!("AF_INCOMING_MSG too short ({} bytes)", p.len());
        return None;
    }

    let cluster_id = u16::from_le_bytes([p[2], p[3]]);
    let src = u16::from_le_bytes([p[4], p[5]]);
    let zcl_cmd = p[ZCL_OFFSET + 2];
    let body = &p[ZCL_OFFSET + 3..];

    tracing::debug!(
        "AF_INCOMING_MSG from {:#06X} ({}), ZCL cmd {:#04X}",
        src,
        zcl::cluster_name(cluster_id),
        zcl_cmd
    );

    let reading = match zcl_cmd {
        // Configure Reporting Response is a receipt; log the status only.
        command::CONFIGURE_REPORTING_RSP => {
            match body.first() {
                Some(0x00) => tracing::debug!("Reporting configured by {:#06X}", src),
                Some(status) => {
                    tracing::debug!("Reporting rejected by {:#06X}: status {:#04X}", src, status);
                }
                None => tracing::debug!("Empty configure-reporting response from {:#06X}", src),
            }
            None
        }

        // Cluster-specific Toggle on the On/Off cluster: a button press.
        0x02 if cluster_id == cluster::ON_OFF => Some(Reading::ButtonPress { src }),

        command::REPORT_ATTRIBUTES | command::READ_ATTRIBUTES_RSP => {
            walk_attributes(zcl_cmd, src, cluster_id, body)
        }

        other => {
            tracing::debug!("Unhandled ZCL command {:#04X} from {:#06X}", other, src);
            None
        }
    };

    reading.map(|reading| AfPacket::IncomingMessage {
        src,
        cluster_id,
        reading,
    })
}

/// Walk a ZCL attribute list and return the first recognized reading.
///
/// Real sensors pack variable numbers of attributes and variable-length
/// strings, so the walker derives each record's length from its data type
/// instead of assuming fixed offsets.
fn walk_attributes(zcl_cmd: u8, src: u16, cluster_id: u16, body: &[u8]) -> Option<Reading> {
    let mut cursor = 0;

    while cursor + 2 <= body.len() {
        let attr_id = u16::from_le_bytes([body[cursor], body[cursor + 1]]);
        cursor += 2;

        // Read-response records carry a status; failed records end there.
        if zcl_cmd == command::READ_ATTRIBUTES_RSP {
            let status = *body.get(cursor)?;
            cursor += 1;
            if status != 0 {
                tracing::debug!(
                    "Attribute {:#06X} read failed with status {:#04X}",
                    attr_id,
                    status
                );
                continue;
            }
        }

        let data_type = *body.get(cursor)?;
        cursor += 1;

        let len = match zcl::value_len(data_type, body.get(cursor).copied()) {
            Some(len) => len,
            None => {
                tracing::debug!("Unknown ZCL data type {:#04X}, stopping walk", data_type);
                return None;
            }
        };
        if cursor + len > body.len() {
            tracing::debug!("Attribute value truncated, stopping walk");
            return None;
        }

        let value = &body[cursor..cursor + len];
        cursor += len;

        if let Some(reading) = recognize(src, cluster_id, attr_id, value) {
            return Some(reading);
        }
        tracing::debug!(
            "Unrecognized reading: cluster {:#06X} attr {:#06X}",
            cluster_id,
            attr_id
        );
    }

    None
}

/// Map a (cluster, attribute) pair and its value bytes to a reading
fn recognize(src: u16, cluster_id: u16, attr_id: u16, value: &[u8]) -> Option<Reading> {
    match (cluster_id, attr_id) {
        (cluster::TEMPERATURE_MEASUREMENT, attr::MEASURED_VALUE) => {
            let raw = i16::from_le_bytes([*value.first()?, *value.get(1)?]);
            Some(Reading::Temperature {
                src,
                celsius: f32::from(raw) / 100.0,
            })
        }
        (cluster::HUMIDITY_MEASUREMENT, attr::MEASURED_VALUE) => {
            let raw = i16::from_le_bytes([*value.first()?, *value.get(1)?]);
            Some(Reading::Humidity {
                src,
                percent: f32::from(raw) / 100.0,
            })
        }
        (cluster::POWER_CONFIG, attr::BATTERY_PERCENTAGE) => {
            let raw = *value.first()?;
            Some(Reading::Battery {
                src,
                percent: f32::from(raw) / 2.0,
            })
        }
        (cluster::ON_OFF, attr::ON_OFF) => Some(Reading::OnOff {
            src,
            is_on: *value.first()? != 0,
        }),
        (cluster::ELECTRICAL_MEASUREMENT, attr::ACTIVE_POWER) => {
            let raw = i16::from_le_bytes([*value.first()?, *value.get(1)?]);
            Some(Reading::ActivePower { src, watts: raw })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an AF_INCOMING_MSG frame around a ZCL payload
    fn incoming_msg(src: u16, cluster_id: u16, zcl: &[u8]) -> MtFrame {
        let mut p = vec![0u8; ZCL_OFFSET];
        p[2..4].copy_from_slice(&cluster_id.to_le_bytes());
        p[4..6].copy_from_slice(&src.to_le_bytes());
        p[6] = 0x01; // source endpoint
        p[7] = 0x01; // destination endpoint
        p[16] = zcl.len() as u8;
        p.extend_from_slice(zcl);
        MtFrame::new(0x44, af::INCOMING_MSG, p)
    }

    #[test]
    fn test_temperature_report() {
        // Report Attributes, attr 0x0000, int16, 21.26 C
        let zcl = [0x18, 0x01, 0x0A, 0x00, 0x00, 0x29, 0x4E, 0x08];
        let packet = decode(&incoming_msg(0x16C5, 0x0402, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x16C5,
                cluster_id: 0x0402,
                reading: Reading::Temperature {
                    src: 0x16C5,
                    celsius: 21.26,
                },
            }
        );
    }

    #[test]
    fn test_humidity_report() {
        // uint16 on the wire; 54.00 percent
        let zcl = [0x18, 0x01, 0x0A, 0x00, 0x00, 0x21, 0x18, 0x15];
        let packet = decode(&incoming_msg(0x16C5, 0x0405, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x16C5,
                cluster_id: 0x0405,
                reading: Reading::Humidity {
                    src: 0x16C5,
                    percent: 54.0,
                },
            }
        );
    }

    #[test]
    fn test_battery_report() {
        let zcl = [0x18, 0x01, 0x0A, 0x21, 0x00, 0x20, 0xC8];
        let packet = decode(&incoming_msg(0x1234, 0x0001, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x1234,
                cluster_id: 0x0001,
                reading: Reading::Battery {
                    src: 0x1234,
                    percent: 100.0,
                },
            }
        );
    }

    #[test]
    fn test_on_off_report() {
        let zcl = [0x18, 0x01, 0x0A, 0x00, 0x00, 0x10, 0x01];
        let packet = decode(&incoming_msg(0x1234, 0x0006, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x1234,
                cluster_id: 0x0006,
                reading: Reading::OnOff {
                    src: 0x1234,
                    is_on: true,
                },
            }
        );
    }

    #[test]
    fn test_button_press() {
        // Cluster-specific Toggle command on On/Off
        let zcl = [0x01, 0x05, 0x02];
        let packet = decode(&incoming_msg(0x1234, 0x0006, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x1234,
                cluster_id: 0x0006,
                reading: Reading::ButtonPress { src: 0x1234 },
            }
        );
    }

    #[test]
    fn test_read_response_skips_failed_records() {
        // First record fails (status 0x86), second succeeds
        let zcl = [
            0x18, 0x01, 0x01, // header, cmd = Read Attributes Response
            0x01, 0x00, 0x86, // attr 0x0001: unsupported
            0x00, 0x00, 0x00, 0x29, 0x4E, 0x08, // attr 0x0000: 21.26 C
        ];
        let packet = decode(&incoming_msg(0x16C5, 0x0402, &zcl)).unwrap();
        assert_eq!(
            packet,
            AfPacket::IncomingMessage {
                src: 0x16C5,
                cluster_id: 0x0402,
                reading: Reading::Temperature {
                    src: 0x16C5,
                    celsius: 21.26,
                },
            }
        );
    }

    #[test]
    fn test_walker_skips_string_attribute() {
        // A char-string attribute precedes the recognized one
        let zcl = [
            0x18, 0x01, 0x0A, // header, Report
            0x05, 0x00, 0x42, 0x02, b'h', b'i', // attr 0x0005: string "hi"
            0x00, 0x00, 0x29, 0x4E, 0x08, // attr 0x0000: 21.26 C
        ];
        let packet = decode(&incoming_msg(0x16C5, 0x0402, &zcl)).unwrap();
        assert!(matches!(
            packet,
            AfPacket::IncomingMessage {
                reading: Reading::Temperature { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_first_recognized_reading_wins() {
        let zcl = [
            0x18, 0x01, 0x0A, // header, Report
            0x00, 0x00, 0x29, 0x4E, 0x08, // 21.26 C
            0x00, 0x00, 0x29, 0x10, 0x27, // 100.00 C, ignored
        ];
        let packet = decode(&incoming_msg(0x16C5, 0x0402, &zcl)).unwrap();
        assert!(matches!(
            packet,
            AfPacket::IncomingMessage {
                reading: Reading::Temperature { celsius, .. },
                ..
            } if (celsius - 21.26).abs() < f32::EPSILON
        ));
    }

    #[test]
    fn test_unknown_data_type_stops_walk() {
        let zcl = [0x18, 0x01, 0x0A, 0x00, 0x00, 0x4C, 0x00, 0x00];
        assert_eq!(decode(&incoming_msg(0x16C5, 0x0402, &zcl)), None);
    }

    #[test]
    fn test_truncated_value_yields_nothing() {
        let zcl = [0x18, 0x01, 0x0A, 0x00, 0x00, 0x29, 0x4E];
        assert_eq!(decode(&incoming_msg(0x16C5, 0x0402, &zcl)), None);
    }

    #[test]
    fn test_config_response_is_logged_only() {
        let zcl = [0x18, 0x01, 0x07, 0x00];
        assert_eq!(decode(&incoming_msg(0x16C5, 0x0402, &zcl)), None);
    }

    #[test]
    fn test_data_confirm_ignored() {
        let frame = MtFrame::new(0x44, af::DATA_CONFIRM, vec![0x00, 0x00, 0x00]);
        assert_eq!(decode(&frame), None);
    }
}
