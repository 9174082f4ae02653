//! ZCL (Zigbee Cluster Library) definitions and AF request builders

use crate::commands::{af, CommandType, Subsystem};
use crate::frame::MtFrame;

/// Home Automation profile id
pub const HA_PROFILE: u16 = 0x0104;

/// Common ZCL cluster ids
pub mod cluster {
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const ON_OFF: u16 = 0x0006;
    pub const LEVEL_CONTROL: u16 = 0x0008;
    pub const COLOR_CONTROL: u16 = 0x0300;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    pub const HUMIDITY_MEASUREMENT: u16 = 0x0405;

    // The wire codes as observed; 0x0702 is summation metering and 0x0B04
    // instantaneous electrical measurement per the ZCL standard.
    pub const METERING: u16 = 0x0702;
    pub const ELECTRICAL_MEASUREMENT: u16 = 0x0B04;
}

/// Attribute ids recognized by the reading decoder
pub mod attr {
    /// MeasuredValue, shared by the measurement clusters
    pub const MEASURED_VALUE: u16 = 0x0000;
    /// Power Configuration: BatteryPercentageRemaining
    pub const BATTERY_PERCENTAGE: u16 = 0x0021;
    /// On/Off: OnOff
    pub const ON_OFF: u16 = 0x0000;
    /// Electrical Measurement: ActivePower
    pub const ACTIVE_POWER: u16 = 0x050B;
}

/// ZCL global command ids
pub mod command {
    pub const READ_ATTRIBUTES: u8 = 0x00;
    pub const READ_ATTRIBUTES_RSP: u8 = 0x01;
    pub const WRITE_ATTRIBUTES: u8 = 0x02;
    pub const CONFIGURE_REPORTING: u8 = 0x06;
    pub const CONFIGURE_REPORTING_RSP: u8 = 0x07;
    pub const READ_REPORTING_CONFIG: u8 = 0x08;
    pub const REPORT_ATTRIBUTES: u8 = 0x0A;
    pub const DEFAULT_RSP: u8 = 0x0B;
}

/// ZCL data type codes
pub mod data_type {
    pub const BOOLEAN: u8 = 0x10;
    pub const BITMAP8: u8 = 0x18;
    pub const BITMAP16: u8 = 0x19;
    pub const UINT8: u8 = 0x20;
    pub const UINT16: u8 = 0x21;
    pub const UINT32: u8 = 0x23;
    pub const INT16: u8 = 0x29;
    pub const INT32: u8 = 0x2B;
    pub const ENUM8: u8 = 0x30;
    pub const FLOAT32: u8 = 0x39;
    pub const CHAR_STRING: u8 = 0x42;
}

/// Wire length of a ZCL typed value, excluding the string length prefix.
///
/// Character strings carry their own 1-byte length; callers pass the first
/// value byte to resolve it. Unknown type codes return `None`, which stops
/// the attribute walker.
#[must_use]
pub fn value_len(ty: u8, first_value_byte: Option<u8>) -> Option<usize> {
    match ty {
        data_type::BOOLEAN | data_type::BITMAP8 | data_type::UINT8 | data_type::ENUM8 => Some(1),
        data_type::BITMAP16 | data_type::UINT16 | data_type::INT16 => Some(2),
        data_type::UINT32 | data_type::INT32 | data_type::FLOAT32 => Some(4),
        data_type::CHAR_STRING => first_value_byte.map(|n| 1 + n as usize),
        _ => None,
    }
}

/// Reporting defaults used by `configure_reporting`
pub const REPORT_MIN_INTERVAL_S: u16 = 10;
pub const REPORT_MAX_INTERVAL_S: u16 = 600;
pub const REPORTABLE_CHANGE: u16 = 20;

/// Wrap a ZCL payload in an AF_DATA_REQUEST frame.
///
/// AF header: destination short address, endpoints fixed at 1 on both
/// sides, transaction id 0, default options, radius 0x0F.
fn wrap_af_data_request(dst_short_addr: u16, cluster_id: u16, zcl: &[u8]) -> MtFrame {
    let mut payload = Vec::with_capacity(10 + zcl.len());
    payload.extend_from_slice(&dst_short_addr.to_le_bytes());
    payload.push(0x01); // destination endpoint
    payload.push(0x01); // source endpoint
    payload.extend_from_slice(&cluster_id.to_le_bytes());
    payload.push(0x00); // transaction id
    payload.push(0x00); // options
    payload.push(0x0F); // radius
    payload.push(zcl.len() as u8);
    payload.extend_from_slice(zcl);

    MtFrame::command(CommandType::Sreq, Subsystem::Af, af::DATA_REQUEST, payload)
}

/// Read Attributes request for a single attribute
#[must_use]
pub fn read_attributes(dst_short_addr: u16, cluster_id: u16, attr_id: u16, seq: u8) -> MtFrame {
    let mut zcl = vec![0x00, seq, command::READ_ATTRIBUTES];
    zcl.extend_from_slice(&attr_id.to_le_bytes());
    wrap_af_data_request(dst_short_addr, cluster_id, &zcl)
}

/// Read Attributes preset for the temperature MeasuredValue
#[must_use]
pub fn read_temperature(dst_short_addr: u16, seq: u8) -> MtFrame {
    read_attributes(
        dst_short_addr,
        cluster::TEMPERATURE_MEASUREMENT,
        attr::MEASURED_VALUE,
        seq,
    )
}

/// Read Attributes preset for the humidity MeasuredValue
#[must_use]
pub fn read_humidity(dst_short_addr: u16, seq: u8) -> MtFrame {
    read_attributes(
        dst_short_addr,
        cluster::HUMIDITY_MEASUREMENT,
        attr::MEASURED_VALUE,
        seq,
    )
}

/// Configure Reporting for MeasuredValue on the given cluster.
///
/// Reports every 10 s to 10 min, on a change of 20 raw units (0.20 in the
/// scaled measurement clusters).
#[must_use]
pub fn configure_reporting(
    dst_short_addr: u16,
    cluster_id: u16,
    data_type: u8,
    seq: u8,
) -> MtFrame {
    let mut zcl = vec![0x00, seq, command::CONFIGURE_REPORTING];
    zcl.push(0x00); // direction: reported
    zcl.extend_from_slice(&attr::MEASURED_VALUE.to_le_bytes());
    zcl.push(data_type);
    zcl.extend_from_slice(&REPORT_MIN_INTERVAL_S.to_le_bytes());
    zcl.extend_from_slice(&REPORT_MAX_INTERVAL_S.to_le_bytes());
    zcl.extend_from_slice(&REPORTABLE_CHANGE.to_le_bytes());
    wrap_af_data_request(dst_short_addr, cluster_id, &zcl)
}

/// Read Reporting Configuration for MeasuredValue on the given cluster
#[must_use]
pub fn read_reporting_config(dst_short_addr: u16, cluster_id: u16, seq: u8) -> MtFrame {
    let mut zcl = vec![0x00, seq, command::READ_REPORTING_CONFIG];
    zcl.push(0x00); // direction: reported
    zcl.extend_from_slice(&attr::MEASURED_VALUE.to_le_bytes());
    wrap_af_data_request(dst_short_addr, cluster_id, &zcl)
}

/// Human-readable cluster name for log lines
#[must_use]
pub fn cluster_name(cluster_id: u16) -> String {
    let name = match cluster_id {
        cluster::BASIC => Some("Basic"),
        cluster::POWER_CONFIG => Some("Power Configuration"),
        cluster::ON_OFF => Some("On/Off"),
        cluster::LEVEL_CONTROL => Some("Level Control"),
        cluster::COLOR_CONTROL => Some("Color Control"),
        cluster::TEMPERATURE_MEASUREMENT => Some("Temperature Measurement"),
        cluster::HUMIDITY_MEASUREMENT => Some("Humidity Measurement"),
        cluster::METERING => Some("Metering"),
        cluster::ELECTRICAL_MEASUREMENT => Some("Electrical Measurement"),
        _ => None,
    };

    match name {
        Some(n) => n.to_string(),
        None => format!("Unknown Cluster {cluster_id:#06X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_attributes_layout() {
        let frame = read_temperature(0x16C5, 0x01);
        assert_eq!(frame.cmd0, 0x24);
        assert_eq!(frame.cmd1, af::DATA_REQUEST);
        assert_eq!(
            frame.payload,
            vec![
                0xC5, 0x16, // destination
                0x01, 0x01, // endpoints
                0x02, 0x04, // cluster 0x0402
                0x00, 0x00, 0x0F, // trans id, options, radius
                0x05, // ZCL length
                0x00, 0x01, 0x00, // ZCL header
                0x00, 0x00, // attr id 0x0000
            ]
        );
    }

    #[test]
    fn test_configure_reporting_layout() {
        let frame = configure_reporting(0x16C5, cluster::HUMIDITY_MEASUREMENT, data_type::INT16, 0x11);
        let zcl = &frame.payload[10..];
        assert_eq!(
            zcl,
            &[
                0x00, 0x11, 0x06, // header
                0x00, // direction
                0x00, 0x00, // attr id
                0x29, // int16
                0x0A, 0x00, // min 10 s
                0x58, 0x02, // max 600 s
                0x14, 0x00, // change 20
            ]
        );
    }

    #[test]
    fn test_value_len_table() {
        assert_eq!(value_len(data_type::BOOLEAN, None), Some(1));
        assert_eq!(value_len(data_type::INT16, None), Some(2));
        assert_eq!(value_len(data_type::FLOAT32, None), Some(4));
        assert_eq!(value_len(data_type::CHAR_STRING, Some(4)), Some(5));
        assert_eq!(value_len(data_type::CHAR_STRING, None), None);
        assert_eq!(value_len(0x4C, None), None);
    }
}
