//! Zigbee device representation

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A Zigbee device paired to our network
///
/// The IEEE address is the stable identity; the short address is assigned
/// by the network and may change across rejoins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZigbeeDevice {
    /// IEEE address (EUI-64)
    pub ieee_address: u64,
    /// Network short address
    pub short_address: u16,
    /// User-assigned friendly name
    pub friendly_name: Option<String>,
    /// Device endpoints, filled in by discovery
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Last time the device said anything
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl ZigbeeDevice {
    /// Create a new device with just address info
    #[must_use]
    pub fn new(ieee_address: u64, short_address: u16) -> Self {
        Self {
            ieee_address,
            short_address,
            friendly_name: None,
            endpoints: Vec::new(),
            last_seen: None,
        }
    }

    /// IEEE address as humans read it (big-endian, colon-separated)
    #[must_use]
    pub fn ieee_string(&self) -> String {
        self.ieee_address
            .to_be_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Display name: friendly name if set, IEEE address otherwise
    #[must_use]
    pub fn display_name(&self) -> String {
        self.friendly_name
            .clone()
            .unwrap_or_else(|| self.ieee_string())
    }

    /// IEEE address in wire order (little-endian), for bind requests
    #[must_use]
    pub fn ieee_wire_bytes(&self) -> [u8; 8] {
        self.ieee_address.to_le_bytes()
    }
}

/// A device endpoint, from a simple descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint id (1-240)
    pub id: u8,
    /// Profile id (e.g. 0x0104 for Home Automation)
    pub profile_id: u16,
    /// Device id within the profile
    pub device_id: u16,
    /// Input (server) clusters
    pub in_clusters: Vec<u16>,
    /// Output (client) clusters
    pub out_clusters: Vec<u16>,
}

impl Endpoint {
    /// Check if the endpoint carries a specific cluster
    #[must_use]
    pub fn has_cluster(&self, cluster_id: u16) -> bool {
        self.in_clusters.contains(&cluster_id) || self.out_clusters.contains(&cluster_id)
    }

    /// Temperature measurement cluster present
    #[must_use]
    pub fn has_temperature(&self) -> bool {
        self.has_cluster(0x0402)
    }

    /// Humidity measurement cluster present
    #[must_use]
    pub fn has_humidity(&self) -> bool {
        self.has_cluster(0x0405)
    }

    /// On/Off cluster present
    #[must_use]
    pub fn is_on_off(&self) -> bool {
        self.has_cluster(0x0006)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ieee_string_big_endian() {
        let device = ZigbeeDevice::new(0x0012_4B00_14D8_A123, 0x16C5);
        assert_eq!(device.ieee_string(), "00:12:4b:00:14:d8:a1:23");
    }

    #[test]
    fn test_ieee_wire_bytes_little_endian() {
        let device = ZigbeeDevice::new(0x0012_4B00_14D8_A123, 0x16C5);
        assert_eq!(
            device.ieee_wire_bytes(),
            [0x23, 0xA1, 0xD8, 0x14, 0x00, 0x4B, 0x12, 0x00]
        );
    }

    #[test]
    fn test_display_name_falls_back_to_ieee() {
        let mut device = ZigbeeDevice::new(0x0012_4B00_14D8_A123, 0x16C5);
        assert_eq!(device.display_name(), device.ieee_string());
        device.friendly_name = Some("Living Room Sensor".to_string());
        assert_eq!(device.display_name(), "Living Room Sensor");
    }

    #[test]
    fn test_endpoint_cluster_helpers() {
        let endpoint = Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0x0302,
            in_clusters: vec![0x0402, 0x0405],
            out_clusters: vec![0x0006],
        };
        assert!(endpoint.has_temperature());
        assert!(endpoint.has_humidity());
        assert!(endpoint.is_on_off());
        assert!(!endpoint.has_cluster(0x0300));
    }
}
