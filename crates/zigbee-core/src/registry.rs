//! Device registry keyed by IEEE address
//!
//! Short addresses are network-assigned and unstable, so devices live under
//! their IEEE address with a secondary short-address index that is refreshed
//! on every announcement.

use crate::device::{Endpoint, ZigbeeDevice};
use crate::persistence;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

/// In-memory device registry with optional JSON persistence
pub struct DeviceRegistry {
    devices: HashMap<u64, ZigbeeDevice>,
    short_index: HashMap<u16, u64>,
    path: Option<PathBuf>,
}

impl DeviceRegistry {
    /// Create an empty, non-persisted registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            short_index: HashMap::new(),
            path: None,
        }
    }

    /// Load the registry from `path`; mutations save back to it
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let mut registry = Self::new();
        for device in persistence::load_devices(&path) {
            registry.short_index.insert(device.short_address, device.ieee_address);
            registry.devices.insert(device.ieee_address, device);
        }
        registry.path = Some(path);
        registry
    }

    /// Record a device announcement.
    ///
    /// A new IEEE address inserts a device; a known one refreshes its short
    /// address. Returns true when the device was not known before.
    pub fn record_announcement(&mut self, ieee_address: u64, short_address: u16) -> bool {
        let is_new = !self.devices.contains_key(&ieee_address);

        let device = self
            .devices
            .entry(ieee_address)
            .or_insert_with(|| ZigbeeDevice::new(ieee_address, short_address));
        if is_new {
            tracing::info!("New device discovered: {}", device.ieee_string());
        }
        device.short_address = short_address;
        device.last_seen = Some(Instant::now());

        self.short_index.insert(short_address, ieee_address);
        self.save();
        is_new
    }

    /// Store a discovered endpoint descriptor on a device
    pub fn set_endpoint(&mut self, short_address: u16, endpoint: Endpoint) {
        let Some(device) = self.device_by_short_mut(short_address) else {
            tracing::debug!(
                "Descriptor for unknown short address {:#06X}, ignoring",
                short_address
            );
            return;
        };

        device.endpoints.retain(|e| e.id != endpoint.id);
        device.endpoints.push(endpoint);
        self.save();
    }

    /// Assign a friendly name
    pub fn rename(&mut self, ieee_address: u64, name: impl Into<String>) {
        if let Some(device) = self.devices.get_mut(&ieee_address) {
            device.friendly_name = Some(name.into());
            self.save();
        }
    }

    /// Note that a device was heard from
    pub fn touch(&mut self, short_address: u16) {
        if let Some(device) = self.device_by_short_mut(short_address) {
            device.last_seen = Some(Instant::now());
        }
    }

    /// Look up a device by its current short address
    #[must_use]
    pub fn device_by_short(&self, short_address: u16) -> Option<&ZigbeeDevice> {
        let ieee = self.short_index.get(&short_address)?;
        self.devices.get(ieee)
    }

    fn device_by_short_mut(&mut self, short_address: u16) -> Option<&mut ZigbeeDevice> {
        let ieee = *self.short_index.get(&short_address)?;
        self.devices.get_mut(&ieee)
    }

    /// Display name for a short address, for log lines
    #[must_use]
    pub fn name_of(&self, short_address: u16) -> String {
        self.device_by_short(short_address)
            .map_or_else(|| "Unknown Device".to_string(), ZigbeeDevice::display_name)
    }

    /// All known devices
    pub fn devices(&self) -> impl Iterator<Item = &ZigbeeDevice> {
        self.devices.values()
    }

    /// Number of known devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let devices: Vec<_> = self.devices.values().cloned().collect();
        if let Err(e) = persistence::save_devices(path, &devices) {
            tracing::warn!("Failed to persist device registry: {}", e);
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
