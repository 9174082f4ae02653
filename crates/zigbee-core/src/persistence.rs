//! Device persistence using JSON file storage

use crate::device::ZigbeeDevice;
use std::fs;
use std::path::Path;

/// Load devices from a JSON file
///
/// A missing file is an empty registry; a corrupt file logs a warning and
/// starts fresh.
#[must_use]
pub fn load_devices(path: &Path) -> Vec<ZigbeeDevice> {
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Vec<ZigbeeDevice>>(&contents) {
            Ok(devices) => {
                tracing::info!("Loaded {} devices from {:?}", devices.len(), path);
                devices
            }
            Err(e) => {
                tracing::warn!("Failed to parse devices file {:?}: {}", path, e);
                Vec::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No devices file at {:?}, starting fresh", path);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Failed to read devices file {:?}: {}", path, e);
            Vec::new()
        }
    }
}

/// Save devices to a JSON file atomically
pub fn save_devices(path: &Path, devices: &[ZigbeeDevice]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(devices)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Write to a temp file, then rename
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)?;
    fs::rename(&tmp_path, path)?;

    tracing::debug!("Saved {} devices to {:?}", devices.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = std::env::temp_dir().join("zigbee-core-test-missing");
        assert!(load_devices(&dir.join("devices.json")).is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("zigbee-core-test-roundtrip");
        let path = dir.join("devices.json");

        let mut device = ZigbeeDevice::new(0x0012_4B00_14D8_A123, 0x16C5);
        device.friendly_name = Some("Sensor".to_string());
        save_devices(&path, &[device]).unwrap();

        let loaded = load_devices(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].ieee_address, 0x0012_4B00_14D8_A123);
        assert_eq!(loaded[0].friendly_name.as_deref(), Some("Sensor"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = std::env::temp_dir().join("zigbee-core-test-corrupt");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("devices.json");
        fs::write(&path, "not json at all").unwrap();

        assert!(load_devices(&path).is_empty());

        let _ = fs::remove_dir_all(&dir);
    }
}
