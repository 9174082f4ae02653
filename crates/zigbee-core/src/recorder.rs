//! Append-only time-series log of sensor readings

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Records readings as `value, timestamp` lines in a text file
///
/// Recording must never stall the pump, so I/O failures are logged and
/// swallowed.
pub struct ReadingRecorder {
    path: PathBuf,
}

impl ReadingRecorder {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one reading with the current local time
    pub fn record(&self, value: f32) {
        if let Err(e) = self.append(value) {
            tracing::warn!("Failed to record reading to {:?}: {}", self.path, e);
        }
    }

    fn append(&self, value: f32) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "{value}, {timestamp}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_lines() {
        let dir = std::env::temp_dir().join("zigbee-core-test-recorder");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("temperature_readings.txt");

        let recorder = ReadingRecorder::new(path.clone());
        recorder.record(21.26);
        recorder.record(21.31);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("21.26, "));
        assert!(lines[1].starts_with("21.31, "));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
