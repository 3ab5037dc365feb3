//! Test data builders for creating test objects

use sensorvis_rs::config::secrets::{MySqlSecrets, SecretsFile};
use sensorvis_rs::{DeviceRecord, RawReading};

/// Builder for creating test devices
pub struct DeviceBuilder {
    id: i64,
    uuid: String,
    channels: Vec<String>,
}

impl DeviceBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            uuid: format!("device-{}", id),
            channels: Vec::new(),
        }
    }

    pub fn uuid(mut self, uuid: &str) -> Self {
        self.uuid = uuid.to_string();
        self
    }

    pub fn channels(mut self, channels: &[&str]) -> Self {
        self.channels = channels.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> DeviceRecord {
        DeviceRecord::new(self.id, self.uuid, self.channels)
    }
}

/// `count` tilt rows for one instrument, newest first, one per hour
pub fn tilt_rows(instrument: &str, count: u32) -> Vec<RawReading> {
    (0..count)
        .rev()
        .map(|h| RawReading::tilt(super::at_hour(h), instrument, h as f64, -(h as f64)))
        .collect()
}

/// Secret store pointing at the given host
pub fn secrets_for(host: &str) -> SecretsFile {
    SecretsFile {
        mysql: Some(MySqlSecrets {
            host: host.to_string(),
            user: "monitor".to_string(),
            database: "safety".to_string(),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_builder() {
        let device = DeviceBuilder::new(3).channels(&["a", "b"]).build();

        assert_eq!(device.id, 3);
        assert_eq!(device.uuid, "device-3");
        assert_eq!(device.sensor_channels, vec!["a", "b"]);
    }
}
