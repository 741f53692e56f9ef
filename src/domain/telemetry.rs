// Telemetry data domain models
use serde::Deserialize;

/// Tag key every point carries; the reading's `tag` becomes its value.
pub const TAG_KEY: &str = "tag";

/// One sample as posted by the current logger.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    pub measurement: String,
    pub tag: String,
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub bat: f64,
    /// Device tick counter, see [`DeviceTimeUnit`](super::session::DeviceTimeUnit).
    pub timestamp: i64,
}

/// A write record for the time-series store.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    pub measurement: String,
    pub tag_value: String,
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub bat: f64,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

impl TelemetryPoint {
    pub fn from_reading(reading: Reading, timestamp_ns: i64) -> Self {
        Self {
            measurement: reading.measurement,
            tag_value: reading.tag,
            current: reading.current,
            voltage: reading.voltage,
            power: reading.power,
            bat: reading.bat,
            timestamp_ns,
        }
    }

    /// Field name/value pairs in write order.
    pub fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("current", self.current),
            ("voltage", self.voltage),
            ("power", self.power),
            ("bat", self.bat),
        ]
    }
}
