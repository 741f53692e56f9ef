// Mapper to convert domain points to InfluxDB data points
use crate::domain::telemetry::{TAG_KEY, TelemetryPoint};
use anyhow::Context;
use influxdb2::models::DataPoint;

pub fn point_to_influx(point: TelemetryPoint) -> anyhow::Result<DataPoint> {
    let mut builder = DataPoint::builder(point.measurement.as_str())
        .tag(TAG_KEY, point.tag_value.as_str())
        .timestamp(point.timestamp_ns);

    for (name, value) in point.fields() {
        builder = builder.field(name, value);
    }

    builder
        .build()
        .with_context(|| format!("invalid data point for measurement {}", point.measurement))
}
