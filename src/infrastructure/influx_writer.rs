// InfluxDB writer implementation
use crate::application::point_writer::PointWriter;
use crate::domain::telemetry::TelemetryPoint;
use crate::infrastructure::config::InfluxSettings;
use crate::infrastructure::point_mapper::point_to_influx;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream;
use influxdb2::Client;
use influxdb2::api::write::TimestampPrecision;
use influxdb2::models::DataPoint;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Buffers points in memory and writes them to an InfluxDB 2.x bucket
/// with nanosecond precision.
///
/// `write` only buffers. Nothing reaches the network until `flush`, which
/// sends the buffer in requests of at most `batch_size` points, each bounded
/// by `write_timeout`.
pub struct InfluxWriter {
    client: Client,
    bucket: String,
    batch_size: usize,
    write_timeout: Duration,
    buffer: Mutex<Vec<DataPoint>>,
}

impl InfluxWriter {
    pub fn new(settings: &InfluxSettings) -> Self {
        Self {
            client: Client::new(
                settings.url.trim_end_matches('/'),
                &settings.org,
                &settings.token,
            ),
            bucket: settings.bucket.clone(),
            batch_size: settings.batch_size.max(1),
            write_timeout: Duration::from_millis(settings.write_timeout_ms),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Whether the server reports itself ready.
    pub async fn is_ready(&self) -> bool {
        match self.client.ready().await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!(error = %e, "InfluxDB readiness check failed");
                false
            }
        }
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<DataPoint>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn write_chunk(&self, chunk: Vec<DataPoint>) -> Result<()> {
        let count = chunk.len();
        let request = self.client.write_with_precision(
            &self.bucket,
            stream::iter(chunk),
            TimestampPrecision::Nanoseconds,
        );

        tokio::time::timeout(self.write_timeout, request)
            .await
            .with_context(|| {
                format!("write of {count} points timed out after {:?}", self.write_timeout)
            })?
            .with_context(|| format!("InfluxDB rejected a write of {count} points"))
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write(&self, point: TelemetryPoint) -> Result<()> {
        let data_point = point_to_influx(point)?;
        self.buffer().push(data_point);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let points = std::mem::take(&mut *self.buffer());
        if points.is_empty() {
            return Ok(());
        }

        // Points are dropped on failure; the logger does not resend.
        let total = points.len();
        let mut failed = 0;
        let mut last_error = None;
        let mut points = points.into_iter().peekable();
        while points.peek().is_some() {
            let chunk: Vec<DataPoint> = points.by_ref().take(self.batch_size).collect();
            let count = chunk.len();
            if let Err(e) = self.write_chunk(chunk).await {
                tracing::warn!(error = %e, count, bucket = %self.bucket, "dropping points");
                failed += count;
                last_error = Some(e);
            }
        }

        match last_error {
            None => {
                tracing::debug!(count = total, bucket = %self.bucket, "flushed points to InfluxDB");
                Ok(())
            }
            Some(e) => Err(e.context(format!(
                "failed to write {failed} of {total} points to bucket {}",
                self.bucket
            ))),
        }
    }

    fn buffered(&self) -> usize {
        self.buffer().len()
    }
}
