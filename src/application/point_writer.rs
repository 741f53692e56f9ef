// Writer port for the time-series store
use crate::domain::telemetry::TelemetryPoint;
use async_trait::async_trait;

#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Buffer a point for the next flush. Never talks to the store.
    async fn write(&self, point: TelemetryPoint) -> anyhow::Result<()>;

    /// Send every buffered point and wait for the store to answer.
    async fn flush(&self) -> anyhow::Result<()>;

    /// Number of points waiting for a flush
    fn buffered(&self) -> usize;
}
