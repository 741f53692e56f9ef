// Ingest service - Stamps logger readings and forwards them to the store
use crate::application::clock::WallClock;
use crate::application::point_writer::PointWriter;
use crate::domain::error::IngestError;
use crate::domain::session::{DeviceTimeUnit, SessionClock, StampError};
use crate::domain::telemetry::{Reading, TelemetryPoint};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What the `DATA` field of an acknowledgment counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Readings ingested since the process started.
    #[default]
    Cumulative,
    /// Readings in the current request only.
    PerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReceipt {
    /// Readings accepted from this request
    pub accepted: usize,
    /// Value reported back to the client, per [`CountMode`].
    pub count: u64,
}

struct IngestState {
    session: SessionClock,
    total: u64,
}

#[derive(Clone)]
pub struct IngestService {
    writer: Arc<dyn PointWriter>,
    clock: Arc<dyn WallClock>,
    count_mode: CountMode,
    state: Arc<Mutex<IngestState>>,
}

impl IngestService {
    pub fn new(
        writer: Arc<dyn PointWriter>,
        clock: Arc<dyn WallClock>,
        unit: DeviceTimeUnit,
        count_mode: CountMode,
    ) -> Self {
        Self {
            writer,
            clock,
            count_mode,
            state: Arc::new(Mutex::new(IngestState {
                session: SessionClock::new(unit),
                total: 0,
            })),
        }
    }

    /// Ingest one request body holding a JSON array of readings.
    ///
    /// The batch is all-or-nothing: a body that fails to parse or a single
    /// bad reading rejects the whole request before any point is written
    /// and before the session state changes. The flush runs after the
    /// session lock is released, so a slow store never blocks other batches
    /// from being stamped and buffered.
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestReceipt, IngestError> {
        let readings = decode_batch(body)?;

        let receipt = {
            // Held across buffering so two batches never interleave their
            // anchor decisions or their points.
            let mut state = self.state.lock().await;

            let mut session = state.session;
            let mut points = Vec::with_capacity(readings.len());
            for (index, reading) in readings.into_iter().enumerate() {
                let previous_tick = session.last_seen();
                let stamped = session
                    .observe(reading.timestamp, || self.clock.now().timestamp_nanos_opt())
                    .map_err(|e| match e {
                        StampError::Overflow => IngestError::TimestampOutOfRange { index },
                        StampError::WallClock => IngestError::WallClock,
                    })?;
                if let (true, Some(anchor)) = (stamped.new_session, session.anchor()) {
                    tracing::info!(
                        device_epoch = anchor.device_epoch,
                        wall_clock_ns = anchor.wall_clock_ns,
                        previous_tick = ?previous_tick,
                        "logging session started"
                    );
                }
                points.push(TelemetryPoint::from_reading(reading, stamped.timestamp_ns));
            }
            state.session = session;

            let accepted = points.len();
            for point in points {
                if let Err(e) = self.writer.write(point).await {
                    tracing::error!(error = %e, "failed to buffer point");
                }
            }
            state.total += accepted as u64;

            IngestReceipt {
                accepted,
                count: match self.count_mode {
                    CountMode::Cumulative => state.total,
                    CountMode::PerRequest => accepted as u64,
                },
            }
        };

        tracing::info!(
            accepted = receipt.accepted,
            count = receipt.count,
            "received data"
        );

        if receipt.accepted > 0 {
            if let Err(e) = self.writer.flush().await {
                tracing::error!(error = %e, "failed to flush points to the store");
            }
        }

        Ok(receipt)
    }

    #[cfg(test)]
    async fn session(&self) -> SessionClock {
        self.state.lock().await.session
    }
}

fn decode_batch(body: &[u8]) -> Result<Vec<Reading>, IngestError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(IngestError::Parse)?;
    let serde_json::Value::Array(items) = value else {
        return Err(IngestError::Validation(
            "expected a JSON array of readings".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| IngestError::invalid_reading(index, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clock::testing::SteppingClock;
    use crate::application::point_writer::testing::RecordingWriter;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::time::Duration;

    const MS: i64 = 1_000_000;

    fn start_ns() -> i64 {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap()
            .timestamp_nanos_opt()
            .unwrap()
    }

    fn service(writer: Arc<RecordingWriter>, count_mode: CountMode) -> IngestService {
        let clock = SteppingClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            TimeDelta::seconds(60),
        );
        IngestService::new(
            writer,
            Arc::new(clock),
            DeviceTimeUnit::Milliseconds,
            count_mode,
        )
    }

    fn batch(ticks: &[i64]) -> Vec<u8> {
        let readings: Vec<serde_json::Value> = ticks
            .iter()
            .map(|tick| {
                serde_json::json!({
                    "measurement": "currentlogger",
                    "tag": "currentch1",
                    "timestamp": tick,
                    "current": 0.5,
                    "voltage": 5.01,
                    "power": 2.505,
                    "bat": 80.0,
                })
            })
            .collect();
        serde_json::to_vec(&readings).unwrap()
    }

    #[tokio::test]
    async fn test_increasing_ticks_share_one_anchor_across_requests() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        service.ingest(&batch(&[1_000, 1_250])).await.unwrap();
        service.ingest(&batch(&[1_500, 4_000])).await.unwrap();

        let stamps: Vec<i64> = writer.flushed().iter().map(|p| p.timestamp_ns).collect();
        assert_eq!(
            stamps,
            vec![
                start_ns(),
                start_ns() + 250 * MS,
                start_ns() + 500 * MS,
                start_ns() + 3_000 * MS,
            ]
        );
    }

    #[tokio::test]
    async fn test_backwards_tick_restarts_session() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        service.ingest(&batch(&[100, 200, 150, 300])).await.unwrap();

        let second_anchor = start_ns() + 60_000 * MS;
        let stamps: Vec<i64> = writer.flushed().iter().map(|p| p.timestamp_ns).collect();
        assert_eq!(
            stamps,
            vec![
                start_ns(),
                start_ns() + 100 * MS,
                second_anchor,
                second_anchor + 150 * MS,
            ]
        );
        let anchor = service.session().await.anchor().unwrap();
        assert_eq!(anchor.device_epoch, 150);
    }

    #[tokio::test]
    async fn test_points_follow_input_order() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);
        let body = br#"[
            {"measurement":"m1","tag":"a","timestamp":1,"current":1,"voltage":2,"power":3,"bat":4},
            {"measurement":"m2","tag":"b","timestamp":2,"current":5,"voltage":6,"power":7,"bat":8}
        ]"#;

        let receipt = service.ingest(body).await.unwrap();

        assert_eq!(receipt.accepted, 2);
        let points = writer.flushed();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].measurement, "m1");
        assert_eq!(points[0].tag_value, "a");
        assert_eq!(points[1].measurement, "m2");
        assert_eq!(points[1].bat, 8.0);
        assert_eq!(writer.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_body_writes_nothing() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        let err = service.ingest(b"[{\"measurement\":").await.unwrap_err();

        assert!(matches!(err, IngestError::Parse(_)));
        assert!(writer.flushed().is_empty());
        assert_eq!(writer.buffered(), 0);
        assert_eq!(writer.flush_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_field_rejects_whole_batch() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);
        let body = br#"[
            {"measurement":"m","tag":"t","timestamp":10,"current":1,"voltage":2,"power":3,"bat":4},
            {"measurement":"m","tag":"t","timestamp":20,"current":1,"voltage":2,"power":3}
        ]"#;

        let err = service.ingest(body).await.unwrap_err();

        match err {
            IngestError::Validation(message) => {
                assert!(message.contains("index 1"), "{message}");
                assert!(message.contains("bat"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(writer.flushed().is_empty());
        assert_eq!(service.session().await.last_seen(), None);
    }

    #[tokio::test]
    async fn test_non_array_body_is_invalid() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        let err = service.ingest(br#"{"DATA": 1}"#).await.unwrap_err();

        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_count() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        let first = service.ingest(&batch(&[1, 2, 3])).await.unwrap();
        let empty = service.ingest(b"[]").await.unwrap();

        assert_eq!(first.count, 3);
        assert_eq!(empty.accepted, 0);
        assert_eq!(empty.count, 3);
        assert_eq!(writer.flushed().len(), 3);
    }

    #[tokio::test]
    async fn test_count_modes() {
        let cumulative = service(Arc::new(RecordingWriter::default()), CountMode::Cumulative);
        let per_request = service(Arc::new(RecordingWriter::default()), CountMode::PerRequest);

        for service in [&cumulative, &per_request] {
            service.ingest(&batch(&[1, 2])).await.unwrap();
        }

        assert_eq!(cumulative.ingest(&batch(&[3])).await.unwrap().count, 3);
        assert_eq!(per_request.ingest(&batch(&[3])).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_flush_failure_still_acknowledges() {
        let writer = Arc::new(RecordingWriter::failing());
        let service = service(writer.clone(), CountMode::Cumulative);

        let receipt = service.ingest(&batch(&[5, 6])).await.unwrap();

        assert_eq!(receipt.count, 2);
        assert_eq!(writer.flush_count(), 1);
        assert!(writer.flushed().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_tick_rejects_batch() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        let err = service.ingest(&batch(&[0, i64::MAX])).await.unwrap_err();

        assert!(matches!(err, IngestError::TimestampOutOfRange { index: 1 }));
        assert!(writer.flushed().is_empty());
        assert_eq!(service.session().await.anchor(), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_wall_clock_is_not_blamed_on_the_reading() {
        let writer = Arc::new(RecordingWriter::default());
        let clock = SteppingClock::new(
            Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap(),
            TimeDelta::seconds(1),
        );
        let service = IngestService::new(
            writer.clone(),
            Arc::new(clock),
            DeviceTimeUnit::Milliseconds,
            CountMode::Cumulative,
        );

        let err = service.ingest(&batch(&[1, 2])).await.unwrap_err();

        assert!(matches!(err, IngestError::WallClock), "{err:?}");
        assert!(writer.flushed().is_empty());
        assert_eq!(service.session().await.anchor(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_do_not_interleave() {
        let writer = Arc::new(RecordingWriter::default());
        let service = service(writer.clone(), CountMode::Cumulative);

        let tagged = |tag: &str, len: i64| -> Vec<u8> {
            let readings: Vec<serde_json::Value> = (0..len)
                .map(|tick| {
                    serde_json::json!({
                        "measurement": "currentlogger",
                        "tag": tag,
                        "timestamp": tick,
                        "current": 0.5,
                        "voltage": 5.0,
                        "power": 2.5,
                        "bat": 80.0,
                    })
                })
                .collect();
            serde_json::to_vec(&readings).unwrap()
        };
        let (first, second) = (tagged("ch1", 50), tagged("ch2", 30));

        let (a, b) = tokio::join!(
            tokio::spawn({
                let service = service.clone();
                async move { service.ingest(&first).await.unwrap() }
            }),
            tokio::spawn({
                let service = service.clone();
                async move { service.ingest(&second).await.unwrap() }
            }),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut counts = [a.count, b.count];
        counts.sort_unstable();
        assert!(counts == [50, 80] || counts == [30, 80], "{counts:?}");

        let tags: Vec<String> = writer.flushed().into_iter().map(|p| p.tag_value).collect();
        assert_eq!(tags.len(), 80);
        let switches = tags.windows(2).filter(|pair| pair[0] != pair[1]).count();
        assert_eq!(switches, 1, "batches interleaved: {tags:?}");

        // Each batch starts its own session and keeps its ticks in order.
        for tag in ["ch1", "ch2"] {
            let stamps: Vec<i64> = writer
                .flushed()
                .into_iter()
                .filter(|p| p.tag_value == tag)
                .map(|p| p.timestamp_ns)
                .collect();
            assert!(stamps.windows(2).all(|pair| pair[1] - pair[0] == MS), "{tag}");
        }
    }

    /// Buffers like a real writer but its flush never completes.
    #[derive(Default)]
    struct StalledWriter {
        written: std::sync::Mutex<usize>,
        flush_started: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl PointWriter for StalledWriter {
        async fn write(&self, _point: TelemetryPoint) -> anyhow::Result<()> {
            *self.written.lock().unwrap() += 1;
            Ok(())
        }

        async fn flush(&self) -> anyhow::Result<()> {
            self.flush_started.notify_one();
            std::future::pending::<()>().await;
            Ok(())
        }

        fn buffered(&self) -> usize {
            *self.written.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn test_stalled_flush_does_not_block_other_batches() {
        let writer = Arc::new(StalledWriter::default());
        let service = IngestService::new(
            writer.clone(),
            Arc::new(crate::application::clock::SystemClock),
            DeviceTimeUnit::Milliseconds,
            CountMode::Cumulative,
        );

        let stuck = tokio::spawn({
            let service = service.clone();
            async move { service.ingest(&batch(&[1])).await }
        });
        writer.flush_started.notified().await;

        let empty = tokio::time::timeout(Duration::from_secs(2), service.ingest(b"[]"))
            .await
            .expect("empty batch waited on another request's flush")
            .unwrap();
        assert_eq!(empty.count, 1);

        // A non-empty batch still gets stamped and buffered; only its own
        // flush waits on the store.
        let next = tokio::spawn({
            let service = service.clone();
            async move { service.ingest(&batch(&[2, 3])).await }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            while writer.buffered() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("second batch was never buffered");

        stuck.abort();
        next.abort();
    }
}
