// Session timing - maps device ticks onto wall-clock time
use serde::Deserialize;

/// Unit of the device's tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTimeUnit {
    Seconds,
    #[default]
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl DeviceTimeUnit {
    fn nanos_per_tick(self) -> i64 {
        match self {
            DeviceTimeUnit::Seconds => 1_000_000_000,
            DeviceTimeUnit::Milliseconds => 1_000_000,
            DeviceTimeUnit::Microseconds => 1_000,
            DeviceTimeUnit::Nanoseconds => 1,
        }
    }

    pub fn to_nanos(self, ticks: i64) -> Option<i64> {
        ticks.checked_mul(self.nanos_per_tick())
    }
}

/// Origin of a session: the device tick seen first and the wall-clock time it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub device_epoch: i64,
    pub wall_clock_ns: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampError {
    /// The wall clock cannot be expressed as nanoseconds since the epoch.
    WallClock,
    /// The absolute timestamp does not fit in an `i64`.
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamped {
    pub timestamp_ns: i64,
    pub new_session: bool,
}

/// Tracks the current session and converts device ticks to absolute time.
///
/// A session starts on the first reading ever and again whenever a tick is
/// strictly smaller than the one before it (the device rebooted and its
/// counter restarted). Every reading is evaluated on its own, so a single
/// backwards step re-anchors even when the next tick resumes the old run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    unit: DeviceTimeUnit,
    last_seen: Option<i64>,
    anchor: Option<Anchor>,
}

impl SessionClock {
    pub fn new(unit: DeviceTimeUnit) -> Self {
        Self {
            unit,
            last_seen: None,
            anchor: None,
        }
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.last_seen
    }

    /// Record `device_ts` and return its absolute timestamp in nanoseconds.
    ///
    /// `now_ns` is only called when a new session starts; `None` from it
    /// means the wall clock is out of range and leaves the state untouched.
    pub fn observe(
        &mut self,
        device_ts: i64,
        now_ns: impl FnOnce() -> Option<i64>,
    ) -> Result<Stamped, StampError> {
        let starts_session = self.last_seen.is_none_or(|last| device_ts < last);
        let anchor = match self.anchor {
            Some(anchor) if !starts_session => anchor,
            _ => {
                let anchor = Anchor {
                    device_epoch: device_ts,
                    wall_clock_ns: now_ns().ok_or(StampError::WallClock)?,
                };
                self.anchor = Some(anchor);
                anchor
            }
        };
        self.last_seen = Some(device_ts);

        let timestamp_ns = device_ts
            .checked_sub(anchor.device_epoch)
            .and_then(|ticks| self.unit.to_nanos(ticks))
            .and_then(|offset| anchor.wall_clock_ns.checked_add(offset))
            .ok_or(StampError::Overflow)?;
        Ok(Stamped {
            timestamp_ns,
            new_session: starts_session,
        })
    }
}
