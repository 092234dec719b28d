//! Timestamps with nanosecond precision.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Earliest representable second: 0001-01-01T00:00:00Z.
pub const MIN_SECONDS: i64 = -62_135_596_800;

/// Latest representable second: 9999-12-31T23:59:59Z.
pub const MAX_SECONDS: i64 = 253_402_300_799;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i32 = 1_000_000;

/// A point in time as `(seconds, nanoseconds)` since the Unix epoch.
///
/// `nanos` is always in `[0, 999_999_999]`, so instants before the epoch
/// carry a negative `seconds` and a positive `nanos`. Conversions through
/// [`Timestamp::to_millis`] are the only lossy ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimestamp")]
pub struct Timestamp {
    seconds: i64,
    nanos: i32,
}

#[derive(Deserialize)]
struct RawTimestamp {
    #[serde(default)]
    seconds: i64,
    #[serde(default)]
    nanos: i32,
}

impl TryFrom<RawTimestamp> for Timestamp {
    type Error = CodecError;

    fn try_from(raw: RawTimestamp) -> CodecResult<Self> {
        Timestamp::new(raw.seconds, raw.nanos)
    }
}

impl Timestamp {
    /// Creates a timestamp, validating both components.
    pub fn new(seconds: i64, nanos: i32) -> CodecResult<Self> {
        if !(0..NANOS_PER_SECOND as i32).contains(&nanos) {
            return Err(CodecError::invalid_timestamp(format!(
                "nanoseconds must be in [0, 999999999], got {nanos}"
            )));
        }
        if !(MIN_SECONDS..=MAX_SECONDS).contains(&seconds) {
            return Err(CodecError::invalid_timestamp(format!(
                "seconds must be in [{MIN_SECONDS}, {MAX_SECONDS}], got {seconds}"
            )));
        }
        Ok(Self { seconds, nanos })
    }

    /// Creates a timestamp from components supplied as floating point numbers.
    ///
    /// Fails unless both components are integral and in range.
    pub fn from_f64_parts(seconds: f64, nanos: f64) -> CodecResult<Self> {
        if seconds.fract() != 0.0 || !seconds.is_finite() {
            return Err(CodecError::invalid_timestamp(format!(
                "seconds must be an integer, got {seconds}"
            )));
        }
        if nanos.fract() != 0.0 || !nanos.is_finite() {
            return Err(CodecError::invalid_timestamp(format!(
                "nanoseconds must be an integer, got {nanos}"
            )));
        }
        if nanos < 0.0 || nanos >= NANOS_PER_SECOND as f64 {
            return Err(CodecError::invalid_timestamp(format!(
                "nanoseconds must be in [0, 999999999], got {nanos}"
            )));
        }
        if seconds < MIN_SECONDS as f64 || seconds > MAX_SECONDS as f64 {
            return Err(CodecError::invalid_timestamp(format!(
                "seconds must be in [{MIN_SECONDS}, {MAX_SECONDS}], got {seconds}"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        Self::new(seconds as i64, nanos as i32)
    }

    /// Creates a timestamp from milliseconds since the epoch.
    pub fn from_millis(millis: i64) -> CodecResult<Self> {
        let seconds = millis.div_euclid(1000);
        #[allow(clippy::cast_possible_truncation)]
        let nanos = millis.rem_euclid(1000) as i32 * NANOS_PER_MILLI;
        Self::new(seconds, nanos)
    }

    /// Returns the current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now()).unwrap_or(Self {
            seconds: 0,
            nanos: 0,
        })
    }

    /// Converts a [`SystemTime`].
    pub fn from_system_time(time: SystemTime) -> CodecResult<Self> {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => {
                let seconds = i64::try_from(after.as_secs())
                    .map_err(|_| CodecError::invalid_timestamp("time too far in the future"))?;
                #[allow(clippy::cast_possible_wrap)]
                Self::new(seconds, after.subsec_nanos() as i32)
            }
            Err(err) => {
                let before = err.duration();
                let mut seconds = -i64::try_from(before.as_secs())
                    .map_err(|_| CodecError::invalid_timestamp("time too far in the past"))?;
                #[allow(clippy::cast_possible_wrap)]
                let mut nanos = before.subsec_nanos() as i32;
                if nanos > 0 {
                    seconds -= 1;
                    nanos = NANOS_PER_SECOND as i32 - nanos;
                }
                Self::new(seconds, nanos)
            }
        }
    }

    /// Converts into a [`SystemTime`].
    #[allow(clippy::cast_sign_loss)]
    pub fn to_system_time(&self) -> SystemTime {
        let nanos = Duration::from_nanos(self.nanos as u64);
        if self.seconds >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.seconds as u64) + nanos
        } else {
            UNIX_EPOCH - Duration::from_secs(self.seconds.unsigned_abs()) + nanos
        }
    }

    /// Seconds since the epoch.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Nanosecond fraction, always non-negative.
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Milliseconds since the epoch, dropping sub-millisecond precision.
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanos / NANOS_PER_MILLI)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timestamp(seconds={}, nanoseconds={})",
            self.seconds, self.nanos
        )
    }
}
