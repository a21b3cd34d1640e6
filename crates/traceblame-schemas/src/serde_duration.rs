//! `Duration` conversions for trace timestamps and JSON output.
//!
//! Chrome trace timestamps are f64 microseconds. Everything downstream works
//! in `Duration`, and reports are written as f64 milliseconds. The functions
//! at the top convert at the input boundary; [`serialize`]/[`deserialize`]
//! and [`option`] are `#[serde(with = "...")]` modules for the output
//! boundary.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Converts a trace timestamp or duration in microseconds to a `Duration`.
///
/// Rounds to the nearest nanosecond. Negative and NaN inputs clamp to zero.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "value is checked to be finite, positive and below u64::MAX"
)]
pub fn from_micros_f64(micros: f64) -> Duration {
    if micros.is_nan() || micros <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = (micros * 1_000.0).round();
    if nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }
    Duration::from_nanos(nanos as u64)
}

/// Converts a `Duration` to f64 milliseconds.
pub fn to_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// Serialize a `Duration` as f64 milliseconds.
pub fn serialize<S: Serializer>(
    dur: &Duration,
    s: S,
) -> Result<S::Ok, S::Error> {
    to_millis_f64(*dur).serialize(s)
}

/// Deserialize f64 milliseconds into a `Duration`.
pub fn deserialize<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Duration, D::Error> {
    let ms = f64::deserialize(d)?;
    Ok(from_micros_f64(ms * 1_000.0))
}

/// Serializes `Option<Duration>` as `Option<f64>` milliseconds.
///
/// `None` maps to JSON `null`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize an `Option<Duration>` as `Option<f64>` milliseconds.
    pub fn serialize<S: Serializer>(
        dur: &Option<Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match dur {
            Some(d) => s.serialize_some(&super::to_millis_f64(*d)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize `Option<f64>` milliseconds into `Option<Duration>`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Duration>, D::Error> {
        let opt = Option::<f64>::deserialize(d)?;
        Ok(opt.map(|ms| super::from_micros_f64(ms * 1_000.0)))
    }
}
