//! Timestamped heart-rate readings.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// A single heart-rate reading as delivered by the sensor.
///
/// `rate == 0` is the "no reading" sentinel, not a physiological zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedRate {
    /// Seconds since the Unix epoch, as supplied by the caller
    pub timestamp: f64,
    /// Beats per minute
    pub rate: u32,
}

impl StampedRate {
    pub fn new(timestamp: f64, rate: u32) -> Self {
        Self { timestamp, rate }
    }

    /// Whether this sample carries an actual reading.
    pub fn has_reading(&self) -> bool {
        self.rate != 0
    }

    /// Convert the timestamp into a datetime in the given timezone.
    ///
    /// Returns `None` when the timestamp is outside chrono's range.
    pub fn datetime_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        tz.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
    }

    pub fn local_datetime(&self) -> Option<DateTime<Local>> {
        self.datetime_in(&Local)
    }
}

/// Whether `raw` is a rate literal: one or more ASCII digits, no sign.
pub fn is_rate_literal(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}
