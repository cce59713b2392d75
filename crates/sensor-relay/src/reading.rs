// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor reading value type.


/// Sensor identifier as reported by the event source.
pub type SensorId = i32;

/// One parsed temperature measurement.
///
/// Created by the reading filter, owned by the accumulator until drained,
/// then consumed by the line encoder. Never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Sensor that produced the measurement.
    pub sensor_id: SensorId,
    /// Measured temperature.
    pub temperature: f64,
    /// Event timestamp, seconds since Unix epoch.
    pub timestamp_secs: i64,
}

impl Reading {
    /// Create a new reading.
    pub fn new(sensor_id: SensorId, temperature: f64, timestamp_secs: i64) -> Self {
        Self {
            sensor_id,
            temperature,
            timestamp_secs,
        }
    }

    /// Timestamp in nanoseconds since Unix epoch.
    ///
    /// Widened to `i128` so any `i64` second count converts without overflow.
    pub fn timestamp_ns(&self) -> i128 {
        i128::from(self.timestamp_secs) * 1_000_000_000
    }
}

/// Space-separated list of sensor ids, used in log lines.
pub fn id_list<I>(ids: I) -> String
where
    I: IntoIterator<Item = SensorId>,
{
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `""` for exactly one item, `"s"` otherwise.
pub(crate) fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ns_scales_seconds() {
        let reading = Reading::new(7, 21.5, 1000);
        assert_eq!(reading.timestamp_ns(), 1_000_000_000_000);
    }

    #[test]
    fn test_timestamp_ns_does_not_overflow() {
        let reading = Reading::new(1, 0.0, i64::MAX);
        assert_eq!(reading.timestamp_ns(), i128::from(i64::MAX) * 1_000_000_000);
    }

    #[test]
    fn test_id_list_keeps_order_and_duplicates() {
        assert_eq!(id_list([3, 1, 3]), "3 1 3");
        assert_eq!(id_list(Vec::new()), "");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(2), "s");
    }
}
