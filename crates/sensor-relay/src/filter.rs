// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reading filter: watch-set membership and value parsing.

use crate::config::ConfigError;
use crate::feed::SensorEvent;
use crate::reading::{id_list, Reading, SensorId};
use std::collections::BTreeSet;
use std::fmt;

/// Set of sensor ids whose readings are forwarded.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    ids: BTreeSet<SensorId>,
}

impl WatchSet {
    /// Create a watch set from sensor ids (duplicates collapse).
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = SensorId>,
    {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Check whether a sensor is watched.
    pub fn contains(&self, id: SensorId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of distinct watched ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if no sensor is watched.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Watched ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.ids.iter().copied()
    }
}

impl fmt::Display for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&id_list(self.iter()))
    }
}

/// Why an event did not produce a reading.
///
/// Rejections are expected input, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    /// Sensor id is not in the watch set.
    Unwatched(SensorId),
    /// Value text is not a finite floating-point number.
    Malformed {
        /// Sensor that sent the value.
        sensor_id: SensorId,
        /// Raw value text.
        raw_value: String,
    },
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejected::Unwatched(id) => write!(f, "sensor {} is not watched", id),
            Rejected::Malformed {
                sensor_id,
                raw_value,
            } => write!(f, "sensor {} sent unparseable value {:?}", sensor_id, raw_value),
        }
    }
}

/// Turns raw sensor events into readings for watched sensors.
#[derive(Debug, Clone)]
pub struct ReadingFilter {
    watch: WatchSet,
}

impl ReadingFilter {
    /// Create a filter over a watch set.
    pub fn new(watch: WatchSet) -> Self {
        Self { watch }
    }

    /// The configured watch set.
    pub fn watch_set(&self) -> &WatchSet {
        &self.watch
    }

    /// Accept or reject one event.
    pub fn filter(&self, event: &SensorEvent) -> Result<Reading, Rejected> {
        if !self.watch.contains(event.sensor_id) {
            return Err(Rejected::Unwatched(event.sensor_id));
        }

        let temperature = parse_value(&event.raw_value).ok_or_else(|| Rejected::Malformed {
            sensor_id: event.sensor_id,
            raw_value: event.raw_value.clone(),
        })?;

        Ok(Reading::new(
            event.sensor_id,
            temperature,
            event.timestamp_secs,
        ))
    }
}

/// Parse a measurement value.
///
/// Surrounding whitespace is ignored. Empty text, trailing garbage,
/// `inf`/`nan` and values outside the normal `f32` range yield `None`:
/// both overflow past `f32::MAX` and underflow (a non-zero literal that
/// narrows to zero or a subnormal).
pub fn parse_value(raw: &str) -> Option<f64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let value = text.parse::<f64>().ok()?;

    let narrowed = value as f32;
    if !narrowed.is_finite() || narrowed.is_subnormal() {
        return None;
    }
    if narrowed == 0.0 && has_nonzero_mantissa(text) {
        return None;
    }
    Some(value)
}

fn has_nonzero_mantissa(text: &str) -> bool {
    text.split(['e', 'E'])
        .next()
        .is_some_and(|mantissa| mantissa.bytes().any(|b| matches!(b, b'1'..=b'9')))
}

/// Parse a sensor id argument with C `strtol` base-0 rules.
///
/// Accepts an optional sign followed by `0x`/`0X` hex digits, `0`-prefixed
/// octal digits or decimal digits. The whole argument must be consumed and
/// the value must fit a [`SensorId`].
pub fn parse_sensor_id(arg: &str) -> Result<SensorId, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSensorId {
        arg: arg.to_string(),
        reason: reason.to_string(),
    };

    let text = arg.trim();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid("not a number"));
    }

    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid("out of range"))?;
    let value = if negative { -magnitude } else { magnitude };
    SensorId::try_from(value).map_err(|_| invalid("out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: SensorId, value: &str, ts: i64) -> SensorEvent {
        SensorEvent::new(id, value, ts)
    }

    #[test]
    fn test_watched_event_becomes_reading() {
        let filter = ReadingFilter::new(WatchSet::new([1, 2]));
        let reading = filter.filter(&event(2, "19.0", 102)).unwrap();
        assert_eq!(reading, Reading::new(2, 19.0, 102));
    }

    #[test]
    fn test_unwatched_event_rejected() {
        let filter = ReadingFilter::new(WatchSet::new([1, 2]));
        assert_eq!(
            filter.filter(&event(3, "99.9", 100)),
            Err(Rejected::Unwatched(3))
        );
    }

    #[test]
    fn test_malformed_values_rejected() {
        let filter = ReadingFilter::new(WatchSet::new([5]));
        for raw in [
            "", "   ", "abc", "20.1abc", "1e400", "-1e400", "nan", "inf", "1,5", "1e39", "-1e39",
            "1e-400", "1e-40", "-2.5e-45",
        ] {
            match filter.filter(&event(5, raw, 0)) {
                Err(Rejected::Malformed { sensor_id, raw_value }) => {
                    assert_eq!(sensor_id, 5);
                    assert_eq!(raw_value, raw);
                }
                other => panic!("expected Malformed for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_parse_value_accepts_common_forms() {
        assert_eq!(parse_value("21.5"), Some(21.5));
        assert_eq!(parse_value(" -3 "), Some(-3.0));
        assert_eq!(parse_value("1e2"), Some(100.0));
        assert_eq!(parse_value("+0.25"), Some(0.25));
    }

    #[test]
    fn test_parse_value_range_edges() {
        assert_eq!(parse_value("0"), Some(0.0));
        assert_eq!(parse_value("-0.000e-500"), Some(-0.0));
        assert_eq!(parse_value("3.4e38"), Some(3.4e38));
        assert_eq!(parse_value("1.2e-38"), Some(1.2e-38));
        assert_eq!(parse_value("1e-38"), None);
    }

    #[test]
    fn test_parse_sensor_id_bases() {
        assert_eq!(parse_sensor_id("42").unwrap(), 42);
        assert_eq!(parse_sensor_id("0x1F").unwrap(), 31);
        assert_eq!(parse_sensor_id("0X1f").unwrap(), 31);
        assert_eq!(parse_sensor_id("017").unwrap(), 15);
        assert_eq!(parse_sensor_id("0").unwrap(), 0);
        assert_eq!(parse_sensor_id("-12").unwrap(), -12);
        assert_eq!(parse_sensor_id("+0x10").unwrap(), 16);
        assert_eq!(parse_sensor_id(" 7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_sensor_id_rejects_garbage() {
        for arg in ["", "abc", "12abc", "0x", "09", "--5", "+-5", "1.5", "99999999999"] {
            assert!(
                matches!(parse_sensor_id(arg), Err(ConfigError::InvalidSensorId { .. })),
                "{:?} should be rejected",
                arg
            );
        }
    }

    #[test]
    fn test_watch_set_dedups_and_sorts() {
        let watch = WatchSet::new([16, 3, 3, 1]);
        assert_eq!(watch.len(), 3);
        assert_eq!(watch.to_string(), "1 3 16");
        assert!(watch.contains(16));
        assert!(!watch.contains(2));
    }
}
