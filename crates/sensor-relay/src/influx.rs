// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB Line Protocol encoding of reading batches.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 value=<float> timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::reading::Reading;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Default measurement name.
pub const DEFAULT_MEASUREMENT: &str = "temperature";

/// Tag key that always carries the reading's sensor id.
pub const SERIAL_TAG: &str = "serial";

/// Field key carrying the reading's value.
pub const VALUE_FIELD: &str = "value";

/// Static tags attached to every line unless configured otherwise.
pub fn default_tags() -> BTreeMap<String, String> {
    [
        ("location", "Jacuzzi"),
        ("source", "Tellstick"),
        ("type", "Pool thermometer"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Serializes readings to Line Protocol, one line per reading.
///
/// Tags are emitted sorted by key (the canonical form InfluxDB prefers),
/// with `serial` merged in from each reading. The static part of every line
/// is escaped once at construction.
#[derive(Debug, Clone)]
pub struct LineEncoder {
    /// Escaped measurement plus static tags sorting before `serial`.
    head: String,
    /// Escaped static tags sorting after `serial`.
    tail: String,
}

impl LineEncoder {
    /// Create an encoder for a measurement and static tag set.
    ///
    /// A static tag named `serial` is ignored; that tag always comes from the
    /// reading.
    pub fn new(measurement: &str, tags: &BTreeMap<String, String>) -> Self {
        let mut head = escape_measurement(measurement);
        let mut tail = String::new();

        for (key, value) in tags {
            if key == SERIAL_TAG {
                continue;
            }
            let target = if key.as_str() < SERIAL_TAG {
                &mut head
            } else {
                &mut tail
            };
            target.push(',');
            target.push_str(&escape_tag(key));
            target.push('=');
            target.push_str(&escape_tag(value));
        }

        Self { head, tail }
    }

    /// Encode a batch. Input order is kept; an empty batch yields `""`.
    pub fn encode(&self, readings: &[Reading]) -> String {
        let mut out = String::new();
        for reading in readings {
            self.encode_into(reading, &mut out);
        }
        out
    }

    /// Append the line for one reading, newline included.
    pub fn encode_into(&self, reading: &Reading, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{},{}={}{} {}={} {}",
            self.head,
            SERIAL_TAG,
            reading.sensor_id,
            self.tail,
            VALUE_FIELD,
            reading.temperature,
            reading.timestamp_ns()
        );
    }
}

impl Default for LineEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT, &default_tags())
    }
}

/// Escape measurement name per Line Protocol spec.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Escape tag key or value per Line Protocol spec.
/// Commas, equals signs, and spaces must be escaped.
fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_shape() {
        let encoder = LineEncoder::default();
        let text = encoder.encode(&[Reading::new(7, 21.5, 1000)]);
        assert_eq!(
            text,
            "temperature,location=Jacuzzi,serial=7,source=Tellstick,type=Pool\\ thermometer value=21.5 1000000000000\n"
        );
    }

    #[test]
    fn test_empty_batch_encodes_to_empty_text() {
        assert_eq!(LineEncoder::default().encode(&[]), "");
    }

    #[test]
    fn test_one_line_per_reading_in_order() {
        let encoder = LineEncoder::default();
        let text = encoder.encode(&[
            Reading::new(2, 19.0, 102),
            Reading::new(1, 20.1, 100),
            Reading::new(2, 19.0, 102),
        ]);

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("serial=2") && lines[0].contains(" value=19 102000000000"));
        assert!(lines[1].contains("serial=1") && lines[1].contains(" value=20.1 100000000000"));
        assert_eq!(lines[0], lines[2]);
    }

    #[test]
    fn test_negative_values_and_ids() {
        let text = LineEncoder::default().encode(&[Reading::new(-4, -0.5, 1)]);
        assert!(text.contains(",serial=-4,"));
        assert!(text.contains(" value=-0.5 1000000000\n"));
    }

    #[test]
    fn test_custom_tags_sorted_and_escaped() {
        let mut tags = BTreeMap::new();
        tags.insert("zone".to_string(), "a,b".to_string());
        tags.insert("area".to_string(), "x=y".to_string());
        tags.insert("serial".to_string(), "ignored".to_string());

        let encoder = LineEncoder::new("pool temp", &tags);
        let text = encoder.encode(&[Reading::new(3, 1.25, 2)]);
        assert_eq!(
            text,
            "pool\\ temp,area=x\\=y,serial=3,zone=a\\,b value=1.25 2000000000\n"
        );
    }

    #[test]
    fn test_no_static_tags() {
        let encoder = LineEncoder::new("m", &BTreeMap::new());
        assert_eq!(
            encoder.encode(&[Reading::new(1, 2.0, 3)]),
            "m,serial=1 value=2 3000000000\n"
        );
    }
}
