//! Wide-to-long series reshaping
//!
//! A wide row carries one timestamp, one instrument and one value per declared
//! channel. Reshaping emits one [`SeriesPoint`] per (row, channel), keyed by
//! the schema's key template (`TI1_X`, `VG01_VALUE1`, ...).
//!
//! Output is channel-major: every row's first channel in row order, then every
//! row's second channel, and so on. Values are passed through untouched, NaN
//! included, so charts show gaps instead of silently dropping samples.

use crate::types::{InstrumentSchema, RawReading, SeriesPoint};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};

/// Convert wide rows into long-format series points
pub fn reshape(rows: &[RawReading], schema: &InstrumentSchema) -> Vec<SeriesPoint> {
    let labels: Vec<String> = rows.iter().map(|row| row.instrument.to_uppercase()).collect();
    let mut points = Vec::with_capacity(rows.len() * schema.channel_count());

    for (index, channel) in schema.channels.iter().enumerate() {
        for (row, label) in rows.iter().zip(&labels) {
            points.push(SeriesPoint {
                timestamp: row.timestamp,
                series_key: schema.series_key(label, channel),
                value: row.value(index),
            });
        }
    }

    points
}

/// Distinct series keys present in a point collection
pub fn series_keys(points: &[SeriesPoint]) -> BTreeSet<String> {
    points.iter().map(|p| p.series_key.clone()).collect()
}

/// One chartable series: points sorted by ascending timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: String,
    pub points: Vec<(NaiveDateTime, f64)>,
}

impl Series {
    /// Points as `[x, y]` pairs with x in Unix seconds; missing values are skipped
    pub fn plot_points(&self) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .filter(|(_, value)| !value.is_nan())
            .map(|(ts, value)| [ts.and_utc().timestamp() as f64, *value])
            .collect()
    }
}

/// Group points by series key, each series sorted ascending by timestamp
///
/// Series come out in key order. The sort is stable, so points sharing a
/// timestamp keep their input order.
pub fn group_series(points: &[SeriesPoint]) -> Vec<Series> {
    let mut grouped: BTreeMap<&str, Vec<(NaiveDateTime, f64)>> = BTreeMap::new();
    for point in points {
        grouped
            .entry(point.series_key.as_str())
            .or_default()
            .push((point.timestamp, point.value));
    }

    grouped
        .into_iter()
        .map(|(key, mut points)| {
            points.sort_by_key(|(ts, _)| *ts);
            Series {
                key: key.to_string(),
                points,
            }
        })
        .collect()
}
