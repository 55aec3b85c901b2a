// Telemetry data domain models
use super::metric::{Metric, SensorStatus};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// One timestamped reading. Aggregated buckets share this shape, with
/// `timestamp` holding the bucket start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: String,
    pub value: f64,
    pub timestamp: i64,
}

impl Sample {
    pub fn new(time: String, value: f64, timestamp: i64) -> Self {
        Self {
            time,
            value,
            timestamp,
        }
    }

    pub fn at<Tz>(timestamp: i64, value: f64, granularity: Granularity, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self::new(granularity.label(timestamp, tz), value, timestamp)
    }
}

/// Precision at which a sample's `time` label is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn for_bucket(bucket_ms: i64) -> Self {
        if bucket_ms >= DAY_MS {
            Granularity::Day
        } else if bucket_ms >= HOUR_MS {
            Granularity::Hour
        } else {
            Granularity::Minute
        }
    }

    pub fn label<Tz>(&self, timestamp: i64, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let Some(utc) = DateTime::from_timestamp_millis(timestamp) else {
            return String::new();
        };
        let local = utc.with_timezone(tz);
        match self {
            Granularity::Minute | Granularity::Hour => local.format("%I:%M %p").to_string(),
            Granularity::Day => local.format("%d %b").to_string(),
        }
    }
}

/// Latest value for one metric, as shown on a monitoring tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileData {
    pub id: String,
    pub title: String,
    pub unit: String,
    pub value: f64,
    pub precision: usize,
    pub display: String,
    pub status: SensorStatus,
}

impl TileData {
    pub fn new(metric: Metric, value: f64) -> Self {
        let spec = metric.spec();
        Self {
            id: spec.id.to_string(),
            title: spec.label.to_string(),
            unit: spec.unit.to_string(),
            value,
            precision: spec.decimals,
            display: metric.format_value(value),
            status: metric.status_for(value),
        }
    }
}

/// Latest value per metric plus a human-readable update time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentReading {
    pub values: BTreeMap<Metric, f64>,
    pub last_update: String,
}

impl CurrentReading {
    pub fn tiles(&self) -> Vec<TileData> {
        self.values
            .iter()
            .map(|(metric, value)| TileData::new(*metric, *value))
            .collect()
    }
}
