// Time-window filtering and calendar-aligned bucket averaging
use super::telemetry::{Granularity, Sample};
use chrono::{DateTime, Offset, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Contiguous suffix of `samples` with `timestamp >= now_ms - window_ms`.
pub fn filter_by_window(samples: &[Sample], window_ms: i64, now_ms: i64) -> Vec<Sample> {
    let cutoff = now_ms.saturating_sub(window_ms);
    let start = samples.partition_point(|s| s.timestamp < cutoff);
    samples[start..].to_vec()
}

/// Start of the bucket containing `timestamp`, aligned in the local time of
/// `tz`. For hour buckets this is the top of the hour, for day buckets local
/// midnight.
pub fn bucket_start<Tz: TimeZone>(timestamp: i64, bucket_ms: i64, tz: &Tz) -> i64 {
    let offset_ms = DateTime::from_timestamp_millis(timestamp)
        .map(|utc| {
            tz.offset_from_utc_datetime(&utc.naive_utc())
                .fix()
                .local_minus_utc() as i64
                * 1000
        })
        .unwrap_or(0);
    let local = timestamp + offset_ms;
    local.div_euclid(bucket_ms) * bucket_ms - offset_ms
}

/// Mean per calendar-aligned bucket, ascending by bucket start. Buckets with
/// no contributing samples are left out.
pub fn aggregate_by_bucket<Tz>(samples: &[Sample], bucket_ms: i64, tz: &Tz) -> Vec<Sample>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if bucket_ms <= 0 {
        return samples.to_vec();
    }

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.value.is_finite()) {
        let entry = buckets
            .entry(bucket_start(sample.timestamp, bucket_ms, tz))
            .or_insert((0.0, 0));
        entry.0 += sample.value;
        entry.1 += 1;
    }

    let granularity = Granularity::for_bucket(bucket_ms);
    buckets
        .into_iter()
        .map(|(start, (sum, count))| Sample::at(start, sum / count as f64, granularity, tz))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl SeriesStats {
    /// Summary of a sequence; change is latest against the previous sample.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let last = samples.last()?;
        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), s| (min.min(s.value), max.max(s.value), sum + s.value),
        );
        let previous = samples
            .len()
            .checked_sub(2)
            .map(|i| samples[i].value)
            .unwrap_or(last.value);
        let change = last.value - previous;
        let change_percent = if previous != 0.0 {
            change / previous * 100.0
        } else {
            0.0
        };

        Some(Self {
            min,
            max,
            mean: sum / samples.len() as f64,
            latest: last.value,
            change,
            change_percent,
        })
    }
}
