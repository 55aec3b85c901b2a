// Bounded per-metric sample store
use super::error::TelemetryError;
use super::metric::{round_to, Metric, SystemId};
use super::telemetry::{CurrentReading, Granularity, Sample, MINUTE_MS};
use chrono::TimeZone;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

pub const MAX_LIVE_POINTS: usize = 60;
pub const SEED_SPACING_MS: i64 = MINUTE_MS;

/// Parameters for synthesizing and random-walking one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSeed {
    pub metric: Metric,
    pub base: f64,
    pub variance: f64,
    pub step_variance: f64,
}

/// Uniform draw in `[-spread/2, spread/2]`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, spread: f64) -> f64 {
    let half = spread.abs() / 2.0;
    rng.gen_range(-half..=half)
}

/// Synthesizes `count` samples one minute apart, the last one at `now_ms`.
pub fn create_series<R, Tz>(seed: &SeriesSeed, count: usize, now_ms: i64, rng: &mut R, tz: &Tz) -> Vec<Sample>
where
    R: Rng + ?Sized,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let precision = seed.metric.seed_precision();
    (0..count)
        .map(|i| {
            let minutes_ago = (count - 1 - i) as i64;
            let timestamp = now_ms - minutes_ago * SEED_SPACING_MS;
            let value = round_to(seed.base + jitter(rng, seed.variance), precision);
            Sample::at(timestamp, value, Granularity::Minute, tz)
        })
        .collect()
}

/// Ordered, capacity-bounded samples for one metric. Appending yields a new
/// series; the receiver is left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    metric: Metric,
    capacity: usize,
    samples: Vec<Sample>,
}

impl MetricSeries {
    pub fn new(metric: Metric, capacity: usize) -> Self {
        Self {
            metric,
            capacity: capacity.max(1),
            samples: Vec::new(),
        }
    }

    /// Builds a series from externally supplied samples. Input is sorted by
    /// timestamp and only the newest `capacity` samples are retained.
    pub fn from_samples(metric: Metric, capacity: usize, mut samples: Vec<Sample>) -> Self {
        let capacity = capacity.max(1);
        samples.sort_by_key(|s| s.timestamp);
        if samples.len() > capacity {
            samples.drain(..samples.len() - capacity);
        }
        Self {
            metric,
            capacity,
            samples,
        }
    }

    pub fn seeded<R, Tz>(seed: &SeriesSeed, capacity: usize, now_ms: i64, rng: &mut R, tz: &Tz) -> Self
    where
        R: Rng + ?Sized,
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self::from_samples(seed.metric, capacity, create_series(seed, capacity, now_ms, rng, tz))
    }

    pub fn append(&self, sample: Sample) -> Result<MetricSeries, TelemetryError> {
        if let Some(tail) = self.samples.last() {
            if sample.timestamp < tail.timestamp {
                return Err(TelemetryError::OutOfOrderSample {
                    tail: tail.timestamp,
                    got: sample.timestamp,
                });
            }
        }

        let mut samples = Vec::with_capacity(self.capacity + 1);
        let skip = usize::from(self.samples.len() + 1 > self.capacity);
        samples.extend(self.samples.iter().skip(skip).cloned());
        samples.push(sample);

        Ok(Self {
            metric: self.metric,
            capacity: self.capacity,
            samples,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Independent copy of every tracked series of one system, plus the latest
/// reading per metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub system: SystemId,
    pub series: BTreeMap<Metric, MetricSeries>,
    pub current: CurrentReading,
}

impl FeedSnapshot {
    pub fn new(system: SystemId, series: BTreeMap<Metric, MetricSeries>, last_update: String) -> Self {
        let values = series
            .iter()
            .filter_map(|(metric, s)| s.latest().map(|latest| (*metric, latest.value)))
            .collect();
        Self {
            system,
            series,
            current: CurrentReading {
                values,
                last_update,
            },
        }
    }

    pub fn samples(&self, metric: Metric) -> &[Sample] {
        self.series.get(&metric).map(|s| s.samples()).unwrap_or(&[])
    }
}
