// Data source contract and payload decoding
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::{FeedSnapshot, MetricSeries};
use crate::domain::telemetry::Sample;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Latest live window of every metric of `system`.
    async fn fetch(&self, system: SystemId) -> anyhow::Result<FeedSnapshot>;

    /// Long-term samples of every metric covering the last `window_ms`.
    async fn fetch_history(
        &self,
        system: SystemId,
        window_ms: i64,
    ) -> anyhow::Result<BTreeMap<Metric, Vec<Sample>>>;
}

/// A series as it arrives on the wire: a plain array, or an object keyed
/// by sequence index where index order is oldest first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SeriesPayload {
    List(Vec<Sample>),
    Indexed(BTreeMap<String, Sample>),
}

impl SeriesPayload {
    pub fn into_samples(self) -> anyhow::Result<Vec<Sample>> {
        match self {
            SeriesPayload::List(samples) => Ok(samples),
            SeriesPayload::Indexed(map) => {
                let mut indexed = map
                    .into_iter()
                    .map(|(key, sample)| {
                        key.parse::<u64>()
                            .map(|index| (index, sample))
                            .with_context(|| format!("Invalid sequence index '{}'", key))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                // String keys sort "10" before "2".
                indexed.sort_by_key(|(index, _)| *index);
                Ok(indexed.into_iter().map(|(_, sample)| sample).collect())
            }
        }
    }
}

/// Decodes an object keyed by metric id. Keys may carry a `Data` suffix
/// (`temperatureData`); unknown keys are skipped.
pub fn parse_series_payload(body: &[u8]) -> anyhow::Result<BTreeMap<Metric, Vec<Sample>>> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(body).context("Failed to decode series payload")?;

    let mut out = BTreeMap::new();
    for (key, value) in raw {
        let id = key.strip_suffix("Data").unwrap_or(&key);
        let Ok(metric) = id.parse::<Metric>() else {
            tracing::debug!("Ignoring unknown payload key '{}'", key);
            continue;
        };
        let payload: SeriesPayload = serde_json::from_value(value)
            .with_context(|| format!("Malformed series for '{}'", key))?;
        let mut samples = payload.into_samples()?;
        samples.sort_by_key(|s| s.timestamp);
        out.insert(metric, samples);
    }
    Ok(out)
}

/// Builds a snapshot from decoded series, keeping the newest `capacity`
/// samples of each metric the system tracks.
pub fn snapshot_from_series(
    system: SystemId,
    series: BTreeMap<Metric, Vec<Sample>>,
    capacity: usize,
    last_update: String,
) -> FeedSnapshot {
    let series = series
        .into_iter()
        .filter(|(metric, _)| system.metrics().contains(metric))
        .map(|(metric, samples)| (metric, MetricSeries::from_samples(metric, capacity, samples)))
        .collect();
    FeedSnapshot::new(system, series, last_update)
}
