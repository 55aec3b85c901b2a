// Simulated data source backed by live feeds
use crate::application::data_source::DataSource;
use crate::application::live_feed::LiveFeed;
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::{create_series, FeedSnapshot, SeriesSeed};
use crate::domain::telemetry::{Sample, MINUTE_MS};
use anyhow::Context;
use async_trait::async_trait;
use chrono::FixedOffset;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct SimulatedSource {
    feeds: BTreeMap<SystemId, LiveFeed>,
    seeds: BTreeMap<SystemId, Vec<SeriesSeed>>,
    tz: FixedOffset,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(tz: FixedOffset, rng: StdRng) -> Self {
        Self {
            feeds: BTreeMap::new(),
            seeds: BTreeMap::new(),
            tz,
            rng: Mutex::new(rng),
        }
    }

    pub fn with_feed(mut self, feed: LiveFeed, seeds: Vec<SeriesSeed>) -> Self {
        self.seeds.insert(feed.system(), seeds);
        self.feeds.insert(feed.system(), feed);
        self
    }

    fn feed(&self, system: SystemId) -> anyhow::Result<&LiveFeed> {
        self.feeds
            .get(&system)
            .with_context(|| format!("No simulated feed for {}", system))
    }
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn fetch(&self, system: SystemId) -> anyhow::Result<FeedSnapshot> {
        Ok(self.feed(system)?.snapshot())
    }

    /// Backfills per-minute samples ahead of the live window so the history
    /// modes have data on a fresh start.
    async fn fetch_history(
        &self,
        system: SystemId,
        window_ms: i64,
    ) -> anyhow::Result<BTreeMap<Metric, Vec<Sample>>> {
        let live = self.feed(system)?.snapshot();
        let seeds = self.seeds.get(&system).map(Vec::as_slice).unwrap_or(&[]);
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("Simulator random source is poisoned"))?;

        let mut out = BTreeMap::new();
        for seed in seeds {
            let recent = live.samples(seed.metric);
            let Some(oldest) = recent.first() else {
                continue;
            };
            let count = usize::try_from(window_ms / MINUTE_MS)
                .unwrap_or(0)
                .saturating_sub(recent.len());

            let mut samples = create_series(seed, count, oldest.timestamp - MINUTE_MS, &mut *rng, &self.tz);
            samples.extend(recent.iter().cloned());
            out.insert(seed.metric, samples);
        }

        tracing::debug!("Simulated {} history series for {}", out.len(), system);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::live_feed::tests::{test_feed, CountingScheduler, NOW};
    use crate::domain::telemetry::HOUR_MS;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn source() -> SimulatedSource {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 60);
        let seeds = crate::infrastructure::config::default_seeds(SystemId::GhCompax)
            .into_iter()
            .filter(|s| matches!(s.metric, Metric::Humidity | Metric::Ph))
            .collect();
        SimulatedSource::new(FixedOffset::east_opt(0).unwrap(), StdRng::seed_from_u64(3)).with_feed(feed, seeds)
    }

    #[tokio::test]
    async fn test_fetch_returns_live_snapshot() {
        let source = source();
        let snapshot = source.fetch(SystemId::GhCompax).await.unwrap();
        assert_eq!(snapshot.samples(Metric::Ph).len(), 60);
        assert!(source.fetch(SystemId::SkyVera).await.is_err());
    }

    #[tokio::test]
    async fn test_history_backfills_before_live_window() {
        let source = source();
        let history = source.fetch_history(SystemId::GhCompax, 24 * HOUR_MS).await.unwrap();

        let ph = &history[&Metric::Ph];
        assert_eq!(ph.len(), 24 * 60);
        assert_eq!(ph.last().unwrap().timestamp, NOW);
        for pair in ph.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, MINUTE_MS);
        }
    }
}
