// Live feed simulator - Random-walk samples fanned out to subscribers
use crate::application::scheduler::{IntervalScheduler, TickFn, TimerHandle};
use crate::domain::metric::{round_to, SystemId};
use crate::domain::series::{jitter, FeedSnapshot, MetricSeries, SeriesSeed};
use crate::domain::telemetry::{Granularity, Sample};
use chrono::{DateTime, FixedOffset};
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

pub const UPDATE_INTERVAL_MS: u64 = 60_000;

pub type SnapshotCallback = Arc<dyn Fn(&FeedSnapshot) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Running,
}

struct FeedInner {
    series: BTreeMap<crate::domain::metric::Metric, MetricSeries>,
    seeds: Vec<SeriesSeed>,
    subscribers: Vec<(u64, SnapshotCallback)>,
    next_id: u64,
    timer: Option<TimerHandle>,
    /// Bumped whenever a timer starts; ticks from older timers are dropped.
    generation: u64,
    rng: StdRng,
}

struct FeedCore {
    system: SystemId,
    period: Duration,
    tz: FixedOffset,
    scheduler: Arc<dyn IntervalScheduler>,
    inner: Mutex<FeedInner>,
}

/// Simulated sensor feed for one monitored system.
///
/// `Idle` while nobody listens; the first subscriber starts exactly one
/// periodic timer and the last one to leave stops it.
#[derive(Clone)]
pub struct LiveFeed {
    core: Arc<FeedCore>,
}

pub struct FeedOptions {
    pub system: SystemId,
    pub seeds: Vec<SeriesSeed>,
    pub capacity: usize,
    pub period: Duration,
    pub tz: FixedOffset,
}

impl LiveFeed {
    /// Seeds every metric with `capacity` backfilled samples ending at
    /// `now_ms`, so charts never start empty.
    pub fn new(
        options: FeedOptions,
        scheduler: Arc<dyn IntervalScheduler>,
        mut rng: StdRng,
        now_ms: i64,
    ) -> Self {
        let series = options
            .seeds
            .iter()
            .map(|seed| {
                (
                    seed.metric,
                    MetricSeries::seeded(seed, options.capacity, now_ms, &mut rng, &options.tz),
                )
            })
            .collect();

        tracing::debug!(
            "Seeded live feed for {} with {} metrics",
            options.system,
            options.seeds.len()
        );

        Self {
            core: Arc::new(FeedCore {
                system: options.system,
                period: options.period,
                tz: options.tz,
                scheduler,
                inner: Mutex::new(FeedInner {
                    series,
                    seeds: options.seeds,
                    subscribers: Vec::new(),
                    next_id: 0,
                    timer: None,
                    generation: 0,
                    rng,
                }),
            }),
        }
    }

    pub fn system(&self) -> SystemId {
        self.core.system
    }

    /// Registers `callback`, delivers the current snapshot to it right away
    /// and then again on every tick.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FeedSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: SnapshotCallback = Arc::new(callback);
        let (id, snapshot) = {
            let mut inner = self.core.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, callback.clone()));

            if inner.timer.is_none() {
                inner.generation += 1;
                let generation = inner.generation;
                let weak = Arc::downgrade(&self.core);
                let tick: TickFn = Arc::new(move || {
                    if let Some(core) = weak.upgrade() {
                        core.advance(chrono::Utc::now().timestamp_millis(), Some(generation));
                    }
                });
                inner.timer = Some(self.core.scheduler.start(self.core.period, tick));
                tracing::debug!("Live feed for {} is running", self.core.system);
            }

            let now = chrono::Utc::now().timestamp_millis();
            (id, self.core.snapshot_locked(&inner, now))
        };

        deliver(self.core.system, id, &callback, &snapshot);

        Subscription {
            core: Arc::downgrade(&self.core),
            id,
            active: true,
        }
    }

    /// Appends one random-walk sample per metric at `now_ms` and notifies
    /// every subscriber.
    pub fn tick_at(&self, now_ms: i64) {
        self.core.advance(now_ms, None);
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let inner = self.core.lock();
        self.core
            .snapshot_locked(&inner, chrono::Utc::now().timestamp_millis())
    }

    pub fn state(&self) -> FeedState {
        if self.core.lock().timer.is_some() {
            FeedState::Running
        } else {
            FeedState::Idle
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.core.lock().subscribers.len()
    }
}

impl FeedCore {
    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        // A panicking subscriber never runs under this lock, so a poisoned
        // guard still holds consistent data.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot_locked(&self, inner: &FeedInner, now_ms: i64) -> FeedSnapshot {
        FeedSnapshot::new(self.system, inner.series.clone(), update_label(now_ms, &self.tz))
    }

    /// One tick. Timer ticks carry the generation of the timer that fired
    /// them and are ignored once that timer has been stopped or replaced.
    fn advance(&self, now_ms: i64, generation: Option<u64>) {
        let (snapshot, subscribers) = {
            let mut inner = self.lock();
            let inner = &mut *inner;

            if let Some(generation) = generation {
                if inner.timer.is_none() || inner.generation != generation {
                    tracing::debug!("Dropping stale tick for {}", self.system);
                    return;
                }
            }

            for seed in &inner.seeds {
                let Some(current) = inner.series.get(&seed.metric) else {
                    continue;
                };
                let last = current.latest().map(|s| s.value).unwrap_or(seed.base);
                let spec = seed.metric.spec();
                let value = round_to(
                    spec.valid_range.clamp(last + jitter(&mut inner.rng, seed.step_variance)),
                    seed.metric.seed_precision(),
                );
                let sample = Sample::at(now_ms, value, Granularity::Minute, &self.tz);

                match current.append(sample) {
                    Ok(next) => {
                        inner.series.insert(seed.metric, next);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping {} sample for {}: {}", seed.metric, self.system, e);
                    }
                }
            }

            (
                self.snapshot_locked(inner, now_ms),
                inner.subscribers.clone(),
            )
        };

        tracing::debug!(
            "Live feed tick for {} notifying {} subscribers",
            self.system,
            subscribers.len()
        );

        for (id, callback) in &subscribers {
            // Skip subscribers that left while earlier ones were notified.
            if !self.is_subscribed(*id) {
                continue;
            }
            deliver(self.system, *id, callback, &snapshot);
        }
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.lock().subscribers.iter().any(|(sub_id, _)| *sub_id == id)
    }

    fn remove(&self, id: u64) {
        let timer = {
            let mut inner = self.lock();
            inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
            if inner.subscribers.is_empty() {
                inner.timer.take()
            } else {
                None
            }
        };

        if let Some(timer) = timer {
            timer.cancel();
            tracing::debug!("Live feed for {} is idle", self.system);
        }
    }
}

/// Runs one callback, containing both error returns and panics.
fn deliver(system: SystemId, id: u64, callback: &SnapshotCallback, snapshot: &FeedSnapshot) {
    match catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!("Subscriber {} of {} failed: {:#}", id, system, e);
        }
        Err(_) => {
            tracing::warn!("Subscriber {} of {} panicked", id, system);
        }
    }
}

fn update_label(now_ms: i64, tz: &FixedOffset) -> String {
    DateTime::from_timestamp_millis(now_ms)
        .map(|utc| {
            utc.with_timezone(tz)
                .format("%m/%d/%Y, %I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_default()
}

/// Keeps a live feed subscription alive. Dropping it unsubscribes.
pub struct Subscription {
    core: Weak<FeedCore>,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(core) = self.core.upgrade() {
            core.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::metric::Metric;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scheduler that never fires on its own and counts live timers. Tick
    /// functions are kept so tests can fire them by hand.
    #[derive(Default)]
    pub(crate) struct CountingScheduler {
        pub started: AtomicUsize,
        pub active: Arc<AtomicUsize>,
        pub ticks: Mutex<Vec<TickFn>>,
    }

    impl IntervalScheduler for CountingScheduler {
        fn start(&self, _period: Duration, tick: TickFn) -> TimerHandle {
            self.ticks.lock().unwrap().push(tick);
            self.started.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_add(1, Ordering::SeqCst);
            let active = self.active.clone();
            TimerHandle::new(move || {
                active.fetch_sub(1, Ordering::SeqCst);
            })
        }
    }

    pub(crate) const NOW: i64 = 1_709_596_800_000;

    pub(crate) fn test_feed(scheduler: Arc<dyn IntervalScheduler>, capacity: usize) -> LiveFeed {
        LiveFeed::new(
            FeedOptions {
                system: SystemId::GhCompax,
                seeds: vec![
                    SeriesSeed {
                        metric: Metric::Humidity,
                        base: 99.5,
                        variance: 1.0,
                        step_variance: 30.0,
                    },
                    SeriesSeed {
                        metric: Metric::Ph,
                        base: 6.8,
                        variance: 1.0,
                        step_variance: 0.1,
                    },
                ],
                capacity,
                period: Duration::from_millis(UPDATE_INTERVAL_MS),
                tz: FixedOffset::east_opt(0).unwrap(),
            },
            scheduler,
            StdRng::seed_from_u64(42),
            NOW,
        )
    }

    #[test]
    fn test_subscribe_delivers_initial_snapshot() {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 60);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let _sub = feed.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.samples(Metric::Humidity).len());
            Ok(())
        });

        assert_eq!(*received.lock().unwrap(), vec![60]);
    }

    #[test]
    fn test_timer_lifecycle_across_cycles() {
        let scheduler = Arc::new(CountingScheduler::default());
        let feed = test_feed(scheduler.clone(), 60);
        assert_eq!(feed.state(), FeedState::Idle);

        for cycle in 1..=3 {
            let a = feed.subscribe(|_| Ok(()));
            let b = feed.subscribe(|_| Ok(()));
            assert_eq!(feed.state(), FeedState::Running);
            assert_eq!(scheduler.started.load(Ordering::SeqCst), cycle);
            assert_eq!(scheduler.active.load(Ordering::SeqCst), 1);

            a.unsubscribe();
            assert_eq!(feed.state(), FeedState::Running);
            drop(b);
            assert_eq!(feed.state(), FeedState::Idle);
            assert_eq!(scheduler.active.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_tick_appends_evicts_and_clamps() {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 10);
        let latest = Arc::new(Mutex::new(None));
        let sink = latest.clone();
        let _sub = feed.subscribe(move |snapshot| {
            *sink.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        });

        for i in 1..=25 {
            feed.tick_at(NOW + i * 60_000);
        }

        let snapshot = latest.lock().unwrap().clone().unwrap();
        let humidity = snapshot.samples(Metric::Humidity);
        assert_eq!(humidity.len(), 10);
        assert_eq!(humidity.last().unwrap().timestamp, NOW + 25 * 60_000);
        assert_eq!(humidity.first().unwrap().timestamp, NOW + 16 * 60_000);
        assert!(humidity.iter().all(|s| (0.0..=100.0).contains(&s.value)));
        assert!(snapshot.samples(Metric::Ph).iter().all(|s| (5.0..=8.0).contains(&s.value)));
        assert_eq!(
            snapshot.current.values.get(&Metric::Humidity),
            Some(&humidity.last().unwrap().value)
        );
    }

    #[test]
    fn test_out_of_order_tick_is_skipped() {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 10);
        let before = feed.snapshot();
        feed.tick_at(NOW - 60_000);
        let after = feed.snapshot();
        assert_eq!(before.series, after.series);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 10);
        let hits = Arc::new(AtomicUsize::new(0));

        let _failing = feed.subscribe(|_| anyhow::bail!("render failed"));
        let _panicking = feed.subscribe(|_| panic!("subscriber bug"));
        let counter = hits.clone();
        let _healthy = feed.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        feed.tick_at(NOW + 60_000);
        feed.tick_at(NOW + 120_000);

        // One initial delivery plus two ticks.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(feed.state(), FeedState::Running);
    }

    #[test]
    fn test_tick_from_stopped_timer_is_ignored() {
        let scheduler = Arc::new(CountingScheduler::default());
        let feed = test_feed(scheduler.clone(), 10);
        let hits = Arc::new(AtomicUsize::new(0));

        let first = feed.subscribe(|_| Ok(()));
        first.unsubscribe();
        let before = feed.snapshot().series;

        // A tick that was already in flight when the timer stopped.
        let stale = scheduler.ticks.lock().unwrap()[0].clone();
        stale();
        assert_eq!(feed.snapshot().series, before);

        let counter = hits.clone();
        let _second = feed.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        stale();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let current = scheduler.ticks.lock().unwrap()[1].clone();
        current();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribed_during_tick_is_not_notified() {
        let feed = test_feed(Arc::new(CountingScheduler::default()), 10);
        let late_hits = Arc::new(AtomicUsize::new(0));
        let late: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = late.clone();
        let _first = feed.subscribe(move |_| {
            // Drops the second subscription the first time it is present.
            drop(slot.lock().unwrap().take());
            Ok(())
        });
        let counter = late_hits.clone();
        let second = feed.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        *late.lock().unwrap() = Some(second);

        feed.tick_at(NOW + 60_000);

        // Only the initial delivery reached it.
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_stops_with_last_subscriber() {
        use crate::infrastructure::tokio_scheduler::TokioScheduler;

        let feed = test_feed(Arc::new(TokioScheduler::current()), 60);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = feed.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(Duration::from_millis(UPDATE_INTERVAL_MS * 3 + 10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        sub.unsubscribe();
        tokio::time::sleep(Duration::from_millis(UPDATE_INTERVAL_MS * 3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(feed.state(), FeedState::Idle);
    }
}
