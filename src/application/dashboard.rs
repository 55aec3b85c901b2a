// Dashboard orchestrator - Wires feed, aggregation, rendering and animation
use crate::application::animator::{reveal_count, QueuedFrameClock, RevealAnimator, SeriesIdentity};
use crate::application::chart_renderer::{ChartRenderer, DrawSurface, RenderOptions, RenderOutcome};
use crate::application::live_feed::{LiveFeed, Subscription};
use crate::application::preferences::{PreferenceStore, Preferences, ThemeFlag};
use crate::application::scheduler::{FrameClock, FrameId};
use crate::domain::dashboard::{derive_view, ChartView, DisplayMode, DrillDown, SystemOverview};
use crate::domain::error::TelemetryError;
use crate::domain::geometry::{ChartGeometry, Padding, Spacing};
use crate::domain::hit_test::{hit_test, Hit};
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::{FeedSnapshot, MetricSeries};
use crate::domain::telemetry::Sample;
use chrono::FixedOffset;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Seven days of per-minute samples.
pub const HISTORY_CAPACITY: usize = 7 * 24 * 60;

/// Applied snapshots buffered per stream client.
const UPDATE_BUFFER: usize = 16;

/// Surface a chart is drawn on and how far it is revealed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartRequest {
    pub width: f64,
    pub height: f64,
    /// Explicit reveal progress; otherwise the chart's animator decides.
    pub progress: Option<f64>,
    /// Drill-down layout: wider insets, reference lines, fixed x slots.
    pub detail: bool,
    /// Overrides the active display mode for this chart only.
    pub mode: Option<DisplayMode>,
}

impl ChartRequest {
    pub fn card(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            progress: None,
            detail: false,
            mode: None,
        }
    }

    pub fn detail(width: f64, height: f64) -> Self {
        Self {
            detail: true,
            ..Self::card(width, height)
        }
    }
}

pub struct DashboardOptions {
    pub system: SystemId,
    pub tz: FixedOffset,
    pub history_capacity: usize,
}

pub struct DashboardOrchestrator<C: FrameClock> {
    system: SystemId,
    tz: FixedOffset,
    feed: LiveFeed,
    store: Arc<dyn PreferenceStore>,
    theme: Arc<ThemeFlag>,
    preferences: Preferences,
    metric: Metric,
    snapshot: FeedSnapshot,
    history: BTreeMap<Metric, MetricSeries>,
    history_capacity: usize,
    animator: RevealAnimator<C>,
    last_warning: Option<TelemetryError>,
    updates: broadcast::Sender<FeedSnapshot>,
}

impl<C: FrameClock> DashboardOrchestrator<C> {
    pub fn new(
        options: DashboardOptions,
        feed: LiveFeed,
        store: Arc<dyn PreferenceStore>,
        theme: Arc<ThemeFlag>,
        animator: RevealAnimator<C>,
    ) -> Self {
        let preferences = store.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load preferences, using defaults: {:#}", e);
            Preferences::default()
        });
        theme.set(preferences.dark_mode);

        let tracked = options.system.metrics();
        let metric = preferences
            .selected_metric
            .filter(|m| tracked.contains(m))
            .or_else(|| tracked.first().copied())
            .unwrap_or(Metric::Temperature);

        let snapshot = feed.snapshot();
        let history_capacity = options.history_capacity.max(1);
        let history = snapshot
            .series
            .iter()
            .map(|(m, s)| {
                (
                    *m,
                    MetricSeries::from_samples(*m, history_capacity, s.samples().to_vec()),
                )
            })
            .collect();

        Self {
            system: options.system,
            tz: options.tz,
            feed,
            store,
            theme,
            preferences,
            metric,
            snapshot,
            history,
            history_capacity,
            animator,
            last_warning: None,
            updates: broadcast::channel(UPDATE_BUFFER).0,
        }
    }

    /// Subscribes the orchestrator to its live feed. `on_update` runs after
    /// each snapshot has been applied, outside the orchestrator lock.
    pub fn mount<F>(shared: &Arc<Mutex<Self>>, on_update: F) -> Subscription
    where
        C: 'static,
        F: Fn(&FeedSnapshot) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let feed = match shared.lock() {
            Ok(guard) => guard.feed.clone(),
            Err(poisoned) => poisoned.into_inner().feed.clone(),
        };
        let weak = Arc::downgrade(shared);

        feed.subscribe(move |snapshot| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            {
                let mut dashboard = shared
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Dashboard state is poisoned"))?;
                dashboard.apply_snapshot(snapshot.clone(), chrono::Utc::now().timestamp_millis());
            }
            on_update(snapshot)
        })
    }

    pub fn system(&self) -> SystemId {
        self.system
    }

    pub fn mode(&self) -> DisplayMode {
        self.preferences.chart_mode
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn snapshot(&self) -> &FeedSnapshot {
        &self.snapshot
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
    }

    pub fn last_warning(&self) -> Option<&TelemetryError> {
        self.last_warning.as_ref()
    }

    pub fn animator(&self) -> &RevealAnimator<C> {
        &self.animator
    }

    /// Receives every snapshot applied after this call, whichever source it
    /// came from.
    pub fn updates(&self) -> broadcast::Receiver<FeedSnapshot> {
        self.updates.subscribe()
    }

    pub fn on_mode_change(&mut self, mode: DisplayMode, now_ms: i64) -> anyhow::Result<()> {
        self.preferences.chart_mode = mode;
        self.persist()?;
        self.animator.sync(self.identity(), now_ms as f64);
        Ok(())
    }

    pub fn on_metric_select(&mut self, metric: Metric, now_ms: i64) -> anyhow::Result<()> {
        self.ensure_tracked(metric)?;
        self.metric = metric;
        self.preferences.selected_metric = Some(metric);
        self.persist()?;
        self.animator.sync(self.identity(), now_ms as f64);
        Ok(())
    }

    pub fn set_dark_mode(&mut self, dark: bool) -> anyhow::Result<()> {
        self.preferences.dark_mode = dark;
        self.theme.set(dark);
        self.persist()
    }

    /// Delivers a host frame to the chart animation.
    pub fn on_frame(&mut self, id: FrameId, now_ms: i64) -> f64 {
        self.animator.on_frame(id, now_ms as f64)
    }

    /// Opens the drill-down view of `metric` in the active mode.
    pub fn on_chart_click(&self, metric: Metric, now_ms: i64) -> Result<DrillDown, TelemetryError> {
        Ok(DrillDown::new(self.view(metric, now_ms)?))
    }

    /// Replaces the live snapshot and folds new samples into the long-term
    /// history. The running animation is kept for the same chart.
    pub fn apply_snapshot(&mut self, snapshot: FeedSnapshot, now_ms: i64) {
        for (metric, live) in &snapshot.series {
            let history = self
                .history
                .entry(*metric)
                .or_insert_with(|| MetricSeries::new(*metric, self.history_capacity));
            let tail = history.latest().map(|s| s.timestamp).unwrap_or(i64::MIN);
            for sample in live.samples().iter().filter(|s| s.timestamp > tail) {
                match history.append(sample.clone()) {
                    Ok(next) => *history = next,
                    Err(e) => tracing::warn!("Skipping history sample for {}: {}", metric, e),
                }
            }
        }
        self.snapshot = snapshot;
        self.last_warning = None;
        self.animator.sync(self.identity(), now_ms as f64);
        // No stream clients is not an error.
        let _ = self.updates.send(self.snapshot.clone());
    }

    /// Applies the result of an external refresh. A failure keeps the last
    /// good snapshot and is returned as a non-fatal warning.
    pub fn apply_refresh(&mut self, result: anyhow::Result<FeedSnapshot>, now_ms: i64) -> Option<TelemetryError> {
        match result {
            Ok(snapshot) => {
                self.apply_snapshot(snapshot, now_ms);
                None
            }
            Err(e) => {
                tracing::warn!("Data refresh for {} failed: {:#}", self.system, e);
                let warning = TelemetryError::DataSourceFailure(format!("{:#}", e));
                self.last_warning = Some(warning.clone());
                Some(warning)
            }
        }
    }

    /// Replaces the long-term history, e.g. from `DataSource::fetch_history`.
    pub fn seed_history(&mut self, history: BTreeMap<Metric, Vec<Sample>>) {
        for (metric, samples) in history {
            if !self.system.metrics().contains(&metric) {
                continue;
            }
            self.history.insert(
                metric,
                MetricSeries::from_samples(metric, self.history_capacity, samples),
            );
        }
    }

    pub fn view(&self, metric: Metric, now_ms: i64) -> Result<ChartView, TelemetryError> {
        self.view_in(metric, self.mode(), now_ms)
    }

    pub fn view_in(&self, metric: Metric, mode: DisplayMode, now_ms: i64) -> Result<ChartView, TelemetryError> {
        self.ensure_tracked(metric)?;
        let source = if mode.is_history() {
            self.history.get(&metric).map(|s| s.samples()).unwrap_or(&[])
        } else {
            self.snapshot.samples(metric)
        };
        let samples = derive_view(source, mode, now_ms, &self.tz);
        Ok(ChartView::new(self.system, metric, mode, samples))
    }

    pub fn overview(&self, now_ms: i64) -> SystemOverview {
        let charts = self
            .system
            .metrics()
            .iter()
            .filter_map(|m| self.view(*m, now_ms).ok())
            .collect();
        SystemOverview {
            system: self.system,
            title: self.system.display_name(),
            mode: self.mode(),
            selected_metric: self.metric,
            last_update: self.snapshot.current.last_update.clone(),
            tiles: self.snapshot.current.tiles(),
            charts,
        }
    }

    /// Draws `metric` in the requested or active mode. Geometry is rebuilt from the
    /// current snapshot on every call.
    pub fn render_chart<S: DrawSurface + ?Sized>(
        &self,
        metric: Metric,
        request: ChartRequest,
        now_ms: i64,
        surface: &mut S,
    ) -> Result<RenderOutcome, TelemetryError> {
        let view = self.view_in(metric, request.mode.unwrap_or(self.mode()), now_ms)?;
        let geometry = match self.geometry(&view, request) {
            Ok(g) => Some(g),
            Err(TelemetryError::EmptySeries) => None,
            Err(e) => return Err(e),
        };
        let revealed = self.reveal_for(&view, request);

        let options = if request.detail {
            RenderOptions::detail(&view.color, view.fraction_digits, Some(axis_title(&view)))
        } else {
            RenderOptions::card(&view.color, view.fraction_digits)
        };
        let renderer = ChartRenderer::new(self.theme.clone(), options);
        Ok(renderer.render(&view.samples, geometry.as_ref(), revealed, surface))
    }

    /// Resolves a pointer over the chart of `metric` to a sample.
    pub fn tooltip(
        &self,
        metric: Metric,
        x: f64,
        y: f64,
        request: ChartRequest,
        now_ms: i64,
    ) -> Result<Option<Hit>, TelemetryError> {
        let view = self.view_in(metric, request.mode.unwrap_or(self.mode()), now_ms)?;
        let geometry = match self.geometry(&view, request) {
            Ok(g) => g,
            Err(TelemetryError::EmptySeries) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(hit_test(x, y, &geometry, &view.samples, self.reveal_for(&view, request)))
    }

    fn geometry(&self, view: &ChartView, request: ChartRequest) -> Result<ChartGeometry, TelemetryError> {
        let (padding, spacing) = if request.detail {
            let spacing = view
                .mode
                .expected_points()
                .map(Spacing::Fixed)
                .unwrap_or(Spacing::Series);
            (Padding::DETAIL, spacing)
        } else {
            (Padding::CARD, Spacing::Series)
        };
        ChartGeometry::compute(&view.samples, request.width, request.height, padding, spacing)
    }

    fn reveal_for(&self, view: &ChartView, request: ChartRequest) -> usize {
        let identity = SeriesIdentity {
            system: view.system,
            metric: view.metric,
            mode: view.mode,
        };
        let progress = match request.progress {
            Some(p) => p,
            None if self.animator.identity() == Some(identity) => self.animator.progress(),
            None => 1.0,
        };
        reveal_count(progress, view.samples.len())
    }

    fn identity(&self) -> SeriesIdentity {
        SeriesIdentity {
            system: self.system,
            metric: self.metric,
            mode: self.mode(),
        }
    }

    fn ensure_tracked(&self, metric: Metric) -> Result<(), TelemetryError> {
        if self.system.metrics().contains(&metric) {
            Ok(())
        } else {
            Err(TelemetryError::UnknownMetric(metric.to_string()))
        }
    }

    fn persist(&self) -> anyhow::Result<()> {
        self.store.save(&self.preferences)
    }
}

impl DashboardOrchestrator<QueuedFrameClock> {
    /// Delivers every frame queued before this call and returns the chart's
    /// reveal progress.
    pub fn pump_frames(&mut self, now_ms: i64) -> f64 {
        for id in self.animator.clock_mut().drain_due() {
            self.on_frame(id, now_ms);
        }
        self.animator.progress()
    }
}

fn axis_title(view: &ChartView) -> String {
    if view.unit.is_empty() {
        view.title.clone()
    } else {
        format!("{} ({})", view.title, view.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::chart_renderer::tests::{Call, RecordingSurface};
    use crate::application::live_feed::tests::{test_feed, CountingScheduler, NOW};
    use crate::domain::telemetry::{DAY_MS, HOUR_MS, MINUTE_MS};
    use crate::infrastructure::preferences::MemoryPreferenceStore;

    type TestDashboard = DashboardOrchestrator<QueuedFrameClock>;

    fn dashboard_with(store: Arc<MemoryPreferenceStore>) -> TestDashboard {
        DashboardOrchestrator::new(
            DashboardOptions {
                system: SystemId::GhCompax,
                tz: FixedOffset::east_opt(0).unwrap(),
                history_capacity: HISTORY_CAPACITY,
            },
            test_feed(Arc::new(CountingScheduler::default()), 60),
            store,
            Arc::new(ThemeFlag::default()),
            RevealAnimator::new(QueuedFrameClock::new()),
        )
    }

    fn dashboard() -> TestDashboard {
        dashboard_with(Arc::new(MemoryPreferenceStore::default()))
    }

    fn finish_animation(dashboard: &mut TestDashboard, now: i64) {
        while let Some(id) = dashboard.animator().pending_frame() {
            dashboard.on_frame(id, now + 2_000);
        }
    }

    #[test]
    fn test_defaults_to_first_tracked_metric() {
        let dashboard = dashboard();
        assert_eq!(dashboard.metric(), Metric::Temperature);
        assert_eq!(dashboard.mode(), DisplayMode::Recent);
    }

    #[test]
    fn test_mode_change_persists_and_restarts_animation() {
        let store = Arc::new(MemoryPreferenceStore::default());
        let mut dashboard = dashboard_with(store.clone());
        dashboard.on_metric_select(Metric::Ph, NOW).unwrap();
        finish_animation(&mut dashboard, NOW);
        assert_eq!(dashboard.animator().progress(), 1.0);

        dashboard.on_mode_change(DisplayMode::HourlyHistory, NOW).unwrap();
        assert_eq!(dashboard.animator().progress(), 0.0);

        let saved = store.load().unwrap();
        assert_eq!(saved.chart_mode, DisplayMode::HourlyHistory);
        assert_eq!(saved.selected_metric, Some(Metric::Ph));

        // Reloaded dashboards pick the persisted state up.
        let reloaded = dashboard_with(store);
        assert_eq!(reloaded.mode(), DisplayMode::HourlyHistory);
        assert_eq!(reloaded.metric(), Metric::Ph);
    }

    #[test]
    fn test_untracked_metric_is_rejected() {
        let mut dashboard = dashboard();
        assert!(dashboard.on_metric_select(Metric::Rainfall, NOW).is_err());
        assert_eq!(
            dashboard.view(Metric::Rainfall, NOW).unwrap_err(),
            TelemetryError::UnknownMetric("rainfall".into())
        );
    }

    #[test]
    fn test_live_tick_keeps_finished_animation() {
        let mut dashboard = dashboard();
        dashboard.on_metric_select(Metric::Humidity, NOW).unwrap();
        finish_animation(&mut dashboard, NOW);

        let feed = dashboard.feed.clone();
        feed.tick_at(NOW + MINUTE_MS);
        dashboard.apply_snapshot(feed.snapshot(), NOW + MINUTE_MS);

        assert_eq!(dashboard.animator().progress(), 1.0);
        let latest = dashboard.snapshot().samples(Metric::Humidity).last().unwrap().timestamp;
        assert_eq!(latest, NOW + MINUTE_MS);
    }

    #[test]
    fn test_refresh_failure_keeps_last_snapshot() {
        let mut dashboard = dashboard();
        let before = dashboard.snapshot().clone();

        let warning = dashboard.apply_refresh(Err(anyhow::anyhow!("connection refused")), NOW);

        assert!(matches!(warning, Some(TelemetryError::DataSourceFailure(ref m)) if m.contains("connection refused")));
        assert_eq!(dashboard.snapshot(), &before);
        assert!(dashboard.last_warning().is_some());

        assert!(dashboard.apply_refresh(Ok(before), NOW).is_none());
        assert!(dashboard.last_warning().is_none());
    }

    #[test]
    fn test_history_modes_read_long_term_samples() {
        let mut dashboard = dashboard();
        let now = NOW + 3 * DAY_MS;
        let mut history = BTreeMap::new();
        history.insert(
            Metric::Ph,
            (0..3 * 24)
                .map(|h| Sample::new(String::new(), 6.5, NOW + h * HOUR_MS + 30 * MINUTE_MS))
                .collect(),
        );
        dashboard.seed_history(history);
        dashboard.on_mode_change(DisplayMode::DailyHistory, now).unwrap();

        let drill = dashboard.on_chart_click(Metric::Ph, now).unwrap();
        assert_eq!(drill.view.samples.len(), 3);
        assert!(drill.view.samples.iter().all(|s| s.value == 6.5));
        let completeness = drill.completeness.unwrap();
        assert_eq!((completeness.actual_points, completeness.expected_points), (3, 7));
    }

    #[test]
    fn test_render_and_tooltip_share_geometry() {
        let dashboard = dashboard();
        let request = ChartRequest {
            progress: Some(0.5),
            ..ChartRequest::card(640.0, 270.0)
        };

        let mut surface = RecordingSurface::default();
        let outcome = dashboard
            .render_chart(Metric::Ph, request, NOW, &mut surface)
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Drawn { revealed: 30 });

        let line = surface
            .calls
            .iter()
            .find_map(|c| match c {
                Call::Polyline(p) => Some(p.clone()),
                _ => None,
            })
            .unwrap();
        let last = line[29];
        let hit = dashboard
            .tooltip(Metric::Ph, last.x, last.y, request, NOW)
            .unwrap()
            .unwrap();
        assert_eq!(hit.index, 29);
        assert_eq!((hit.x, hit.y), (last.x, last.y));

        // Half a line is revealed, so later samples answer nothing.
        let hidden_x = line[29].x + (line[1].x - line[0].x) * 10.0;
        assert!(dashboard.tooltip(Metric::Ph, hidden_x, last.y, request, NOW).unwrap().is_none());
    }

    #[test]
    fn test_empty_history_renders_no_data() {
        let mut dashboard = dashboard();
        dashboard.on_mode_change(DisplayMode::DailyHistory, NOW).unwrap();
        let far_future = NOW + 30 * DAY_MS;
        let mut surface = RecordingSurface::default();

        let outcome = dashboard
            .render_chart(Metric::Ph, ChartRequest::detail(800.0, 400.0), far_future, &mut surface)
            .unwrap();
        assert_eq!(outcome, RenderOutcome::NoData);
        assert!(dashboard
            .tooltip(Metric::Ph, 100.0, 100.0, ChartRequest::detail(800.0, 400.0), far_future)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pumped_frames_reveal_selected_chart() {
        let shared = Arc::new(Mutex::new(dashboard()));
        let _mount = TestDashboard::mount(&shared, |_| Ok(()));
        let mut dashboard = shared.lock().unwrap();
        dashboard.on_metric_select(Metric::Ph, NOW).unwrap();
        let request = ChartRequest::card(640.0, 270.0);

        let revealed = |dashboard: &TestDashboard| {
            let mut surface = RecordingSurface::default();
            dashboard.render_chart(Metric::Ph, request, NOW, &mut surface).unwrap()
        };
        assert_eq!(revealed(&*dashboard), RenderOutcome::Drawn { revealed: 2 });

        let progress = dashboard.pump_frames(NOW + 500);
        assert!(progress > 0.0 && progress < 1.0);
        assert!(dashboard.animator().pending_frame().is_some());

        assert_eq!(dashboard.pump_frames(NOW + 1_500), 1.0);
        assert!(dashboard.animator().pending_frame().is_none());
        assert_eq!(revealed(&*dashboard), RenderOutcome::Drawn { revealed: 60 });

        // Tooltips reach the tail once the line is fully drawn.
        let hit = dashboard
            .tooltip(Metric::Ph, 640.0 - Padding::CARD.right, 135.0, request, NOW)
            .unwrap()
            .unwrap();
        assert_eq!(hit.index, 59);
    }

    #[test]
    fn test_overview_covers_every_tracked_metric() {
        let mut dashboard = dashboard();
        dashboard.on_metric_select(Metric::Humidity, NOW).unwrap();

        let overview = dashboard.overview(NOW);

        assert_eq!(overview.title, SystemId::GhCompax.display_name());
        assert_eq!(overview.selected_metric, Metric::Humidity);
        assert_eq!(overview.mode, DisplayMode::Recent);
        assert_eq!(overview.charts.len(), SystemId::GhCompax.metrics().len());
        assert_eq!(overview.tiles.len(), 2);
        let ph = overview.charts.iter().find(|c| c.metric == Metric::Ph).unwrap();
        assert_eq!(ph.samples.len(), 60);
    }

    #[test]
    fn test_applied_snapshots_are_broadcast() {
        let mut dashboard = dashboard();
        let mut updates = dashboard.updates();
        let feed = dashboard.feed.clone();

        feed.tick_at(NOW + MINUTE_MS);
        dashboard.apply_snapshot(feed.snapshot(), NOW + MINUTE_MS);
        dashboard.apply_refresh(Err(anyhow::anyhow!("timeout")), NOW + MINUTE_MS);

        let applied = updates.try_recv().unwrap();
        assert_eq!(applied.samples(Metric::Ph).last().unwrap().timestamp, NOW + MINUTE_MS);
        // Failed refreshes publish nothing.
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_mount_applies_live_ticks() {
        let shared = Arc::new(Mutex::new(dashboard()));
        let updates = Arc::new(Mutex::new(0usize));
        let counter = updates.clone();

        let sub = TestDashboard::mount(&shared, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        let feed = shared.lock().unwrap().feed.clone();
        feed.tick_at(NOW + MINUTE_MS);

        assert_eq!(*updates.lock().unwrap(), 2);
        let dashboard = shared.lock().unwrap();
        let tail = dashboard.snapshot().samples(Metric::Tvoc).last().map(|s| s.timestamp);
        // The test feed only tracks humidity and pH.
        assert_eq!(tail, None);
        assert_eq!(
            dashboard.snapshot().samples(Metric::Ph).last().unwrap().timestamp,
            NOW + MINUTE_MS
        );
        drop(dashboard);

        sub.unsubscribe();
        assert_eq!(feed.subscriber_count(), 0);
    }
}
