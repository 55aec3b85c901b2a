// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::animator::{QueuedFrameClock, RevealAnimator};
use crate::application::dashboard::{DashboardOptions, DashboardOrchestrator};
use crate::application::data_source::DataSource;
use crate::application::live_feed::{FeedOptions, LiveFeed};
use crate::application::preferences::{PreferenceStore, ThemeFlag};
use crate::domain::metric::SystemId;
use crate::domain::dashboard::DisplayMode;
use crate::infrastructure::config::load_monitoring_config;
use crate::infrastructure::demo_auth::DemoAuth;
use crate::infrastructure::frame_driver::{spawn_frame_driver, FRAME_INTERVAL};
use crate::infrastructure::preferences::{FilePreferenceStore, MemoryPreferenceStore};
use crate::infrastructure::remote_source::RemoteSource;
use crate::infrastructure::simulated_source::SimulatedSource;
use crate::infrastructure::tokio_scheduler::TokioScheduler;
use crate::presentation::app_state::{AppState, SharedDashboard};
use crate::presentation::handlers::{
    get_chart, get_drilldown, get_overview, get_snapshot, get_tooltip, health_check, login, logout,
    put_preferences, refresh_system, session, stream_snapshots,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_monitoring_config()?;
    let settings = &config.monitoring;
    let tz = settings.timezone()?;
    let now = chrono::Utc::now().timestamp_millis();
    let mut rng = match settings.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // Live feeds (application layer), one per monitored system
    let scheduler = Arc::new(TokioScheduler::current());
    let feeds: Vec<LiveFeed> = SystemId::ALL
        .iter()
        .map(|system| {
            LiveFeed::new(
                FeedOptions {
                    system: *system,
                    seeds: config.seeds_for(*system),
                    capacity: settings.realtime_points,
                    period: Duration::from_millis(settings.update_interval_ms),
                    tz,
                },
                scheduler.clone(),
                StdRng::from_rng(&mut rng).unwrap_or_else(|_| StdRng::seed_from_u64(now as u64)),
                now,
            )
        })
        .collect();

    // Data source (infrastructure layer)
    let source: Arc<dyn DataSource> = match &config.remote {
        Some(remote) => {
            tracing::info!("Using remote monitoring API at {}", remote.base_url);
            Arc::new(RemoteSource::new(remote, settings.realtime_points, tz)?)
        }
        None => {
            let simulated = feeds.iter().fold(
                SimulatedSource::new(tz, StdRng::seed_from_u64(rng_seed_for_history(settings.rng_seed, now))),
                |source, feed| source.with_feed(feed.clone(), config.seeds_for(feed.system())),
            );
            Arc::new(simulated)
        }
    };

    let store: Arc<dyn PreferenceStore> = match &config.preferences.path {
        Some(path) => Arc::new(FilePreferenceStore::new(path)),
        None => Arc::new(MemoryPreferenceStore::default()),
    };
    let theme = Arc::new(ThemeFlag::default());
    let history_window = DisplayMode::DailyHistory.window_ms().unwrap_or(7 * 24 * 3_600_000);

    // Dashboards, seeded with long-term history and mounted on their feeds
    let mut dashboards: BTreeMap<SystemId, SharedDashboard> = BTreeMap::new();
    let mut mounts = Vec::new();
    for feed in feeds {
        let system = feed.system();
        let mut dashboard = DashboardOrchestrator::new(
            DashboardOptions {
                system,
                tz,
                history_capacity: settings.history_capacity,
            },
            feed,
            store.clone(),
            theme.clone(),
            RevealAnimator::with_duration(QueuedFrameClock::new(), settings.animation_duration_ms),
        );

        match source.fetch_history(system, history_window).await {
            Ok(history) => dashboard.seed_history(history),
            Err(e) => tracing::warn!("No history for {}: {:#}", system, e),
        }
        if config.remote.is_some() {
            let result = source.fetch(system).await;
            dashboard.apply_refresh(result, chrono::Utc::now().timestamp_millis());
        }

        let shared = Arc::new(Mutex::new(dashboard));
        spawn_frame_driver(&shared, FRAME_INTERVAL, || chrono::Utc::now().timestamp_millis());
        // Remote dashboards are refreshed by polling instead.
        if config.remote.is_none() {
            mounts.push(DashboardOrchestrator::mount(&shared, move |snapshot| {
                tracing::debug!(
                    "{} updated at {}",
                    snapshot.system,
                    snapshot.current.last_update
                );
                Ok(())
            }));
        }
        dashboards.insert(system, shared);
    }

    if config.remote.is_some() {
        spawn_remote_refresh(
            dashboards.clone(),
            source.clone(),
            Duration::from_millis(settings.update_interval_ms),
        );
    }

    // Create application state
    let state = Arc::new(AppState {
        dashboards,
        source,
        auth: Arc::new(DemoAuth::new(config.preferences.path.as_ref().map(|p| {
            PathBuf::from(p).with_file_name("session.json")
        }))),
        chart_width: settings.chart_width,
        chart_height: settings.chart_height,
        mounts,
    });

    // Build router (presentation layer)
    // Note: We handle compression manually in our response builders,
    // so we don't use CompressionLayer to avoid double compression
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/systems/:system/overview", get(get_overview))
        .route("/systems/:system/snapshot", get(get_snapshot))
        .route("/systems/:system/refresh", post(refresh_system))
        .route("/systems/:system/stream", get(stream_snapshots))
        .route("/systems/:system/charts/:metric", get(get_chart))
        .route("/systems/:system/charts/:metric/tooltip", get(get_tooltip))
        .route("/systems/:system/charts/:metric/drilldown", get(get_drilldown))
        .route("/preferences", put(put_preferences))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind))?;
    tracing::info!("Starting agri-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

fn rng_seed_for_history(seed: Option<u64>, now: i64) -> u64 {
    seed.map(|s| s.wrapping_add(1)).unwrap_or(now as u64)
}

/// Polls the remote source on the live update interval.
fn spawn_remote_refresh(
    dashboards: BTreeMap<SystemId, SharedDashboard>,
    source: Arc<dyn DataSource>,
    period: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);
        while ticks.next().await.is_some() {
            for (system, shared) in &dashboards {
                let result = source.fetch(*system).await;
                let now = chrono::Utc::now().timestamp_millis();
                match shared.lock() {
                    Ok(mut dashboard) => {
                        dashboard.apply_refresh(result, now);
                    }
                    Err(_) => tracing::error!("Dashboard state for {} is poisoned", system),
                }
            }
        }
    });
}
