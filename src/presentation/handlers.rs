// HTTP request handlers
use crate::application::animator::QueuedFrameClock;
use crate::application::auth::{LoginOutcome, User};
use crate::application::chart_renderer::{Anchor, DrawSurface, Point, RenderOutcome, TextStyle};
use crate::application::dashboard::{ChartRequest, DashboardOrchestrator};
use crate::application::preferences::Preferences;
use crate::domain::dashboard::{DisplayMode, DrillDown};
use crate::domain::error::TelemetryError;
use crate::domain::hit_test::Hit;
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::FeedSnapshot;
use crate::domain::telemetry::TileData;
use crate::infrastructure::chunked_stream::stream_from_broadcast;
use crate::infrastructure::http_response::{accepts_brotli, json_response, svg_response};
use crate::infrastructure::svg_surface::SvgSurface;
use crate::presentation::app_state::{AppState, SharedDashboard};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, MutexGuard};

type Dashboard = DashboardOrchestrator<QueuedFrameClock>;

#[derive(Deserialize)]
pub struct ChartQuery {
    pub mode: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub progress: Option<f64>,
    #[serde(default)]
    pub detail: bool,
}

#[derive(Deserialize)]
pub struct TooltipQuery {
    pub x: f64,
    pub y: f64,
    pub mode: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    #[serde(default)]
    pub detail: bool,
}

#[derive(Deserialize)]
pub struct DrillDownQuery {
    pub mode: Option<String>,
}

#[derive(Deserialize)]
pub struct PreferencesUpdate {
    pub chart_mode: Option<String>,
    pub dark_mode: Option<bool>,
    pub metric: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SnapshotResponse {
    pub system: SystemId,
    pub title: &'static str,
    pub mode: DisplayMode,
    pub metric: Metric,
    pub tiles: Vec<TileData>,
    pub snapshot: FeedSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct TooltipResponse {
    pub hit: Option<Hit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn status_for(error: &TelemetryError) -> StatusCode {
    match error {
        TelemetryError::UnknownMetric(_) | TelemetryError::UnknownSystem(_) => StatusCode::NOT_FOUND,
        TelemetryError::UnknownMode(_) => StatusCode::BAD_REQUEST,
        TelemetryError::DataSourceFailure(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: TelemetryError) -> Response {
    tracing::debug!("Rejecting request: {}", error);
    (status_for(&error), error.to_string()).into_response()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_mode(mode: Option<&str>) -> Result<Option<DisplayMode>, TelemetryError> {
    mode.map(str::parse).transpose()
}

fn find_dashboard(state: &AppState, system: &str) -> Result<SharedDashboard, TelemetryError> {
    let system: SystemId = system.parse()?;
    state
        .dashboard(system)
        .cloned()
        .ok_or_else(|| TelemetryError::UnknownSystem(system.slug().to_string()))
}

fn lock(shared: &SharedDashboard) -> Result<MutexGuard<'_, Dashboard>, StatusCode> {
    shared.lock().map_err(|_| {
        tracing::error!("Dashboard state is poisoned");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

macro_rules! try_or_reject {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return reject(e),
        }
    };
}

macro_rules! try_status {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(status) => return status.into_response(),
        }
    };
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current reading, tiles and live series of one system
pub async fn get_snapshot(
    Path(system): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let body = {
        let dashboard = try_status!(lock(&shared));
        let snapshot = dashboard.snapshot().clone();
        SnapshotResponse {
            system: dashboard.system(),
            title: dashboard.system().display_name(),
            mode: dashboard.mode(),
            metric: dashboard.metric(),
            tiles: snapshot.current.tiles(),
            snapshot,
            warning: dashboard.last_warning().map(|w| w.to_string()),
        }
    };

    match json_response(&body, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Tiles plus one chart per tracked metric in the active mode
pub async fn get_overview(
    Path(system): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let overview = try_status!(lock(&shared)).overview(now_ms());

    match json_response(&overview, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Render one chart as SVG
pub async fn get_chart(
    Path((system, metric)): Path<(String, String)>,
    Query(query): Query<ChartQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let metric: Metric = try_or_reject!(metric.parse());
    let mode = try_or_reject!(parse_mode(query.mode.as_deref()));

    let width = query.width.unwrap_or(state.chart_width);
    let height = query.height.unwrap_or(state.chart_height);
    let base = if query.detail {
        ChartRequest::detail(width, height)
    } else {
        ChartRequest::card(width, height)
    };
    let request = ChartRequest {
        progress: query.progress,
        mode,
        ..base
    };

    let svg = {
        let dashboard = try_status!(lock(&shared));
        let mut surface = SvgSurface::new(width, height);
        let outcome = try_or_reject!(dashboard.render_chart(metric, request, now_ms(), &mut surface));
        if outcome == RenderOutcome::NoData {
            surface.text(
                Point { x: width / 2.0, y: height / 2.0 },
                "No data available",
                &TextStyle {
                    color: "#9ca3af".to_string(),
                    size: 14.0,
                    anchor: Anchor::Middle,
                    bold: false,
                },
            );
        }
        surface.finish()
    };

    match svg_response(svg, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Resolve a pointer position over a chart to a sample
pub async fn get_tooltip(
    Path((system, metric)): Path<(String, String)>,
    Query(query): Query<TooltipQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let metric: Metric = try_or_reject!(metric.parse());
    let mode = try_or_reject!(parse_mode(query.mode.as_deref()));

    let width = query.width.unwrap_or(state.chart_width);
    let height = query.height.unwrap_or(state.chart_height);
    let base = if query.detail {
        ChartRequest::detail(width, height)
    } else {
        ChartRequest::card(width, height)
    };
    let request = ChartRequest { mode, ..base };

    let dashboard = try_status!(lock(&shared));
    let hit = try_or_reject!(dashboard.tooltip(metric, query.x, query.y, request, now_ms()));
    let display = hit
        .as_ref()
        .map(|h| format!("{} {}", metric.format_value(h.sample.value), metric.spec().unit).trim_end().to_string());

    Json(TooltipResponse { hit, display }).into_response()
}

/// Drill-down view with stats and completeness
pub async fn get_drilldown(
    Path((system, metric)): Path<(String, String)>,
    Query(query): Query<DrillDownQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let metric: Metric = try_or_reject!(metric.parse());
    let mode = try_or_reject!(parse_mode(query.mode.as_deref()));

    let dashboard = try_status!(lock(&shared));
    let drill = match mode {
        Some(mode) => dashboard.view_in(metric, mode, now_ms()).map(DrillDown::new),
        None => dashboard.on_chart_click(metric, now_ms()),
    };
    Json(try_or_reject!(drill)).into_response()
}

/// Stream the snapshots the dashboard applies as NDJSON, starting with the
/// current one, until the client disconnects
pub async fn stream_snapshots(Path(system): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let (current, updates) = {
        let dashboard = try_status!(lock(&shared));
        (dashboard.snapshot().clone(), dashboard.updates())
    };
    tracing::info!("Streaming {} to a new client", current.system);

    stream_from_broadcast(current, updates).into_response()
}

/// Fetch fresh data from the configured data source
pub async fn refresh_system(Path(system): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let shared = try_or_reject!(find_dashboard(&state, &system));
    let system_id: SystemId = try_or_reject!(system.parse());

    let result = state.source.fetch(system_id).await;
    let warning = try_status!(lock(&shared)).apply_refresh(result, now_ms());

    Json(RefreshResponse {
        applied: warning.is_none(),
        warning: warning.map(|w| w.to_string()),
    })
    .into_response()
}

/// Update chart mode, theme or selected metric on every dashboard
pub async fn put_preferences(State(state): State<Arc<AppState>>, Json(update): Json<PreferencesUpdate>) -> Response {
    let mode = try_or_reject!(parse_mode(update.chart_mode.as_deref()));
    let metric: Option<Metric> = try_or_reject!(update.metric.as_deref().map(str::parse).transpose());
    let now = now_ms();

    let mut current = Preferences::default();
    for shared in state.dashboards.values() {
        let mut dashboard = try_status!(lock(shared));
        if let Err(e) = apply_preferences(&mut dashboard, mode, update.dark_mode, metric, now) {
            tracing::error!("Failed to update preferences: {:#}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        current = dashboard.preferences();
    }

    Json(current).into_response()
}

fn apply_preferences(
    dashboard: &mut Dashboard,
    mode: Option<DisplayMode>,
    dark_mode: Option<bool>,
    metric: Option<Metric>,
    now: i64,
) -> anyhow::Result<()> {
    if let Some(mode) = mode {
        dashboard.on_mode_change(mode, now)?;
    }
    if let Some(dark) = dark_mode {
        dashboard.set_dark_mode(dark)?;
    }
    // Metrics a system does not track are left alone.
    if let Some(metric) = metric.filter(|m| dashboard.system().metrics().contains(m)) {
        dashboard.on_metric_select(metric, now)?;
    }
    Ok(())
}

pub async fn login(State(state): State<Arc<AppState>>, Json(request): Json<LoginRequest>) -> Response {
    match state.auth.login(&request.email, &request.password).await {
        Ok(outcome) => {
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::UNAUTHORIZED
            };
            (status, Json::<LoginOutcome>(outcome)).into_response()
        }
        Err(e) => {
            tracing::error!("Login failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    match state.auth.logout().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("Logout failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn session(State(state): State<Arc<AppState>>) -> Response {
    match state.auth.restore().await {
        Ok(user) => Json::<Option<User>>(user).into_response(),
        Err(e) => {
            tracing::error!("Session restore failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
