use crate::application::animator::ANIMATION_DURATION_MS;
use crate::application::dashboard::HISTORY_CAPACITY;
use crate::application::live_feed::UPDATE_INTERVAL_MS;
use crate::domain::metric::{Metric, SystemId};
use crate::domain::series::{SeriesSeed, MAX_LIVE_POINTS};
use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub preferences: PreferenceSettings,
    pub remote: Option<RemoteSettings>,
    #[serde(default)]
    pub systems: Vec<SystemConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitoringSettings {
    pub update_interval_ms: u64,
    pub realtime_points: usize,
    pub history_capacity: usize,
    pub animation_duration_ms: f64,
    /// Offset from UTC used for labels and calendar buckets.
    pub timezone_offset_minutes: i32,
    pub chart_width: f64,
    pub chart_height: f64,
    pub rng_seed: Option<u64>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: UPDATE_INTERVAL_MS,
            realtime_points: MAX_LIVE_POINTS,
            history_capacity: HISTORY_CAPACITY,
            animation_duration_ms: ANIMATION_DURATION_MS,
            timezone_offset_minutes: 7 * 60,
            chart_width: 640.0,
            chart_height: 270.0,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PreferenceSettings {
    /// TOML file the dashboard preferences persist to. In-memory if unset.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSettings {
    pub base_url: String,
    pub token: Option<String>,
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_history_template")]
    pub history_template: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    pub id: SystemId,
    #[serde(default)]
    pub seeds: Vec<SeriesSeed>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_url_template() -> String {
    "${base_url}/monitoring/${system}/".to_string()
}

fn default_history_template() -> String {
    "${base_url}/monitoring/${system}/history/?window_ms=${window_ms}".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl MonitoringSettings {
    pub fn timezone(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60)
            .with_context(|| format!("Invalid timezone offset {} minutes", self.timezone_offset_minutes))
    }
}

impl MonitoringConfig {
    /// Seeds of `system`, falling back to the built-in sensor profile.
    pub fn seeds_for(&self, system: SystemId) -> Vec<SeriesSeed> {
        self.systems
            .iter()
            .find(|s| s.id == system && !s.seeds.is_empty())
            .map(|s| s.seeds.clone())
            .unwrap_or_else(|| default_seeds(system))
    }
}

fn seed(metric: Metric, base: f64, variance: f64, step_variance: f64) -> SeriesSeed {
    SeriesSeed {
        metric,
        base,
        variance,
        step_variance,
    }
}

pub fn default_seeds(system: SystemId) -> Vec<SeriesSeed> {
    match system {
        SystemId::GhCompax => vec![
            seed(Metric::Temperature, 28.5, 3.0, 0.5),
            seed(Metric::Humidity, 75.0, 10.0, 1.5),
            seed(Metric::Tvoc, 0.35, 0.5, 0.05),
            seed(Metric::Eco2, 450.0, 100.0, 10.0),
            seed(Metric::Tds, 850.0, 150.0, 25.0),
            seed(Metric::Ph, 6.8, 1.0, 0.1),
        ],
        SystemId::SkyVera => vec![
            seed(Metric::WindSpeed, 12.5, 8.0, 1.0),
            seed(Metric::Rainfall, 4.5, 4.0, 0.5),
            seed(Metric::Temperature, 29.1, 3.0, 1.0),
            seed(Metric::Humidity, 78.0, 10.0, 3.0),
            seed(Metric::Co2, 415.0, 50.0, 20.0),
            seed(Metric::Tvoc, 0.36, 0.2, 0.1),
        ],
    }
}

/// Loads `config/monitoring.toml` when present, then environment overrides
/// such as `AGRI__MONITORING__UPDATE_INTERVAL_MS`.
pub fn load_monitoring_config() -> anyhow::Result<MonitoringConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitoring").required(false))
        .add_source(
            config::Environment::with_prefix("AGRI")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read monitoring configuration")?;

    settings
        .try_deserialize()
        .context("Invalid monitoring configuration")
}

/// Replace template variables in a URL or query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
