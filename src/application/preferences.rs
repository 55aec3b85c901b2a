// Persisted dashboard preferences
use crate::application::chart_renderer::ThemeSource;
use crate::domain::dashboard::DisplayMode;
use crate::domain::metric::Metric;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "agri-chart-mode", default)]
    pub chart_mode: DisplayMode,
    #[serde(rename = "agri-dark-mode", default)]
    pub dark_mode: bool,
    #[serde(rename = "agri-selected-metric", default, skip_serializing_if = "Option::is_none")]
    pub selected_metric: Option<Metric>,
}

pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Preferences>;
    fn save(&self, preferences: &Preferences) -> anyhow::Result<()>;
}

/// Theme flag shared between the preference layer and chart renderers.
#[derive(Debug, Default)]
pub struct ThemeFlag(AtomicBool);

impl ThemeFlag {
    pub fn new(dark: bool) -> Self {
        Self(AtomicBool::new(dark))
    }

    pub fn set(&self, dark: bool) {
        self.0.store(dark, Ordering::SeqCst);
    }
}

impl ThemeSource for ThemeFlag {
    fn is_dark(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
