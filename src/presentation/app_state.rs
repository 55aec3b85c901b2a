// Application state for HTTP handlers
use crate::application::animator::QueuedFrameClock;
use crate::application::auth::AuthService;
use crate::application::dashboard::DashboardOrchestrator;
use crate::application::data_source::DataSource;
use crate::application::live_feed::Subscription;
use crate::domain::metric::SystemId;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub type SharedDashboard = Arc<Mutex<DashboardOrchestrator<QueuedFrameClock>>>;

pub struct AppState {
    pub dashboards: BTreeMap<SystemId, SharedDashboard>,
    pub source: Arc<dyn DataSource>,
    pub auth: Arc<dyn AuthService>,
    pub chart_width: f64,
    pub chart_height: f64,
    /// Keeps every dashboard mounted on its live feed.
    pub mounts: Vec<Subscription>,
}

impl AppState {
    pub fn dashboard(&self, system: SystemId) -> Option<&SharedDashboard> {
        self.dashboards.get(&system)
    }
}
