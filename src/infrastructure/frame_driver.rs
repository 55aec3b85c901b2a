// Tokio frame loop that drives chart reveal animations
use crate::application::animator::QueuedFrameClock;
use crate::application::dashboard::DashboardOrchestrator;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Roughly 60 frames per second.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

type Driven = Mutex<DashboardOrchestrator<QueuedFrameClock>>;

/// Delivers queued animation frames to `dashboard` every `period`, reading
/// the wall clock from `now_ms`. Stops once the dashboard is dropped.
pub fn spawn_frame_driver<F>(dashboard: &Arc<Driven>, period: Duration, now_ms: F) -> JoinHandle<()>
where
    F: Fn() -> i64 + Send + 'static,
{
    let weak = Arc::downgrade(dashboard);
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !pump(&weak, now_ms()) {
                break;
            }
        }
    })
}

fn pump(weak: &Weak<Driven>, now_ms: i64) -> bool {
    let Some(shared) = weak.upgrade() else {
        return false;
    };
    match shared.lock() {
        Ok(mut dashboard) => {
            dashboard.pump_frames(now_ms);
            true
        }
        Err(_) => {
            tracing::error!("Dashboard state is poisoned, stopping frame driver");
            false
        }
    }
}
