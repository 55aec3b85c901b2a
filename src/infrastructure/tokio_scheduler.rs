// Tokio-backed interval timer for live feeds
use crate::application::scheduler::{IntervalScheduler, TickFn, TimerHandle};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Binds to the runtime of the calling task.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl IntervalScheduler for TokioScheduler {
    fn start(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        let task = self.handle.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });

        TimerHandle::new(move || task.abort())
    }
}
