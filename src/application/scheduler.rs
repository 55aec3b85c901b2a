// Scheduling abstractions for the live feed timer and the frame clock
use std::time::Duration;
use std::sync::Arc;

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Owns a running periodic timer. Cancelling or dropping it stops the timer
/// before returning.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Periodic timer strategy behind the live feed.
pub trait IntervalScheduler: Send + Sync {
    /// Calls `tick` every `period`, first after one full period.
    fn start(&self, period: Duration, tick: TickFn) -> TimerHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// Host frame scheduling (request/cancel), the animator's only clock.
pub trait FrameClock: Send {
    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
}
