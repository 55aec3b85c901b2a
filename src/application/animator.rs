// Entry animation for chart lines
use crate::application::scheduler::{FrameClock, FrameId};
use crate::domain::dashboard::DisplayMode;
use crate::domain::metric::{Metric, SystemId};
use std::collections::VecDeque;

pub const ANIMATION_DURATION_MS: f64 = 1500.0;

/// Fewest points drawn while a line is being revealed.
pub const MIN_VISIBLE_POINTS: usize = 2;

pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Number of leading samples drawn at `progress`.
pub fn reveal_count(progress: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let progress = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 1.0 };
    let revealed = (len as f64 * progress).floor() as usize;
    revealed.max(MIN_VISIBLE_POINTS).min(len)
}

/// What a chart is showing. A change restarts the animation; new samples for
/// the same identity do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesIdentity {
    pub system: SystemId,
    pub metric: Metric,
    pub mode: DisplayMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationState {
    Idle,
    Animating { started_at: f64 },
    Done,
}

pub struct RevealAnimator<C: FrameClock> {
    clock: C,
    state: AnimationState,
    progress: f64,
    pending: Option<FrameId>,
    identity: Option<SeriesIdentity>,
    duration_ms: f64,
}

impl<C: FrameClock> RevealAnimator<C> {
    pub fn new(clock: C) -> Self {
        Self::with_duration(clock, ANIMATION_DURATION_MS)
    }

    pub fn with_duration(clock: C, duration_ms: f64) -> Self {
        Self {
            clock,
            state: AnimationState::Idle,
            progress: 0.0,
            pending: None,
            identity: None,
            duration_ms: duration_ms.max(1.0),
        }
    }

    /// Resets progress to 0 and schedules the first frame, dropping any frame
    /// still pending from an earlier run.
    pub fn start(&mut self, now_ms: f64) {
        self.cancel_pending();
        self.state = AnimationState::Animating { started_at: now_ms };
        self.progress = 0.0;
        self.pending = Some(self.clock.request_frame());
    }

    /// Advances the animation for a delivered frame. Frames that arrive after
    /// cancellation are ignored.
    pub fn on_frame(&mut self, id: FrameId, now_ms: f64) -> f64 {
        if self.pending != Some(id) {
            return self.progress;
        }
        self.pending = None;

        let AnimationState::Animating { started_at } = self.state else {
            return self.progress;
        };

        let linear = ((now_ms - started_at) / self.duration_ms).clamp(0.0, 1.0);
        // Never move backwards, even if the host clock does.
        self.progress = self.progress.max(ease_out_cubic(linear));

        if linear >= 1.0 {
            self.progress = 1.0;
            self.state = AnimationState::Done;
        } else {
            self.pending = Some(self.clock.request_frame());
        }
        self.progress
    }

    /// Stops the animation without touching progress.
    pub fn cancel(&mut self) {
        self.cancel_pending();
        if matches!(self.state, AnimationState::Animating { .. }) {
            self.state = AnimationState::Idle;
        }
    }

    /// Restarts only when the chart shows a different series.
    pub fn sync(&mut self, identity: SeriesIdentity, now_ms: f64) -> bool {
        if self.identity == Some(identity) {
            return false;
        }
        tracing::debug!(
            "Restarting reveal for {} {} ({})",
            identity.system,
            identity.metric,
            identity.mode
        );
        self.identity = Some(identity);
        self.start(now_ms);
        true
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn pending_frame(&self) -> Option<FrameId> {
        self.pending
    }

    pub fn identity(&self) -> Option<SeriesIdentity> {
        self.identity
    }

    pub fn reveal_count(&self, len: usize) -> usize {
        reveal_count(self.progress, len)
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.clock.cancel_frame(id);
        }
    }
}

impl<C: FrameClock> Drop for RevealAnimator<C> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Frame clock for hosts that pull frames: requested frames queue up until
/// the host drains them, cancelled ones are removed.
#[derive(Debug, Default)]
pub struct QueuedFrameClock {
    next: u64,
    queue: VecDeque<FrameId>,
}

impl QueuedFrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every frame requested so far. Frames requested while these are
    /// delivered wait for the next drain.
    pub fn drain_due(&mut self) -> Vec<FrameId> {
        self.queue.drain(..).collect()
    }
}

impl FrameClock for QueuedFrameClock {
    fn request_frame(&mut self) -> FrameId {
        self.next += 1;
        let id = FrameId(self.next);
        self.queue.push_back(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.queue.retain(|queued| *queued != id);
    }
}
