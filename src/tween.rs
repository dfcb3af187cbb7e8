//! Frame-driven interpolation of a single scalar.

use std::time::{Duration, Instant};

use crate::easing::Ease;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenStatus {
    Running,
    Finished,
}

/// Drives a value from `from` to `to` over `duration`, one step per frame.
///
/// Elapsed time is measured from the first frame the tween sees, not from
/// construction, so the gap before the first frame never eats into the
/// animation.
#[derive(Debug, Clone)]
pub struct Tween {
    from: f64,
    to: f64,
    duration: Duration,
    ease: Ease,
    started_at: Option<Instant>,
    finished: bool,
}

impl Tween {
    pub fn new(from: f64, to: f64, duration: Duration, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration,
            ease,
            started_at: None,
            finished: false,
        }
    }

    /// Advance to the frame at `now`, handing the interpolated value to
    /// `on_step`. The final value is delivered exactly once.
    pub fn tick(&mut self, now: Instant, mut on_step: impl FnMut(f64)) -> TweenStatus {
        if self.finished {
            return TweenStatus::Finished;
        }

        let started_at = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started_at);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / self.duration.as_secs_f64()
        };

        if progress >= 1.0 {
            on_step(self.to);
            self.finished = true;
            return TweenStatus::Finished;
        }

        on_step(self.from + (self.to - self.from) * (self.ease)(progress));
        TweenStatus::Running
    }
}
