//! Drives a transition's progress over wall-clock time.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::trace;

use crate::transition::{Direction, Easing, Swap, Transition};

/// Wraps one [`Transition`] with a duration, an optional start delay and an
/// easing curve.
///
/// `progress` is the raw linear fraction; it only ever grows and reaches
/// exactly `1.0` on completion (by elapsed time or [`stop`](Self::stop)).
/// Transitions are fed [`eased_progress`](Self::eased_progress).
#[derive(Clone)]
pub struct TransitionAnimator {
    transition: Arc<dyn Transition>,
    duration: Duration,
    delay: Duration,
    easing: Easing,
    started_at: Option<Instant>,
    progress: f32,
    stopped: bool,
}

impl TransitionAnimator {
    pub fn new(transition: Arc<dyn Transition>, duration: Duration) -> Self {
        Self {
            transition,
            duration,
            delay: Duration::ZERO,
            easing: Easing::Linear,
            started_at: None,
            progress: 0.0,
            stopped: false,
        }
    }

    /// A zero-duration swap; completes as soon as it is started.
    pub fn cut(direction: Direction) -> Self {
        Self::new(Arc::new(Swap::new(direction)), Duration::ZERO)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn transition(&self) -> &Arc<dyn Transition> {
        &self.transition
    }

    pub fn direction(&self) -> Direction {
        self.transition.direction()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Records the start time and takes the first sample.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.progress = 0.0;
        self.stopped = false;
        self.tick(now);
    }

    /// Advances progress to `clamp((now - start - delay) / duration, 0, 1)`.
    ///
    /// Never moves backwards, even if `now` does. Returns the new raw progress.
    pub fn tick(&mut self, now: Instant) -> f32 {
        if self.is_complete() {
            return self.progress;
        }
        let Some(start) = self.started_at else {
            return self.progress;
        };
        let elapsed = now.saturating_duration_since(start).saturating_sub(self.delay);
        let fraction = if self.duration.is_zero() {
            if now.saturating_duration_since(start) >= self.delay { 1.0 } else { 0.0 }
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
        };
        if fraction > self.progress {
            self.progress = fraction;
        }
        trace!("Animator '{}' progress {:.3}", self.transition.name(), self.progress);
        self.progress
    }

    /// Forces immediate completion without further ticking.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.progress = 1.0;
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn eased_progress(&self) -> f32 {
        self.easing.apply(self.progress)
    }
}

impl fmt::Debug for TransitionAnimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionAnimator")
            .field("transition", &self.transition.name())
            .field("direction", &self.transition.direction())
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("easing", &self.easing)
            .field("progress", &self.progress)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::Fade;

    fn fade(ms: u64) -> TransitionAnimator {
        TransitionAnimator::new(Arc::new(Fade::new(Direction::In)), Duration::from_millis(ms))
    }

    #[test]
    fn progress_follows_elapsed_time_and_hits_one() {
        let t0 = Instant::now();
        let mut anim = fade(300);
        anim.start(t0);
        assert_eq!(anim.progress(), 0.0);
        assert!((anim.tick(t0 + Duration::from_millis(150)) - 0.5).abs() < 1e-3);
        assert!(!anim.is_complete());
        assert_eq!(anim.tick(t0 + Duration::from_millis(450)), 1.0);
        assert!(anim.is_complete());
    }

    #[test]
    fn progress_never_decreases() {
        let t0 = Instant::now();
        let mut anim = fade(100);
        anim.start(t0);
        anim.tick(t0 + Duration::from_millis(80));
        let later = anim.progress();
        anim.tick(t0 + Duration::from_millis(10));
        assert_eq!(anim.progress(), later);
    }

    #[test]
    fn delay_holds_progress_at_zero() {
        let t0 = Instant::now();
        let mut anim = fade(100).with_delay(Duration::from_millis(50));
        anim.start(t0);
        assert_eq!(anim.tick(t0 + Duration::from_millis(40)), 0.0);
        assert!((anim.tick(t0 + Duration::from_millis(100)) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn cut_completes_on_start() {
        let mut anim = TransitionAnimator::cut(Direction::In);
        anim.start(Instant::now());
        assert!(anim.is_complete());
        assert_eq!(anim.eased_progress(), 1.0);
    }

    #[test]
    fn stop_forces_completion() {
        let mut anim = fade(10_000);
        anim.start(Instant::now());
        anim.stop();
        assert!(anim.is_complete());
        assert!(anim.was_stopped());
        anim.stop();
        assert_eq!(anim.progress(), 1.0);
    }
}
