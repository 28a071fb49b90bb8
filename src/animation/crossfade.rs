use crate::prelude::Duration;
use serde::{Deserialize, Serialize};

/// Easing curves for opacity transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EasingType {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Smoothstep (3t^2 - 2t^3)
    #[default]
    Smooth,
    /// Smootherstep (6t^5 - 15t^4 + 10t^3)
    UltraSmooth,
}

impl EasingType {
    /// Apply easing function to a normalized time value (0.0 to 1.0)
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            EasingType::Linear => t,
            EasingType::EaseIn => t * t * t,
            EasingType::EaseOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            EasingType::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            EasingType::Smooth => t * t * (3.0 - 2.0 * t),
            EasingType::UltraSmooth => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
        }
    }
}

/// Opacity interpolation between two frames.
///
/// Driven by [`Crossfade::tick`] with elapsed time, so it runs the same on
/// a real or simulated clock. At completion the opacities are exactly
/// `(0, opacity)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossfade {
    from: usize,
    to: usize,
    elapsed: Duration,
    duration: Duration,
    easing: EasingType,
    opacity: f32,
}

impl Crossfade {
    pub fn new(from: usize, to: usize, duration: Duration, easing: EasingType, opacity: f32) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
            duration,
            easing,
            opacity,
        }
    }

    /// Advance by `dt`; returns true once the fade is complete
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
        self.is_complete()
    }

    /// Normalised time in `0..=1`. A zero duration is complete at once.
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.progress() >= 1.0
    }

    /// `(from, to)` layer opacities at the current time
    pub fn opacities(&self) -> (f32, f32) {
        if self.is_complete() {
            return (0.0, self.opacity);
        }
        let eased = self.easing.apply(self.progress()) as f32;
        (self.opacity * (1.0 - eased), self.opacity * eased)
    }

    /// Next fade in the loop: starts from this fade's target
    pub fn rearm(&self, next: usize) -> Self {
        Self::new(self.to, next, self.duration, self.easing, self.opacity)
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
