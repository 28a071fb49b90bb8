//! Playback, throttled redraws and crossfades on top of the compositor

pub mod crossfade;
pub mod driver;
pub mod throttle;

pub use crossfade::{Crossfade, EasingType};
pub use driver::AnimationDriver;
pub use throttle::RedrawThrottle;
