use crate::core::config::PlaybackConfig;
use crate::frames::Frame;
use crate::prelude::Duration;

/// Ordered frame list plus playback state.
///
/// Frames are kept oldest to newest and capped to the most recent
/// `max_frames`. Whenever the list is non-empty the current index is in
/// range; an empty list forces the paused state at index 0.
#[derive(Debug, Clone)]
pub struct FrameRegistry {
    frames: Vec<Frame>,
    current_index: usize,
    is_playing: bool,
    interval: Duration,
    max_frames: usize,
}

impl FrameRegistry {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            frames: Vec::new(),
            current_index: 0,
            is_playing: false,
            interval: config.interval,
            max_frames: config.max_frames.max(1),
        }
    }

    /// Replace the whole list.
    ///
    /// The index goes to `default_index` (clamped) or to the newest frame.
    /// Returns the new current index, `None` when the list is empty.
    pub fn set_frames(&mut self, mut frames: Vec<Frame>, default_index: Option<usize>) -> Option<usize> {
        frames.sort_by_key(|frame| frame.timestamp_seconds);
        if frames.len() > self.max_frames {
            frames.drain(..frames.len() - self.max_frames);
        }
        self.frames = frames;

        if self.frames.is_empty() {
            self.current_index = 0;
            self.is_playing = false;
            return None;
        }

        let last = self.frames.len() - 1;
        self.current_index = default_index.map_or(last, |index| index.min(last));
        Some(self.current_index)
    }

    /// Clamp and select `index`. `None` when there are no frames.
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        let last = self.frames.len().checked_sub(1)?;
        self.current_index = index.min(last);
        Some(self.current_index)
    }

    /// Move by `delta` frames, wrapping at both ends
    pub fn step(&mut self, delta: isize) -> Option<usize> {
        let len = self.frames.len() as isize;
        if len == 0 {
            return None;
        }
        let index = (self.current_index as isize + delta).rem_euclid(len);
        self.current_index = index as usize;
        Some(self.current_index)
    }

    /// Playback tick: next frame modulo the frame count
    pub fn advance(&mut self) -> Option<usize> {
        self.step(1)
    }

    /// Request a play state change. Playing an empty list is refused.
    ///
    /// Returns the resulting play state.
    pub fn set_playing(&mut self, playing: bool) -> bool {
        self.is_playing = playing && !self.frames.is_empty();
        self.is_playing
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.get(self.current_index)
    }

    /// The frame shown before the current one, if any
    pub fn previous_index(&self) -> Option<usize> {
        self.current_index.checked_sub(1).filter(|_| !self.frames.is_empty())
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Zero intervals are bumped to 1ms so the ticker never spins
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(Duration::from_millis(1));
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}
