//! Engine-wide constants for the radar pipeline.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Web Mercator latitude limit in degrees.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Zoom band used for radar compositing passes.
pub const RADAR_ZOOM_BAND: (u8, u8) = (2, 12);

/// Zoom band used for overlays and cache prewarming.
pub const OVERLAY_ZOOM_BAND: (u8, u8) = (2, 8);

/// Degrees added around the viewport so imminent pans are already covered.
pub const VIEWPORT_PADDING_DEGREES: f64 = 0.8;

/// Most recent frames kept by the registry.
pub const MAX_FRAMES: usize = 12;

/// Tiles kept by the loader cache.
pub const TILE_CACHE_CAPACITY: usize = 512;

/// Redraw cadence for throttled viewport redraws (~60 fps).
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Delay between discrete frames during playback.
pub const PLAYBACK_INTERVAL_MS: u64 = 500;

/// Crossfade length between two frames.
pub const CROSSFADE_DURATION_MS: u64 = 600;

/// Radar opacity for the current frame.
pub const RADAR_OPACITY: f32 = 0.75;

/// Opacity of the previous frame in compare mode.
pub const GHOST_OPACITY: f32 = 0.28;

/// Opacity of auxiliary overlays.
pub const OVERLAY_OPACITY: f32 = 0.6;
