//! # radarcast
//!
//! An async radar tile compositor and animation pipeline for weather maps.
//!
//! The crate turns a viewport into a covering set of slippy-map tiles,
//! loads them through a de-duplicating cache, paints them into an
//! off-screen buffer using a projection captured at pass start, and blits
//! the finished frame to a render surface in one step. An animation driver
//! on top of that handles playback, redraw throttling and crossfades.

pub mod animation;
pub mod compositor;
pub mod core;
pub mod frames;
pub mod overlay;
pub mod prelude;
pub mod radar;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    config::{RadarConfig, RadarProfile},
    geo::{GeoBounds, LatLng, Point, TileCoord},
    viewport::{Viewport, ViewportProvider, ViewportSnapshot},
};

pub use tiles::{
    cache::TileCache,
    loader::{TileLoader, TileRequest},
    source::{RadarTileSource, TileUrlSource},
};

pub use frames::{Frame, FrameRegistry, FrameSource};

pub use compositor::{Compositor, PassLayer, PassOutcome, RasterSurface, RenderSurface};

pub use animation::{AnimationDriver, Crossfade};

pub use overlay::{OverlayLayer, OverlayProjector};

pub use radar::{MapEvent, Notice, RadarMap};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, RadarError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = RadarError;

/// Initialise `env_logger` from `RUST_LOG`; repeated calls are ignored
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
