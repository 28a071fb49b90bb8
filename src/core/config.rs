//! Configuration for the radar pipeline
//!
//! A [`RadarConfig`] groups the tunables of each stage (loader, compositor,
//! playback, crossfade, overlays). Presets are resolved from a
//! [`RadarProfile`]; any config can also be loaded from JSON, with missing
//! fields taking their defaults.

use crate::animation::crossfade::EasingType;
use crate::core::constants;
use crate::prelude::Duration;
use crate::tiles::loader::TileLoaderConfig;
use crate::tiles::math::ZoomBand;
use crate::tiles::source::RadarTileSource;
use crate::{RadarError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialize a `Duration` as whole milliseconds
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RadarProfile {
    #[default]
    Balanced,
    /// Fewer retries, smaller cache, narrower tile windows
    LowBandwidth,
    /// Crossfaded playback with a larger cache
    Smooth,
    Custom(RadarConfig),
}

impl RadarProfile {
    pub fn resolve(&self) -> RadarConfig {
        match self {
            Self::Balanced => RadarConfig::default(),
            Self::LowBandwidth => RadarConfig {
                tile_loader: TileLoaderConfig::low_bandwidth(),
                compositor: CompositorConfig {
                    radar_zoom: ZoomBand::new(2, 10),
                    padding_degrees: 0.0,
                    ..CompositorConfig::default()
                },
                playback: PlaybackConfig {
                    max_frames: 6,
                    interval: Duration::from_millis(800),
                    ..PlaybackConfig::default()
                },
                crossfade: CrossfadeConfig {
                    enabled: false,
                    ..CrossfadeConfig::default()
                },
                ..RadarConfig::default()
            },
            Self::Smooth => RadarConfig {
                tile_loader: TileLoaderConfig::high_performance(),
                crossfade: CrossfadeConfig {
                    enabled: true,
                    duration: Duration::from_millis(900),
                    easing: EasingType::Smooth,
                },
                ..RadarConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RadarConfig {
    pub tile_source: RadarTileSource,
    pub tile_loader: TileLoaderConfig,
    pub compositor: CompositorConfig,
    pub playback: PlaybackConfig,
    pub crossfade: CrossfadeConfig,
    pub overlay: OverlayConfig,
}

impl RadarConfig {
    /// Parse a config from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make the pipeline degenerate
    pub fn validate(&self) -> Result<()> {
        if self.playback.max_frames == 0 {
            return Err(RadarError::Config("playback.max_frames must be at least 1".into()));
        }
        if self.tile_loader.cache_capacity == 0 {
            return Err(RadarError::Config("tile_loader.cache_capacity must be at least 1".into()));
        }
        if self.playback.interval.is_zero() || self.playback.frame_interval.is_zero() {
            return Err(RadarError::Config("playback intervals must be non-zero".into()));
        }
        if !self.compositor.padding_degrees.is_finite() || self.compositor.padding_degrees < 0.0 {
            return Err(RadarError::Config("compositor.padding_degrees must be >= 0".into()));
        }
        for opacity in [
            self.compositor.radar_opacity,
            self.compositor.ghost_opacity,
            self.overlay.opacity,
        ] {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(RadarError::Config(format!("opacity {opacity} is outside 0..=1")));
            }
        }
        Ok(())
    }
}

/// Radar compositing passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub radar_zoom: ZoomBand,
    /// Band used when prewarming every frame after a move ends
    pub prewarm_zoom: ZoomBand,
    pub padding_degrees: f64,
    pub radar_opacity: f32,
    /// Opacity of the previous frame when compare mode is on
    pub ghost_opacity: f32,
    pub compare: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            radar_zoom: constants::RADAR_ZOOM_BAND.into(),
            prewarm_zoom: constants::OVERLAY_ZOOM_BAND.into(),
            padding_degrees: constants::VIEWPORT_PADDING_DEGREES,
            radar_opacity: constants::RADAR_OPACITY,
            ghost_opacity: constants::GHOST_OPACITY,
            compare: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub max_frames: usize,
    /// Time each frame stays on screen while playing
    #[serde(with = "millis")]
    pub interval: Duration,
    /// Redraw tick for throttled viewport redraws and crossfades
    #[serde(with = "millis")]
    pub frame_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_frames: constants::MAX_FRAMES,
            interval: Duration::from_millis(constants::PLAYBACK_INTERVAL_MS),
            frame_interval: Duration::from_millis(constants::FRAME_INTERVAL_MS),
        }
    }
}

impl PlaybackConfig {
    pub fn frames_per_second(&self) -> f64 {
        1.0 / self.interval.as_secs_f64().max(f64::EPSILON)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    pub enabled: bool,
    #[serde(with = "millis")]
    pub duration: Duration,
    pub easing: EasingType,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: Duration::from_millis(constants::CROSSFADE_DURATION_MS),
            easing: EasingType::Smooth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// URL template with `{layer}`, `{z}`, `{x}`, `{y}` and `{api_key}` placeholders
    pub url_template: String,
    pub api_key: Option<String>,
    pub zoom: ZoomBand,
    pub padding_degrees: f64,
    pub opacity: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            url_template: "https://tile.openweathermap.org/map/{layer}/{z}/{x}/{y}.png?appid={api_key}"
                .to_string(),
            api_key: None,
            zoom: constants::OVERLAY_ZOOM_BAND.into(),
            padding_degrees: constants::VIEWPORT_PADDING_DEGREES,
            opacity: constants::OVERLAY_OPACITY,
        }
    }
}
