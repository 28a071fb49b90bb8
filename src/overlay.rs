//! Auxiliary weather rasters (temperature, wind, ...) composited on their
//! own surface with the same tile pipeline as the radar.

use crate::animation::throttle::RedrawThrottle;
use crate::compositor::{Compositor, PassLayer, PassOutcome, SharedSurface};
use crate::core::config::OverlayConfig;
use crate::core::geo::TileCoord;
use crate::core::viewport::ViewportProvider;
use crate::prelude::{Arc, Duration, Mutex};
use crate::runtime::TaskHandle;
use crate::tiles::loader::TileLoader;
use crate::tiles::source::TileUrlSource;
use crate::RadarError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayer {
    Temperature,
    WindSpeed,
    Pressure,
    Clouds,
    Precipitation,
}

impl OverlayLayer {
    pub fn all() -> &'static [OverlayLayer] {
        &[
            OverlayLayer::Temperature,
            OverlayLayer::WindSpeed,
            OverlayLayer::Pressure,
            OverlayLayer::Clouds,
            OverlayLayer::Precipitation,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            OverlayLayer::Temperature => "temperature",
            OverlayLayer::WindSpeed => "wind_speed",
            OverlayLayer::Pressure => "pressure",
            OverlayLayer::Clouds => "clouds",
            OverlayLayer::Precipitation => "precipitation",
        }
    }

    /// Layer id substituted for `{layer}` in tile URLs
    pub fn tile_layer(&self) -> &'static str {
        match self {
            OverlayLayer::Temperature => "temp_new",
            OverlayLayer::WindSpeed => "wind_new",
            OverlayLayer::Pressure => "pressure_new",
            OverlayLayer::Clouds => "clouds_new",
            OverlayLayer::Precipitation => "precipitation_new",
        }
    }
}

impl std::fmt::Display for OverlayLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverlayLayer {
    type Err = RadarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OverlayLayer::all()
            .iter()
            .find(|layer| layer.name() == s)
            .copied()
            .ok_or_else(|| RadarError::Config(format!("unknown overlay layer '{s}'")))
    }
}

/// Tile URLs from a `{layer}/{z}/{x}/{y}` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayTileSource {
    template: String,
    layer: OverlayLayer,
    api_key: String,
}

impl OverlayTileSource {
    pub fn new(template: impl Into<String>, layer: OverlayLayer, api_key: Option<String>) -> Self {
        Self {
            template: template.into(),
            layer,
            api_key: api_key.unwrap_or_default(),
        }
    }

    pub fn layer(&self) -> OverlayLayer {
        self.layer
    }
}

impl TileUrlSource for OverlayTileSource {
    fn url(&self, coord: TileCoord) -> String {
        self.template
            .replace("{layer}", self.layer.tile_layer())
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{api_key}", &self.api_key)
    }
}

/// At most one active overlay, drawn at a fixed opacity on its own surface.
pub struct OverlayProjector {
    compositor: Compositor,
    viewport: Arc<dyn ViewportProvider>,
    active: Mutex<Option<OverlayLayer>>,
    config: OverlayConfig,
    throttle: RedrawThrottle,
    redraws: Mutex<Vec<TaskHandle>>,
}

impl OverlayProjector {
    /// `loader` is normally shared with the radar compositor
    pub fn new(
        loader: TileLoader,
        surface: SharedSurface,
        viewport: Arc<dyn ViewportProvider>,
        config: OverlayConfig,
        frame_interval: Duration,
    ) -> Self {
        Self {
            compositor: Compositor::new(loader, surface, config.zoom, config.padding_degrees),
            viewport,
            active: Mutex::new(None),
            config,
            throttle: RedrawThrottle::new(frame_interval),
            redraws: Mutex::new(Vec::new()),
        }
    }

    /// Activate `layer` (replacing any other) or clear the overlay with `None`.
    pub async fn select(&self, layer: Option<OverlayLayer>) -> PassOutcome {
        if let Ok(mut active) = self.active.lock() {
            *active = layer;
        }
        match layer {
            Some(layer) => log::debug!("overlay {} selected", layer),
            None => log::debug!("overlay cleared"),
        }
        self.render().await
    }

    /// Composite the active overlay. With none active this blits a clear buffer.
    pub async fn render(&self) -> PassOutcome {
        let layers: Vec<PassLayer> = self
            .active()
            .map(|layer| {
                let source = OverlayTileSource::new(
                    self.config.url_template.clone(),
                    layer,
                    self.config.api_key.clone(),
                );
                PassLayer::new(Arc::new(source), self.config.opacity)
            })
            .into_iter()
            .collect();
        self.compositor.composite(&*self.viewport, &layers).await
    }

    /// Throttled redraw while the viewport moves; skipped with no overlay active
    pub fn on_viewport_move(self: &Arc<Self>) -> bool {
        if self.active().is_none() {
            return false;
        }
        let projector = Arc::clone(self);
        let scheduled = self.throttle.request(move || async move {
            projector.render().await;
        });
        let Some(handle) = scheduled else {
            return false;
        };
        if let Ok(mut redraws) = self.redraws.lock() {
            redraws.retain(|handle| !handle.is_finished());
            redraws.push(handle);
        }
        true
    }

    /// Cancel pending redraws and drop any pass still in flight
    pub fn destroy(&self) {
        if let Ok(mut redraws) = self.redraws.lock() {
            for handle in redraws.drain(..) {
                handle.cancel();
            }
        }
        self.throttle.reset();
        self.compositor.invalidate();
        log::debug!("overlay projector destroyed");
    }

    pub async fn on_resize(&self, width: u32, height: u32) -> PassOutcome {
        self.compositor.resize(width, height);
        self.render().await
    }

    pub fn active(&self) -> Option<OverlayLayer> {
        self.active.lock().ok().and_then(|active| *active)
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let source = OverlayTileSource::new(
            OverlayConfig::default().url_template,
            OverlayLayer::WindSpeed,
            Some("k3y".to_string()),
        );
        assert_eq!(
            source.url(TileCoord::new(5, 9, 4)),
            "https://tile.openweathermap.org/map/wind_new/4/5/9.png?appid=k3y"
        );
    }

    #[test]
    fn test_layer_names_round_trip() {
        for layer in OverlayLayer::all() {
            assert_eq!(layer.name().parse::<OverlayLayer>().unwrap(), *layer);
        }
        assert!("humidity".parse::<OverlayLayer>().is_err());
        assert_eq!(
            serde_json::to_string(&OverlayLayer::WindSpeed).unwrap(),
            "\"wind_speed\""
        );
    }
}
