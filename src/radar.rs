//! One radar map instance: loader, compositors, frames and driver wired together.

use crate::animation::AnimationDriver;
use crate::compositor::{Compositor, PassOutcome, SharedSurface};
use crate::core::config::RadarConfig;
use crate::core::viewport::ViewportProvider;
use crate::frames::{Frame, FrameListFetcher, FrameSource};
use crate::overlay::{OverlayLayer, OverlayProjector};
use crate::prelude::Arc;
use crate::runtime::TaskHandle;
use crate::tiles::fetch::TileFetcher;
use crate::tiles::loader::TileLoader;
use crossbeam_channel::{Receiver, Sender};

/// Lifecycle events forwarded from the host map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    /// Pan, rotate or pitch in progress
    Move,
    MoveEnd,
    ZoomEnd,
    /// Style swapped; map-embedded layers must be redrawn
    StyleReload,
    Resize { width: u32, height: u32 },
}

/// Non-fatal, user-facing conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No frame source answered; the previous frames stay in place
    FrameListUnavailable { reason: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::FrameListUnavailable { reason } => {
                write!(f, "Radar frames are unavailable right now ({reason})")
            }
        }
    }
}

/// Everything one map needs for radar and overlays. Independent instances
/// share nothing.
pub struct RadarMap {
    config: RadarConfig,
    loader: TileLoader,
    driver: AnimationDriver,
    overlay: Arc<OverlayProjector>,
    frame_fetcher: Option<FrameListFetcher>,
    notice_tx: Sender<Notice>,
    notice_rx: Receiver<Notice>,
}

impl RadarMap {
    pub fn new(
        config: RadarConfig,
        fetcher: Arc<dyn TileFetcher>,
        viewport: Arc<dyn ViewportProvider>,
        radar_surface: SharedSurface,
        overlay_surface: SharedSurface,
    ) -> Self {
        Self::with_loader(
            config.clone(),
            TileLoader::new(fetcher, config.tile_loader.clone()),
            viewport,
            radar_surface,
            overlay_surface,
        )
    }

    /// Build around an existing loader (custom decoder, shared cache)
    pub fn with_loader(
        config: RadarConfig,
        loader: TileLoader,
        viewport: Arc<dyn ViewportProvider>,
        radar_surface: SharedSurface,
        overlay_surface: SharedSurface,
    ) -> Self {
        let compositor = Compositor::new(
            loader.clone(),
            radar_surface,
            config.compositor.radar_zoom,
            config.compositor.padding_degrees,
        );
        let driver = AnimationDriver::new(compositor, Arc::clone(&viewport), &config);
        let overlay = Arc::new(OverlayProjector::new(
            loader.clone(),
            overlay_surface,
            viewport,
            config.overlay.clone(),
            config.playback.frame_interval,
        ));
        let (notice_tx, notice_rx) = crossbeam_channel::unbounded();

        Self {
            config,
            loader,
            driver,
            overlay,
            frame_fetcher: None,
            notice_tx,
            notice_rx,
        }
    }

    /// Use `primary` (and optionally `fallback`) for [`RadarMap::refresh_frames`]
    pub fn with_frame_sources(
        mut self,
        primary: Arc<dyn FrameSource>,
        fallback: Option<Arc<dyn FrameSource>>,
    ) -> Self {
        let mut fetcher = FrameListFetcher::new(primary).with_notices(self.notice_tx.clone());
        if let Some(fallback) = fallback {
            fetcher = fetcher.with_fallback(fallback);
        }
        self.frame_fetcher = Some(fetcher);
        self
    }

    /// Fetch a new frame list and show its newest frame.
    ///
    /// On failure the current frames are kept and a [`Notice`] is queued.
    pub async fn refresh_frames(&self) -> Option<PassOutcome> {
        let fetcher = self.frame_fetcher.as_ref()?;
        let list = fetcher.fetch().await?;

        if let Some(host) = list.host {
            self.driver.set_tile_host(host);
        }
        log::debug!("fetched {} frames", list.frames.len());
        self.driver.set_frames(list.frames, None)?;
        Some(self.driver.render().await)
    }

    /// Replace frames directly and composite the selected one
    pub async fn set_frames(&self, frames: Vec<Frame>, default_index: Option<usize>) -> PassOutcome {
        self.driver.set_frames(frames, default_index);
        self.driver.render().await
    }

    pub async fn seek(&self, index: usize) -> PassOutcome {
        self.driver.seek(index).await
    }

    pub async fn step(&self, delta: isize) -> PassOutcome {
        self.driver.step(delta).await
    }

    pub fn play(&self) -> bool {
        self.driver.play()
    }

    pub fn pause(&self) {
        self.driver.pause()
    }

    pub fn toggle(&self) -> bool {
        self.driver.toggle()
    }

    pub fn set_compare(&self, enabled: bool) {
        self.driver.set_compare(enabled)
    }

    pub async fn select_overlay(&self, layer: Option<OverlayLayer>) -> PassOutcome {
        self.overlay.select(layer).await
    }

    /// React to a host map event. Returns the prewarm task on move/zoom end.
    pub async fn handle_event(&self, event: MapEvent) -> Option<TaskHandle> {
        log::trace!("map event {:?}", event);
        match event {
            MapEvent::Move => {
                self.driver.on_viewport_move();
                self.overlay.on_viewport_move();
                None
            }
            MapEvent::MoveEnd | MapEvent::ZoomEnd => {
                let prewarm = self.driver.on_move_end();
                self.overlay.render().await;
                prewarm
            }
            MapEvent::StyleReload => {
                self.driver.on_style_reload().await;
                self.overlay.render().await;
                None
            }
            MapEvent::Resize { width, height } => {
                self.driver.on_resize(width, height).await;
                self.overlay.on_resize(width, height).await;
                None
            }
        }
    }

    /// Queued notices; clone freely
    pub fn notices(&self) -> Receiver<Notice> {
        self.notice_rx.clone()
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn overlay(&self) -> &OverlayProjector {
        &self.overlay
    }

    /// Stop playback and pending redraws
    pub fn destroy(&self) {
        self.driver.destroy();
        self.overlay.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_message() {
        let notice = Notice::FrameListUnavailable {
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(
            notice.to_string(),
            "Radar frames are unavailable right now (HTTP 503)"
        );
    }
}
