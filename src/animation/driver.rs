use crate::animation::crossfade::Crossfade;
use crate::animation::throttle::RedrawThrottle;
use crate::compositor::{Compositor, PassLayer, PassOutcome};
use crate::core::config::{CompositorConfig, CrossfadeConfig, RadarConfig};
use crate::core::viewport::ViewportProvider;
use crate::frames::{Frame, FrameRegistry};
use crate::prelude::{Arc, Duration, Mutex};
use crate::runtime::{self, TaskHandle};
use crate::tiles::math;
use crate::tiles::source::{RadarTileSource, TileUrlSource};
use tokio_util::sync::CancellationToken;

/// Running playback loop
struct Ticker {
    token: CancellationToken,
    handle: TaskHandle,
}

struct DriverState {
    compositor: Compositor,
    viewport: Arc<dyn ViewportProvider>,
    registry: Mutex<FrameRegistry>,
    crossfade: Mutex<Option<Crossfade>>,
    tiles: Mutex<RadarTileSource>,
    settings: Mutex<CompositorConfig>,
    fade: CrossfadeConfig,
    frame_interval: Duration,
}

/// Drives radar playback and redraws.
///
/// Owns the frame registry and the radar compositor. Playback runs as one
/// spawned ticker; pausing cancels its token and aborts the task, so no
/// tick can land after `pause` returns.
pub struct AnimationDriver {
    state: Arc<DriverState>,
    throttle: RedrawThrottle,
    ticker: Mutex<Option<Ticker>>,
    redraws: Mutex<Vec<TaskHandle>>,
}

impl AnimationDriver {
    pub fn new(compositor: Compositor, viewport: Arc<dyn ViewportProvider>, config: &RadarConfig) -> Self {
        let frame_interval = config.playback.frame_interval;
        Self {
            state: Arc::new(DriverState {
                compositor,
                viewport,
                registry: Mutex::new(FrameRegistry::new(&config.playback)),
                crossfade: Mutex::new(None),
                tiles: Mutex::new(config.tile_source.clone()),
                settings: Mutex::new(config.compositor.clone()),
                fade: config.crossfade.clone(),
                frame_interval,
            }),
            throttle: RedrawThrottle::new(frame_interval),
            ticker: Mutex::new(None),
            redraws: Mutex::new(Vec::new()),
        }
    }

    /// Replace the frame list. Clears any crossfade; an empty list stops playback.
    pub fn set_frames(&self, frames: Vec<Frame>, default_index: Option<usize>) -> Option<usize> {
        self.state.clear_crossfade();
        let index = self.state.with_registry(|registry| registry.set_frames(frames, default_index));
        if index.is_none() {
            self.stop_ticker();
        }
        log::debug!("frames replaced, current index {:?}", index);
        index
    }

    /// Select a frame and composite it
    pub async fn seek(&self, index: usize) -> PassOutcome {
        self.state.clear_crossfade();
        self.state.with_registry(|registry| registry.seek(index));
        self.state.render().await
    }

    /// Move `delta` frames (wrapping) and composite
    pub async fn step(&self, delta: isize) -> PassOutcome {
        self.state.clear_crossfade();
        self.state.with_registry(|registry| registry.step(delta));
        self.state.render().await
    }

    /// Start the playback loop. No-op returning `false` when there are no frames.
    pub fn play(&self) -> bool {
        if !self.state.with_registry(|registry| registry.set_playing(true)) {
            return false;
        }

        let mut ticker = match self.ticker.lock() {
            Ok(ticker) => ticker,
            Err(poisoned) => poisoned.into_inner(),
        };
        if ticker.is_none() {
            let token = CancellationToken::new();
            let handle = runtime::spawn(run_playback(Arc::clone(&self.state), token.clone()));
            *ticker = Some(Ticker { token, handle });
            log::debug!("playback started");
        }
        true
    }

    /// Stop playback, leaving the last composited frame on screen
    pub fn pause(&self) {
        self.state.with_registry(|registry| registry.set_playing(false));
        self.stop_ticker();
        self.state.clear_crossfade();
    }

    /// Returns the new play state
    pub fn toggle(&self) -> bool {
        if self.is_playing() {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    /// Viewport is moving: redraw the current frame at most once per frame tick
    pub fn on_viewport_move(&self) {
        let state = Arc::clone(&self.state);
        let scheduled = self.throttle.request(move || async move {
            state.render().await;
        });
        if let Some(handle) = scheduled {
            if let Ok(mut redraws) = self.redraws.lock() {
                redraws.retain(|handle| !handle.is_finished());
                redraws.push(handle);
            }
        }
    }

    /// Viewport settled: warm the cache with every frame's tiles, fire-and-forget
    pub fn on_move_end(&self) -> Option<TaskHandle> {
        self.state.prewarm()
    }

    /// The host restyled the map: composite again from scratch
    pub async fn on_style_reload(&self) -> PassOutcome {
        self.state.render().await
    }

    pub async fn on_resize(&self, width: u32, height: u32) -> PassOutcome {
        self.state.compositor.resize(width, height);
        self.state.render().await
    }

    /// Composite the current frame now
    pub async fn render(&self) -> PassOutcome {
        self.state.render().await
    }

    /// Stop everything. The surface keeps whatever was last blitted.
    pub fn destroy(&self) {
        self.pause();
        if let Ok(mut redraws) = self.redraws.lock() {
            for handle in redraws.drain(..) {
                handle.cancel();
            }
        }
        self.throttle.reset();
        self.state.compositor.invalidate();
        log::debug!("animation driver destroyed");
    }

    pub fn set_compare(&self, enabled: bool) {
        if let Ok(mut settings) = self.state.settings.lock() {
            settings.compare = enabled;
        }
    }

    /// Point tile URLs at a new host, as announced by a frame list
    pub fn set_tile_host(&self, host: impl Into<String>) {
        if let Ok(mut tiles) = self.state.tiles.lock() {
            tiles.host = host.into();
        }
    }

    pub fn set_interval(&self, interval: Duration) {
        self.state.with_registry(|registry| registry.set_interval(interval));
    }

    pub fn is_playing(&self) -> bool {
        self.state.with_registry(|registry| registry.is_playing())
    }

    /// Whether a playback task exists
    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().map(|ticker| ticker.is_some()).unwrap_or(false)
    }

    pub fn current_index(&self) -> usize {
        self.state.with_registry(|registry| registry.current_index())
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.state.with_registry(|registry| registry.current_frame().cloned())
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.state.with_registry(|registry| registry.frames().to_vec())
    }

    pub fn crossfade(&self) -> Option<Crossfade> {
        self.state.crossfade.lock().ok().and_then(|fade| fade.clone())
    }

    pub fn compositor(&self) -> &Compositor {
        &self.state.compositor
    }

    fn stop_ticker(&self) {
        let ticker = self.ticker.lock().ok().and_then(|mut ticker| ticker.take());
        if let Some(ticker) = ticker {
            ticker.token.cancel();
            ticker.handle.cancel();
            log::debug!("playback stopped");
        }
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl DriverState {
    fn with_registry<T>(&self, f: impl FnOnce(&mut FrameRegistry) -> T) -> T {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut registry)
    }

    fn clear_crossfade(&self) {
        if let Ok(mut fade) = self.crossfade.lock() {
            *fade = None;
        }
    }

    fn layer(&self, frame: &Frame, opacity: f32) -> Option<PassLayer> {
        let tiles = self.tiles.lock().ok()?.for_frame(frame.path_token.clone());
        Some(PassLayer::new(Arc::new(tiles), opacity))
    }

    /// Layers for the current state, built without holding any lock afterwards
    fn layers(&self) -> Vec<PassLayer> {
        let settings = match self.settings.lock() {
            Ok(settings) => settings.clone(),
            Err(_) => return Vec::new(),
        };
        let fade = self.crossfade.lock().ok().and_then(|fade| fade.clone());

        self.with_registry(|registry| {
            if let Some(fade) = fade {
                let (from_opacity, to_opacity) = fade.opacities();
                return [(fade.from(), from_opacity), (fade.to(), to_opacity)]
                    .into_iter()
                    .filter(|(_, opacity)| *opacity > 0.0)
                    .filter_map(|(index, opacity)| self.layer(registry.frame(index)?, opacity))
                    .collect();
            }

            let mut layers = Vec::new();
            if let Some(frame) = registry.current_frame() {
                layers.extend(self.layer(frame, settings.radar_opacity));
            }
            if settings.compare {
                if let Some(ghost) = registry.previous_index().and_then(|index| registry.frame(index)) {
                    layers.extend(self.layer(ghost, settings.ghost_opacity));
                }
            }
            layers
        })
    }

    async fn render(&self) -> PassOutcome {
        let layers = self.layers();
        self.compositor.composite(&*self.viewport, &layers).await
    }

    /// One crossfade step over `dt` of elapsed time; arms a new fade when none is running
    fn advance_crossfade(&self, dt: Duration, token: &CancellationToken) {
        let opacity = self.settings.lock().map(|s| s.radar_opacity).unwrap_or(0.0);
        self.with_registry(|registry| {
            let len = registry.len();
            if len < 2 || !still_playing(registry, token) {
                return;
            }
            let Ok(mut slot) = self.crossfade.lock() else {
                return;
            };

            let current = registry.current_index();
            let fade = match slot.take() {
                Some(fade) if !fade.is_complete() => fade,
                Some(done) => done.rearm((done.to() + 1) % len),
                None => Crossfade::new(current, (current + 1) % len, self.fade.duration, self.fade.easing, opacity),
            };
            let fade = slot.insert(fade);

            if fade.tick(dt) {
                registry.seek(fade.to());
            }
        });
    }

    fn prewarm(&self) -> Option<TaskHandle> {
        let settings = self.settings.lock().ok()?.clone();
        let frames = self.with_registry(|registry| registry.frames().to_vec());
        if frames.is_empty() {
            return None;
        }

        let zoom = self.viewport.zoom();
        let padding = math::padding_for_zoom(settings.padding_degrees, settings.prewarm_zoom.clamp(zoom));
        let bounds = math::pad_bounds(&self.viewport.bounds(), padding);
        let coords = math::tiles_for_viewport(&bounds, zoom, settings.prewarm_zoom);
        let tiles = self.tiles.lock().ok()?.clone();

        let requests = frames
            .iter()
            .flat_map(|frame| {
                let source = tiles.for_frame(frame.path_token.clone());
                coords
                    .iter()
                    .map(|coord| source.request(*coord))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        log::debug!("prewarming {} tiles across {} frames", requests.len(), frames.len());
        Some(self.compositor.loader().prewarm(requests))
    }
}

/// `pause` flips the play flag under the registry lock before cancelling,
/// so checking both under that lock keeps a late tick from moving the frame
fn still_playing(registry: &FrameRegistry, token: &CancellationToken) -> bool {
    !token.is_cancelled() && registry.is_playing()
}

async fn run_playback(state: Arc<DriverState>, token: CancellationToken) {
    let mut last = tokio::time::Instant::now();
    loop {
        let crossfading = state.fade.enabled;
        let delay = if crossfading {
            state.frame_interval
        } else {
            state.with_registry(|registry| registry.interval())
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = runtime::sleep(delay) => {}
        }

        // Fades follow wall time, so a slow render does not stretch them
        let now = tokio::time::Instant::now();
        let elapsed = now - last;
        last = now;

        if crossfading {
            state.advance_crossfade(elapsed, &token);
        } else {
            state.with_registry(|registry| {
                if still_playing(registry, &token) {
                    registry.advance();
                }
            });
        }

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = state.render() => outcome,
        };
        log::trace!("playback tick: {:?}", outcome);
    }
}
