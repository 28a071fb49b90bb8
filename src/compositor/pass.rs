use crate::compositor::surface::{Canvas, SharedSurface};
use crate::core::bounds::Bounds;
use crate::core::geo::{LatLng, TileCoord};
use crate::core::viewport::{ViewportProvider, ViewportSnapshot};
use crate::prelude::{Arc, Mutex};
use crate::tiles::loader::TileLoader;
use crate::tiles::math::{self, ZoomBand};
use crate::tiles::source::TileUrlSource;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};

/// One raster layer of a pass: where its tiles come from and how opaque it is.
#[derive(Clone)]
pub struct PassLayer {
    pub source: Arc<dyn TileUrlSource>,
    pub opacity: f32,
}

impl PassLayer {
    pub fn new(source: Arc<dyn TileUrlSource>, opacity: f32) -> Self {
        Self { source, opacity }
    }
}

impl std::fmt::Debug for PassLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassLayer").field("opacity", &self.opacity).finish()
    }
}

/// What a compositing pass did to the visible surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Buffer painted and blitted; `tiles` images were drawn
    Drawn { tiles: usize },
    /// A newer pass started while this one was loading; nothing was touched
    Stale,
    /// Zero-sized surface; nothing was loaded or touched
    Skipped,
}

/// Double-buffered tile compositor for one surface.
///
/// Each pass snapshots the viewport before its first await, loads every
/// tile in parallel, then paints into an off-screen buffer and blits it
/// once. Passes are numbered; only the most recently started one may touch
/// the surface.
pub struct Compositor {
    loader: TileLoader,
    surface: SharedSurface,
    buffer: Mutex<Option<Box<dyn Canvas>>>,
    sequence: AtomicU64,
    zoom_band: ZoomBand,
    padding_degrees: f64,
}

impl Compositor {
    pub fn new(loader: TileLoader, surface: SharedSurface, zoom_band: ZoomBand, padding_degrees: f64) -> Self {
        Self {
            loader,
            surface,
            buffer: Mutex::new(None),
            sequence: AtomicU64::new(0),
            zoom_band,
            padding_degrees,
        }
    }

    /// Run one pass of `layers` over the viewport, painted in order.
    pub async fn composite(&self, viewport: &dyn ViewportProvider, layers: &[PassLayer]) -> PassOutcome {
        if self.surface_size().map_or(true, |(w, h)| w == 0 || h == 0) {
            log::trace!("skipping pass on zero-sized surface");
            return PassOutcome::Skipped;
        }

        // Everything up to the first await is synchronous
        let pass = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = ViewportSnapshot::capture(viewport, self.zoom_band, self.padding_degrees);
        if snapshot.is_empty() {
            return PassOutcome::Skipped;
        }
        let coords = math::tiles_for_viewport(&snapshot.bounds, snapshot.zoom as f64, self.zoom_band);
        // Placement is fixed now, even if the provider handed out a live projector
        let rects: Vec<Bounds> = coords.iter().map(|coord| tile_rect(&snapshot, *coord)).collect();
        let window = coords.len() * layers.len();
        if window > self.loader.config().cache_capacity {
            log::warn!(
                "pass window of {} tiles exceeds the tile cache ({})",
                window,
                self.loader.config().cache_capacity
            );
        }

        let loads = layers.iter().flat_map(|layer| {
            coords
                .iter()
                .map(move |coord| self.loader.load(layer.source.request(*coord)))
        });
        let images = join_all(loads).await;

        if self.sequence.load(Ordering::SeqCst) != pass {
            log::trace!("dropping stale pass {}", pass);
            return PassOutcome::Stale;
        }

        let mut surface = match self.surface.lock() {
            Ok(surface) => surface,
            Err(_) => return PassOutcome::Skipped,
        };
        // Re-checked under the lock: a newer pass may have blitted since the check above
        if self.sequence.load(Ordering::SeqCst) != pass {
            log::trace!("dropping stale pass {}", pass);
            return PassOutcome::Stale;
        }
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return PassOutcome::Skipped;
        }

        let mut slot = match self.buffer.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let buffer = match slot.take() {
            Some(buffer) if buffer.size() == (width, height) => buffer,
            _ => {
                log::debug!("creating {}x{} compositing buffer", width, height);
                surface.create_buffer(width, height)
            }
        };
        let buffer = slot.insert(buffer);
        buffer.clear();

        let mut drawn = 0;
        let per_layer = coords.len().max(1);
        for (i, image) in images.iter().enumerate() {
            let Some(image) = image else { continue };
            let layer = &layers[i / per_layer];
            let rect = rects[i % per_layer];
            if !rect.is_drawable() {
                continue;
            }
            buffer.draw_image(image, rect, layer.opacity);
            drawn += 1;
        }

        surface.clear();
        surface.blit(&**buffer);
        log::trace!("pass {} drew {} tiles", pass, drawn);
        PassOutcome::Drawn { tiles: drawn }
    }

    /// Mark every in-flight pass stale without starting a new one
    pub fn invalidate(&self) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
    }

    /// Clear the visible surface and invalidate running passes
    pub fn clear(&self) {
        self.invalidate();
        if let Ok(mut surface) = self.surface.lock() {
            surface.clear();
        }
    }

    /// Resize the visible surface. The buffer follows on the next pass.
    pub fn resize(&self, width: u32, height: u32) {
        if let Ok(mut surface) = self.surface.lock() {
            surface.resize(width, height);
        }
    }

    /// Number of passes started so far
    pub fn passes_started(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    pub fn zoom_band(&self) -> ZoomBand {
        self.zoom_band
    }

    pub fn padding_degrees(&self) -> f64 {
        self.padding_degrees
    }

    fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface.lock().ok().map(|surface| surface.size())
    }
}

/// Screen rectangle of `coord` under the snapshot's projection.
///
/// A tile may be drawn one turn east or west of its nominal longitude;
/// the copy whose centre lands nearest the middle of the view is used, so
/// windows spanning the antimeridian stay contiguous.
pub fn tile_rect(snapshot: &ViewportSnapshot, coord: TileCoord) -> Bounds {
    let bounds = coord.bounds();
    let mid_x = snapshot.size.0 as f64 / 2.0;
    let mid_lat = (bounds.north + bounds.south) / 2.0;
    let mid_lng = (bounds.west + bounds.east) / 2.0;

    let offset = |shift: f64| (snapshot.project(&LatLng::new(mid_lat, mid_lng + shift)).x - mid_x).abs();
    let shift = [0.0, -360.0, 360.0]
        .into_iter()
        .min_by(|a, b| offset(*a).partial_cmp(&offset(*b)).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    let nw = snapshot.project(&LatLng::new(bounds.north, bounds.west + shift));
    let se = snapshot.project(&LatLng::new(bounds.south, bounds.east + shift));
    Bounds::new(nw, se)
}
