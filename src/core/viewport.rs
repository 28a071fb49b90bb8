use crate::core::geo::{GeoBounds, LatLng, Point};
use crate::prelude::{Arc, Mutex};
use crate::tiles::math::{self, ZoomBand};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS: f64 = 6378137.0;

/// Maps a geographic coordinate to a screen pixel for one fixed render state.
pub type Projector = Arc<dyn Fn(&LatLng) -> Point + Send + Sync>;

/// The map engine as seen by the compositor.
///
/// `projector` must return a function bound to the state the map is in
/// *now*; later pans must not change what an already-returned projector
/// computes unless the implementation deliberately models a live view.
pub trait ViewportProvider: Send + Sync {
    /// Projection for the current render state
    fn projector(&self) -> Projector;

    /// Visible geographic bounds
    fn bounds(&self) -> GeoBounds;

    /// Current (possibly fractional) zoom
    fn zoom(&self) -> f64;

    /// Surface size in pixels
    fn size(&self) -> (u32, u32);
}

/// Immutable capture of the viewport taken at the start of a compositing pass.
#[derive(Clone)]
pub struct ViewportSnapshot {
    pub projector: Projector,
    pub zoom: u8,
    pub bounds: GeoBounds,
    pub size: (u32, u32),
}

impl ViewportSnapshot {
    /// Capture the provider's state. Must run before the first await of a pass.
    pub fn capture(provider: &dyn ViewportProvider, band: ZoomBand, padding_degrees: f64) -> Self {
        let zoom = band.clamp(provider.zoom());
        let padding = math::padding_for_zoom(padding_degrees, zoom);
        Self {
            projector: provider.projector(),
            zoom,
            bounds: math::pad_bounds(&provider.bounds(), padding),
            size: provider.size(),
        }
    }

    /// Project with the captured state
    pub fn project(&self, lat_lng: &LatLng) -> Point {
        (self.projector)(lat_lng)
    }

    pub fn is_empty(&self) -> bool {
        self.size.0 == 0 || self.size.1 == 0
    }
}

impl std::fmt::Debug for ViewportSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportSnapshot")
            .field("zoom", &self.zoom)
            .field("bounds", &self.bounds)
            .field("size", &self.size)
            .finish()
    }
}

/// Manages a Web Mercator view of the map: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 18.0),
            size,
            min_zoom: 0.0,
            max_zoom: 18.0,
        }
    }

    /// Sets the center of the viewport
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(LatLng::clamp_lat(center.lat), LatLng::wrap_lng(center.lng));
    }

    /// Sets the zoom level, clamping to valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets the viewport size
    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    /// Projects a LatLng to world pixel coordinates at the given zoom level
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let scale = 256.0 * 2_f64.powf(z);
        let pi = std::f64::consts::PI;

        let lat = LatLng::clamp_lat(lat_lng.lat);
        let x = lat_lng.lng.to_radians() * EARTH_RADIUS;
        let y = ((pi / 4.0 + lat.to_radians() / 2.0).tan().ln()) * EARTH_RADIUS;

        let pixel_x = (x + pi * EARTH_RADIUS) / (2.0 * pi * EARTH_RADIUS) * scale;
        let pixel_y = (-y + pi * EARTH_RADIUS) / (2.0 * pi * EARTH_RADIUS) * scale;

        Point::new(pixel_x, pixel_y)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let scale = 256.0 * 2_f64.powf(z);
        let pi = std::f64::consts::PI;

        let x = (pixel.x / scale) * (2.0 * pi * EARTH_RADIUS) - pi * EARTH_RADIUS;
        let y = pi * EARTH_RADIUS - (pixel.y / scale) * (2.0 * pi * EARTH_RADIUS);

        let lng = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - pi / 2.0).to_degrees();

        LatLng::new(lat, lng)
    }

    /// Converts a geographical coordinate to screen pixel coordinates (container relative)
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        let origin = self.project(&self.center, None);
        let projected = self.project(lat_lng, None);
        Point::new(
            projected.x - origin.x + self.size.x / 2.0,
            projected.y - origin.y + self.size.y / 2.0,
        )
    }

    /// Converts screen pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let origin = self.project(&self.center, None);
        let world = Point::new(
            pixel.x - self.size.x / 2.0 + origin.x,
            pixel.y - self.size.y / 2.0 + origin.y,
        );
        self.unproject(&world, None)
    }

    /// Pans the viewport by the given pixel offset
    pub fn pan(&mut self, delta: Point) {
        let center_px = Point::new(self.size.x / 2.0, self.size.y / 2.0);
        let new_center = self.pixel_to_lat_lng(&center_px.add(&delta));
        self.set_center(new_center);
    }

    /// Geographic bounds of the visible area
    pub fn bounds(&self) -> GeoBounds {
        let nw = self.pixel_to_lat_lng(&Point::new(0.0, 0.0));
        let se = self.pixel_to_lat_lng(&self.size);

        let (west, east) = if se.lng - nw.lng >= 360.0 {
            (-180.0, 180.0)
        } else {
            (LatLng::wrap_lng(nw.lng), LatLng::wrap_lng(se.lng))
        };

        GeoBounds::new(
            west,
            east,
            LatLng::clamp_lat(nw.lat),
            LatLng::clamp_lat(se.lat),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 4.0, Point::new(800.0, 600.0))
    }
}

impl ViewportProvider for Viewport {
    fn projector(&self) -> Projector {
        let frozen = self.clone();
        Arc::new(move |lat_lng: &LatLng| frozen.lat_lng_to_pixel(lat_lng))
    }

    fn bounds(&self) -> GeoBounds {
        Viewport::bounds(self)
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn size(&self) -> (u32, u32) {
        (self.size.x.max(0.0) as u32, self.size.y.max(0.0) as u32)
    }
}

/// A viewport shared between the host application and the radar pipeline.
///
/// The host mutates it through [`SharedViewport::update`] while passes are in
/// flight; every pass reads it once through the provider methods.
#[derive(Debug, Clone, Default)]
pub struct SharedViewport {
    inner: Arc<Mutex<Viewport>>,
}

impl SharedViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Arc::new(Mutex::new(viewport)),
        }
    }

    /// Apply a change to the live viewport
    pub fn update<F: FnOnce(&mut Viewport)>(&self, change: F) {
        if let Ok(mut viewport) = self.inner.lock() {
            change(&mut viewport);
        }
    }

    /// Copy of the current state
    pub fn get(&self) -> Viewport {
        self.inner
            .lock()
            .map(|viewport| viewport.clone())
            .unwrap_or_default()
    }
}

impl ViewportProvider for SharedViewport {
    fn projector(&self) -> Projector {
        self.get().projector()
    }

    fn bounds(&self) -> GeoBounds {
        self.get().bounds()
    }

    fn zoom(&self) -> f64 {
        self.get().zoom
    }

    fn size(&self) -> (u32, u32) {
        ViewportProvider::size(&self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_projects_to_middle() {
        let viewport = Viewport::new(LatLng::new(40.0, -74.0), 10.0, Point::new(800.0, 600.0));
        let px = viewport.lat_lng_to_pixel(&LatLng::new(40.0, -74.0));
        assert!((px.x - 400.0).abs() < 1e-6);
        assert!((px.y - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_round_trip() {
        let viewport = Viewport::new(LatLng::new(51.5, -0.12), 8.0, Point::new(1024.0, 768.0));
        let ll = viewport.pixel_to_lat_lng(&Point::new(100.0, 200.0));
        let back = viewport.lat_lng_to_pixel(&ll);
        assert!((back.x - 100.0).abs() < 1e-6);
        assert!((back.y - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_wrap_at_antimeridian() {
        let viewport = Viewport::new(LatLng::new(0.0, 179.0), 5.0, Point::new(800.0, 600.0));
        let bounds = viewport.bounds();
        assert!(bounds.crosses_antimeridian());
        assert!(bounds.west < 179.5 && bounds.east > -179.5);
        assert!(bounds.lng_span() < 40.0);
    }

    #[test]
    fn test_zoomed_out_bounds_cover_world() {
        let viewport = Viewport::new(LatLng::new(0.0, 0.0), 0.0, Point::new(2048.0, 1024.0));
        let bounds = viewport.bounds();
        assert_eq!(bounds.west, -180.0);
        assert_eq!(bounds.east, 180.0);
    }

    #[test]
    fn test_projector_is_frozen_after_pan() {
        let shared = SharedViewport::new(Viewport::new(
            LatLng::new(0.0, 0.0),
            6.0,
            Point::new(400.0, 400.0),
        ));
        let projector = shared.projector();
        let before = projector(&LatLng::new(1.0, 1.0));

        shared.update(|viewport| viewport.pan(Point::new(150.0, 0.0)));

        assert_eq!(projector(&LatLng::new(1.0, 1.0)), before);
        assert_ne!(shared.projector()(&LatLng::new(1.0, 1.0)), before);
    }
}
