//! Slippy-map tile arithmetic.
//!
//! Every function here is total: inputs are clamped or wrapped into range
//! so callers never see NaN or out-of-range indices.

use crate::core::geo::{GeoBounds, LatLng, TileCoord};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Inclusive zoom range a pipeline is allowed to request tiles at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomBand {
    pub min: u8,
    pub max: u8,
}

impl ZoomBand {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Round and clamp a map zoom into the band
    pub fn clamp(&self, zoom: f64) -> u8 {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        if !zoom.is_finite() {
            return lo;
        }
        zoom.round().clamp(lo as f64, hi as f64) as u8
    }
}

impl From<(u8, u8)> for ZoomBand {
    fn from((min, max): (u8, u8)) -> Self {
        Self::new(min, max)
    }
}

/// Highest tile index on either axis at zoom `z`
pub fn max_index(z: u8) -> u32 {
    // 2^31 - 1 is the largest u32 index we can represent safely
    let z = z.min(31) as u32;
    (1u32 << z) - 1
}

fn clamp_index(value: f64, max: u32) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, max as f64) as u32
}

/// Tile indices containing `(lng, lat)` at zoom `z`
pub fn lng_lat_to_tile(lng: f64, lat: f64, z: u8) -> (u32, u32) {
    let lat_rad = LatLng::clamp_lat(lat).to_radians();
    let n = 2_f64.powi(z.min(31) as i32);
    let max = max_index(z);

    let x = ((lng + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    (clamp_index(x, max), clamp_index(y, max))
}

/// Geographic bounds of tile `(x, y, z)` in degrees
pub fn tile_to_bounds(x: u32, y: u32, z: u8) -> GeoBounds {
    let n = 2_f64.powi(z.min(31) as i32);
    let lng = |x: f64| x / n * 360.0 - 180.0;
    let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

    GeoBounds::new(
        lng(x as f64),
        lng(x as f64 + 1.0),
        lat(y as f64),
        lat(y as f64 + 1.0),
    )
}

/// Column ranges covering `min_x..=max_x`, split in two when the window wraps.
pub fn x_ranges_for_viewport(min_x: i64, max_x: i64, max_index: u32) -> Vec<(u32, u32)> {
    let clamp = |v: i64| v.clamp(0, max_index as i64) as u32;

    if min_x <= max_x {
        vec![(clamp(min_x), clamp(max_x))]
    } else {
        vec![(0, clamp(max_x)), (clamp(min_x), max_index)]
    }
}

/// Grow `bounds` by `degrees` on every side, wrapping longitudes.
pub fn pad_bounds(bounds: &GeoBounds, degrees: f64) -> GeoBounds {
    let degrees = if degrees.is_finite() { degrees.max(0.0) } else { 0.0 };
    let north = (bounds.north + degrees).min(90.0);
    let south = (bounds.south - degrees).max(-90.0);

    if bounds.lng_span() + 2.0 * degrees >= 360.0 {
        return GeoBounds::new(-180.0, 180.0, north, south);
    }

    GeoBounds::new(
        LatLng::wrap_lng(bounds.west - degrees),
        LatLng::wrap_lng(bounds.east + degrees),
        north,
        south,
    )
}

/// Padding for a window at zoom `z`, capped at one tile width so deep
/// zooms stay within a tile ring of the visible area.
pub fn padding_for_zoom(degrees: f64, z: u8) -> f64 {
    let tile_width = 360.0 / 2_f64.powi(z.min(31) as i32);
    if degrees.is_finite() {
        degrees.clamp(0.0, tile_width)
    } else {
        0.0
    }
}

/// Every tile intersecting `bounds` at `zoom` (clamped into `band`)
pub fn tiles_for_viewport(bounds: &GeoBounds, zoom: f64, band: ZoomBand) -> Vec<TileCoord> {
    let z = band.clamp(zoom);
    let max = max_index(z);

    let (min_x, max_x) = if bounds.lng_span() >= 360.0 {
        (0, max)
    } else {
        let (west, _) = lng_lat_to_tile(bounds.west, 0.0, z);
        let (east, _) = lng_lat_to_tile(bounds.east, 0.0, z);
        // A wrapping window whose edges share a column spans almost the whole world
        if bounds.crosses_antimeridian() && west <= east {
            (0, max)
        } else {
            (west, east)
        }
    };
    let (_, min_y) = lng_lat_to_tile(0.0, bounds.north, z);
    let (_, max_y) = lng_lat_to_tile(0.0, bounds.south, z);
    let (min_y, max_y) = (min_y.min(max_y), min_y.max(max_y).min(max));

    let mut tiles = Vec::new();
    for (lo, hi) in x_ranges_for_viewport(min_x as i64, max_x as i64, max) {
        for x in lo..=hi {
            for y in min_y..=max_y {
                tiles.push(TileCoord::new(x, y, z));
            }
        }
    }
    tiles
}
