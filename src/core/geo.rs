use crate::core::constants::MAX_LATITUDE;
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        if lat.is_nan() {
            return 0.0;
        }
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Geographic rectangle in degrees.
///
/// `west > east` is allowed and means the rectangle crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl GeoBounds {
    pub fn new(west: f64, east: f64, north: f64, south: f64) -> Self {
        Self {
            west,
            east,
            north,
            south,
        }
    }

    /// Top-left corner
    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north, self.west)
    }

    /// Bottom-right corner
    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south, self.east)
    }

    /// Whether the rectangle crosses the ±180° line
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Longitude span in degrees, accounting for wraparound
    pub fn lng_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            360.0 - self.west + self.east
        } else {
            self.east - self.west
        }
    }
}

/// Represents a tile coordinate in the slippy map tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Gets the geographic bounds of the tile
    pub fn bounds(&self) -> GeoBounds {
        crate::tiles::math::tile_to_bounds(self.x, self.y, self.z)
    }
}
