use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Represents a bounding box in screen/pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Creates bounds covering a surface of the given pixel size
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::from_coords(0.0, 0.0, width as f64, height as f64)
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Checks if the bounds intersect with another bounds
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y)
    }

    /// Gets the intersection of two bounds
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.intersects(other) {
            return None;
        }

        Some(Bounds::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    /// A rectangle worth drawing: finite corners and positive extent
    pub fn is_drawable(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.width() > 0.0 && self.height() > 0.0
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0))
    }
}
