//! Pixel and geographic bounding boxes.
//!
//! # Coordinate System
//!
//! - Pixel boxes are half-open: `min` is inside, `max` is one past the edge
//! - Origin is the top-left corner, y grows downward
//! - Geographic boxes are in degrees

use serde::{Deserialize, Serialize};

/// Integer rectangle in output-canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl PixelBox {
    /// Create a box from its origin and size.
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    /// Create a box from two corners.
    pub fn from_corners(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }

    /// True when the box has no positive area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Check whether `other` lies completely inside this box.
    pub fn contains(&self, other: &PixelBox) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &PixelBox) -> PixelBox {
        PixelBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Clip this box to `bounds`.
    ///
    /// A box outside `bounds` collapses to zero size rather than going
    /// negative, so `width()`/`height()` never report less than zero.
    pub fn crop(&self, bounds: &PixelBox) -> PixelBox {
        let min_x = self.min_x.max(bounds.min_x);
        let min_y = self.min_y.max(bounds.min_y);
        PixelBox {
            min_x,
            min_y,
            max_x: self.max_x.min(bounds.max_x).max(min_x),
            max_y: self.max_y.min(bounds.max_y).max(min_y),
        }
    }

    /// Overlap of two boxes, or `None` when they share no area.
    pub fn intersection(&self, other: &PixelBox) -> Option<PixelBox> {
        let cropped = self.crop(other);
        if cropped.is_empty() {
            None
        } else {
            Some(cropped)
        }
    }

    pub fn translate(&self, dx: i64, dy: i64) -> PixelBox {
        PixelBox {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

/// Longitude/latitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LonLatBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LonLatBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Map a canvas pixel box to degrees with the square 360°×360° canvas
    /// used by the KML and Gigapan layouts.
    ///
    /// `lon = -180 + 360·x/x_resolution`, `lat = 180 - 360·y/y_resolution`.
    pub fn from_pixel_box(bbox: &PixelBox, x_resolution: i64, y_resolution: i64) -> Self {
        let xres = x_resolution as f64;
        let yres = y_resolution as f64;
        Self {
            west: -180.0 + 360.0 * bbox.min_x as f64 / xres,
            east: -180.0 + 360.0 * bbox.max_x as f64 / xres,
            north: 180.0 - 360.0 * bbox.min_y as f64 / yres,
            south: 180.0 - 360.0 * bbox.max_y as f64 / yres,
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}
