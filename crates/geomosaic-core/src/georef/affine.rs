//! Six-term affine mapping between pixel and projected coordinates.
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```
//!
//! Pixel coordinates are corner-based: `(0, 0)` is the top-left corner of
//! the first pixel and `(cols, rows)` the bottom-right corner of the last.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Axis-aligned transform with the given pixel size and origin.
    pub fn scale_translate(scale_x: f64, scale_y: f64, origin_x: f64, origin_y: f64) -> Self {
        Self::new(scale_x, 0.0, origin_x, 0.0, scale_y, origin_y)
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Inverse mapping, or `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.e * inv;
        let b = -self.b * inv;
        let d = -self.d * inv;
        let e = self.a * inv;
        Some(Affine {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    /// True when the matrix has shear/rotation terms.
    pub fn has_rotation(&self) -> bool {
        self.b != 0.0 || self.d != 0.0
    }
}
