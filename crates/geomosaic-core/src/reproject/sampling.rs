//! Bilinear sampling with edge-extension policies.
//!
//! Samples are addressed in index space: integer `(x, y)` is the centre of
//! pixel `(x, y)`. Colour is interpolated alpha-weighted so transparent
//! neighbours do not darken edges.

use crate::raster::Raster;

/// Coordinates this close to a pixel centre are treated as exact.
const SNAP_TOLERANCE: f64 = 1e-6;

#[inline]
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_TOLERANCE {
        r
    } else {
        v
    }
}

/// What lies beyond the edge of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeMode {
    /// Transparent pixels.
    #[default]
    Zero,
    /// The nearest edge pixel repeats.
    Constant,
    /// Columns wrap around (longitude is cyclic), rows repeat the edge.
    Cylindrical,
}

#[inline]
fn fetch(image: &Raster, x: i64, y: i64, edge: EdgeMode) -> Option<&[f32]> {
    let (w, h) = (image.width as i64, image.height as i64);
    let (x, y) = match edge {
        EdgeMode::Zero => {
            if x < 0 || x >= w || y < 0 || y >= h {
                return None;
            }
            (x, y)
        }
        EdgeMode::Constant => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        EdgeMode::Cylindrical => (x.rem_euclid(w), y.clamp(0, h - 1)),
    };
    Some(image.pixel(x as u32, y as u32))
}

/// Sample `image` at `(x, y)` into `out` (`bands + 1` values, alpha last).
///
/// Non-finite coordinates, and points outside the image under
/// [`EdgeMode::Zero`], yield a transparent pixel.
pub fn sample_bilinear(image: &Raster, x: f64, y: f64, edge: EdgeMode, out: &mut [f32]) {
    out.fill(0.0);
    if image.is_empty() || !x.is_finite() || !y.is_finite() {
        return;
    }

    let (x, y) = (snap(x), snap(y));
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let bands = image.bands;
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut alpha = 0.0f32;
    for (tx, ty, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        let Some(px) = fetch(image, tx, ty, edge) else {
            continue;
        };
        let wa = weight * px[bands];
        for i in 0..bands {
            out[i] += px[i] * wa;
        }
        alpha += wa;
    }

    if alpha > 0.0 {
        for v in out[..bands].iter_mut() {
            *v /= alpha;
        }
    }
    out[bands] = alpha;
}
