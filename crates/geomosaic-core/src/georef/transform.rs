//! Mapping between two georeferenced pixel spaces.
//!
//! ```text
//! forward(p) = dst.lonlat_to_pixel(src.pixel_to_lonlat(p)) + offset
//! reverse(p) = src.lonlat_to_pixel(dst.pixel_to_lonlat(p - offset))
//! ```

use super::GeoReference;
use crate::bbox::PixelBox;

/// Grid density used when mapping a bbox forward.
const BBOX_SAMPLES: usize = 64;

/// Slack before rounding a mapped bbox outward, so an image ending exactly
/// on a pixel edge is not grown by one pixel of floating-point noise.
const BBOX_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct GeoTransform {
    src: GeoReference,
    dst: GeoReference,
    offset: (f64, f64),
}

impl GeoTransform {
    /// Build a transform from `src` pixels to `dst` pixels.
    ///
    /// When the destination is unprojected and the source centre lies a full
    /// turn away from the destination's [-180, 180] range (e.g. an image
    /// georeferenced over 180..360), the offset is preset to shift it back by
    /// 360°. Callers that place images explicitly reset it with
    /// [`GeoTransform::set_offset`].
    pub fn new(src: GeoReference, dst: GeoReference, src_cols: u32, src_rows: u32) -> Self {
        let mut tx = Self {
            src,
            dst,
            offset: (0.0, 0.0),
        };
        if tx.dst.is_lonlat() {
            let (lon, _) = tx
                .src
                .pixel_to_lonlat(src_cols as f64 / 2.0, src_rows as f64 / 2.0);
            let turn = 360.0 / tx.dst.transform().a;
            if lon > 180.0 {
                tx.offset.0 = -turn;
            } else if lon < -180.0 {
                tx.offset.0 = turn;
            }
        }
        tx
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    pub fn set_offset(&mut self, offset: (f64, f64)) {
        self.offset = offset;
    }

    pub fn source(&self) -> &GeoReference {
        &self.src
    }

    pub fn destination(&self) -> &GeoReference {
        &self.dst
    }

    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = self.src.pixel_to_lonlat(x, y);
        let (px, py) = self.dst.lonlat_to_pixel(lon, lat);
        (px + self.offset.0, py + self.offset.1)
    }

    pub fn reverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = self
            .dst
            .pixel_to_lonlat(x - self.offset.0, y - self.offset.1);
        self.src.lonlat_to_pixel(lon, lat)
    }

    /// Bounding box, in destination pixels, of a source pixel box.
    ///
    /// The perimeter and a coarse interior grid are mapped forward; points
    /// outside the projection's domain are skipped. Returns an empty box
    /// when nothing maps.
    pub fn forward_bbox(&self, bbox: &PixelBox) -> PixelBox {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);

        let steps_x = (bbox.width().max(1) as usize).min(BBOX_SAMPLES);
        let steps_y = (bbox.height().max(1) as usize).min(BBOX_SAMPLES);
        for j in 0..=steps_y {
            for i in 0..=steps_x {
                let x = bbox.min_x as f64 + bbox.width() as f64 * i as f64 / steps_x as f64;
                let y = bbox.min_y as f64 + bbox.height() as f64 * j as f64 / steps_y as f64;
                let (fx, fy) = self.forward(x, y);
                if !fx.is_finite() || !fy.is_finite() {
                    continue;
                }
                min = (min.0.min(fx), min.1.min(fy));
                max = (max.0.max(fx), max.1.max(fy));
            }
        }

        if !min.0.is_finite() {
            return PixelBox::default();
        }
        PixelBox::from_corners(
            (min.0 + BBOX_TOLERANCE).floor() as i64,
            (min.1 + BBOX_TOLERANCE).floor() as i64,
            (max.0 - BBOX_TOLERANCE).ceil() as i64,
            (max.1 - BBOX_TOLERANCE).ceil() as i64,
        )
    }
}
