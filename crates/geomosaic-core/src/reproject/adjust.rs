//! Per-image pixel adjustments applied before reprojection.
//!
//! ## Adjustment Order
//! 1. Nodata masking
//! 2. Linear rescale (`value * scale + offset`)
//! 3. Normalization to the full channel range

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::raster::{channel_value_range, Raster, RasterSource};

/// Observed value range that normalization stretches to the channel range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeRange {
    pub lo: f32,
    pub hi: f32,
}

impl NormalizeRange {
    pub fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    /// Pre-pass over every input: the smallest and largest colour sample,
    /// ignoring nodata pixels. `nodata` overrides each source's own value.
    ///
    /// The range is in raw source units; [`PixelAdjustments`] carries it
    /// through channel conversion and rescaling before stretching.
    ///
    /// [`PixelAdjustments`]: super::PixelAdjustments
    pub fn scan(sources: &[Arc<dyn RasterSource>], nodata: Option<f32>) -> Result<Option<Self>> {
        let mut range: Option<Self> = None;
        for source in sources {
            let raster = source.read()?;
            let nd = nodata.or_else(|| source.nodata());
            if let Some((lo, hi)) = channel_value_range(&raster, nd) {
                range = Some(match range {
                    Some(r) => Self::new(r.lo.min(lo), r.hi.max(hi)),
                    None => Self::new(lo, hi),
                });
            }
        }
        Ok(range)
    }

    /// Both ends passed through `f`, reordered if `f` is decreasing.
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let (a, b) = (f(self.lo), f(self.hi));
        Self::new(a.min(b), a.max(b))
    }
}

/// Replace the alpha band with a nodata mask.
///
/// Pixels whose colour bands all equal `nodata` become fully transparent
/// (every sample zero); everything else becomes fully opaque.
pub fn mask_nodata(raster: &mut Raster, nodata: f32) {
    let bands = raster.bands;
    let opaque = raster.channel.opaque();
    for px in raster.pixels_mut() {
        if px[..bands].iter().all(|&v| v == nodata) {
            px.fill(0.0);
        } else {
            px[bands] = opaque;
        }
    }
}

/// `value * scale + offset` on the colour bands, clamped back into the
/// channel range.
pub fn apply_scale_offset(raster: &mut Raster, scale: f32, offset: f32) {
    let bands = raster.bands;
    let channel = raster.channel;
    for px in raster.pixels_mut() {
        for v in px[..bands].iter_mut() {
            *v = channel.clamp(*v * scale + offset);
        }
    }
}

/// Stretch `[range.lo, range.hi]` onto the full channel range, leaving
/// alpha untouched. A degenerate range leaves the raster unchanged.
pub fn normalize_retain_alpha(raster: &mut Raster, range: NormalizeRange) {
    if range.hi <= range.lo {
        return;
    }
    let bands = raster.bands;
    let channel = raster.channel;
    let (min, max) = (channel.min(), channel.max());
    let gain = (max - min) / (range.hi - range.lo);
    for px in raster.pixels_mut() {
        for v in px[..bands].iter_mut() {
            *v = channel.clamp((*v - range.lo) * gain + min);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{ChannelType, MemorySource};

    fn gray(values: &[f32]) -> Raster {
        let data = values.iter().flat_map(|&v| [v, 255.0]).collect();
        Raster::from_samples(values.len() as u32, 1, 1, ChannelType::U8, data)
    }

    #[test]
    fn test_mask_nodata_block() {
        // 4x4 image with a 2x2 block of zeros in the top-left corner.
        let mut values = vec![50.0; 16];
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            values[y * 4 + x] = 0.0;
        }
        let data = values.iter().flat_map(|&v| [v, v, v, 0.0]).collect();
        let mut r = Raster::from_samples(4, 4, 3, ChannelType::U8, data);

        mask_nodata(&mut r, 0.0);

        for y in 0..4 {
            for x in 0..4 {
                let expected = if x < 2 && y < 2 { 0.0 } else { 255.0 };
                assert_eq!(r.alpha(x, y), expected, "alpha at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_mask_requires_all_bands() {
        let mut r = Raster::from_samples(1, 1, 3, ChannelType::U8, vec![0.0, 0.0, 7.0, 255.0]);
        mask_nodata(&mut r, 0.0);
        assert_eq!(r.alpha(0, 0), 255.0);
    }

    #[test]
    fn test_scale_offset_clamps() {
        let mut r = gray(&[10.0, 100.0, 200.0]);
        apply_scale_offset(&mut r, 2.0, 5.0);
        assert_eq!(r.pixel(0, 0), &[25.0, 255.0]);
        assert_eq!(r.pixel(1, 0), &[205.0, 255.0]);
        assert_eq!(r.pixel(2, 0), &[255.0, 255.0]);
    }

    #[test]
    fn test_normalize_stretches_and_keeps_alpha() {
        let mut r = gray(&[100.0, 150.0, 200.0]);
        r.pixel_mut(1, 0)[1] = 128.0;
        normalize_retain_alpha(&mut r, NormalizeRange::new(100.0, 200.0));
        assert_eq!(r.pixel(0, 0), &[0.0, 255.0]);
        assert_eq!(r.pixel(1, 0), &[128.0, 128.0]);
        assert_eq!(r.pixel(2, 0), &[255.0, 255.0]);
    }

    #[test]
    fn test_normalize_degenerate_range_is_noop() {
        let mut r = gray(&[100.0]);
        normalize_retain_alpha(&mut r, NormalizeRange::new(5.0, 5.0));
        assert_eq!(r.pixel(0, 0), &[100.0, 255.0]);
    }

    #[test]
    fn test_map_reorders_decreasing() {
        let range = NormalizeRange::new(10.0, 20.0).map(|v| 100.0 - v);
        assert_eq!(range, NormalizeRange::new(80.0, 90.0));
    }

    #[test]
    fn test_scan_accumulates_over_sources() {
        let a: Arc<dyn RasterSource> = Arc::new(MemorySource::new("a", gray(&[0.0, 40.0, 90.0])));
        let b: Arc<dyn RasterSource> =
            Arc::new(MemorySource::new("b", gray(&[20.0, 120.0])).with_nodata(120.0));
        let range = NormalizeRange::scan(&[a, b], None).unwrap().unwrap();
        assert_eq!(range, NormalizeRange::new(0.0, 90.0));

        let a: Arc<dyn RasterSource> = Arc::new(MemorySource::new("a", gray(&[0.0, 40.0])));
        let range = NormalizeRange::scan(&[a], Some(0.0)).unwrap().unwrap();
        assert_eq!(range, NormalizeRange::new(40.0, 40.0));
    }
}
