//! Channel statistics used by the normalization pre-pass.

use super::Raster;

/// Minimum and maximum colour sample over the opaque pixels of a raster.
///
/// Pixels whose colour bands all equal `nodata` are skipped, as are
/// transparent pixels. Returns `None` when no pixel qualifies.
pub fn channel_value_range(raster: &Raster, nodata: Option<f32>) -> Option<(f32, f32)> {
    let bands = raster.bands;
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;

    for px in raster.pixels() {
        if px[bands] <= 0.0 {
            continue;
        }
        let colour = &px[..bands];
        if let Some(nd) = nodata {
            if colour.iter().all(|&v| v == nd) {
                continue;
            }
        }
        for &v in colour {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }

    if lo.is_finite() && hi.is_finite() {
        Some((lo, hi))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ChannelType;

    #[test]
    fn test_range_of_gradient() {
        let data = vec![10.0, 255.0, 20.0, 255.0, 200.0, 255.0];
        let r = Raster::from_samples(3, 1, 1, ChannelType::U8, data);
        assert_eq!(channel_value_range(&r, None), Some((10.0, 200.0)));
    }

    #[test]
    fn test_range_skips_nodata_and_transparent() {
        let data = vec![0.0, 255.0, 50.0, 0.0, 60.0, 255.0, 70.0, 255.0];
        let r = Raster::from_samples(4, 1, 1, ChannelType::U8, data);
        assert_eq!(channel_value_range(&r, Some(0.0)), Some((60.0, 70.0)));
    }

    #[test]
    fn test_range_of_empty() {
        let r = Raster::new(2, 2, 3, ChannelType::U8);
        assert_eq!(channel_value_range(&r, None), None);
    }
}
