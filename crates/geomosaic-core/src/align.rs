//! Cropping the composite bbox to the canvas and, for KML output, snapping
//! it to a power-of-two square.
//!
//! # Alignment
//!
//! Super-overlays need each tile to cover a whole quad-tree cell of the
//! global canvas. The aligned box is the smallest square of side `dim`
//! (a power of two, at most `total_resolution`) whose origin is a multiple
//! of `dim` and which contains the data. When the data straddles a cell
//! boundary the square is grown by `dim` toward the straddled side, which
//! doubles `dim`, until it fits.

use tracing::debug;

use crate::bbox::PixelBox;
use crate::error::{MosaicError, Result};

/// Crop `raw` to the canvas `(0, 0) .. (x_resolution, y_resolution)`.
///
/// Fails with [`MosaicError::EmptyComposite`] when nothing remains.
pub fn crop_to_canvas(raw: &PixelBox, x_resolution: i64, y_resolution: i64) -> Result<PixelBox> {
    let canvas = PixelBox::new(0, 0, x_resolution, y_resolution);
    let cropped = raw.crop(&canvas);
    if cropped.is_empty() {
        return Err(MosaicError::EmptyComposite {
            width: cropped.width(),
            height: cropped.height(),
        });
    }
    Ok(cropped)
}

/// Final output bbox of the composite: cropped to the canvas and, when the
/// output format needs it, aligned to a power-of-two cell.
pub fn align_bbox(
    raw: &PixelBox,
    total_resolution: i64,
    x_resolution: i64,
    y_resolution: i64,
    power_of_two: bool,
) -> Result<PixelBox> {
    let cropped = crop_to_canvas(raw, x_resolution, y_resolution)?;
    if power_of_two {
        Ok(align_to_power_of_two(&cropped, total_resolution))
    } else {
        Ok(cropped)
    }
}

/// Smallest power of two `>= n` (1 for `n <= 1`).
fn next_power_of_two(n: i64) -> i64 {
    (n.max(1) as u64).next_power_of_two() as i64
}

/// Snap `bbox` to a power-of-two square cell of the canvas. See the module
/// documentation for the rule.
pub fn align_to_power_of_two(bbox: &PixelBox, total_resolution: i64) -> PixelBox {
    let mut dim = next_power_of_two(bbox.width().max(bbox.height())).min(total_resolution);
    loop {
        let square = PixelBox::new(
            bbox.min_x.div_euclid(dim) * dim,
            bbox.min_y.div_euclid(dim) * dim,
            dim,
            dim,
        );
        if square.contains(bbox) || dim >= total_resolution {
            debug!(
                min_x = square.min_x,
                min_y = square.min_y,
                dim,
                "Aligned bbox to power of two"
            );
            return square;
        }
        dim = (dim * 2).min(total_resolution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_to_canvas() {
        let raw = PixelBox::from_corners(-20, 100, 1100, 300);
        assert_eq!(
            crop_to_canvas(&raw, 1024, 1024).unwrap(),
            PixelBox::from_corners(0, 100, 1024, 300)
        );
    }

    #[test]
    fn test_crop_outside_canvas_fails() {
        let raw = PixelBox::from_corners(2000, 0, 2100, 50);
        let err = crop_to_canvas(&raw, 1024, 1024).unwrap_err();
        assert!(matches!(err, MosaicError::EmptyComposite { width: 0, .. }));
    }

    #[test]
    fn test_align_bbox_only_snaps_when_asked() {
        let raw = PixelBox::from_corners(300, 290, 500, 400);
        assert_eq!(align_bbox(&raw, 1024, 1024, 1024, false).unwrap(), raw);
        assert_eq!(
            align_bbox(&raw, 1024, 1024, 1024, true).unwrap(),
            PixelBox::new(256, 256, 256, 256)
        );
    }

    #[test]
    fn test_align_two_hemispheres() {
        // Two 512x512 hemispheres at 1024 px per turn.
        let raw = PixelBox::from_corners(0, 256, 1024, 768);
        assert_eq!(align_to_power_of_two(&raw, 1024), PixelBox::new(0, 0, 1024, 1024));
    }

    #[test]
    fn test_align_inside_one_cell() {
        let raw = PixelBox::from_corners(300, 290, 500, 400);
        assert_eq!(align_to_power_of_two(&raw, 1024), PixelBox::new(256, 256, 256, 256));
    }

    #[test]
    fn test_align_straddling_cell_boundary_grows() {
        // Fits in 128 but straddles x = 256.
        let raw = PixelBox::from_corners(200, 10, 300, 100);
        assert_eq!(align_to_power_of_two(&raw, 1024), PixelBox::new(0, 0, 512, 512));
    }

    #[test]
    fn test_align_capped_at_total_resolution() {
        let raw = PixelBox::from_corners(0, 0, 2048, 100);
        assert_eq!(align_to_power_of_two(&raw, 1024), PixelBox::new(0, 0, 1024, 1024));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const TOTAL: i64 = 4096;

        fn canvas_bbox() -> impl Strategy<Value = PixelBox> {
            (0..TOTAL - 1, 0..TOTAL - 1).prop_flat_map(|(x, y)| {
                (1..=TOTAL - x, 1..=TOTAL - y)
                    .prop_map(move |(w, h)| PixelBox::new(x, y, w, h))
            })
        }

        proptest! {
            #[test]
            fn prop_aligned_is_power_of_two_square(bbox in canvas_bbox()) {
                let aligned = align_to_power_of_two(&bbox, TOTAL);
                prop_assert_eq!(aligned.width(), aligned.height());
                prop_assert!((aligned.width() as u64).is_power_of_two());
                prop_assert!(aligned.width() <= TOTAL);
            }

            #[test]
            fn prop_aligned_contains_input(bbox in canvas_bbox()) {
                let aligned = align_to_power_of_two(&bbox, TOTAL);
                prop_assert!(aligned.contains(&bbox));
                prop_assert_eq!(aligned.min_x % aligned.width(), 0);
                prop_assert_eq!(aligned.min_y % aligned.height(), 0);
            }

            #[test]
            fn prop_alignment_is_idempotent(bbox in canvas_bbox()) {
                let once = align_to_power_of_two(&bbox, TOTAL);
                let twice = align_to_power_of_two(&once, TOTAL);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
