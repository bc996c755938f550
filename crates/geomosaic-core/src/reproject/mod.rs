//! Reprojection of each input into the output canvas.

mod adjust;
mod sampling;
mod stage;

pub use adjust::{apply_scale_offset, mask_nodata, normalize_retain_alpha, NormalizeRange};
pub use sampling::{sample_bilinear, EdgeMode};
pub use stage::{
    is_global, reproject, reproject_all, InputDescriptor, PixelAdjustments, ReprojectedSource,
};
