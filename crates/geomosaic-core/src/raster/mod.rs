//! Raster data: in-memory pixel buffers, input sources and tile encoding.
//!
//! All pixel values are carried as `f32` samples. Every raster has an alpha
//! band after its colour bands so that nodata masking and compositing work
//! the same way for grey and RGB inputs.

mod encode;
mod source;
mod stats;
mod types;

pub use encode::{encode_raster, EncodeSettings};
pub use source::{parse_world_file, ImageFileSource, MemorySource, RasterSource};
pub use stats::channel_value_range;
pub use types::{ChannelType, Raster};
