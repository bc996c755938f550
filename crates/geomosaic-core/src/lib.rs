//! Geomosaic Core - mosaic assembly and quad-tree tiling
//!
//! This crate turns one or more georeferenced rasters into a seamless
//! mosaic and cuts it into a quad-tree of tiles for KML, TMS, Google Maps,
//! Uniview, Celestia or Gigapan viewers.
//!
//! # Pipeline
//!
//! 1. [`georef::resolve_georeferences`]: one georeference per input and a
//!    shared output canvas
//! 2. [`reproject::reproject_all`]: lazily sampled views in canvas pixels
//! 3. [`composite::ImageComposite`]: placements with date-line wrap
//! 4. [`align::align_bbox`]: crop, and snap to a power-of-two cell for KML
//! 5. [`quadtree::QuadTreeGenerator`]: tiles and per-format metadata
//!
//! [`pipeline::run_mosaic`] runs all five.

pub mod align;
pub mod bbox;
pub mod composite;
pub mod config;
pub mod error;
pub mod georef;
pub mod pipeline;
pub mod progress;
pub mod quadtree;
pub mod raster;
pub mod reproject;
pub mod writer;

pub use bbox::{LonLatBox, PixelBox};
pub use config::Options;
pub use error::{MosaicError, Result};
pub use pipeline::{run_mosaic, run_plain_quadtree, MosaicSummary};
pub use quadtree::{OutputMode, OutputModeConfig};
pub use raster::{ImageFileSource, MemorySource, RasterSource};
pub use reproject::NormalizeRange;
pub use writer::{DiskTileWriter, MemoryTileWriter, TileWriter};
