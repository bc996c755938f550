//! Georeferences and the transforms between them.
//!
//! # Coordinate System
//!
//! - Pixel coordinates are corner-based, origin top-left, y down
//! - Geographic coordinates are degrees, longitude first
//! - Projected coordinates are whatever the proj4 definition yields

mod affine;
mod reference;
mod resolver;
mod transform;

pub use affine::Affine;
pub use reference::{Datum, GeoReference, LONGLAT};
pub use resolver::{compute_resolution, resolve_georeferences, ResolvedGeoreferences};
pub use transform::GeoTransform;
