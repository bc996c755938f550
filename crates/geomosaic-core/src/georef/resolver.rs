//! Georeference resolution: one georeference per input plus the shared
//! output georeference at a resolution that does not magnify any input.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::GeoReference;
use crate::config::Options;
use crate::error::{MosaicError, Result};
use crate::raster::RasterSource;

/// Resolution used when no input says otherwise.
pub const DEFAULT_RESOLUTION: i64 = 1024;

/// Largest power-of-two exponent a resolution may reach.
const MAX_RESOLUTION_EXPONENT: i32 = 30;

/// Output of the resolver stage.
#[derive(Debug, Clone)]
pub struct ResolvedGeoreferences {
    /// One georeference per input, in input order.
    pub inputs: Vec<GeoReference>,
    /// Pixels per full turn of longitude.
    pub total_resolution: i64,
    pub x_resolution: i64,
    pub y_resolution: i64,
    /// Georeference of the output canvas.
    pub output: GeoReference,
}

/// Pixels per 360° that preserve the finest detail of an image, rounded up
/// to a power of two.
///
/// Measured at the centre pixel: the smaller of the x and y pixel steps in
/// degrees. Returns `None` when the centre cannot be mapped.
pub fn compute_resolution(georef: &GeoReference, cols: u32, rows: u32) -> Option<i64> {
    let (cx, cy) = ((cols / 2) as f64, (rows / 2) as f64);
    let pos = georef.pixel_to_lonlat(cx, cy);
    let right = georef.pixel_to_lonlat(cx + 1.0, cy);
    let down = georef.pixel_to_lonlat(cx, cy + 1.0);

    let x_step = (right.0 - pos.0).hypot(right.1 - pos.1);
    let y_step = (down.0 - pos.0).hypot(down.1 - pos.1);
    let degrees_per_pixel = x_step.min(y_step);
    if !degrees_per_pixel.is_finite() || degrees_per_pixel <= 0.0 {
        return None;
    }

    let pixels_per_circumference = 360.0 / degrees_per_pixel;
    let exponent = (pixels_per_circumference.log2().ceil() as i32).clamp(0, MAX_RESOLUTION_EXPONENT);
    Some(1i64 << exponent)
}

/// Georeference for one input, honouring explicit bounds and the projection
/// and datum overrides. `Ok(None)` means the input carries no georeference.
fn input_georeference(source: &dyn RasterSource, opts: &Options) -> Result<Option<GeoReference>> {
    let (cols, rows) = source.dimensions();
    let datum_override = opts.datum.datum()?;

    let base = match opts.bounds() {
        Some(b) => {
            debug!(
                input = source.name(),
                north = b.north,
                south = b.south,
                east = b.east,
                west = b.west,
                "Using explicit bounds"
            );
            let datum = datum_override.unwrap_or_default();
            Some(GeoReference::from_bounds(
                cols, rows, b.west, b.east, b.north, b.south, datum,
            )?)
        }
        None => source.georeference(),
    };
    let Some(base) = base else {
        return Ok(None);
    };

    let projection = opts.projection.proj4_str()?;
    if projection.is_none() && datum_override.is_none() {
        return Ok(Some(base));
    }
    let projection = projection.unwrap_or_else(|| base.proj4_str().to_string());
    let datum = datum_override.unwrap_or(base.datum());
    GeoReference::new(&projection, datum, *base.transform()).map(Some)
}

/// Resolve every input's georeference and the output georeference.
pub fn resolve_georeferences(
    sources: &[Arc<dyn RasterSource>],
    opts: &Options,
) -> Result<ResolvedGeoreferences> {
    let resolved = sources
        .iter()
        .map(|s| input_georeference(s.as_ref(), opts))
        .collect::<Result<Vec<_>>>()?;

    let missing = resolved.iter().filter(|g| g.is_none()).count();
    if missing > 1 {
        return Err(MosaicError::Georeference(format!(
            "{missing} input images have no georeference; at most one can be assumed global"
        )));
    }

    let mut inputs = Vec::with_capacity(sources.len());
    let mut total_resolution = DEFAULT_RESOLUTION;
    for (source, georef) in sources.iter().zip(resolved) {
        let (cols, rows) = source.dimensions();
        let georef = match georef {
            Some(g) => g,
            None => {
                warn!(
                    input = source.name(),
                    "No georeferencing info found. Assuming Plate Carree WGS84: -180 to 180 E, -90 to 90 N."
                );
                GeoReference::global(cols, rows)?
            }
        };
        debug!(input = source.name(), georef = %georef, "Input georeference");

        if let Some(resolution) = compute_resolution(&georef, cols, rows) {
            total_resolution = total_resolution.max(resolution);
        }
        inputs.push(georef);
    }

    if let Some(forced) = opts.global_resolution {
        total_resolution = forced as i64;
    }
    let x_resolution = total_resolution / opts.aspect_ratio.max(1) as i64;
    let y_resolution = total_resolution;
    if x_resolution <= 0 {
        return Err(MosaicError::config(format!(
            "aspect ratio {} leaves no columns at resolution {total_resolution}",
            opts.aspect_ratio
        )));
    }

    let output = opts.mode.output_georef(x_resolution, y_resolution)?;
    info!(
        total_resolution,
        x_resolution, y_resolution, "Resolved output resolution"
    );
    debug!(georef = %output, "Output georeference");

    Ok(ResolvedGeoreferences {
        inputs,
        total_resolution,
        x_resolution,
        y_resolution,
        output,
    })
}
