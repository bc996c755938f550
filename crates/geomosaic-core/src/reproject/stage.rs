//! Per-image reprojection into the output canvas.
//!
//! # Architecture
//!
//! Each input is adjusted (nodata, rescale, normalization) eagerly, then
//! wrapped in a [`ReprojectedSource`] that samples it lazily: the composite
//! asks for one output pixel at a time and the source maps it back through
//! the inverse transform. Only the placement bbox is computed up front.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use super::adjust::{apply_scale_offset, mask_nodata, normalize_retain_alpha, NormalizeRange};
use super::sampling::{sample_bilinear, EdgeMode};
use crate::bbox::PixelBox;
use crate::config::Options;
use crate::error::{MosaicError, Result};
use crate::georef::{GeoReference, GeoTransform, LONGLAT};
use crate::raster::{ChannelType, Raster, RasterSource};

/// Fraction of the image diagonal that `reverse(forward(0, 0))` may drift
/// before the transform is considered to cross a projection fault.
const FAULT_TOLERANCE: f64 = 0.01;

/// One input paired with its resolved georeference, working channel type
/// and effective nodata value.
#[derive(Clone)]
pub struct InputDescriptor {
    pub source: Arc<dyn RasterSource>,
    pub georef: GeoReference,
    pub channel: ChannelType,
    pub nodata: Option<f32>,
}

impl InputDescriptor {
    /// Descriptor using the source's own channel type and nodata value.
    pub fn new(source: Arc<dyn RasterSource>, georef: GeoReference) -> Self {
        let channel = source.channel_type();
        let nodata = source.nodata();
        Self {
            source,
            georef,
            channel,
            nodata,
        }
    }

    /// An explicit nodata value replaces the source's own.
    pub fn with_nodata_override(mut self, nodata: Option<f32>) -> Self {
        if nodata.is_some() {
            self.nodata = nodata;
        }
        self
    }

    pub fn with_channel(mut self, channel: ChannelType) -> Self {
        self.channel = channel;
        self
    }
}

impl std::fmt::Debug for InputDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDescriptor")
            .field("source", &self.source.name())
            .field("georef", &self.georef)
            .field("channel", &self.channel)
            .field("nodata", &self.nodata)
            .finish()
    }
}

/// Pixel adjustments shared by every input of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelAdjustments {
    /// `(scale, offset)`; present when either was requested.
    pub scale_offset: Option<(f32, f32)>,
    pub normalize: Option<NormalizeRange>,
    /// Working colour band count; grey inputs are expanded to RGB.
    pub bands: Option<usize>,
}

impl PixelAdjustments {
    pub fn from_options(opts: &Options, normalize: Option<NormalizeRange>) -> Self {
        let scale_offset = if opts.pixel_scale.is_some() || opts.pixel_offset.is_some() {
            Some((opts.pixel_scale.unwrap_or(1.0), opts.pixel_offset.unwrap_or(0.0)))
        } else {
            None
        };
        Self {
            scale_offset,
            normalize: if opts.normalize { normalize } else { None },
            bands: None,
        }
    }

    /// Apply to the raster read from `input`.
    pub fn apply(&self, raster: Raster, input: &InputDescriptor) -> Raster {
        let source_channel = raster.channel;
        let mut raster = raster.convert_channel(input.channel);
        if self.bands == Some(3) && raster.bands != 3 {
            raster = raster.to_rgb();
        }
        if let Some(nodata) = input.nodata {
            debug!(input = input.source.name(), nodata, "Masking nodata");
            mask_nodata(&mut raster, nodata);
        }
        if let Some((scale, offset)) = self.scale_offset {
            debug!(input = input.source.name(), scale, offset, "Rescaling pixels");
            apply_scale_offset(&mut raster, scale, offset);
        }
        if let Some(range) = self.normalize {
            let range = self.working_range(range, source_channel, input.channel);
            debug!(input = input.source.name(), lo = range.lo, hi = range.hi, "Normalizing");
            normalize_retain_alpha(&mut raster, range);
        }
        raster
    }

    /// A range scanned in `from` units, moved through the same channel
    /// conversion and rescale the pixels went through.
    fn working_range(
        &self,
        range: NormalizeRange,
        from: ChannelType,
        to: ChannelType,
    ) -> NormalizeRange {
        let range = range.map(|v| from.rescale_to(v, to));
        match self.scale_offset {
            Some((scale, offset)) => range.map(|v| to.clamp(v * scale + offset)),
            None => range,
        }
    }
}

/// True when `georef` is an unprojected image spanning the whole globe:
/// each of ±180° longitude and ±90° latitude lands within one pixel of the
/// matching image edge.
pub fn is_global(georef: &GeoReference, cols: u32, rows: u32) -> bool {
    if georef.proj4_str().trim() != LONGLAT {
        return false;
    }
    let (cols, rows) = (cols as f64, rows as f64);
    let left = georef.lonlat_to_pixel(-180.0, 0.0).0;
    let right = georef.lonlat_to_pixel(180.0, 0.0).0;
    let top = georef.lonlat_to_pixel(0.0, 90.0).1;
    let bottom = georef.lonlat_to_pixel(0.0, -90.0).1;
    left.abs() < 1.0
        && (right - cols).abs() < 1.0
        && top.abs() < 1.0
        && (bottom - rows).abs() < 1.0
}

/// An input resampled into output-canvas pixels, evaluated lazily.
///
/// Local pixel `(0, 0)` is canvas pixel `bbox().min`.
#[derive(Debug, Clone)]
pub struct ReprojectedSource {
    name: String,
    image: Raster,
    transform: GeoTransform,
    edge: EdgeMode,
    /// Added to source coordinates after the inverse transform.
    shift: (f64, f64),
    bbox: PixelBox,
}

impl ReprojectedSource {
    /// Name of the input this was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placement in output-canvas pixels.
    pub fn bbox(&self) -> PixelBox {
        self.bbox
    }

    /// Colour bands after adjustment.
    pub fn bands(&self) -> usize {
        self.image.bands
    }

    /// Working sample type after adjustment.
    pub fn channel(&self) -> ChannelType {
        self.image.channel
    }

    /// How samples past the source edge are filled.
    pub fn edge_mode(&self) -> EdgeMode {
        self.edge
    }

    /// Sample local pixel `(x, y)` into `out` (`bands + 1` values).
    #[inline]
    pub fn sample_into(&self, x: i64, y: i64, out: &mut [f32]) {
        let cx = (self.bbox.min_x + x) as f64 + 0.5;
        let cy = (self.bbox.min_y + y) as f64 + 0.5;
        let (u, v) = self.transform.reverse(cx, cy);
        sample_bilinear(
            &self.image,
            u + self.shift.0 - 0.5,
            v + self.shift.1 - 0.5,
            self.edge,
            out,
        );
    }

    /// Evaluate the whole placement bbox.
    pub fn materialize(&self) -> Raster {
        let (w, h) = (self.bbox.width() as u32, self.bbox.height() as u32);
        let mut out = Raster::new(w, h, self.image.bands, self.image.channel);
        for y in 0..h {
            for x in 0..w {
                self.sample_into(x as i64, y as i64, out.pixel_mut(x, y));
            }
        }
        out
    }
}

/// Reproject one input into the space of `output`.
///
/// Fails with [`MosaicError::Reprojection`] when the placement bbox is
/// degenerate or a fault correction is needed on a rotated source.
pub fn reproject(
    input: &InputDescriptor,
    output: &GeoReference,
    adjustments: &PixelAdjustments,
) -> Result<ReprojectedSource> {
    let name = input.source.name().to_string();
    let (cols, rows) = input.source.dimensions();
    let image = adjustments.apply(input.source.read()?, input);

    let global = is_global(&input.georef, cols, rows);
    if global {
        info!(input = %name, "Detected global overlay. Using cylindrical edge extension to hide the seam.");
    }

    let mut transform = GeoTransform::new(input.georef.clone(), output.clone(), cols, rows);
    // Placement across the date line is handled by the composite.
    transform.set_offset((0.0, 0.0));

    let image_box = PixelBox::new(0, 0, cols as i64, rows as i64);
    let bbox = transform.forward_bbox(&image_box);
    if bbox.is_empty() {
        return Err(MosaicError::Reprojection(format!(
            "{name}: output bbox {}x{} is degenerate",
            bbox.width(),
            bbox.height()
        )));
    }

    let (edge, shift) = if global {
        (EdgeMode::Cylindrical, (0.0, 0.0))
    } else {
        let (fx, fy) = transform.forward(0.0, 0.0);
        let (rx, ry) = transform.reverse(fx, fy);
        let drift = rx.hypot(ry);
        let limit = FAULT_TOLERANCE * (cols as f64).hypot(rows as f64);
        if drift.is_finite() && drift > limit {
            if input.georef.transform().has_rotation() {
                return Err(MosaicError::Reprojection(format!(
                    "{name}: fault correction is not supported for rotated georeferences"
                )));
            }
            let correction = -rx.trunc();
            debug!(input = %name, correction, "Correcting for projection fault");
            (EdgeMode::Constant, (correction, 0.0))
        } else {
            (EdgeMode::Zero, (0.0, 0.0))
        }
    };

    debug!(
        input = %name,
        cols,
        rows,
        min_x = bbox.min_x,
        min_y = bbox.min_y,
        max_x = bbox.max_x,
        max_y = bbox.max_y,
        ?edge,
        "Reprojected placement"
    );

    Ok(ReprojectedSource {
        name,
        image,
        transform,
        edge,
        shift,
        bbox,
    })
}

/// Reproject every input in parallel. Output order matches input order.
pub fn reproject_all(
    inputs: &[InputDescriptor],
    output: &GeoReference,
    adjustments: &PixelAdjustments,
) -> Result<Vec<ReprojectedSource>> {
    info!(count = inputs.len(), "Reprojecting images");
    inputs
        .par_iter()
        .map(|input| reproject(input, output, adjustments))
        .collect()
}
