//! Options consumed by the mosaic pipeline.
//!
//! Optional settings are `Option<T>`: when absent the feature is skipped,
//! when present the value overrides any default or data-derived value.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MosaicError, Result};
use crate::georef::Datum;
use crate::quadtree::OutputMode;
use crate::raster::{ChannelType, EncodeSettings};

/// Projection applied to the inputs in place of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// Keep each input's projection.
    #[default]
    Default,
    /// Treat the input as a plain image: no reprojection, no composite.
    None,
    Sinusoidal,
    Mercator,
    TransverseMercator,
    Orthographic,
    Stereographic,
    LambertAzimuthal,
    LambertConformalConic,
    Utm,
    PlateCarree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    pub kind: ProjectionKind,
    /// Centre latitude (or latitude of true scale).
    pub lat: Option<f64>,
    /// Centre longitude.
    pub lon: Option<f64>,
    /// Scale factor.
    pub scale: f64,
    /// First standard parallel.
    pub p1: Option<f64>,
    /// Second standard parallel.
    pub p2: Option<f64>,
    /// UTM zone, negative for the southern hemisphere.
    pub utm_zone: Option<i32>,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::Default,
            lat: None,
            lon: None,
            scale: 1.0,
            p1: None,
            p2: None,
            utm_zone: None,
        }
    }
}

impl ProjectionOptions {
    /// Proj4 projection string for the override, `None` when inputs keep
    /// their own projection.
    pub fn proj4_str(&self) -> Result<Option<String>> {
        let lat = self.lat.unwrap_or(0.0);
        let lon = self.lon.unwrap_or(0.0);
        let k = self.scale;
        let proj = match self.kind {
            ProjectionKind::Default | ProjectionKind::None => return Ok(None),
            ProjectionKind::Sinusoidal => format!("+proj=sinu +lon_0={lon}"),
            ProjectionKind::Mercator => format!("+proj=merc +lon_0={lon} +lat_ts={lat} +k={k}"),
            ProjectionKind::TransverseMercator => {
                format!("+proj=tmerc +lat_0={lat} +lon_0={lon} +k={k}")
            }
            ProjectionKind::Orthographic => format!("+proj=ortho +lat_0={lat} +lon_0={lon}"),
            ProjectionKind::Stereographic => {
                format!("+proj=stere +lat_0={lat} +lon_0={lon} +k={k}")
            }
            ProjectionKind::LambertAzimuthal => format!("+proj=laea +lat_0={lat} +lon_0={lon}"),
            ProjectionKind::LambertConformalConic => {
                let (p1, p2) = self.p1.zip(self.p2).ok_or_else(|| {
                    MosaicError::config("Lambert conformal conic requires --p1 and --p2")
                })?;
                format!("+proj=lcc +lat_1={p1} +lat_2={p2} +lat_0={lat} +lon_0={lon}")
            }
            ProjectionKind::Utm => {
                let zone = self
                    .utm_zone
                    .filter(|z| *z != 0 && z.abs() <= 60)
                    .ok_or_else(|| MosaicError::config("UTM projection requires a zone (1-60)"))?;
                if zone < 0 {
                    format!("+proj=utm +zone={} +south", -zone)
                } else {
                    format!("+proj=utm +zone={zone}")
                }
            }
            ProjectionKind::PlateCarree => format!("+proj=eqc +lat_ts={lat} +lon_0={lon}"),
        };
        Ok(Some(proj))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatumKind {
    #[default]
    None,
    Wgs84,
    Lunar,
    Mars,
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatumOptions {
    pub kind: DatumKind,
    pub sphere_radius: Option<f64>,
}

impl DatumOptions {
    /// Datum replacing the inputs' own, if one was requested.
    pub fn datum(&self) -> Result<Option<Datum>> {
        Ok(match self.kind {
            DatumKind::None => None,
            DatumKind::Wgs84 => Some(Datum::Wgs84),
            DatumKind::Lunar => Some(Datum::Lunar),
            DatumKind::Mars => Some(Datum::Mars),
            DatumKind::Sphere => Some(Datum::Sphere(self.sphere_radius.ok_or_else(|| {
                MosaicError::config("Sphere datum override requires a radius")
            })?)),
        })
    }
}

/// KML-specific tiling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmlOptions {
    pub draw_order_offset: u32,
    pub max_lod_pixels: i32,
}

impl Default for KmlOptions {
    fn default() -> Self {
        Self {
            draw_order_offset: 0,
            max_lod_pixels: 1024,
        }
    }
}

/// Everything the pipeline needs to know about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub input_files: Vec<PathBuf>,
    /// Output name; defaults to the first input without its extension.
    pub output_name: Option<PathBuf>,
    pub output_file_type: String,
    pub module_name: Option<String>,
    pub tile_size: u32,
    pub jpeg_quality: Option<u8>,
    pub png_compression: Option<u32>,
    pub pixel_scale: Option<f32>,
    pub pixel_offset: Option<f32>,
    pub aspect_ratio: u32,
    pub global_resolution: Option<u32>,
    pub nodata: Option<f32>,
    pub north: Option<f64>,
    pub south: Option<f64>,
    pub east: Option<f64>,
    pub west: Option<f64>,
    /// Shorthand for whole-globe bounds.
    pub global: bool,
    /// Force the working channel type instead of the first input's.
    pub channel_type: Option<ChannelType>,
    pub mode: OutputMode,
    /// Blend overlapping images instead of overwriting (draft mode).
    pub multiband: bool,
    pub normalize: bool,
    pub terrain: bool,
    pub kml: KmlOptions,
    pub projection: ProjectionOptions,
    pub datum: DatumOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output_name: None,
            output_file_type: "png".to_string(),
            module_name: None,
            tile_size: 256,
            jpeg_quality: None,
            png_compression: None,
            pixel_scale: None,
            pixel_offset: None,
            aspect_ratio: 1,
            global_resolution: None,
            nodata: None,
            north: None,
            south: None,
            east: None,
            west: None,
            global: false,
            channel_type: None,
            mode: OutputMode::None,
            multiband: false,
            normalize: false,
            terrain: false,
            kml: KmlOptions::default(),
            projection: ProjectionOptions::default(),
            datum: DatumOptions::default(),
        }
    }
}

/// Explicit geographic bounds of a single input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Options {
    /// Check the options for contradictions and fill in derived values.
    ///
    /// Expands `global` into ±180/±90 bounds and derives `output_name`
    /// from the first input.
    pub fn validate(&mut self) -> Result<()> {
        if self.input_files.is_empty() {
            return Err(MosaicError::config("need at least one input image"));
        }
        if self.tile_size == 0 {
            return Err(MosaicError::config("tile size must be positive"));
        }
        if self.aspect_ratio == 0 {
            return Err(MosaicError::config("aspect ratio must be positive"));
        }
        if let Some(resolution) = self.global_resolution {
            if !resolution.is_power_of_two() {
                return Err(MosaicError::config(format!(
                    "global resolution {resolution} must be a power of two"
                )));
            }
        }

        self.datum.datum()?;
        self.projection.proj4_str()?;

        if self.output_name.is_none() {
            self.output_name = Some(self.input_files[0].with_extension(""));
        }

        let any_bound =
            self.north.is_some() || self.south.is_some() || self.east.is_some() || self.west.is_some();
        if self.global || any_bound {
            if self.input_files.len() != 1 {
                return Err(MosaicError::config(
                    "Cannot override georeference information on multiple images",
                ));
            }
            if self.global {
                self.north = Some(90.0);
                self.south = Some(-90.0);
                self.east = Some(180.0);
                self.west = Some(-180.0);
            } else if self.bounds().is_none() {
                return Err(MosaicError::config(
                    "If you provide one, you must provide all of: --north --south --east --west",
                ));
            }
        }

        match self.mode {
            OutputMode::None if self.input_files.len() != 1 => {
                return Err(MosaicError::config(
                    "Non-georeferenced images cannot be composed",
                ));
            }
            OutputMode::Celestia | OutputMode::Uniview if self.module_name.is_none() => {
                return Err(MosaicError::config(
                    "Uniview and Celestia require --module-name",
                ));
            }
            _ => {}
        }

        if self.projection.kind == ProjectionKind::None && self.input_files.len() != 1 {
            return Err(MosaicError::config(
                "Non-georeferenced images cannot be composed",
            ));
        }

        Ok(())
    }

    /// Explicit bounds, when all four are set.
    pub fn bounds(&self) -> Option<GeoBounds> {
        Some(GeoBounds {
            north: self.north?,
            south: self.south?,
            east: self.east?,
            west: self.west?,
        })
    }

    /// True when the run builds a plain quad-tree without reprojection.
    pub fn is_plain_quadtree(&self) -> bool {
        self.mode == OutputMode::None || self.projection.kind == ProjectionKind::None
    }

    /// Output name with the default applied.
    pub fn output_name(&self) -> PathBuf {
        self.output_name
            .clone()
            .or_else(|| self.input_files.first().map(|p| p.with_extension("")))
            .unwrap_or_else(|| PathBuf::from("output"))
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        let defaults = EncodeSettings::default();
        EncodeSettings {
            jpeg_quality: self.jpeg_quality.unwrap_or(defaults.jpeg_quality),
            png_compression: self.png_compression.unwrap_or(defaults.png_compression),
        }
    }
}
