//! Command-line arguments and their merge onto [`Options`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use geomosaic_core::config::{DatumKind, ProjectionKind};
use geomosaic_core::raster::ChannelType;
use geomosaic_core::{Options, OutputMode};

/// Output format argument for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Plain quad-tree of a single image
    None,
    /// KML super-overlay
    Kml,
    /// Tile Map Service
    Tms,
    /// Uniview texture module
    Uniview,
    /// Google Maps tiles
    Gmap,
    /// Celestia virtual texture
    Celestia,
    /// Gigapan viewer
    Gigapan,
}

impl From<ModeArg> for OutputMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::None => OutputMode::None,
            ModeArg::Kml => OutputMode::Kml,
            ModeArg::Tms => OutputMode::Tms,
            ModeArg::Uniview => OutputMode::Uniview,
            ModeArg::Gmap => OutputMode::GMap,
            ModeArg::Celestia => OutputMode::Celestia,
            ModeArg::Gigapan => OutputMode::Gigapan,
        }
    }
}

/// Projection override argument for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProjectionArg {
    /// Treat the input as an ungeoreferenced image
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

impl From<ProjectionArg> for ProjectionKind {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::None => ProjectionKind::None,
            ProjectionArg::Sinusoidal => ProjectionKind::Sinusoidal,
            ProjectionArg::Mercator => ProjectionKind::Mercator,
            ProjectionArg::TransverseMercator => ProjectionKind::TransverseMercator,
            ProjectionArg::Orthographic => ProjectionKind::Orthographic,
            ProjectionArg::Stereographic => ProjectionKind::Stereographic,
            ProjectionArg::LambertAzimuthal => ProjectionKind::LambertAzimuthal,
            ProjectionArg::LambertConformalConic => ProjectionKind::LambertConformalConic,
            ProjectionArg::Utm => ProjectionKind::Utm,
            ProjectionArg::PlateCarree => ProjectionKind::PlateCarree,
        }
    }
}

/// Datum override argument for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DatumArg {
    Wgs84,
    Lunar,
    Mars,
    /// Sphere of --sphere-radius metres
    Sphere,
}

impl From<DatumArg> for DatumKind {
    fn from(arg: DatumArg) -> Self {
        match arg {
            DatumArg::Wgs84 => DatumKind::Wgs84,
            DatumArg::Lunar => DatumKind::Lunar,
            DatumArg::Mars => DatumKind::Mars,
            DatumArg::Sphere => DatumKind::Sphere,
        }
    }
}

/// Working channel type argument for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChannelArg {
    Uint8,
    Uint16,
    Int16,
    Float32,
}

impl From<ChannelArg> for ChannelType {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Uint8 => ChannelType::U8,
            ChannelArg::Uint16 => ChannelType::U16,
            ChannelArg::Int16 => ChannelType::I16,
            ChannelArg::Float32 => ChannelType::F32,
        }
    }
}

/// Build a quad-tree of tiles from one or more georeferenced images
#[derive(Parser, Debug)]
#[command(name = "image2qtree")]
#[command(about = "Mosaic georeferenced images and cut them into a tiled quad-tree")]
pub struct Args {
    /// Input images
    pub input_files: Vec<PathBuf>,

    /// JSON options file; command-line flags take precedence
    #[arg(long)]
    pub options_file: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output name [default: first input without its extension]
    #[arg(short, long)]
    pub output_name: Option<PathBuf>,

    /// Tile file type
    #[arg(short = 't', long)]
    pub file_type: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Module name (Uniview and Celestia)
    #[arg(long)]
    pub module_name: Option<String>,

    /// Tile size in pixels
    #[arg(long)]
    pub tile_size: Option<u32>,

    /// JPEG quality, 1-100
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// PNG compression level
    #[arg(long)]
    pub png_compression: Option<u32>,

    /// Multiply every pixel value by this
    #[arg(long)]
    pub pixel_scale: Option<f32>,

    /// Add this to every pixel value after scaling
    #[arg(long)]
    pub pixel_offset: Option<f32>,

    /// Pixel aspect ratio (width over height)
    #[arg(long)]
    pub aspect_ratio: Option<u32>,

    /// Override the computed pixels per full turn
    #[arg(long)]
    pub global_resolution: Option<u32>,

    /// Treat this pixel value as transparent
    #[arg(long)]
    pub nodata_value: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub north: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub south: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub east: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub west: Option<f64>,

    /// Input covers the whole globe
    #[arg(long)]
    pub global: bool,

    /// Working channel type [default: first input's]
    #[arg(long, value_enum)]
    pub channel_type: Option<ChannelArg>,

    /// Blend overlapping images instead of overwriting
    #[arg(long)]
    pub multiband: bool,

    /// Stretch pixel values to the full channel range
    #[arg(long)]
    pub normalize: bool,

    /// Mark Uniview output as terrain
    #[arg(long)]
    pub terrain: bool,

    /// KML draw order offset
    #[arg(long)]
    pub draw_order_offset: Option<u32>,

    /// KML maxLodPixels of interior nodes
    #[arg(long, allow_hyphen_values = true)]
    pub max_lod_pixels: Option<i32>,

    /// Reproject the inputs into this projection
    #[arg(long, value_enum)]
    pub projection: Option<ProjectionArg>,

    /// Projection centre latitude
    #[arg(long, allow_hyphen_values = true)]
    pub proj_lat: Option<f64>,

    /// Projection centre longitude
    #[arg(long, allow_hyphen_values = true)]
    pub proj_lon: Option<f64>,

    /// Projection scale factor
    #[arg(long)]
    pub proj_scale: Option<f64>,

    /// First standard parallel
    #[arg(long, allow_hyphen_values = true)]
    pub p1: Option<f64>,

    /// Second standard parallel
    #[arg(long, allow_hyphen_values = true)]
    pub p2: Option<f64>,

    /// UTM zone, negative for the southern hemisphere
    #[arg(long, allow_hyphen_values = true)]
    pub utm: Option<i32>,

    /// Replace the inputs' datum
    #[arg(long, value_enum)]
    pub datum: Option<DatumArg>,

    /// Sphere radius in metres for --datum sphere
    #[arg(long)]
    pub sphere_radius: Option<f64>,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

impl Args {
    /// Apply every flag given on the command line on top of `opts`.
    pub fn merge_into(self, opts: &mut Options) {
        if !self.input_files.is_empty() {
            opts.input_files = self.input_files;
        }
        set_opt(&mut opts.output_name, self.output_name);
        set(&mut opts.output_file_type, self.file_type);
        set(&mut opts.mode, self.mode.map(Into::into));
        set_opt(&mut opts.module_name, self.module_name);
        set(&mut opts.tile_size, self.tile_size);
        set_opt(&mut opts.jpeg_quality, self.jpeg_quality);
        set_opt(&mut opts.png_compression, self.png_compression);
        set_opt(&mut opts.pixel_scale, self.pixel_scale);
        set_opt(&mut opts.pixel_offset, self.pixel_offset);
        set(&mut opts.aspect_ratio, self.aspect_ratio);
        set_opt(&mut opts.global_resolution, self.global_resolution);
        set_opt(&mut opts.nodata, self.nodata_value);
        set_opt(&mut opts.north, self.north);
        set_opt(&mut opts.south, self.south);
        set_opt(&mut opts.east, self.east);
        set_opt(&mut opts.west, self.west);
        set_opt(&mut opts.channel_type, self.channel_type.map(Into::into));
        opts.global |= self.global;
        opts.multiband |= self.multiband;
        opts.normalize |= self.normalize;
        opts.terrain |= self.terrain;

        set(&mut opts.kml.draw_order_offset, self.draw_order_offset);
        set(&mut opts.kml.max_lod_pixels, self.max_lod_pixels);

        set(&mut opts.projection.kind, self.projection.map(Into::into));
        set_opt(&mut opts.projection.lat, self.proj_lat);
        set_opt(&mut opts.projection.lon, self.proj_lon);
        set(&mut opts.projection.scale, self.proj_scale);
        set_opt(&mut opts.projection.p1, self.p1);
        set_opt(&mut opts.projection.p2, self.p2);
        set_opt(&mut opts.projection.utm_zone, self.utm);

        set(&mut opts.datum.kind, self.datum.map(Into::into));
        set_opt(&mut opts.datum.sphere_radius, self.sphere_radius);
    }
}
