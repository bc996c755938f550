//! End-to-end run: resolve, reproject, composite, align, tile.
//!
//! # Architecture
//!
//! ```text
//! sources ─► resolve_georeferences ─► reproject_all (rayon) ─► ImageComposite
//!                                                                   │
//!              TileWriter ◄─ QuadTreeGenerator ◄─ OutputModeConfig ◄─ align_bbox
//! ```
//!
//! Output mode `None`, or a `None` projection override, skips everything
//! before the tiler and cuts the single input as it is.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::align::align_bbox;
use crate::bbox::{LonLatBox, PixelBox};
use crate::composite::ImageComposite;
use crate::config::Options;
use crate::error::{MosaicError, Result};
use crate::georef::{resolve_georeferences, GeoReference};
use crate::progress::{ProgressCallback, SubProgress};
use crate::quadtree::{OutputMode, OutputModeConfig, QuadTreeGenerator, TileNode, TileSource};
use crate::raster::{ChannelType, RasterSource};
use crate::reproject::{reproject_all, InputDescriptor, NormalizeRange, PixelAdjustments};
use crate::writer::TileWriter;

/// Share of the progress range spent preparing the composite.
const PREPARE_SHARE: f64 = 0.05;

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct MosaicSummary {
    pub root: TileNode,
    /// Tiled image extent: canvas pixels for a mosaic, image pixels for a
    /// plain quad-tree.
    pub aligned_bbox: PixelBox,
    /// Footprint of the data relative to `aligned_bbox`.
    pub data_bbox: PixelBox,
    /// Degrees covered by `data_bbox`.
    pub data_longlat: LonLatBox,
    /// Pixels per full turn; `None` for a plain quad-tree.
    pub total_resolution: Option<i64>,
    /// Placements in the composite, date-line copies included.
    pub composite_layers: usize,
}

impl MosaicSummary {
    pub fn tiles_written(&self) -> usize {
        self.root.count()
    }
}

/// Validated copy of `opts`. Library callers may leave `input_files` empty
/// and pass in-memory sources; their names stand in for the paths.
fn checked_options(opts: &Options, sources: &[Arc<dyn RasterSource>]) -> Result<Options> {
    let mut opts = opts.clone();
    if opts.input_files.is_empty() {
        opts.input_files = sources.iter().map(|s| PathBuf::from(s.name())).collect();
    }
    opts.validate()?;
    if opts.input_files.len() != sources.len() {
        return Err(MosaicError::config(format!(
            "{} input files configured but {} sources supplied",
            opts.input_files.len(),
            sources.len()
        )));
    }
    Ok(opts)
}

fn normalize_range(
    opts: &Options,
    normalize: Option<NormalizeRange>,
) -> Result<Option<NormalizeRange>> {
    if opts.normalize && normalize.is_none() {
        return Err(MosaicError::config(
            "normalization requested without an observed value range",
        ));
    }
    Ok(normalize)
}

/// Build the tiled mosaic of `sources` described by `opts`.
///
/// `normalize` is the value range of all inputs, required when
/// `opts.normalize` is set; see [`NormalizeRange::scan`].
pub fn run_mosaic(
    opts: &Options,
    sources: &[Arc<dyn RasterSource>],
    normalize: Option<NormalizeRange>,
    writer: &dyn TileWriter,
    progress: &dyn ProgressCallback,
) -> Result<MosaicSummary> {
    let opts = checked_options(opts, sources)?;
    let normalize = normalize_range(&opts, normalize)?;
    if opts.is_plain_quadtree() {
        return plain_quadtree(&opts, &sources[0], normalize, writer, progress);
    }

    let resolved = resolve_georeferences(sources, &opts)?;
    let (total, xres, yres) = (
        resolved.total_resolution,
        resolved.x_resolution,
        resolved.y_resolution,
    );

    let channel = opts
        .channel_type
        .unwrap_or_else(|| sources[0].channel_type());
    let inputs: Vec<InputDescriptor> = sources
        .iter()
        .zip(resolved.inputs)
        .map(|(source, georef)| {
            InputDescriptor::new(Arc::clone(source), georef)
                .with_nodata_override(opts.nodata)
                .with_channel(channel)
        })
        .collect();
    let mut adjustments = PixelAdjustments::from_options(&opts, normalize);
    if sources.iter().any(|s| s.bands() == 3) {
        adjustments.bands = Some(3);
    }

    let reprojected = reproject_all(&inputs, &resolved.output, &adjustments)?;

    let mut composite = ImageComposite::new();
    composite.set_draft_mode(!opts.multiband);
    for source in reprojected {
        composite.insert_wrapped(source, total, xres);
    }
    let raw = composite.bbox();
    info!(
        layers = composite.len(),
        min_x = raw.min_x,
        min_y = raw.min_y,
        max_x = raw.max_x,
        max_y = raw.max_y,
        "Composite assembled"
    );

    let aligned = align_bbox(&raw, total, xres, yres, opts.mode.aligns_to_power_of_two())?;
    composite.prepare(aligned, &SubProgress::new(progress, 0.0, PREPARE_SHARE))?;
    let (cols, rows) = (composite.cols(), composite.rows());
    if cols == 0 || rows == 0 {
        return Err(MosaicError::EmptyOutput);
    }
    let data_bbox = composite
        .bbox()
        .crop(&PixelBox::new(0, 0, cols as i64, rows as i64));
    let data_longlat = LonLatBox::from_pixel_box(
        &data_bbox.translate(aligned.min_x, aligned.min_y),
        xres,
        yres,
    );

    let config = OutputModeConfig::from_options(
        &opts,
        LonLatBox::from_pixel_box(&aligned, xres, yres),
    )?;
    let root = generate_tree(
        &opts,
        &composite,
        &config,
        data_bbox,
        writer,
        &SubProgress::new(progress, PREPARE_SHARE, 1.0),
    )?;

    Ok(MosaicSummary {
        root,
        aligned_bbox: aligned,
        data_bbox,
        data_longlat,
        total_resolution: Some(total),
        composite_layers: composite.len(),
    })
}

/// Quad-tree of a single image as it is, without reprojection.
pub fn run_plain_quadtree(
    opts: &Options,
    source: Arc<dyn RasterSource>,
    normalize: Option<NormalizeRange>,
    writer: &dyn TileWriter,
    progress: &dyn ProgressCallback,
) -> Result<MosaicSummary> {
    let sources = [source];
    let opts = checked_options(opts, &sources)?;
    let normalize = normalize_range(&opts, normalize)?;
    plain_quadtree(&opts, &sources[0], normalize, writer, progress)
}

fn plain_quadtree(
    opts: &Options,
    source: &Arc<dyn RasterSource>,
    normalize: Option<NormalizeRange>,
    writer: &dyn TileWriter,
    progress: &dyn ProgressCallback,
) -> Result<MosaicSummary> {
    let (cols, rows) = source.dimensions();
    info!(input = source.name(), cols, rows, "Building plain quad-tree");
    let georef = match source.georeference() {
        Some(g) => g,
        None => GeoReference::global(cols, rows)?,
    };
    let channel: ChannelType = opts.channel_type.unwrap_or_else(|| source.channel_type());
    let input = InputDescriptor::new(Arc::clone(source), georef)
        .with_nodata_override(opts.nodata)
        .with_channel(channel);
    let image = PixelAdjustments::from_options(opts, normalize).apply(source.read()?, &input);

    let image_box = PixelBox::new(0, 0, cols as i64, rows as i64);
    let whole_globe = LonLatBox::new(-180.0, -90.0, 180.0, 90.0);
    let config = OutputModeConfig::from_options(opts, whole_globe)?;
    let root = generate_tree(opts, &image, &config, image_box, writer, progress)?;

    Ok(MosaicSummary {
        root,
        aligned_bbox: image_box,
        data_bbox: image_box,
        data_longlat: whole_globe,
        total_resolution: None,
        composite_layers: 1,
    })
}

fn generate_tree(
    opts: &Options,
    image: &dyn TileSource,
    config: &OutputModeConfig,
    crop: PixelBox,
    writer: &dyn TileWriter,
    progress: &dyn ProgressCallback,
) -> Result<TileNode> {
    let mut generator = QuadTreeGenerator::new(image, opts.output_name());
    generator.set_tile_size(opts.tile_size);
    generator.set_file_type(opts.output_file_type.clone());
    generator.set_crop_bbox(crop);
    config.stamp(&mut generator);
    if config.mode() != OutputMode::None {
        info!(mode = %config.mode(), "Output mode stamped");
    }
    generator.generate(writer, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::georef::Datum;
    use crate::progress::tests::RecordingProgress;
    use crate::progress::NullProgress;
    use crate::raster::{MemorySource, Raster};
    use crate::writer::MemoryTileWriter;

    /// Grey image over the given bounds, pixel value from `value(x, y)`.
    fn georeferenced(
        name: &str,
        (cols, rows): (u32, u32),
        (west, east, north, south): (f64, f64, f64, f64),
        value: impl Fn(u32, u32) -> f32,
    ) -> Arc<dyn RasterSource> {
        let mut data = Vec::with_capacity((cols * rows * 2) as usize);
        for y in 0..rows {
            for x in 0..cols {
                data.push(value(x, y));
                data.push(255.0);
            }
        }
        let raster = Raster::from_samples(cols, rows, 1, ChannelType::U8, data);
        let georef =
            GeoReference::from_bounds(cols, rows, west, east, north, south, Datum::Wgs84).unwrap();
        Arc::new(MemorySource::new(name, raster).with_georeference(georef))
    }

    fn options(mode: OutputMode, name: &str) -> Options {
        Options {
            mode,
            output_name: Some(PathBuf::from(name)),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input_fails_before_reprojection() {
        let writer = MemoryTileWriter::new();
        let err = run_mosaic(
            &options(OutputMode::Kml, "world"),
            &[],
            None,
            &writer,
            &NullProgress,
        )
        .unwrap_err();
        assert!(matches!(err, MosaicError::Configuration(_)));
        assert!(err.to_string().contains("need at least one input image"));
        assert_eq!(writer.tile_count(), 0);
    }

    /// Two 512x512 hemispheres give a 1024 px turn; 1024x512 hemispheres
    /// over 180° each would give 2048. The stamped region is the aligned
    /// 1024x1024 square, so its latitude runs to ±180 on the KML canvas;
    /// only `data_longlat` is exactly [-180, 180] x [-90, 90].
    #[test]
    fn test_two_hemispheres_kml() {
        let sources = [
            georeferenced("west", (512, 512), (-180.0, 0.0, 90.0, -90.0), |_, _| 100.0),
            georeferenced("east", (512, 512), (0.0, 180.0, 90.0, -90.0), |_, _| 200.0),
        ];
        let mut opts = options(OutputMode::Kml, "world");
        opts.output_file_type = "png".to_string();
        let writer = MemoryTileWriter::new();
        let rec = RecordingProgress::default();

        let summary = run_mosaic(&opts, &sources, None, &writer, &rec).unwrap();

        assert_eq!(summary.total_resolution, Some(1024));
        assert_eq!(summary.composite_layers, 2);
        assert_eq!(summary.aligned_bbox, PixelBox::new(0, 0, 1024, 1024));
        assert_eq!(summary.data_bbox, PixelBox::from_corners(0, 256, 1024, 768));
        assert_eq!(
            summary.data_longlat,
            LonLatBox::new(-180.0, -90.0, 180.0, 90.0)
        );

        // 1024 / 256 = 4 leaf columns; only the two middle rows hold data.
        assert_eq!(summary.root.max_level(), 2);
        assert_eq!(summary.root.leaf_count(), 8);
        assert_eq!(summary.tiles_written(), 13);
        assert_eq!(writer.tile_count(), 13);

        let west = writer.tile("world/03.png").unwrap();
        assert_eq!(west.pixel(0, 0), &[100.0, 255.0]);
        assert_eq!(west.pixel(255, 255), &[100.0, 255.0]);
        let east = writer.tile("world/12.png").unwrap();
        assert_eq!(east.pixel(10, 10), &[200.0, 255.0]);
        assert!(writer.tile("world/00.png").is_none());

        let leaf_kml = writer.metadata("world/02.kml").unwrap();
        assert!(leaf_kml.contains("<north>90</north><south>0</south><east>-90</east><west>-180</west>"));
        assert!(leaf_kml.contains("<maxLodPixels>-1</maxLodPixels>"));
        let root_kml = writer.metadata("world.kml").unwrap();
        assert!(root_kml.contains("<href>world/root.kml</href>"));
        assert_eq!(writer.metadata_paths().len(), 14);

        let values = rec.values.lock().unwrap();
        assert_eq!(values.last(), Some(&1.0));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_image_across_date_line_wraps() {
        // lon 90..270: the right half lands on the far left of the canvas.
        let sources = [georeferenced(
            "pacific",
            (512, 512),
            (90.0, 270.0, 90.0, -90.0),
            |x, _| if x < 256 { 50.0 } else { 150.0 },
        )];
        let writer = MemoryTileWriter::new();
        let summary = run_mosaic(
            &options(OutputMode::Tms, "dl"),
            &sources,
            None,
            &writer,
            &NullProgress,
        )
        .unwrap();

        assert_eq!(summary.composite_layers, 2);
        assert_eq!(summary.aligned_bbox, PixelBox::from_corners(0, 256, 1024, 768));
        assert_eq!(summary.data_bbox, PixelBox::new(0, 0, 1024, 512));

        // Top data row of leaves is TMS row 3 at level 2.
        let far_left = writer.tile("dl/2/0/3.png").unwrap();
        assert_eq!(far_left.pixel(10, 10), &[150.0, 255.0]);
        let gap = writer.tile("dl/2/1/3.png").unwrap();
        assert_eq!(gap.alpha(10, 10), 0.0);
        let far_right = writer.tile("dl/2/3/3.png").unwrap();
        assert_eq!(far_right.pixel(10, 10), &[50.0, 255.0]);
        assert!(writer.metadata("dl/tilemapresource.xml").is_some());
    }

    #[test]
    fn test_global_image_with_nodata() {
        let sources = [georeferenced(
            "globe",
            (64, 32),
            (-180.0, 180.0, 90.0, -90.0),
            |x, _| if x < 32 { 0.0 } else { 200.0 },
        )];
        let mut opts = options(OutputMode::Gigapan, "out/globe");
        opts.nodata = Some(0.0);
        let writer = MemoryTileWriter::new();
        let summary = run_mosaic(&opts, &sources, None, &writer, &NullProgress).unwrap();

        assert_eq!(summary.composite_layers, 1);
        assert_eq!(summary.data_bbox, PixelBox::new(0, 0, 1024, 512));
        let west = writer.tile("out/globe/00.png").unwrap();
        assert_eq!(west.alpha(100, 10), 0.0);
        // Upsampled 16x, so samples fall between source pixels.
        let east = writer.tile("out/globe/11.png").unwrap();
        let px = east.pixel(132, 10);
        assert!((px[0] - 200.0).abs() < 1e-3);
        assert!((px[1] - 255.0).abs() < 1e-3);

        let json = writer.metadata("out/globe.json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["width"], 1024);
    }

    #[test]
    fn test_normalize_requires_range() {
        let sources = [georeferenced(
            "a",
            (16, 16),
            (0.0, 10.0, 10.0, 0.0),
            |_, _| 5.0,
        )];
        let mut opts = options(OutputMode::Tms, "a");
        opts.normalize = true;
        let writer = MemoryTileWriter::new();
        let err = run_mosaic(&opts, &sources, None, &writer, &NullProgress).unwrap_err();
        assert!(matches!(err, MosaicError::Configuration(_)));
    }

    #[test]
    fn test_source_count_must_match_input_files() {
        let sources = [georeferenced("a", (16, 16), (0.0, 10.0, 10.0, 0.0), |_, _| 5.0)];
        let mut opts = options(OutputMode::Tms, "a");
        opts.input_files = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let writer = MemoryTileWriter::new();
        assert!(run_mosaic(&opts, &sources, None, &writer, &NullProgress).is_err());
    }

    #[test]
    fn test_plain_quadtree() {
        let raster = Raster::new(300, 200, 3, ChannelType::U8);
        let source: Arc<dyn RasterSource> = Arc::new(MemorySource::new("photo.png", raster));
        let mut opts = Options::default();
        opts.tile_size = 128;
        let writer = MemoryTileWriter::new();

        let summary = run_plain_quadtree(&opts, source, None, &writer, &NullProgress).unwrap();

        assert_eq!(summary.total_resolution, None);
        assert_eq!(summary.aligned_bbox, PixelBox::new(0, 0, 300, 200));
        assert_eq!(summary.root.max_level(), 2);
        // Output name defaults to the source name without its extension.
        assert!(writer.tile("photo/root.png").is_some());
        assert!(writer.metadata_paths().is_empty());
        // 3x2 leaves of 128 px cover 300x200.
        assert_eq!(summary.root.leaf_count(), 6);
    }

    #[test]
    fn test_plain_projection_still_stamps_mode() {
        let raster = Raster::new(64, 64, 1, ChannelType::U8);
        let source: Arc<dyn RasterSource> = Arc::new(MemorySource::new("flat", raster));
        let mut opts = options(OutputMode::Kml, "flat");
        opts.projection.kind = crate::config::ProjectionKind::None;
        opts.tile_size = 64;
        let writer = MemoryTileWriter::new();

        let summary = run_mosaic(&opts, &[source], None, &writer, &NullProgress).unwrap();

        assert_eq!(summary.tiles_written(), 1);
        let kml = writer.metadata("flat/root.kml").unwrap();
        assert!(kml.contains("<north>90</north><south>-90</south><east>180</east><west>-180</west>"));
    }
}
