//! Raster sources: where input pixels and embedded georeferences come from.

use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::debug;

use super::{ChannelType, Raster};
use crate::error::{MosaicError, Result};
use crate::georef::{Affine, Datum, GeoReference};

/// A read-only input image.
///
/// Implementations must be shareable across the reprojection worker pool.
pub trait RasterSource: Send + Sync {
    /// Name used in log messages and to derive default output names.
    fn name(&self) -> &str;

    /// `(cols, rows)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Colour bands, 1 (grey) or 3 (RGB).
    fn bands(&self) -> usize;

    fn channel_type(&self) -> ChannelType;

    /// Nodata value declared by the source itself.
    fn nodata(&self) -> Option<f32> {
        None
    }

    /// Georeference embedded in the source, if any.
    fn georeference(&self) -> Option<GeoReference> {
        None
    }

    /// Pixel data with an alpha band.
    fn read(&self) -> Result<Raster>;
}

/// An in-memory raster with optional georeference and nodata value.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    raster: Raster,
    georef: Option<GeoReference>,
    nodata: Option<f32>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, raster: Raster) -> Self {
        Self {
            name: name.into(),
            raster,
            georef: None,
            nodata: None,
        }
    }

    pub fn with_georeference(mut self, georef: GeoReference) -> Self {
        self.georef = Some(georef);
        self
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

impl RasterSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.raster.width, self.raster.height)
    }

    fn bands(&self) -> usize {
        self.raster.bands
    }

    fn channel_type(&self) -> ChannelType {
        self.raster.channel
    }

    fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    fn georeference(&self) -> Option<GeoReference> {
        self.georef.clone()
    }

    fn read(&self) -> Result<Raster> {
        Ok(self.raster.clone())
    }
}

/// A PNG or JPEG file, georeferenced by an ESRI world file when one sits
/// next to it (`.pgw`, `.pngw`, `.jgw`, `.jpgw`, `.wld`).
///
/// World files are taken to be in WGS84 longitude/latitude.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    name: String,
    raster: Raster,
    georef: Option<GeoReference>,
}

impl ImageFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let raster = Raster::from_dynamic_image(img);

        let georef = match find_world_file(path) {
            Some(world) => {
                debug!(image = %path.display(), world = %world.display(), "Reading world file");
                let text = std::fs::read_to_string(&world)?;
                Some(GeoReference::lonlat(parse_world_file(&text)?, Datum::Wgs84)?)
            }
            None => None,
        };

        Ok(Self {
            name: path.display().to_string(),
            raster,
            georef,
        })
    }
}

impl RasterSource for ImageFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.raster.width, self.raster.height)
    }

    fn bands(&self) -> usize {
        self.raster.bands
    }

    fn channel_type(&self) -> ChannelType {
        self.raster.channel
    }

    fn georeference(&self) -> Option<GeoReference> {
        self.georef.clone()
    }

    fn read(&self) -> Result<Raster> {
        Ok(self.raster.clone())
    }
}

fn find_world_file(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mut candidates = vec![format!("{ext}w"), "wld".to_string()];
    if ext.len() >= 2 {
        let short = format!("{}{}w", &ext[..1], &ext[ext.len() - 1..]);
        candidates.insert(0, short);
    }
    candidates
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

/// Parse the six lines of a world file into a corner-based affine.
///
/// World files locate the *centre* of the top-left pixel; the affine used
/// here is anchored at its corner.
pub fn parse_world_file(text: &str) -> Result<Affine> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| MosaicError::Georeference(format!("invalid world file value '{t}'")))
        })
        .collect::<Result<_>>()?;
    if values.len() != 6 {
        return Err(MosaicError::Georeference(format!(
            "world file needs 6 values, found {}",
            values.len()
        )));
    }
    let (a, d, b, e, c, f) = (values[0], values[1], values[2], values[3], values[4], values[5]);
    Ok(Affine::new(
        a,
        b,
        c - 0.5 * a - 0.5 * b,
        d,
        e,
        f - 0.5 * d - 0.5 * e,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_world_file() {
        let t = parse_world_file("0.5\n0\n0\n-0.5\n-179.75\n89.75\n").unwrap();
        assert_eq!(t, Affine::new(0.5, 0.0, -180.0, 0.0, -0.5, 90.0));
    }

    #[test]
    fn test_parse_world_file_rejects_short() {
        assert!(matches!(
            parse_world_file("1 0 0 -1"),
            Err(MosaicError::Georeference(_))
        ));
        assert!(parse_world_file("1 0 0 -1 x 2").is_err());
    }

    #[test]
    fn test_memory_source() {
        let raster = Raster::new(8, 4, 3, ChannelType::U8);
        let src = MemorySource::new("mem", raster).with_nodata(0.0);
        assert_eq!(src.dimensions(), (8, 4));
        assert_eq!(src.bands(), 3);
        assert_eq!(src.nodata(), Some(0.0));
        assert!(src.georeference().is_none());
        assert_eq!(src.read().unwrap().width, 8);
    }

    #[test]
    fn test_image_file_source_with_world_file() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("tile.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([1, 2, 3]))
            .save(&png)
            .unwrap();
        std::fs::write(dir.path().join("tile.pgw"), "90\n0\n0\n-90\n-135\n45\n").unwrap();

        let src = ImageFileSource::open(&png).unwrap();
        assert_eq!(src.dimensions(), (4, 2));
        assert_eq!(src.channel_type(), ChannelType::U8);
        let georef = src.georeference().unwrap();
        let (lon, lat) = georef.pixel_to_lonlat(0.0, 0.0);
        assert!((lon + 180.0).abs() < 1e-9);
        assert!((lat - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_image_file_source_without_world_file() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("plain.png");
        image::GrayImage::from_pixel(3, 3, image::Luma([9])).save(&png).unwrap();

        let src = ImageFileSource::open(&png).unwrap();
        assert!(src.georeference().is_none());
        assert_eq!(src.read().unwrap().bands, 1);
    }
}
