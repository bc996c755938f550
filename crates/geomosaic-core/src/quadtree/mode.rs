//! Output formats and their per-format configuration.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::generator::QuadTreeGenerator;
use super::layout::TreeFormat;
use crate::bbox::LonLatBox;
use crate::config::Options;
use crate::error::{MosaicError, Result};
use crate::georef::{Affine, Datum, GeoReference};

/// Radius of the sphere used by spherical Mercator, in metres.
const MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Target tile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Plain quad-tree of the input, no reprojection.
    #[default]
    None,
    Kml,
    Tms,
    Uniview,
    GMap,
    Celestia,
    Gigapan,
}

impl OutputMode {
    pub const ALL: [OutputMode; 7] = [
        OutputMode::None,
        OutputMode::Kml,
        OutputMode::Tms,
        OutputMode::Uniview,
        OutputMode::GMap,
        OutputMode::Celestia,
        OutputMode::Gigapan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputMode::None => "none",
            OutputMode::Kml => "kml",
            OutputMode::Tms => "tms",
            OutputMode::Uniview => "uniview",
            OutputMode::GMap => "gmap",
            OutputMode::Celestia => "celestia",
            OutputMode::Gigapan => "gigapan",
        }
    }

    /// KML super-overlays need tiles aligned to power-of-two canvas cells.
    pub fn aligns_to_power_of_two(self) -> bool {
        self == OutputMode::Kml
    }

    /// Georeference of the output canvas, `x_resolution` by `y_resolution`
    /// pixels.
    pub fn output_georef(self, x_resolution: i64, y_resolution: i64) -> Result<GeoReference> {
        if x_resolution <= 0 || y_resolution <= 0 {
            return Err(MosaicError::Georeference(format!(
                "output resolution {x_resolution}x{y_resolution} is not positive"
            )));
        }
        let (xres, yres) = (x_resolution as f64, y_resolution as f64);
        match self {
            OutputMode::None | OutputMode::Kml | OutputMode::Tms | OutputMode::Gigapan => {
                GeoReference::lonlat(
                    Affine::scale_translate(360.0 / xres, -360.0 / yres, -180.0, 180.0),
                    Datum::Wgs84,
                )
            }
            OutputMode::Uniview | OutputMode::Celestia => GeoReference::lonlat(
                Affine::scale_translate(360.0 / xres, -180.0 / yres, -180.0, 90.0),
                Datum::Wgs84,
            ),
            OutputMode::GMap => {
                let extent = PI * MERCATOR_RADIUS;
                GeoReference::new(
                    "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +units=m",
                    Datum::Sphere(MERCATOR_RADIUS),
                    Affine::scale_translate(
                        2.0 * extent / xres,
                        -2.0 * extent / yres,
                        -extent,
                        extent,
                    ),
                )
            }
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputMode {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        OutputMode::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| MosaicError::config(format!("unknown output mode '{s}'")))
    }
}

/// Per-format metadata, one variant per [`OutputMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutputModeConfig {
    None,
    Kml {
        longlat_bbox: LonLatBox,
        max_lod_pixels: i32,
        draw_order_offset: u32,
    },
    Tms,
    Uniview {
        terrain: bool,
        module: String,
    },
    GMap,
    Celestia {
        module: String,
    },
    Gigapan {
        longlat_bbox: LonLatBox,
    },
}

impl OutputModeConfig {
    /// Config for `opts.mode`. `longlat_bbox` is the extent of the tiled
    /// image in degrees.
    pub fn from_options(opts: &Options, longlat_bbox: LonLatBox) -> Result<Self> {
        let module = || {
            opts.module_name.clone().ok_or_else(|| {
                MosaicError::config(format!("{} output requires a module name", opts.mode))
            })
        };
        Ok(match opts.mode {
            OutputMode::None => OutputModeConfig::None,
            OutputMode::Kml => OutputModeConfig::Kml {
                longlat_bbox,
                max_lod_pixels: opts.kml.max_lod_pixels,
                draw_order_offset: opts.kml.draw_order_offset,
            },
            OutputMode::Tms => OutputModeConfig::Tms,
            OutputMode::Uniview => OutputModeConfig::Uniview {
                terrain: opts.terrain,
                module: module()?,
            },
            OutputMode::GMap => OutputModeConfig::GMap,
            OutputMode::Celestia => OutputModeConfig::Celestia { module: module()? },
            OutputMode::Gigapan => OutputModeConfig::Gigapan { longlat_bbox },
        })
    }

    pub fn mode(&self) -> OutputMode {
        match self {
            OutputModeConfig::None => OutputMode::None,
            OutputModeConfig::Kml { .. } => OutputMode::Kml,
            OutputModeConfig::Tms => OutputMode::Tms,
            OutputModeConfig::Uniview { .. } => OutputMode::Uniview,
            OutputModeConfig::GMap => OutputMode::GMap,
            OutputModeConfig::Celestia { .. } => OutputMode::Celestia,
            OutputModeConfig::Gigapan { .. } => OutputMode::Gigapan,
        }
    }

    /// Hand this format's naming scheme and metadata to the generator.
    pub fn stamp(&self, generator: &mut QuadTreeGenerator<'_>) {
        let base = TreeFormat::new(self.mode());
        let format = match self {
            OutputModeConfig::None | OutputModeConfig::Tms | OutputModeConfig::GMap => base,
            OutputModeConfig::Kml {
                longlat_bbox,
                max_lod_pixels,
                draw_order_offset,
            } => TreeFormat {
                longlat_bbox: Some(*longlat_bbox),
                max_lod_pixels: Some(*max_lod_pixels),
                draw_order_offset: *draw_order_offset,
                ..base
            },
            OutputModeConfig::Uniview { terrain, module } => TreeFormat {
                terrain: *terrain,
                module: Some(module.clone()),
                ..base
            },
            OutputModeConfig::Celestia { module } => TreeFormat {
                module: Some(module.clone()),
                ..base
            },
            OutputModeConfig::Gigapan { longlat_bbox } => TreeFormat {
                longlat_bbox: Some(*longlat_bbox),
                ..base
            },
        };
        generator.set_format(format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::PixelBox;
    use crate::quadtree::GeneratorState;
    use crate::raster::{ChannelType, Raster};

    #[test]
    fn test_parse_and_display() {
        assert_eq!("KML".parse::<OutputMode>().unwrap(), OutputMode::Kml);
        assert_eq!("gmap".parse::<OutputMode>().unwrap(), OutputMode::GMap);
        assert!("tiff".parse::<OutputMode>().is_err());
        for mode in OutputMode::ALL {
            assert_eq!(mode.to_string().parse::<OutputMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&OutputMode::GMap).unwrap();
        assert_eq!(json, "\"gmap\"");
        let mode: OutputMode = serde_json::from_str("\"celestia\"").unwrap();
        assert_eq!(mode, OutputMode::Celestia);
    }

    #[test]
    fn test_only_kml_aligns() {
        let aligned: Vec<_> = OutputMode::ALL
            .into_iter()
            .filter(|m| m.aligns_to_power_of_two())
            .collect();
        assert_eq!(aligned, vec![OutputMode::Kml]);
    }

    #[test]
    fn test_kml_output_georef() {
        let g = OutputMode::Kml.output_georef(1024, 1024).unwrap();
        assert!(g.is_lonlat());
        assert_eq!(g.pixel_to_lonlat(0.0, 0.0), (-180.0, 180.0));
        assert_eq!(g.pixel_to_lonlat(512.0, 256.0), (0.0, 90.0));
    }

    #[test]
    fn test_uniview_output_georef() {
        let g = OutputMode::Uniview.output_georef(2048, 1024).unwrap();
        assert_eq!(g.pixel_to_lonlat(0.0, 0.0), (-180.0, 90.0));
        assert_eq!(g.pixel_to_lonlat(2048.0, 1024.0), (180.0, -90.0));
    }

    #[test]
    fn test_gmap_output_georef() {
        let g = OutputMode::GMap.output_georef(256, 256).unwrap();
        assert!(!g.is_lonlat());
        let (lon, lat) = g.pixel_to_lonlat(128.0, 128.0);
        assert!(lon.abs() < 1e-9 && lat.abs() < 1e-9);
        let (lon, _) = g.pixel_to_lonlat(0.0, 128.0);
        assert!((lon + 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_module_name() {
        let opts = Options {
            mode: OutputMode::Celestia,
            ..Default::default()
        };
        let err = OutputModeConfig::from_options(&opts, LonLatBox::default()).unwrap_err();
        assert!(matches!(err, MosaicError::Configuration(_)));
    }

    #[test]
    fn test_from_options_carries_fields() {
        let mut opts = Options {
            mode: OutputMode::Uniview,
            module_name: Some("earth".to_string()),
            terrain: true,
            ..Default::default()
        };
        let cfg = OutputModeConfig::from_options(&opts, LonLatBox::default()).unwrap();
        assert_eq!(
            cfg,
            OutputModeConfig::Uniview {
                terrain: true,
                module: "earth".to_string()
            }
        );

        opts.mode = OutputMode::Kml;
        opts.kml.draw_order_offset = 5;
        let bbox = LonLatBox::new(-10.0, -5.0, 10.0, 5.0);
        let cfg = OutputModeConfig::from_options(&opts, bbox).unwrap();
        assert_eq!(cfg.mode(), OutputMode::Kml);
        assert!(matches!(
            cfg,
            OutputModeConfig::Kml {
                draw_order_offset: 5,
                max_lod_pixels: 1024,
                ..
            }
        ));
    }

    #[test]
    fn test_stamp_sets_format() {
        let raster = Raster::new(16, 16, 1, ChannelType::U8);
        let mut generator = QuadTreeGenerator::new(&raster, "out");
        generator.set_tile_size(8);
        generator.set_file_type("png");
        assert_eq!(generator.state(), GeneratorState::Unconfigured);

        let bbox = LonLatBox::from_pixel_box(&PixelBox::new(0, 0, 1024, 1024), 1024, 1024);
        OutputModeConfig::Gigapan { longlat_bbox: bbox }.stamp(&mut generator);
        assert_eq!(generator.state(), GeneratorState::Configured);
        let format = generator.format().unwrap();
        assert_eq!(format.mode, OutputMode::Gigapan);
        assert_eq!(format.longlat_bbox, Some(LonLatBox::new(-180.0, -180.0, 180.0, 180.0)));
        assert_eq!(format.module, None);

        OutputModeConfig::Celestia {
            module: "moon".to_string(),
        }
        .stamp(&mut generator);
        let format = generator.format().unwrap();
        assert_eq!(format.mode, OutputMode::Celestia);
        assert_eq!(format.longlat_bbox, None);
        assert_eq!(format.module.as_deref(), Some("moon"));
    }
}
