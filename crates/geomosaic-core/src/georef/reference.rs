//! Georeferences: pixel grid ↔ projected coordinates ↔ longitude/latitude.
//!
//! Plain longitude/latitude georeferences are evaluated directly through
//! their affine transform. Every other projection goes through `proj4rs`,
//! which works in radians for geographic coordinates.

use std::fmt;
use std::sync::Arc;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};

use super::Affine;
use crate::error::{MosaicError, Result};

/// Projection string of an unprojected georeference.
pub const LONGLAT: &str = "+proj=longlat";

/// Reference ellipsoid of a georeference.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Datum {
    #[default]
    Wgs84,
    /// IAU Moon sphere.
    Lunar,
    /// IAU Mars sphere.
    Mars,
    /// Sphere with the given radius in meters.
    Sphere(f64),
}

impl Datum {
    pub fn proj4_str(&self) -> String {
        match self {
            Datum::Wgs84 => "+ellps=WGS84".to_string(),
            Datum::Lunar => "+a=1737400 +b=1737400".to_string(),
            Datum::Mars => "+a=3396190 +b=3396190".to_string(),
            Datum::Sphere(r) => format!("+a={r} +b={r}"),
        }
    }
}

struct Projector {
    geographic: Proj,
    projected: Proj,
}

/// Association between a pixel grid and geographic coordinates.
#[derive(Clone)]
pub struct GeoReference {
    projection: String,
    datum: Datum,
    transform: Affine,
    inverse: Affine,
    projector: Option<Arc<Projector>>,
}

impl GeoReference {
    /// Unprojected georeference: the affine maps pixels straight to degrees.
    pub fn lonlat(transform: Affine, datum: Datum) -> Result<Self> {
        Self::new(LONGLAT, datum, transform)
    }

    /// Plate carrée georeference stretching `cols × rows` pixels over the
    /// given bounds.
    pub fn from_bounds(
        cols: u32,
        rows: u32,
        west: f64,
        east: f64,
        north: f64,
        south: f64,
        datum: Datum,
    ) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(MosaicError::Georeference(format!(
                "cannot georeference an empty {cols}x{rows} image"
            )));
        }
        let transform = Affine::scale_translate(
            (east - west) / cols as f64,
            (south - north) / rows as f64,
            west,
            north,
        );
        Self::lonlat(transform, datum)
    }

    /// Whole-globe WGS84 plate carrée, the fallback for images carrying no
    /// georeference.
    pub fn global(cols: u32, rows: u32) -> Result<Self> {
        Self::from_bounds(cols, rows, -180.0, 180.0, 90.0, -90.0, Datum::Wgs84)
    }

    /// Georeference in an arbitrary proj4 projection.
    pub fn new(projection: &str, datum: Datum, transform: Affine) -> Result<Self> {
        let inverse = transform.inverse().ok_or_else(|| {
            MosaicError::Georeference(format!("singular pixel transform {transform:?}"))
        })?;
        let projection = projection.trim().to_string();
        let projector = if is_longlat(&projection) {
            None
        } else {
            Some(Arc::new(build_projector(&projection, datum)?))
        };
        Ok(Self {
            projection,
            datum,
            transform,
            inverse,
            projector,
        })
    }

    /// Same pixel grid, different projection.
    pub fn with_projection(&self, projection: &str) -> Result<Self> {
        Self::new(projection, self.datum, self.transform)
    }

    /// Same pixel grid and projection, different ellipsoid.
    pub fn with_datum(&self, datum: Datum) -> Result<Self> {
        Self::new(&self.projection, datum, self.transform)
    }

    /// Projection part of the proj4 definition, without the datum.
    pub fn proj4_str(&self) -> &str {
        &self.projection
    }

    /// Full proj4 definition, projection plus datum.
    pub fn overall_proj4_str(&self) -> String {
        format!("{} {}", self.projection, self.datum.proj4_str())
    }

    pub fn datum(&self) -> Datum {
        self.datum
    }

    pub fn transform(&self) -> &Affine {
        &self.transform
    }

    pub fn is_lonlat(&self) -> bool {
        self.projector.is_none()
    }

    pub fn pixel_to_point(&self, col: f64, row: f64) -> (f64, f64) {
        self.transform.apply(col, row)
    }

    pub fn point_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.inverse.apply(x, y)
    }

    /// Projected coordinates to degrees. Points outside the projection's
    /// domain come back as NaN.
    pub fn point_to_lonlat(&self, x: f64, y: f64) -> (f64, f64) {
        match &self.projector {
            None => (x, y),
            Some(p) => {
                let mut point = (x, y, 0.0);
                match transform(&p.projected, &p.geographic, &mut point) {
                    Ok(()) => (point.0.to_degrees(), point.1.to_degrees()),
                    Err(_) => (f64::NAN, f64::NAN),
                }
            }
        }
    }

    /// Degrees to projected coordinates. Points outside the projection's
    /// domain come back as NaN.
    pub fn lonlat_to_point(&self, lon: f64, lat: f64) -> (f64, f64) {
        match &self.projector {
            None => (lon, lat),
            Some(p) => {
                let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
                match transform(&p.geographic, &p.projected, &mut point) {
                    Ok(()) => (point.0, point.1),
                    Err(_) => (f64::NAN, f64::NAN),
                }
            }
        }
    }

    pub fn pixel_to_lonlat(&self, col: f64, row: f64) -> (f64, f64) {
        let (x, y) = self.pixel_to_point(col, row);
        self.point_to_lonlat(x, y)
    }

    pub fn lonlat_to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.lonlat_to_point(lon, lat);
        self.point_to_pixel(x, y)
    }
}

impl fmt::Debug for GeoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoReference")
            .field("proj4", &self.overall_proj4_str())
            .field("transform", &self.transform)
            .finish()
    }
}

impl fmt::Display for GeoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.transform;
        write!(
            f,
            "[{}] [{} {} {}; {} {} {}]",
            self.overall_proj4_str(),
            t.a,
            t.b,
            t.c,
            t.d,
            t.e,
            t.f
        )
    }
}

fn is_longlat(projection: &str) -> bool {
    let mut tokens = projection.split_whitespace();
    matches!(
        tokens.next(),
        Some("+proj=longlat") | Some("+proj=latlong") | Some("+proj=lonlat")
    )
}

fn build_projector(projection: &str, datum: Datum) -> Result<Projector> {
    let datum = datum.proj4_str();
    let geographic = Proj::from_proj_string(&format!("{LONGLAT} {datum}"))
        .map_err(|e| MosaicError::Georeference(format!("invalid datum '{datum}': {e:?}")))?;
    let projected = Proj::from_proj_string(&format!("{projection} {datum}")).map_err(|e| {
        MosaicError::Georeference(format!("invalid projection '{projection}': {e:?}"))
    })?;
    Ok(Projector {
        geographic,
        projected,
    })
}
