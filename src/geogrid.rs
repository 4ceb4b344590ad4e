//! Grid geometry of raster datasets
//!
//! [`GridGeometry::resolve`] reads the affine geotransform and projection of a
//! dataset and derives the four corner coordinates. The 1D coordinate axes
//! written next to the calibrated bands are spaced uniformly between those
//! corners, which only holds for grids without rotation or shear terms.

use crate::errors::{Result, SatGridError};
use crate::raster::RasterDataset;
use ndarray::Array1;

/// GDAL-ordered affine transform `[x0, dx/dpixel, dx/dline, y0, dy/dpixel, dy/dline]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }

    /// Transform without rotation terms. `pixel_height` is negative for north-up rasters.
    pub fn north_up(origin_x: f64, pixel_width: f64, origin_y: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Georeferenced position of a (pixel, line) location.
    pub fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        let [x0, dxp, dxl, y0, dyp, dyl] = self.0;
        (x0 + pixel * dxp + line * dxl, y0 + pixel * dyp + line * dyl)
    }

    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }
}

/// Corner coordinates in the dataset's projection, as (x, y)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    pub upper_left: (f64, f64),
    pub upper_right: (f64, f64),
    pub lower_right: (f64, f64),
    pub lower_left: (f64, f64),
}

/// Georeferencing shared by all bands of one native resolution
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub geo_transform: GeoTransform,
    /// Projection WKT
    pub projection: String,
    /// Pixel columns
    pub width: usize,
    /// Pixel rows
    pub height: usize,
    pub corners: Corners,
}

impl GridGeometry {
    /// Read the geometry of an open dataset.
    pub fn resolve<D: RasterDataset + ?Sized>(dataset: &D) -> Result<Self> {
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform()?;
        Self::from_parts(geo_transform, dataset.projection(), width, height)
    }

    pub fn from_parts(
        geo_transform: GeoTransform,
        projection: impl Into<String>,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SatGridError::UnsupportedGrid {
                message: format!("empty raster ({width} x {height})"),
            });
        }

        let (cols, rows) = (width as f64, height as f64);
        let corners = Corners {
            upper_left: geo_transform.apply(0.0, 0.0),
            upper_right: geo_transform.apply(cols, 0.0),
            lower_right: geo_transform.apply(cols, rows),
            lower_left: geo_transform.apply(0.0, rows),
        };

        Ok(Self {
            geo_transform,
            projection: projection.into(),
            width,
            height,
            corners,
        })
    }

    /// `(rows, columns)`, the shape of every band array on this grid
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    fn require_axis_aligned(&self) -> Result<()> {
        if self.geo_transform.is_rotated() {
            return Err(SatGridError::UnsupportedGrid {
                message: format!(
                    "rotated geotransform {:?} cannot be expressed as lat/lon axes",
                    self.geo_transform.0
                ),
            });
        }
        Ok(())
    }

    /// Northing axis with one value per row, running from the first row's
    /// edge to the last row's edge (north to south for north-up rasters).
    pub fn latitude_axis(&self) -> Result<Array1<f64>> {
        self.require_axis_aligned()?;
        Ok(Array1::linspace(
            self.corners.upper_left.1,
            self.corners.lower_left.1,
            self.height,
        ))
    }

    /// Easting axis with one value per column, west to east for north-up rasters.
    pub fn longitude_axis(&self) -> Result<Array1<f64>> {
        self.require_axis_aligned()?;
        Ok(Array1::linspace(
            self.corners.upper_left.0,
            self.corners.upper_right.0,
            self.width,
        ))
    }

    /// EPSG code of the last `AUTHORITY["EPSG", ...]` / `ID["EPSG", ...]` in the WKT
    pub fn epsg(&self) -> Option<u32> {
        let start = self.projection.rfind("\"EPSG\"")? + "\"EPSG\"".len();
        let digits: String = self.projection[start..]
            .chars()
            .skip_while(|c| matches!(*c, ',' | '"' | ' '))
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }

    /// True when the projection is a geographic (degree based) CRS
    pub fn is_geographic(&self) -> bool {
        let wkt = self.projection.trim_start();
        wkt.starts_with("GEOGCS") || wkt.starts_with("GEOGCRS") || wkt.starts_with("GEODCRS")
    }

    /// Same shape, transform and projection: bands on both grids may share a file.
    pub fn matches(&self, other: &GridGeometry) -> bool {
        self.shape() == other.shape()
            && self.geo_transform == other.geo_transform
            && self.projection == other.projection
    }
}
