//! NetCDF output of calibrated dataset classes
//!
//! Each dataset class becomes `<output_path>/<class_name>.nc` holding `lat`
//! and `lon` coordinate variables and one `(lat, lon)` float variable per band,
//! named by the band description. Files are written into a hidden staging
//! directory next to the target and moved into place only once every file is
//! complete, so a failed run never leaves a half-written output behind.

use crate::assembler::AssembledScene;
use crate::calibration::CalibratedBand;
use crate::errors::{Result, SatGridError};
use crate::geogrid::GridGeometry;
use crate::sensor::Sensor;
use chrono::Utc;
use netcdf::create;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of the gridded output files
pub const FILE_EXTENSION: &str = "nc";

/// Scalar variable carrying the CRS, referenced by every band's `grid_mapping`
pub const GRID_MAPPING: &str = "crs";

/// Writes calibrated band groups as gridded NetCDF files
#[derive(Debug, Clone, Default)]
pub struct GridWriter {
    sensor: Option<Sensor>,
}

impl GridWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the sensor in each file's global attributes.
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Write a single dataset class into a new `output_path` directory.
    ///
    /// Fails with [`SatGridError::OutputExists`] without touching the
    /// filesystem when `output_path` is already there.
    pub fn write(
        &self,
        output_path: &Path,
        class_name: &str,
        bands: &[CalibratedBand],
        geometry: &GridGeometry,
    ) -> Result<PathBuf> {
        let mut written = staged(output_path, |dir| {
            Ok(vec![self.write_class_file(dir, class_name, bands, geometry)?])
        })?;
        written
            .pop()
            .ok_or_else(|| SatGridError::Raster(format!("nothing written for {class_name}")))
    }

    /// Write every class of an assembled scene, one file each, into a new `output_path`.
    pub fn write_scene(&self, output_path: &Path, scene: &AssembledScene) -> Result<Vec<PathBuf>> {
        let writer = GridWriter {
            sensor: Some(scene.sensor),
        };
        staged(output_path, |dir| {
            scene
                .classes
                .iter()
                .map(|class| writer.write_class_file(dir, class.name(), &class.bands, &class.geometry))
                .collect()
        })
    }

    /// Returns the file name relative to `dir`.
    fn write_class_file(
        &self,
        dir: &Path,
        class_name: &str,
        bands: &[CalibratedBand],
        geometry: &GridGeometry,
    ) -> Result<PathBuf> {
        let file_name = PathBuf::from(format!("{class_name}.{FILE_EXTENSION}"));
        let path = dir.join(&file_name);
        info!(file = %file_name.display(), bands = bands.len(), "writing dataset class");

        // Axes first: a rotated grid fails before the file is created
        let lat = geometry.latitude_axis()?;
        let lon = geometry.longitude_axis()?;

        let mut file = create(&path)?;
        file.add_dimension("lat", geometry.height)?;
        file.add_dimension("lon", geometry.width)?;

        // Axes keep the lat/lon names; projected grids describe them as x/y
        let (lat_attrs, lon_attrs) = if geometry.is_geographic() {
            (
                ("degrees_north", "latitude", "latitude"),
                ("degrees_east", "longitude", "longitude"),
            )
        } else {
            (
                ("m", "y coordinate of projection", "projection_y_coordinate"),
                ("m", "x coordinate of projection", "projection_x_coordinate"),
            )
        };

        {
            let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
            lat_var.put_attribute("units", lat_attrs.0)?;
            lat_var.put_attribute("long_name", lat_attrs.1)?;
            lat_var.put_attribute("standard_name", lat_attrs.2)?;
            lat_var.put_values(&lat.to_vec(), ..)?;
        }

        {
            let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
            lon_var.put_attribute("units", lon_attrs.0)?;
            lon_var.put_attribute("long_name", lon_attrs.1)?;
            lon_var.put_attribute("standard_name", lon_attrs.2)?;
            lon_var.put_values(&lon.to_vec(), ..)?;
        }

        {
            let mut crs = file.add_variable::<i32>(GRID_MAPPING, &[])?;
            crs.put_attribute("crs_wkt", geometry.projection.as_str())?;
            crs.put_attribute("spatial_ref", geometry.projection.as_str())?;
            crs.put_attribute("GeoTransform", geotransform_string(geometry))?;
        }

        for band in bands {
            if band.shape() != geometry.shape() {
                return Err(SatGridError::GridMismatch {
                    class: class_name.to_string(),
                    band: band.id().to_string(),
                    expected: geometry.shape(),
                    found: band.shape(),
                });
            }

            let var_name = variable_name(band.description());
            debug!(band = band.id(), variable = %var_name, "writing band");

            let mut var = file.add_variable::<f32>(&var_name, &["lat", "lon"])?;
            var.put_attribute("_FillValue", f32::NAN)?;
            var.put_attribute("long_name", band.description())?;
            var.put_attribute("band", band.id())?;
            var.put_attribute("units", band.units())?;
            var.put_attribute("grid_mapping", GRID_MAPPING)?;

            let values: Vec<f32> = band.data.iter().map(|&v| v as f32).collect();
            var.put_values(&values, ..)?;
        }

        file.add_attribute("dataset_class", class_name)?;
        file.add_attribute("spatial_ref", geometry.projection.as_str())?;
        file.add_attribute("geotransform", geometry.geo_transform.coefficients().to_vec())?;
        if let Some(code) = geometry.epsg().and_then(|code| i32::try_from(code).ok()) {
            file.add_attribute("epsg", code)?;
        } else {
            warn!(class = class_name, "projection carries no EPSG code");
        }
        if let Some(sensor) = self.sensor {
            file.add_attribute("sensor", sensor.as_str())?;
        }
        file.add_attribute(
            "history",
            format!("Created by sat_grid on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(file_name)
    }
}

/// Run `write` against a fresh staging directory, then move it to `output_path`.
/// `write` returns paths relative to the directory it was given.
fn staged<F>(output_path: &Path, write: F) -> Result<Vec<PathBuf>>
where
    F: FnOnce(&Path) -> Result<Vec<PathBuf>>,
{
    if output_path.exists() {
        return Err(SatGridError::OutputExists {
            path: output_path.to_path_buf(),
        });
    }

    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let leaf = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    // Unique per call: concurrent runs never share a staging directory
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{leaf}.partial-"))
        .tempdir_in(&parent)?;

    let outcome = write(staging.path()).and_then(|files| {
        fs::rename(staging.path(), output_path).map_err(|e| {
            if output_path.exists() {
                // Another run finished the same output first
                SatGridError::OutputExists {
                    path: output_path.to_path_buf(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(files)
    });

    match outcome {
        Ok(files) => {
            // Moved into place, nothing left to remove
            staging.keep();
            Ok(files.into_iter().map(|f| output_path.join(f)).collect())
        }
        Err(e) => {
            let path = staging.path().to_path_buf();
            if let Err(cleanup) = staging.close() {
                warn!(staging = %path.display(), error = %cleanup, "failed to remove staging directory");
            }
            Err(e)
        }
    }
}

fn geotransform_string(geometry: &GridGeometry) -> String {
    geometry
        .geo_transform
        .coefficients()
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// NetCDF-safe variable name for a band description.
///
/// `/` and control characters are not allowed in names; runs of whitespace
/// collapse to one space.
pub fn variable_name(description: &str) -> String {
    description
        .chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
