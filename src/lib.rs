//! sat_grid: band calibration and grid normalization for Landsat-8 and Sentinel-2
//!
//! Takes a satellite tile (per-band rasters plus a scene metadata file),
//! converts digital numbers to physical quantities and writes each group of
//! same-resolution bands as a georeferenced NetCDF grid.
//!
//! ## Key Features
//!
//! - **Metadata parsing**: nested `GROUP = ... END_GROUP` scene metadata into a typed tree
//! - **Calibration**: DOS1 surface reflectance, thermal brightness temperature,
//!   Sentinel-2 quantified reflectance
//! - **Gridding**: corner coordinates and lat/lon axes from the raster geotransform
//! - **Parallel Processing**: bands and scenes calibrated on the Rayon pool
//!
//! ## Module Organization
//!
//! - [`metadata`]: scene metadata parser and lookups
//! - [`sensor`]: static band tables for the supported sensors
//! - [`calibration`]: digital number to reflectance / temperature conversion
//! - [`raster`]: raster access traits with in-memory and GDAL drivers
//! - [`geogrid`]: geotransform, corners and coordinate axes
//! - [`assembler`]: per-tile band discovery, reading and calibration
//! - [`netcdf_io`]: gridded NetCDF output
//! - [`inspect`]: summaries of written files
//! - [`pipeline`]: scene and batch orchestration
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sat_grid::prelude::*;
//! use std::path::Path;
//!
//! # #[cfg(feature = "gdal")]
//! # fn main() -> sat_grid::Result<()> {
//! let driver = sat_grid::raster::gdal::GdalDriver;
//! let report = process_scene(
//!     &driver,
//!     Path::new("LC08_L1TP_042034_20200101"),
//!     Path::new("out/LC08_L1TP_042034_20200101"),
//!     &ProcessingOptions::default(),
//! )?;
//! println!("wrote {} files", report.files.len());
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "gdal"))]
//! # fn main() {}
//! ```

pub mod assembler;
pub mod calibration;
pub mod errors;
pub mod geogrid;
pub mod inspect;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod raster;
pub mod sensor;

pub use errors::{Result, SatGridError};
pub use parallel::{get_parallel_info, ParallelConfig, ParallelInfo};
pub use sensor::Sensor;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::assembler::{AssembledClass, AssembledScene, BandAssembler};
    pub use crate::calibration::{calibrate, CalibratedBand, RawBand};
    pub use crate::errors::{Result, SatGridError};
    pub use crate::geogrid::{GeoTransform, GridGeometry};
    pub use crate::metadata::{parse, SceneMetadata};
    pub use crate::netcdf_io::GridWriter;
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{process_batch, process_scene, ProcessingOptions};
    pub use crate::raster::{RasterDataset, RasterDriver};
    pub use crate::sensor::{CalibrationMode, Sensor};
}
