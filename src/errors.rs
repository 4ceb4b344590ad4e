//! Centralized error handling for sat_grid
//!
//! Every failure a scene can hit while being parsed, calibrated, assembled or
//! written surfaces as one [`SatGridError`] variant. Callers that drive batches
//! use the classification helpers to tell "already processed" apart from real
//! failures.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sat_grid operations
#[derive(Debug, Error)]
pub enum SatGridError {
    /// A metadata line does not match the GROUP / END_GROUP / END / KEY = VALUE grammar
    #[error("metadata parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// No metadata file matching the sensor naming convention in the tile directory
    #[error("no metadata file matching '{pattern}' found in {}", dir.display())]
    MetadataFileNotFound { dir: PathBuf, pattern: String },

    /// A calibration coefficient is absent from the scene metadata
    #[error("calibration error for band {band}: required metadata key '{path}' is missing")]
    MissingKey { band: String, path: String },

    /// Calibration inputs that make the conversion undefined
    #[error("calibration error for band {band}: {message}")]
    Degenerate { band: String, message: String },

    /// Expected band raster or subdataset cannot be located
    #[error("band {band} not found (looked for '{source_name}')")]
    MissingBand { band: String, source_name: String },

    /// Bands within one dataset class disagree on pixel dimensions
    #[error("grid mismatch in {class}: band {band} has shape {found:?}, expected {expected:?}")]
    GridMismatch {
        class: String,
        band: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Bands within one dataset class share a shape but not a georeferencing
    #[error("grid mismatch in {class}: band {band} is not georeferenced like the first band of the class")]
    GeoreferenceMismatch { class: String, band: String },

    /// Output directory already present, the scene counts as processed
    #[error("output {} already exists", path.display())]
    OutputExists { path: PathBuf },

    /// Geotransform the gridding step cannot express as 1D axes
    #[error("unsupported grid: {message}")]
    UnsupportedGrid { message: String },

    /// The raster driver has no dataset under this name
    #[error("raster '{name}' not found")]
    RasterNotFound { name: String },

    /// Any other failure reported by the raster driver
    #[error("raster error: {0}")]
    Raster(String),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("array error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Metadata could not be rendered as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Some scenes of a batch failed; the others were still processed
    #[error("{failed} of {total} scenes failed")]
    BatchFailed { failed: usize, total: usize },

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl SatGridError {
    /// Metadata missing or malformed
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            SatGridError::Parse { .. } | SatGridError::MetadataFileNotFound { .. }
        )
    }

    /// Coefficient missing or numerically degenerate
    pub fn is_calibration_error(&self) -> bool {
        matches!(
            self,
            SatGridError::MissingKey { .. } | SatGridError::Degenerate { .. }
        )
    }

    /// The scene was written by an earlier run and should be skipped
    pub fn is_already_processed(&self) -> bool {
        matches!(self, SatGridError::OutputExists { .. })
    }
}

/// Result type alias for sat_grid operations
pub type Result<T> = std::result::Result<T, SatGridError>;
