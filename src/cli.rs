//! Defines command-line interface options using `clap` for the sat_grid application.

use clap::{Args as ClapArgs, Parser, Subcommand};
use sat_grid::Sensor;
use std::path::PathBuf;

#[cfg(feature = "gdal")]
const RASTER_NOTE: &str = "Band rasters are read through GDAL.";

#[cfg(not(feature = "gdal"))]
const RASTER_NOTE: &str = "This build has no raster driver: `process`, `batch` and Sentinel-2 \
`metadata` fail until sat_grid is rebuilt with `--features gdal`.";

/// Calibrate Landsat-8 and Sentinel-2 tiles and write them as gridded NetCDF
#[derive(Parser, Debug)]
#[command(
    version,
    name = "sat_grid",
    about = "Band calibration and grid normalization for Landsat-8 / Sentinel-2 tiles",
    after_help = RASTER_NOTE
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug) logging.
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Calibrate one tile directory into an output directory (needs the `gdal` feature)
    Process {
        /// Tile directory holding the band rasters and metadata file
        tile: PathBuf,
        /// Output directory, must not exist yet
        output: PathBuf,
        #[command(flatten)]
        options: ProcessArgs,
    },

    /// Calibrate every tile directory under a root (needs the `gdal` feature)
    Batch {
        /// Directory whose sub-directories are tiles
        tiles_root: PathBuf,
        /// Each tile is written to <output_root>/<tile name>
        output_root: PathBuf,
        #[command(flatten)]
        options: ProcessArgs,
        /// Process scenes concurrently
        #[arg(long, default_value_t = false)]
        parallel_scenes: bool,
    },

    /// Parse a tile's metadata and print it as JSON (Sentinel-2 needs the `gdal` feature)
    Metadata {
        /// Tile directory or metadata file
        path: PathBuf,
        /// Re-emit in GROUP / END_GROUP form instead of JSON
        #[arg(long, default_value_t = false)]
        mtl: bool,
    },

    /// Print attributes and per-band statistics of a written file
    Inspect {
        /// Gridded NetCDF file
        file: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ProcessArgs {
    /// Sensor of the tile(s): landsat8 or sentinel2. Detected from the metadata file when omitted
    #[arg(long, value_parser = parse_sensor)]
    pub sensor: Option<Sensor>,

    /// Calibrate bands one after another instead of in parallel
    #[arg(long, default_value_t = false)]
    pub sequential_bands: bool,
}

fn parse_sensor(s: &str) -> Result<Sensor, String> {
    s.parse()
}
