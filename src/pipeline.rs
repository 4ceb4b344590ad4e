//! Scene orchestration
//!
//! [`process_scene`] takes one tile from raw bands to gridded files.
//! [`process_batch`] runs many tiles, isolating failures so one bad scene never
//! stops the rest; a tile whose output already exists is skipped.

use crate::assembler::BandAssembler;
use crate::errors::{Result, SatGridError};
use crate::netcdf_io::GridWriter;
use crate::raster::RasterDriver;
use crate::sensor::Sensor;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Knobs for a processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOptions {
    /// Force a sensor instead of detecting it from the tile's metadata file
    pub sensor: Option<Sensor>,
    /// Calibrate the bands of a class concurrently
    pub parallel_bands: bool,
    /// Process the scenes of a batch concurrently
    pub parallel_scenes: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            sensor: None,
            parallel_bands: true,
            parallel_scenes: false,
        }
    }
}

/// What was written for one scene
#[derive(Debug, Clone)]
pub struct SceneReport {
    pub tile_path: PathBuf,
    pub output_path: PathBuf,
    pub sensor: Sensor,
    /// One file per dataset class, in class order
    pub files: Vec<PathBuf>,
    pub band_count: usize,
    pub elapsed: Duration,
}

/// Outcome of one scene within a batch
#[derive(Debug)]
pub enum SceneOutcome {
    Processed(SceneReport),
    /// Output was already present
    Skipped { tile_path: PathBuf, output_path: PathBuf },
    Failed { tile_path: PathBuf, error: SatGridError },
}

impl SceneOutcome {
    pub fn tile_path(&self) -> &Path {
        match self {
            SceneOutcome::Processed(report) => &report.tile_path,
            SceneOutcome::Skipped { tile_path, .. } | SceneOutcome::Failed { tile_path, .. } => {
                tile_path
            }
        }
    }
}

/// Totals over a batch, with per-scene outcomes in input order
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<SceneOutcome>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Processed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SceneOutcome::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &SatGridError)> {
        self.outcomes.iter().filter_map(|o| match o {
            SceneOutcome::Failed { tile_path, error } => Some((tile_path.as_path(), error)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&SceneOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Output directory used for a tile within a batch: `<output_root>/<tile directory name>`.
pub fn output_path_for(tile_path: &Path, output_root: &Path) -> PathBuf {
    let name = tile_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "scene".into());
    output_root.join(name)
}

/// Calibrate one tile and write its dataset classes under `output_path`.
///
/// The output precondition is checked before any raster is read, so an
/// already processed tile costs nothing.
pub fn process_scene<D: RasterDriver>(
    driver: &D,
    tile_path: &Path,
    output_path: &Path,
    options: &ProcessingOptions,
) -> Result<SceneReport> {
    let start = Instant::now();
    if output_path.exists() {
        return Err(SatGridError::OutputExists {
            path: output_path.to_path_buf(),
        });
    }

    let sensor = match options.sensor {
        Some(sensor) => sensor,
        None => Sensor::detect(tile_path).ok_or_else(|| SatGridError::MetadataFileNotFound {
            dir: tile_path.to_path_buf(),
            pattern: "*MTL.txt or MTD_*.xml".to_string(),
        })?,
    };

    let scene = BandAssembler::new(driver)
        .with_parallel_bands(options.parallel_bands)
        .assemble(tile_path, sensor)?;
    let files = GridWriter::new()
        .with_sensor(sensor)
        .write_scene(output_path, &scene)?;

    let band_count = scene.classes.iter().map(|c| c.bands.len()).sum();
    let elapsed = start.elapsed();
    info!(
        tile = %tile_path.display(),
        output = %output_path.display(),
        files = files.len(),
        bands = band_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "scene processed"
    );

    Ok(SceneReport {
        tile_path: tile_path.to_path_buf(),
        output_path: output_path.to_path_buf(),
        sensor,
        files,
        band_count,
        elapsed,
    })
}

fn run_one<D: RasterDriver>(
    driver: &D,
    tile_path: &Path,
    output_root: &Path,
    options: &ProcessingOptions,
) -> SceneOutcome {
    let output_path = output_path_for(tile_path, output_root);
    match process_scene(driver, tile_path, &output_path, options) {
        Ok(report) => SceneOutcome::Processed(report),
        Err(e) if e.is_already_processed() => {
            warn!(tile = %tile_path.display(), output = %output_path.display(), "output exists, skipping");
            SceneOutcome::Skipped {
                tile_path: tile_path.to_path_buf(),
                output_path,
            }
        }
        Err(e) => {
            error!(tile = %tile_path.display(), error = %e, "scene failed");
            SceneOutcome::Failed {
                tile_path: tile_path.to_path_buf(),
                error: e,
            }
        }
    }
}

/// Process every tile into `<output_root>/<tile name>`, one scene's failure
/// never affecting another.
pub fn process_batch<D: RasterDriver, P: AsRef<Path> + Sync>(
    driver: &D,
    tiles: &[P],
    output_root: &Path,
    options: &ProcessingOptions,
) -> BatchSummary {
    info!(scenes = tiles.len(), parallel = options.parallel_scenes, "starting batch");
    let outcomes: Vec<SceneOutcome> = if options.parallel_scenes {
        tiles
            .par_iter()
            .map(|tile| run_one(driver, tile.as_ref(), output_root, options))
            .collect()
    } else {
        tiles
            .iter()
            .map(|tile| run_one(driver, tile.as_ref(), output_root, options))
            .collect()
    };

    let summary = BatchSummary { outcomes };
    info!(
        processed = summary.processed(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        "batch finished"
    );
    summary
}

/// Sub-directories of `root`, sorted by name, each taken as one tile.
pub fn discover_tiles(root: &Path) -> Result<Vec<PathBuf>> {
    let mut tiles: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    tiles.sort();
    Ok(tiles)
}
