//! Entry point for the sat_grid application.
//! Handles CLI parsing and logging setup, and dispatches the process, batch,
//! metadata and inspect commands.

use clap::Parser;
use sat_grid::metadata::{self, find_metadata_file, read_scene_metadata, SceneMetadata};
use sat_grid::pipeline::{discover_tiles, process_batch, process_scene, ProcessingOptions, SceneOutcome};
use sat_grid::raster::{RasterDataset, RasterDriver};
use sat_grid::{get_parallel_info, inspect, ParallelConfig, Result, SatGridError, Sensor};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command, ProcessArgs};

#[cfg(feature = "gdal")]
fn raster_driver() -> Result<sat_grid::raster::gdal::GdalDriver> {
    Ok(sat_grid::raster::gdal::GdalDriver)
}

#[cfg(not(feature = "gdal"))]
fn raster_driver() -> Result<sat_grid::raster::memory::MemoryDriver> {
    Err(SatGridError::Raster(
        "reading raster files requires sat_grid to be built with `--features gdal`".to_string(),
    ))
}

fn init_logging(args: &Args) {
    let default_level = if args.verbose { "debug" } else { args.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn options_from(args: &ProcessArgs, parallel_scenes: bool) -> ProcessingOptions {
    ProcessingOptions {
        sensor: args.sensor,
        parallel_bands: !args.sequential_bands,
        parallel_scenes,
    }
}

/// Metadata of a tile directory or a single metadata file.
fn load_metadata(path: &Path) -> Result<SceneMetadata> {
    let is_container = |p: &Path| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("xml"));

    if path.is_file() {
        if is_container(path) {
            return container_metadata(path);
        }
        return metadata::parse(&fs::read_to_string(path)?);
    }

    match Sensor::detect(path) {
        Some(Sensor::Sentinel2) => {
            let (prefix, suffix) = Sensor::Sentinel2.metadata_pattern();
            container_metadata(&find_metadata_file(path, prefix, suffix)?)
        }
        _ => {
            let (prefix, suffix) = Sensor::Landsat8.metadata_pattern();
            read_scene_metadata(path, prefix, suffix)
        }
    }
}

fn container_metadata(path: &Path) -> Result<SceneMetadata> {
    let driver = raster_driver()?;
    let container = driver.open(&path.to_string_lossy())?;
    Ok(SceneMetadata::from_items(container.metadata_items()))
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Process { tile, output, options } => {
            let driver = raster_driver()?;
            let report = process_scene(&driver, &tile, &output, &options_from(&options, false))?;
            println!(
                "✅ {} ({}): {} bands in {} files written to {} in {:.2?}",
                tile.display(),
                report.sensor,
                report.band_count,
                report.files.len(),
                report.output_path.display(),
                report.elapsed
            );
            for file in &report.files {
                println!("   {}", file.display());
            }
        }
        Command::Batch {
            tiles_root,
            output_root,
            options,
            parallel_scenes,
        } => {
            let driver = raster_driver()?;
            let tiles = discover_tiles(&tiles_root)?;
            let summary = process_batch(
                &driver,
                &tiles,
                &output_root,
                &options_from(&options, parallel_scenes),
            );

            for outcome in &summary.outcomes {
                match outcome {
                    SceneOutcome::Processed(report) => println!(
                        "✅ {} -> {}",
                        report.tile_path.display(),
                        report.output_path.display()
                    ),
                    SceneOutcome::Skipped { tile_path, .. } => {
                        println!("⏭  {} (already processed)", tile_path.display())
                    }
                    SceneOutcome::Failed { tile_path, error } => {
                        println!("❌ {}: {}", tile_path.display(), error)
                    }
                }
            }
            println!(
                "\n{} processed, {} skipped, {} failed",
                summary.processed(),
                summary.skipped(),
                summary.failed()
            );
            if summary.failed() > 0 {
                return Err(SatGridError::BatchFailed {
                    failed: summary.failed(),
                    total: summary.outcomes.len(),
                });
            }
        }
        Command::Metadata { path, mtl } => {
            let scene = load_metadata(&path)?;
            if mtl {
                print!("{}", scene.to_mtl_string());
            } else {
                println!("{}", serde_json::to_string_pretty(&scene.to_json())?);
            }
        }
        Command::Inspect { file } => {
            let file = netcdf::open(&file)?;
            inspect::print_metadata(&file)?;
        }
    }
    Ok(())
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = ParallelConfig::new(args.threads).setup_global_pool() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    get_parallel_info().log();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
