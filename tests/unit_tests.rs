//! Unit tests for sat_grid modules through the public API

mod common;

use common::*;
use ndarray::{array, Array2};
use netcdf::open;
use sat_grid::{
    assembler::BandAssembler,
    calibration::{calibrate, RawBand},
    errors::{Result, SatGridError},
    geogrid::{GeoTransform, GridGeometry},
    inspect::summarize_bands,
    metadata::{parse, MetadataValue},
    netcdf_io::{variable_name, GridWriter},
    parallel::{get_parallel_info, ParallelConfig},
    raster::memory::MemoryDriver,
    Sensor,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_error_types() {
    let netcdf_err = SatGridError::NetCDF(netcdf::Error::NotFound("test".to_string()));
    assert!(format!("{}", netcdf_err).contains("NetCDF error"));

    let exists = SatGridError::OutputExists {
        path: "/tmp/out".into(),
    };
    assert!(exists.is_already_processed());
    assert!(!exists.is_calibration_error());

    let degenerate = SatGridError::Degenerate {
        band: "B2".to_string(),
        message: "sun below horizon".to_string(),
    };
    assert!(degenerate.is_calibration_error());
    assert!(format!("{}", degenerate).contains("B2"));

    let mismatch = SatGridError::GridMismatch {
        class: "Spectral_Bands".to_string(),
        band: "B5".to_string(),
        expected: (100, 100),
        found: (100, 99),
    };
    assert!(format!("{}", mismatch).contains("(100, 99)"));
}

#[test]
fn test_parallel_config() -> Result<()> {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());
    assert_eq!(ParallelConfig::new(Some(4)).num_threads, Some(4));

    // Without a thread count the global pool is left as rayon sizes it
    default_config.setup_global_pool()?;
    let info = get_parallel_info();
    assert!(info.current_threads > 0);
    assert!(info.available_cores > 0);
    Ok(())
}

#[test]
fn test_landsat_metadata_parses_and_round_trips() -> Result<()> {
    let metadata = parse(&landsat_mtl(&[]))?;
    assert_eq!(metadata.root_name(), "L1_METADATA_FILE");
    assert_eq!(
        metadata.get(&["IMAGE_ATTRIBUTES", "SUN_ELEVATION"]),
        Some(&MetadataValue::Number(60.0))
    );
    assert_eq!(
        metadata
            .get(&["METADATA_FILE_INFO", "LANDSAT_PRODUCT_ID"])
            .and_then(MetadataValue::as_str),
        Some(PRODUCT_ID)
    );
    assert_eq!(
        metadata.require_f64(&["RADIOMETRIC_RESCALING", "RADIANCE_MULT_BAND_4"], "B4")?,
        0.01
    );
    assert!(matches!(
        metadata.get(&["PRODUCT_METADATA", "DATE_ACQUIRED"]),
        Some(MetadataValue::Raw(d)) if d == "2020-01-01"
    ));

    let reparsed = parse(&metadata.to_mtl_string())?;
    assert_eq!(reparsed, metadata);

    let json = metadata.to_json();
    assert_eq!(json["IMAGE_ATTRIBUTES"]["CLOUD_COVER"], serde_json::json!(12.34));
    assert_eq!(json["METADATA_FILE_INFO"]["LANDSAT_PRODUCT_ID"], serde_json::json!(PRODUCT_ID));
    Ok(())
}

#[test]
fn test_missing_coefficient_names_band_and_key() -> Result<()> {
    let metadata = parse(&landsat_mtl(&["K2_CONSTANT_BAND_11"]))?;
    let spec = Sensor::Landsat8.band("B11").unwrap();
    let raw = RawBand::from_digital_numbers(array![[20000.0, 21000.0]]);

    match calibrate(spec, &raw, &metadata) {
        Err(SatGridError::MissingKey { band, path }) => {
            assert_eq!(band, "B11");
            assert_eq!(path, "TIRS_THERMAL_CONSTANTS.K2_CONSTANT_BAND_11");
        }
        other => panic!("expected missing key, got {other:?}"),
    }

    // B10 is unaffected
    let b10 = calibrate(Sensor::Landsat8.band("B10").unwrap(), &raw, &metadata)?;
    assert_eq!(b10.units(), "K");
    Ok(())
}

#[test]
fn test_dos1_reference_scene_through_assembler() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut driver = MemoryDriver::new();
    let tile = standard_landsat_tile(temp_dir.path(), "scene", &mut driver)?;

    let scene = BandAssembler::new(&driver).assemble(&tile, Sensor::Landsat8)?;
    let names: Vec<&str> = scene.classes.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["Panchromatic_Band", "Spectral_Bands", "Thermal_bands"]);

    // mult 0.01, add -5, Lmax 500, ρmax 0.5, d = 1, elevation 60°, darkest DN 100
    let spectral = scene.class("Spectral_Bands").unwrap();
    let b4 = spectral.band("B4").unwrap();
    assert!((b4.data[[0, 0]] - 0.01).abs() < 1e-9);

    // Next pixel, DN 110: ρ = 0.01 + π·0.1 / (1000π·cos 30°)
    let expected = 0.01 + 0.1 / (1000.0 * 30.0_f64.to_radians().cos());
    assert!((b4.data[[0, 1]] - expected).abs() < 1e-9);
    assert!(b4.data[[ROWS - 1, COLS - 1]].is_nan());

    assert_eq!(spectral.geometry.epsg(), Some(32630));
    assert_eq!(scene.class("Panchromatic_Band").unwrap().geometry.shape(), (ROWS * 2, COLS * 2));
    Ok(())
}

#[test]
fn test_sentinel_assembly_selects_subdatasets_by_resolution() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut driver = MemoryDriver::new();
    let tile = write_sentinel_tile(temp_dir.path(), "s2", &mut driver, true)?;

    let scene = BandAssembler::new(&driver)
        .with_parallel_bands(false)
        .assemble(&tile, Sensor::Sentinel2)?;
    let shapes: Vec<(usize, usize)> = scene.classes.iter().map(|c| c.geometry.shape()).collect();
    assert_eq!(shapes, vec![(12, 12), (6, 6), (2, 2)]);

    let b20 = scene.class("Bands_20m").unwrap();
    let ids: Vec<&str> = b20.bands.iter().map(|b| b.id()).collect();
    assert_eq!(ids, vec!["B5", "B6", "B7", "B8A", "B11", "B12"]);
    assert!((b20.band("B12").unwrap().data[[0, 0]] - 0.6).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_grid_writer_single_class_and_inspect() -> Result<()> {
    let temp_dir = tempdir()?;
    let metadata = parse(&landsat_mtl(&[]))?;
    let class = Sensor::Landsat8.class("Spectral_Bands").unwrap();
    let geometry = GridGeometry::from_parts(
        GeoTransform::north_up(ORIGIN_X, 30.0, ORIGIN_Y, -30.0),
        UTM30N,
        3,
        2,
    )?;

    let bands = class
        .bands
        .iter()
        .take(3)
        .map(|spec| calibrate(spec, &RawBand::from_digital_numbers(array![[100.0, 150.0, 0.0], [200.0, 120.0, 130.0]]), &metadata))
        .collect::<Result<Vec<_>>>()?;

    let output = temp_dir.path().join("single");
    let path = GridWriter::new()
        .with_sensor(Sensor::Landsat8)
        .write(&output, class.name, &bands, &geometry)?;
    assert_eq!(path, output.join("Spectral_Bands.nc"));

    let file = open(&path)?;
    let summaries = summarize_bands(&file)?;
    let ids: Vec<Option<&str>> = summaries.iter().map(|s| s.band.as_deref()).collect();
    assert_eq!(ids, vec![Some("B1"), Some("B2"), Some("B3")]);

    let b1 = &summaries[0];
    assert_eq!(b1.variable, variable_name("B1 Ultra Blue (coastal/aerosol) [435nm-451nm]"));
    assert_eq!(b1.shape, vec![2, 3]);
    assert_eq!(b1.valid, 5);
    assert_eq!(b1.masked(), 1);
    assert!((b1.min.unwrap() - 0.01).abs() < 1e-6);
    assert!(b1.max.unwrap() > b1.min.unwrap());
    assert_eq!(b1.units.as_deref(), Some("1"));

    // A second write to the same place is refused
    let err = GridWriter::new()
        .write(&output, class.name, &bands, &geometry)
        .unwrap_err();
    assert!(err.is_already_processed());
    Ok(())
}

#[test]
fn test_grid_writer_rejects_rotated_grid_without_leftovers() -> Result<()> {
    let temp_dir = tempdir()?;
    let metadata = parse(&landsat_mtl(&[]))?;
    let spec = Sensor::Landsat8.band("B2").unwrap();
    let band = calibrate(spec, &RawBand::from_digital_numbers(Array2::from_elem((2, 2), 150.0)), &metadata)?;
    let geometry = GridGeometry::from_parts(
        GeoTransform::new([ORIGIN_X, 30.0, 5.0, ORIGIN_Y, 5.0, -30.0]),
        UTM30N,
        2,
        2,
    )?;

    let output = temp_dir.path().join("rotated");
    let err = GridWriter::new()
        .write(&output, "Spectral_Bands", &[band], &geometry)
        .unwrap_err();
    assert!(matches!(err, SatGridError::UnsupportedGrid { .. }));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_grid_writer_checks_band_shapes() -> Result<()> {
    let temp_dir = tempdir()?;
    let metadata = parse(&landsat_mtl(&[]))?;
    let spec = Sensor::Landsat8.band("B3").unwrap();
    let band = calibrate(spec, &RawBand::from_digital_numbers(Array2::from_elem((2, 3), 150.0)), &metadata)?;
    let geometry = GridGeometry::from_parts(
        GeoTransform::north_up(ORIGIN_X, 30.0, ORIGIN_Y, -30.0),
        UTM30N,
        2,
        2,
    )?;

    let err = GridWriter::new()
        .write(&temp_dir.path().join("o"), "Spectral_Bands", &[band], &geometry)
        .unwrap_err();
    assert!(matches!(err, SatGridError::GridMismatch { .. }));
    assert!(!temp_dir.path().join("o").exists());
    Ok(())
}
