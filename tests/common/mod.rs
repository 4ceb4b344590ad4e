//! Synthetic Landsat-8 and Sentinel-2 tiles backed by the in-memory raster driver

#![allow(dead_code)]

use ndarray::Array2;
use sat_grid::geogrid::GeoTransform;
use sat_grid::raster::memory::{MemoryDataset, MemoryDriver};
use sat_grid::sensor::{BandSpec, CalibrationMode};
use sat_grid::Sensor;
use std::fs;
use std::path::{Path, PathBuf};

pub const UTM30N: &str = r#"PROJCS["WGS 84 / UTM zone 30N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","32630"]]"#;

pub const PRODUCT_ID: &str = "LC08_L1TP_042034_20200101_20200113_01_T1";

pub const ORIGIN_X: f64 = 300000.0;
pub const ORIGIN_Y: f64 = 4500000.0;

/// Multispectral / thermal grid; the panchromatic grid has twice the rows and columns
pub const ROWS: usize = 4;
pub const COLS: usize = 4;

pub const THERMAL_MULT: f64 = 3.342e-4;
pub const THERMAL_ADD: f64 = 0.1;
pub const K1_BAND_10: f64 = 774.8853;
pub const K2_BAND_10: f64 = 1321.0789;

/// Radiance rescaling of the reflective bands: L = 0.01·DN - 5, Lmax 500, ρmax 0.5,
/// one AU, sun 60° above the horizon. A pixel at the darkest DN of 100 has ρ = 0.01.
pub fn landsat_mtl(omit_keys: &[&str]) -> String {
    let mut groups: Vec<(&str, Vec<(String, String)>)> = vec![
        (
            "METADATA_FILE_INFO",
            vec![("LANDSAT_PRODUCT_ID".into(), format!("\"{PRODUCT_ID}\""))],
        ),
        (
            "PRODUCT_METADATA",
            vec![
                ("SPACECRAFT_ID".into(), "\"LANDSAT_8\"".into()),
                ("DATE_ACQUIRED".into(), "2020-01-01".into()),
                ("SCENE_CENTER_TIME".into(), "\"10:52:31.8660280Z\"".into()),
            ],
        ),
        (
            "IMAGE_ATTRIBUTES",
            vec![
                ("CLOUD_COVER".into(), "12.34".into()),
                ("EARTH_SUN_DISTANCE".into(), "1.0000000".into()),
                ("SUN_ELEVATION".into(), "60.0".into()),
            ],
        ),
    ];

    let reflective = 1..=9;
    groups.push((
        "MIN_MAX_RADIANCE",
        reflective
            .clone()
            .map(|n| (format!("RADIANCE_MAXIMUM_BAND_{n}"), "500.0".to_string()))
            .collect(),
    ));
    groups.push((
        "MIN_MAX_REFLECTANCE",
        reflective
            .clone()
            .map(|n| (format!("REFLECTANCE_MAXIMUM_BAND_{n}"), "0.5".to_string()))
            .collect(),
    ));

    let mut rescaling = Vec::new();
    for n in 1..=11 {
        let (mult, add) = if n >= 10 {
            ("3.3420E-04".to_string(), "0.10000".to_string())
        } else {
            ("1.0000E-02".to_string(), "-5.00000".to_string())
        };
        rescaling.push((format!("RADIANCE_MULT_BAND_{n}"), mult));
        rescaling.push((format!("RADIANCE_ADD_BAND_{n}"), add));
    }
    groups.push(("RADIOMETRIC_RESCALING", rescaling));

    groups.push((
        "TIRS_THERMAL_CONSTANTS",
        vec![
            ("K1_CONSTANT_BAND_10".into(), K1_BAND_10.to_string()),
            ("K2_CONSTANT_BAND_10".into(), K2_BAND_10.to_string()),
            ("K1_CONSTANT_BAND_11".into(), "480.8883".into()),
            ("K2_CONSTANT_BAND_11".into(), "1201.1442".into()),
        ],
    ));

    let mut text = String::from("GROUP = L1_METADATA_FILE\n");
    for (group, entries) in groups {
        text.push_str(&format!("  GROUP = {group}\n"));
        for (key, value) in entries {
            if omit_keys.contains(&key.as_str()) {
                continue;
            }
            text.push_str(&format!("    {key} = {value}\n"));
        }
        text.push_str(&format!("  END_GROUP = {group}\n"));
    }
    text.push_str("END_GROUP = L1_METADATA_FILE\nEND\n");
    text
}

/// Digital numbers counting up from `base` in row-major order, last pixel no-data.
pub fn ramp(rows: usize, cols: usize, base: f64, step: f64) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        if (r, c) == (rows - 1, cols - 1) {
            0.0
        } else {
            base + step * (r * cols + c) as f64
        }
    })
}

/// The dataset a Landsat band file holds in an unmodified fixture tile.
pub fn landsat_band(spec: &BandSpec) -> MemoryDataset {
    let (scale, pixel) = if spec.resolution_m == 15 { (2, 15.0) } else { (1, 30.0) };
    let data = match spec.mode {
        CalibrationMode::BrightnessTemperature => ramp(ROWS * scale, COLS * scale, 20000.0, 100.0),
        _ => ramp(ROWS * scale, COLS * scale, 100.0, 10.0),
    };
    MemoryDataset::new(GeoTransform::north_up(ORIGIN_X, pixel, ORIGIN_Y, -pixel), UTM30N)
        .with_band(data)
}

/// Write a Landsat tile directory under `root` and register its band rasters.
///
/// `band` decides what each band file contains; `None` leaves the file out.
pub fn write_landsat_tile<F>(
    root: &Path,
    name: &str,
    driver: &mut MemoryDriver,
    omit_keys: &[&str],
    band: F,
) -> std::io::Result<PathBuf>
where
    F: Fn(&BandSpec) -> Option<MemoryDataset>,
{
    let tile = root.join(name);
    fs::create_dir_all(&tile)?;
    fs::write(tile.join(format!("{PRODUCT_ID}_MTL.txt")), landsat_mtl(omit_keys))?;
    fs::write(tile.join(format!("{PRODUCT_ID}_ANG.txt")), "not metadata\n")?;

    for class in Sensor::Landsat8.classes() {
        for spec in class.bands {
            if let Some(dataset) = band(spec) {
                driver.insert_path(&tile.join(format!("{PRODUCT_ID}_{}.TIF", spec.id)), dataset);
            }
        }
    }
    Ok(tile)
}

pub fn standard_landsat_tile(root: &Path, name: &str, driver: &mut MemoryDriver) -> std::io::Result<PathBuf> {
    write_landsat_tile(root, name, driver, &[], |spec| Some(landsat_band(spec)))
}

pub const S2_CONTAINER: &str = "MTD_MSIL1C.xml";
pub const QUANTIFICATION: f64 = 10000.0;

/// Where a Sentinel-2 fixture declares its radiometric offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RadioOffset {
    /// Pre-04.00 processing baseline
    None,
    /// `RADIO_ADD_OFFSET_<band>` items on the container
    Metadata(f64),
    /// Offset attached to each subdataset band
    Band(f64),
}

/// Write a Sentinel-2 L1C tile: the container file plus one subdataset per resolution.
pub fn write_sentinel_tile(
    root: &Path,
    name: &str,
    driver: &mut MemoryDriver,
    with_quantification: bool,
) -> std::io::Result<PathBuf> {
    write_sentinel_tile_with(root, name, driver, with_quantification, RadioOffset::None)
}

/// Band `i` of a class counts up from `1000 * (i + 1)`, last pixel no-data.
pub fn write_sentinel_tile_with(
    root: &Path,
    name: &str,
    driver: &mut MemoryDriver,
    with_quantification: bool,
    offset: RadioOffset,
) -> std::io::Result<PathBuf> {
    let tile = root.join(name);
    fs::create_dir_all(&tile)?;
    let container_path = tile.join(S2_CONTAINER);
    fs::write(&container_path, "<n1:Level-1C_User_Product/>\n")?;

    let gt = GeoTransform::north_up(ORIGIN_X, 10.0, ORIGIN_Y, -10.0);
    let mut items = vec![
        "SPACECRAFT_NAME=Sentinel-2A".to_string(),
        "PRODUCT_TYPE=S2MSI1C".to_string(),
    ];
    if with_quantification {
        items.push(format!("QUANTIFICATION_VALUE={QUANTIFICATION}"));
    }
    if let RadioOffset::Metadata(value) = offset {
        for class in Sensor::Sentinel2.classes() {
            for band in class.bands {
                items.push(format!("RADIO_ADD_OFFSET_{}={value}", band.metadata_name));
            }
        }
    }
    let mut container = MemoryDataset::new(gt, "").with_metadata(&items);

    let container_name = container_path.to_string_lossy().into_owned();
    for class in Sensor::Sentinel2.classes() {
        let res = class.resolution_m;
        let sub_name = format!("SENTINEL2_L1C:{container_name}:{res}m:EPSG_32630");
        let ids: Vec<&str> = class.bands.iter().map(|b| b.id).collect();
        container = container.with_subdataset(
            sub_name.clone(),
            format!("Bands {} with {res}m resolution, UTM 30N", ids.join(", ")),
        );

        let size = 60 / res as usize * 2;
        let pixel = f64::from(res);
        let mut dataset = MemoryDataset::new(GeoTransform::north_up(ORIGIN_X, pixel, ORIGIN_Y, -pixel), UTM30N);
        for (i, _) in class.bands.iter().enumerate() {
            dataset = dataset.with_band(ramp(size, size, 1000.0 * (i + 1) as f64, 1.0));
            if let RadioOffset::Band(value) = offset {
                dataset = dataset.with_band_offset(value);
            }
        }
        driver.insert(sub_name, dataset);
    }
    driver.insert(container_name, container);
    Ok(tile)
}
