//! Band assembly: locate, read, mask and calibrate every band of a tile
//!
//! Bands are processed class by class in the order of the sensor table, so
//! band indexing in the output files never depends on directory listing
//! order. Each raster handle is opened, read and dropped before the next band
//! is touched.

use crate::calibration::{calibrate, radiometric_offset_key, CalibratedBand, RawBand};
use crate::errors::{Result, SatGridError};
use crate::geogrid::GridGeometry;
use crate::metadata::{find_metadata_file, read_scene_metadata, MetadataValue, SceneMetadata};
use crate::raster::{RasterDataset, RasterDriver, SubDataset};
use crate::sensor::{BandSpec, ClassSpec, Sensor};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Calibrated bands of one dataset class on a common grid
#[derive(Debug, Clone)]
pub struct AssembledClass {
    pub spec: &'static ClassSpec,
    pub geometry: GridGeometry,
    /// Bands in table order
    pub bands: Vec<CalibratedBand>,
}

impl AssembledClass {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn band(&self, id: &str) -> Option<&CalibratedBand> {
        self.bands.iter().find(|b| b.id() == id)
    }
}

/// All classes of one tile
#[derive(Debug, Clone)]
pub struct AssembledScene {
    pub sensor: Sensor,
    pub tile_path: PathBuf,
    pub classes: Vec<AssembledClass>,
}

impl AssembledScene {
    pub fn class(&self, name: &str) -> Option<&AssembledClass> {
        self.classes.iter().find(|c| c.name() == name)
    }
}

/// Drives band reading and calibration for one tile at a time
pub struct BandAssembler<'a, D: RasterDriver> {
    driver: &'a D,
    parallel_bands: bool,
}

impl<'a, D: RasterDriver> BandAssembler<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self {
            driver,
            parallel_bands: true,
        }
    }

    /// Calibrate the bands of a class on the rayon pool (default) or one after another.
    pub fn with_parallel_bands(mut self, parallel: bool) -> Self {
        self.parallel_bands = parallel;
        self
    }

    pub fn assemble(&self, tile_path: &Path, sensor: Sensor) -> Result<AssembledScene> {
        info!(tile = %tile_path.display(), %sensor, "assembling scene");
        let classes = match sensor {
            Sensor::Landsat8 => self.assemble_landsat(tile_path)?,
            Sensor::Sentinel2 => self.assemble_sentinel(tile_path)?,
        };
        Ok(AssembledScene {
            sensor,
            tile_path: tile_path.to_path_buf(),
            classes,
        })
    }

    /// One GeoTIFF per band, named `<product id>_<band>.TIF`, plus an MTL file.
    fn assemble_landsat(&self, tile_path: &Path) -> Result<Vec<AssembledClass>> {
        let sensor = Sensor::Landsat8;
        let (prefix, suffix) = sensor.metadata_pattern();
        let metadata = read_scene_metadata(tile_path, prefix, suffix)?;

        let product_key = ["METADATA_FILE_INFO", "LANDSAT_PRODUCT_ID"];
        let product_id = metadata
            .get(&product_key)
            .and_then(MetadataValue::as_str)
            .ok_or_else(|| SatGridError::MissingKey {
                band: "*".to_string(),
                path: product_key.join("."),
            })?
            .to_string();

        let mut classes = Vec::with_capacity(sensor.classes().len());
        for class in sensor.classes() {
            info!(class = class.name, "loading dataset class");
            let mut geometry: Option<GridGeometry> = None;
            let mut raws = Vec::with_capacity(class.bands.len());

            for band in class.bands {
                let path = tile_path.join(format!("{product_id}_{}.TIF", band.id));
                let name = path.to_string_lossy().into_owned();

                let (raw, band_geometry) = {
                    let dataset = self.open_band(&name, band)?;
                    let band_geometry = GridGeometry::resolve(&dataset)?;
                    let raw = RawBand::from_digital_numbers(dataset.read_band(1)?);
                    (raw, band_geometry)
                };
                debug!(band = band.id, shape = ?raw.shape(), "read band");

                let reference = geometry.get_or_insert_with(|| band_geometry.clone());
                check_shape(class, band, reference.shape(), raw.shape())?;
                if !reference.matches(&band_geometry) {
                    return Err(SatGridError::GeoreferenceMismatch {
                        class: class.name.to_string(),
                        band: band.id.to_string(),
                    });
                }
                raws.push((band, raw));
            }

            let geometry = geometry.ok_or_else(|| SatGridError::MissingBand {
                band: class.name.to_string(),
                source_name: tile_path.display().to_string(),
            })?;
            let bands = self.calibrate_all(&raws, &metadata)?;
            classes.push(AssembledClass {
                spec: class,
                geometry,
                bands,
            });
        }
        Ok(classes)
    }

    /// A container product whose subdatasets are tagged `<res>m resolution`.
    fn assemble_sentinel(&self, tile_path: &Path) -> Result<Vec<AssembledClass>> {
        let sensor = Sensor::Sentinel2;
        let (prefix, suffix) = sensor.metadata_pattern();
        let container_path = find_metadata_file(tile_path, prefix, suffix)?;

        let (items, subdatasets) = {
            let container = self.driver.open(&container_path.to_string_lossy())?;
            (container.metadata_items(), container.subdatasets())
        };

        let mut classes = Vec::with_capacity(sensor.classes().len());
        for class in sensor.classes() {
            let tag = format!("{}m resolution", class.resolution_m);
            let subdataset = find_subdataset(&subdatasets, &tag).ok_or_else(|| {
                SatGridError::MissingBand {
                    band: class.bands[0].id.to_string(),
                    source_name: format!("subdataset with '{tag}'"),
                }
            })?;
            info!(class = class.name, subdataset = %subdataset.name, "loading dataset class");

            let (geometry, raws, metadata) = {
                let dataset = self.open_band(&subdataset.name, &class.bands[0])?;
                let geometry = GridGeometry::resolve(&dataset)?;
                let mut class_items = items.clone();
                let mut raws = Vec::with_capacity(class.bands.len());
                for (i, band) in class.bands.iter().enumerate() {
                    let index = i + 1;
                    if index > dataset.band_count() {
                        return Err(SatGridError::MissingBand {
                            band: band.id.to_string(),
                            source_name: format!("{} band {index}", subdataset.name),
                        });
                    }
                    let raw = RawBand::from_digital_numbers(dataset.read_band(index)?);
                    check_shape(class, band, geometry.shape(), raw.shape())?;

                    // Product-level metadata wins over the band's own offset
                    let key = radiometric_offset_key(band);
                    if let Some(offset) = dataset.band_offset(index) {
                        if !class_items.iter().any(|(k, _)| *k == key) {
                            debug!(band = band.id, offset, "band radiometric offset");
                            class_items.push((key, offset.to_string()));
                        }
                    }
                    raws.push((band, raw));
                }
                (geometry, raws, SceneMetadata::from_items(class_items))
            };

            let bands = self.calibrate_all(&raws, &metadata)?;
            classes.push(AssembledClass {
                spec: class,
                geometry,
                bands,
            });
        }
        Ok(classes)
    }

    fn open_band(&self, name: &str, band: &BandSpec) -> Result<D::Dataset> {
        self.driver.open(name).map_err(|e| match e {
            SatGridError::RasterNotFound { name } => SatGridError::MissingBand {
                band: band.id.to_string(),
                source_name: name,
            },
            other => other,
        })
    }

    /// Calibrate in table order. The first failing band aborts the class.
    fn calibrate_all(
        &self,
        raws: &[(&'static BandSpec, RawBand)],
        metadata: &SceneMetadata,
    ) -> Result<Vec<CalibratedBand>> {
        if self.parallel_bands {
            raws.par_iter()
                .map(|(spec, raw)| calibrate(*spec, raw, metadata))
                .collect()
        } else {
            raws.iter()
                .map(|(spec, raw)| calibrate(*spec, raw, metadata))
                .collect()
        }
    }
}

fn find_subdataset<'s>(subdatasets: &'s [SubDataset], tag: &str) -> Option<&'s SubDataset> {
    subdatasets.iter().find(|s| s.description.contains(tag))
}

fn check_shape(
    class: &ClassSpec,
    band: &BandSpec,
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<()> {
    if expected != found {
        return Err(SatGridError::GridMismatch {
            class: class.name.to_string(),
            band: band.id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}
