//! In-process raster driver
//!
//! Datasets are registered under a name (a file path or subdataset string)
//! and handed out as clones on [`RasterDriver::open`]. Used by the test
//! suites and by callers that already hold decoded rasters.

use super::{split_metadata_items, RasterDataset, RasterDriver, SubDataset};
use crate::errors::{Result, SatGridError};
use crate::geogrid::GeoTransform;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

/// A raster held in memory. All bands share one shape.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    pub geo_transform: GeoTransform,
    pub projection: String,
    pub bands: Vec<Array2<f64>>,
    pub metadata: Vec<(String, String)>,
    pub subdatasets: Vec<SubDataset>,
    /// Radiometric offset per band, parallel to `bands`
    pub offsets: Vec<Option<f64>>,
    size: (usize, usize),
}

impl MemoryDataset {
    pub fn new(geo_transform: GeoTransform, projection: impl Into<String>) -> Self {
        Self {
            geo_transform,
            projection: projection.into(),
            bands: Vec::new(),
            metadata: Vec::new(),
            subdatasets: Vec::new(),
            offsets: Vec::new(),
            size: (0, 0),
        }
    }

    /// Append a band. The first band fixes the raster size.
    pub fn with_band(mut self, data: Array2<f64>) -> Self {
        if self.bands.is_empty() {
            let (rows, cols) = data.dim();
            self.size = (cols, rows);
        }
        self.bands.push(data);
        self.offsets.push(None);
        self
    }

    /// Set the radiometric offset of the most recently added band.
    pub fn with_band_offset(mut self, offset: f64) -> Self {
        if let Some(last) = self.offsets.last_mut() {
            *last = Some(offset);
        }
        self
    }

    /// Add `KEY=VALUE` items to the default metadata domain.
    pub fn with_metadata<S: AsRef<str>>(mut self, items: &[S]) -> Self {
        self.metadata
            .extend(split_metadata_items(items.iter().map(AsRef::as_ref)));
        self
    }

    pub fn with_subdataset(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.subdatasets.push(SubDataset {
            name: name.into(),
            description: description.into(),
        });
        self
    }
}

impl RasterDataset for MemoryDataset {
    fn raster_size(&self) -> (usize, usize) {
        self.size
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn read_band(&self, index: usize) -> Result<Array2<f64>> {
        index
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .cloned()
            .ok_or_else(|| {
                SatGridError::Raster(format!(
                    "band {index} out of range (dataset has {} bands)",
                    self.bands.len()
                ))
            })
    }

    fn geo_transform(&self) -> Result<GeoTransform> {
        Ok(self.geo_transform)
    }

    fn projection(&self) -> String {
        self.projection.clone()
    }

    fn metadata_items(&self) -> Vec<(String, String)> {
        self.metadata.clone()
    }

    fn subdatasets(&self) -> Vec<SubDataset> {
        self.subdatasets.clone()
    }

    fn band_offset(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(1)
            .and_then(|i| self.offsets.get(i))
            .copied()
            .flatten()
    }
}

/// Name-keyed collection of in-memory datasets
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    datasets: HashMap<String, MemoryDataset>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, dataset: MemoryDataset) -> &mut Self {
        self.datasets.insert(name.into(), dataset);
        self
    }

    /// Register a dataset under a filesystem path, the same key the assembler opens.
    pub fn insert_path(&mut self, path: &Path, dataset: MemoryDataset) -> &mut Self {
        self.insert(path.to_string_lossy().into_owned(), dataset)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl RasterDriver for MemoryDriver {
    type Dataset = MemoryDataset;

    fn open(&self, name: &str) -> Result<MemoryDataset> {
        self.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| SatGridError::RasterNotFound {
                name: name.to_string(),
            })
    }
}
