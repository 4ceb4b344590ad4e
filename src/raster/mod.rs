//! Raster access abstraction
//!
//! The pipeline only needs a handful of raster primitives: open a dataset by
//! name, read one band as a 2D array, and query the geotransform, projection,
//! metadata items and subdatasets. [`RasterDriver`] and [`RasterDataset`]
//! capture exactly that, so the calibration code runs the same against GDAL
//! (`gdal` feature) and against the in-process [`memory`] driver.

pub mod memory;

#[cfg(feature = "gdal")]
pub mod gdal;

use crate::errors::Result;
use crate::geogrid::GeoTransform;
use ndarray::Array2;

/// A subdataset entry of a container product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDataset {
    /// Name to pass back to [`RasterDriver::open`]
    pub name: String,
    /// Free text description, e.g. `Bands B2, B3, B4, B8 with 10m resolution, UTM 30N`
    pub description: String,
}

/// An open raster dataset. Dropping it releases the underlying handle.
pub trait RasterDataset {
    /// `(columns, rows)` of the raster
    fn raster_size(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    /// Read band `index` (1-based) as `rows x columns` digital numbers.
    fn read_band(&self, index: usize) -> Result<Array2<f64>>;

    fn geo_transform(&self) -> Result<GeoTransform>;

    /// Projection as WKT, empty when the dataset carries none
    fn projection(&self) -> String;

    /// Items of the default metadata domain
    fn metadata_items(&self) -> Vec<(String, String)>;

    fn subdatasets(&self) -> Vec<SubDataset>;

    /// Radiometric offset of band `index` (1-based) in digital numbers, when
    /// the band declares one (Sentinel-2 processing baseline 04.00 and later).
    fn band_offset(&self, _index: usize) -> Option<f64> {
        None
    }
}

/// Opens raster datasets by file path or subdataset name.
pub trait RasterDriver: Sync {
    type Dataset: RasterDataset;

    /// Fails with [`crate::SatGridError::RasterNotFound`] when nothing exists under `name`.
    fn open(&self, name: &str) -> Result<Self::Dataset>;
}

/// Split `KEY=VALUE` metadata strings, dropping malformed entries.
pub(crate) fn split_metadata_items<I, S>(items: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter_map(|item| {
            item.as_ref()
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Pair up `SUBDATASET_<n>_NAME` / `SUBDATASET_<n>_DESC` items in index order.
#[cfg_attr(not(feature = "gdal"), allow(dead_code))]
pub(crate) fn collect_subdatasets(items: &[(String, String)]) -> Vec<SubDataset> {
    let mut indexed: Vec<(usize, SubDataset)> = items
        .iter()
        .filter_map(|(key, name)| {
            let index = key
                .strip_prefix("SUBDATASET_")?
                .strip_suffix("_NAME")?
                .parse::<usize>()
                .ok()?;
            let desc_key = format!("SUBDATASET_{index}_DESC");
            let description = items
                .iter()
                .find(|(k, _)| *k == desc_key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            Some((
                index,
                SubDataset {
                    name: name.clone(),
                    description,
                },
            ))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, sub)| sub).collect()
}
