//! GDAL-backed raster driver

use super::{collect_subdatasets, split_metadata_items, RasterDataset, RasterDriver, SubDataset};
use crate::errors::{Result, SatGridError};
use crate::geogrid::GeoTransform;
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::path::Path;

const RADIO_ADD_OFFSET: &str = "RADIO_ADD_OFFSET";

fn gdal_err(e: gdal::errors::GdalError) -> SatGridError {
    SatGridError::Raster(e.to_string())
}

/// Opens files and subdatasets with GDAL
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalDriver;

/// An open GDAL dataset; the handle closes on drop
pub struct GdalDataset {
    dataset: Dataset,
}

impl RasterDriver for GdalDriver {
    type Dataset = GdalDataset;

    fn open(&self, name: &str) -> Result<GdalDataset> {
        // Subdataset names ("SENTINEL2_L1C:/path/MTD.xml:10m:EPSG_32630") are not files
        if !name.contains(':') && !Path::new(name).exists() {
            return Err(SatGridError::RasterNotFound {
                name: name.to_string(),
            });
        }
        let dataset = Dataset::open(name).map_err(gdal_err)?;
        Ok(GdalDataset { dataset })
    }
}

impl RasterDataset for GdalDataset {
    fn raster_size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn band_count(&self) -> usize {
        usize::try_from(self.dataset.raster_count()).unwrap_or(0)
    }

    fn read_band(&self, index: usize) -> Result<Array2<f64>> {
        let band_index = index
            .try_into()
            .map_err(|_| SatGridError::Raster(format!("band index {index} out of range")))?;
        let band = self.dataset.rasterband(band_index).map_err(gdal_err)?;
        let (cols, rows) = self.dataset.raster_size();
        let buffer = band
            .read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)
            .map_err(gdal_err)?;
        Ok(Array2::from_shape_vec((rows, cols), buffer.data().to_vec())?)
    }

    fn geo_transform(&self) -> Result<GeoTransform> {
        self.dataset
            .geo_transform()
            .map(GeoTransform::new)
            .map_err(gdal_err)
    }

    fn projection(&self) -> String {
        self.dataset.projection()
    }

    fn metadata_items(&self) -> Vec<(String, String)> {
        self.dataset
            .metadata_domain("")
            .map(split_metadata_items)
            .unwrap_or_default()
    }

    fn subdatasets(&self) -> Vec<SubDataset> {
        self.dataset
            .metadata_domain("SUBDATASETS")
            .map(|items| collect_subdatasets(&split_metadata_items(items)))
            .unwrap_or_default()
    }

    /// The Sentinel-2 driver publishes the offset as a band metadata item.
    fn band_offset(&self, index: usize) -> Option<f64> {
        let band = self.dataset.rasterband(index.try_into().ok()?).ok()?;
        band.metadata_item(RADIO_ADD_OFFSET, "")?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::raster::Buffer;
    use gdal::spatial_ref::SpatialRef;
    use gdal::DriverManager;

    const WKT: &str = r#"PROJCS["WGS 84 / UTM zone 30N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",-3],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1],AUTHORITY["EPSG","32630"]]"#;

    /// Three columns, two rows, so a swapped axis shows up as a wrong shape.
    fn write_geotiff(path: &Path) -> std::result::Result<(), gdal::errors::GdalError> {
        let (cols, rows) = (3, 2);
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut ds = driver.create_with_band_type::<f64, _>(path, cols, rows, 1)?;
        ds.set_geo_transform(&[300000.0, 30.0, 0.0, 4500000.0, 0.0, -30.0])?;
        ds.set_spatial_ref(&SpatialRef::from_wkt(WKT)?)?;

        let mut band = ds.rasterband(1)?;
        band.set_metadata_item(RADIO_ADD_OFFSET, "-1000", "")?;
        let mut buffer = Buffer::new((cols, rows), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        band.write((0, 0), (cols, rows), &mut buffer)?;
        Ok(())
    }

    #[test]
    fn reads_geotiff_in_row_major_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LC08_B4.TIF");
        write_geotiff(&path).unwrap();

        let dataset = GdalDriver.open(&path.to_string_lossy()).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));
        assert_eq!(dataset.band_count(), 1);

        let data = dataset.read_band(1).unwrap();
        assert_eq!(data.dim(), (2, 3));
        assert_eq!(data[[0, 2]], 3.0);
        assert_eq!(data[[1, 0]], 4.0);
        assert!(dataset.read_band(2).is_err());

        assert_eq!(
            dataset.geo_transform().unwrap(),
            GeoTransform::new([300000.0, 30.0, 0.0, 4500000.0, 0.0, -30.0])
        );
        assert!(dataset.projection().contains("32630"));
        assert_eq!(dataset.band_offset(1), Some(-1000.0));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.TIF");
        match GdalDriver.open(&missing.to_string_lossy()) {
            Err(SatGridError::RasterNotFound { name }) => assert!(name.ends_with("absent.TIF")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("opened a missing file"),
        }
    }
}
