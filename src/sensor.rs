//! Static band tables for the supported sensors
//!
//! Each sensor partitions its bands into dataset classes. The tables are the
//! single source for band order, output labels, native resolution and the
//! calibration mode of every band; nothing here changes at runtime.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How a band's digital numbers become physical values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    /// Reflective band corrected with the DOS1 dark object subtraction model
    Dos1Reflectance,
    /// Thermal band converted to at-sensor brightness temperature
    BrightnessTemperature,
    /// Digital numbers already scaled reflectance, divided by the product quantification value
    QuantifiedReflectance,
}

impl CalibrationMode {
    /// CF-style units of the calibrated output
    #[must_use]
    pub const fn units(self) -> &'static str {
        match self {
            Self::Dos1Reflectance | Self::QuantifiedReflectance => "1",
            Self::BrightnessTemperature => "K",
        }
    }
}

/// One row of a sensor band table
#[derive(Debug, PartialEq, Eq)]
pub struct BandSpec {
    /// Short band code, e.g. `B8A`
    pub id: &'static str,
    /// Human readable label used as the output variable name
    pub description: &'static str,
    /// Native ground sample distance in metres
    pub resolution_m: u32,
    pub mode: CalibrationMode,
    /// Band suffix used by the metadata keys, e.g. `BAND_10`
    pub metadata_name: &'static str,
}

/// A named partition of a sensor's bands, written to one output file
#[derive(Debug, PartialEq, Eq)]
pub struct ClassSpec {
    pub name: &'static str,
    /// Resolution of the output grid in metres
    pub resolution_m: u32,
    /// Bands in output order
    pub bands: &'static [BandSpec],
}

impl ClassSpec {
    pub fn band(&self, id: &str) -> Option<&'static BandSpec> {
        self.bands.iter().find(|b| b.id == id)
    }
}

const fn band(
    id: &'static str,
    description: &'static str,
    resolution_m: u32,
    mode: CalibrationMode,
    metadata_name: &'static str,
) -> BandSpec {
    BandSpec {
        id,
        description,
        resolution_m,
        mode,
        metadata_name,
    }
}

use CalibrationMode::{BrightnessTemperature, Dos1Reflectance, QuantifiedReflectance};

static LANDSAT8_CLASSES: [ClassSpec; 3] = [
    ClassSpec {
        name: "Panchromatic_Band",
        resolution_m: 15,
        bands: &[band("B8", "B8 Panchromatic [503nm-676nm]", 15, Dos1Reflectance, "BAND_8")],
    },
    ClassSpec {
        name: "Spectral_Bands",
        resolution_m: 30,
        bands: &[
            band("B1", "B1 Ultra Blue (coastal/aerosol) [435nm-451nm]", 30, Dos1Reflectance, "BAND_1"),
            band("B2", "B2 Blue [452nm-512nm]", 30, Dos1Reflectance, "BAND_2"),
            band("B3", "B3 Green [533nm-590nm]", 30, Dos1Reflectance, "BAND_3"),
            band("B4", "B4 Red [636nm-673nm]", 30, Dos1Reflectance, "BAND_4"),
            band("B5", "B5 Near Infrared (NIR) [851nm-879nm]", 30, Dos1Reflectance, "BAND_5"),
            band("B6", "B6 Shortwave Infrared (SWIR) 1 [1566nm-1651nm]", 30, Dos1Reflectance, "BAND_6"),
            band("B7", "B7 Shortwave Infrared (SWIR) 2 [2107nm-2294nm]", 30, Dos1Reflectance, "BAND_7"),
            band("B9", "B9 Cirrus [1363nm-1384nm]", 30, Dos1Reflectance, "BAND_9"),
        ],
    },
    ClassSpec {
        name: "Thermal_bands",
        resolution_m: 30,
        bands: &[
            band("B10", "B10 Thermal Infrared (TIRS) 1 [10600nm-11190nm]", 100, BrightnessTemperature, "BAND_10"),
            band("B11", "B11 Thermal Infrared (TIRS) 2 [11500nm-12510nm]", 100, BrightnessTemperature, "BAND_11"),
        ],
    },
];

static SENTINEL2_CLASSES: [ClassSpec; 3] = [
    ClassSpec {
        name: "Bands_10m",
        resolution_m: 10,
        bands: &[
            band("B4", "B4 Red [665 nm]", 10, QuantifiedReflectance, "B4"),
            band("B3", "B3 Green [560 nm]", 10, QuantifiedReflectance, "B3"),
            band("B2", "B2 Blue [490 nm]", 10, QuantifiedReflectance, "B2"),
            band("B8", "B8 Near infrared [842 nm]", 10, QuantifiedReflectance, "B8"),
        ],
    },
    ClassSpec {
        name: "Bands_20m",
        resolution_m: 20,
        bands: &[
            band("B5", "B5 Vegetation classification [705 nm]", 20, QuantifiedReflectance, "B5"),
            band("B6", "B6 Vegetation classification [740 nm]", 20, QuantifiedReflectance, "B6"),
            band("B7", "B7 Vegetation classification [783 nm]", 20, QuantifiedReflectance, "B7"),
            band("B8A", "B8A Vegetation classification [865 nm]", 20, QuantifiedReflectance, "B8A"),
            band("B11", "B11 Snow / ice / cloud discrimination [1610 nm]", 20, QuantifiedReflectance, "B11"),
            band("B12", "B12 Snow / ice / cloud discrimination [2190 nm]", 20, QuantifiedReflectance, "B12"),
        ],
    },
    ClassSpec {
        name: "Bands_60m",
        resolution_m: 60,
        bands: &[
            band("B1", "B1 Aerosol detection [443 nm]", 60, QuantifiedReflectance, "B1"),
            band("B9", "B9 Water vapour [945 nm]", 60, QuantifiedReflectance, "B9"),
            band("B10", "B10 Cirrus [1375 nm]", 60, QuantifiedReflectance, "B10"),
        ],
    },
];

/// Supported sensor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Landsat8,
    Sentinel2,
}

impl Sensor {
    pub const ALL: [Sensor; 2] = [Sensor::Landsat8, Sensor::Sentinel2];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Landsat8 => "landsat8",
            Self::Sentinel2 => "sentinel2",
        }
    }

    /// Dataset classes in output order
    #[must_use]
    pub fn classes(self) -> &'static [ClassSpec] {
        match self {
            Self::Landsat8 => &LANDSAT8_CLASSES,
            Self::Sentinel2 => &SENTINEL2_CLASSES,
        }
    }

    pub fn class(self, name: &str) -> Option<&'static ClassSpec> {
        self.classes().iter().find(|c| c.name == name)
    }

    /// Class owning a band code. Tables partition the bands, so there is at most one.
    pub fn class_of(self, band_id: &str) -> Option<&'static ClassSpec> {
        self.classes().iter().find(|c| c.band(band_id).is_some())
    }

    pub fn band(self, band_id: &str) -> Option<&'static BandSpec> {
        self.class_of(band_id).and_then(|c| c.band(band_id))
    }

    /// Prefix and suffix of the per-scene metadata file name
    #[must_use]
    pub const fn metadata_pattern(self) -> (&'static str, &'static str) {
        match self {
            Self::Landsat8 => ("", "MTL.txt"),
            Self::Sentinel2 => ("MTD_", "xml"),
        }
    }

    /// Guess the sensor from the metadata file present in a tile directory.
    pub fn detect(tile_path: &Path) -> Option<Sensor> {
        Self::ALL.into_iter().find(|sensor| {
            let (prefix, suffix) = sensor.metadata_pattern();
            crate::metadata::find_metadata_file(tile_path, prefix, suffix).is_ok()
        })
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "landsat8" | "l8" => Ok(Self::Landsat8),
            "sentinel2" | "s2" => Ok(Self::Sentinel2),
            _ => Err(format!(
                "Unknown sensor '{s}': expected 'landsat8' or 'sentinel2'"
            )),
        }
    }
}
