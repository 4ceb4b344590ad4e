//! Radiometric calibration of digital-number rasters
//!
//! Three conversions are supported, selected by the band's
//! [`CalibrationMode`] in the sensor table:
//!
//! - **DOS1 reflectance** for Landsat reflective bands. Path radiance is
//!   estimated from the darkest valid pixel of the band and subtracted before
//!   converting radiance to reflectance. Atmospheric transmittance is fixed
//!   (`Tz = Tv = 1`, `Ed = 0`).
//! - **Brightness temperature** (Kelvin) for Landsat thermal bands.
//! - **Quantified reflectance** for products whose digital numbers already
//!   encode reflectance scaled by a quantification value (Sentinel-2 L1C).
//!   Processing baseline 04.00 and later shift the digital numbers by a
//!   per-band radiometric offset, added back before dividing.
//!
//! Digital number 0 is no-data: it is masked to NaN before any reduction and
//! stays NaN in the calibrated output. Reflectances are clamped to `[0, 1]`,
//! temperatures are not.

use crate::errors::{Result, SatGridError};
use crate::metadata::SceneMetadata;
use crate::sensor::{BandSpec, CalibrationMode};
use ndarray::Array2;
use std::f64::consts::PI;

/// Below this `Esun * cos(z)` the sun is treated as on or under the horizon.
const MIN_SOLAR_TERM: f64 = 1e-9;

/// Digital numbers of one band with no-data masked to NaN
#[derive(Debug, Clone, PartialEq)]
pub struct RawBand {
    data: Array2<f64>,
}

impl RawBand {
    /// Mask zero samples of a freshly read band.
    pub fn from_digital_numbers(mut dn: Array2<f64>) -> Self {
        dn.mapv_inplace(|v| if v == 0.0 { f64::NAN } else { v });
        Self { data: dn }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Smallest valid digital number, `None` when every sample is masked.
    pub fn min_valid(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}

/// A band converted to physical units, immutable once produced
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedBand {
    pub spec: &'static BandSpec,
    pub data: Array2<f64>,
}

impl CalibratedBand {
    pub fn id(&self) -> &'static str {
        self.spec.id
    }

    pub fn description(&self) -> &'static str {
        self.spec.description
    }

    pub fn units(&self) -> &'static str {
        self.spec.mode.units()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Metadata constants of a reflective band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectiveCoefficients {
    pub radiance_mult: f64,
    pub radiance_add: f64,
    pub radiance_max: f64,
    pub reflectance_max: f64,
    /// Astronomical units
    pub earth_sun_distance: f64,
    /// Degrees above the horizon
    pub sun_elevation: f64,
}

impl ReflectiveCoefficients {
    pub fn from_metadata(metadata: &SceneMetadata, band: &BandSpec) -> Result<Self> {
        let name = band.metadata_name;
        let id = band.id;
        Ok(Self {
            radiance_mult: metadata
                .require_f64(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_MULT_{name}")], id)?,
            radiance_add: metadata
                .require_f64(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_ADD_{name}")], id)?,
            radiance_max: metadata
                .require_f64(&["MIN_MAX_RADIANCE", &format!("RADIANCE_MAXIMUM_{name}")], id)?,
            reflectance_max: metadata.require_f64(
                &["MIN_MAX_REFLECTANCE", &format!("REFLECTANCE_MAXIMUM_{name}")],
                id,
            )?,
            earth_sun_distance: metadata.require_f64(&["IMAGE_ATTRIBUTES", "EARTH_SUN_DISTANCE"], id)?,
            sun_elevation: metadata.require_f64(&["IMAGE_ATTRIBUTES", "SUN_ELEVATION"], id)?,
        })
    }

    /// Exo-atmospheric solar irradiance `π·d²·Lmax / ρmax`
    pub fn esun(&self) -> f64 {
        PI * self.earth_sun_distance.powi(2) * self.radiance_max / self.reflectance_max
    }

    /// Solar zenith angle in degrees
    pub fn solar_zenith(&self) -> f64 {
        90.0 - self.sun_elevation
    }

    pub fn radiance(&self, dn: f64) -> f64 {
        self.radiance_mult * dn + self.radiance_add
    }
}

/// Intermediate DOS1 quantities for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dos1Terms {
    pub esun: f64,
    pub cos_zenith: f64,
    /// Radiance of the darkest valid pixel
    pub l_min: f64,
    /// Radiance of a 1% reflectance dark object
    pub l_one_percent: f64,
    /// Path radiance
    pub l_path: f64,
}

impl Dos1Terms {
    pub fn new(coeffs: &ReflectiveCoefficients, min_dn: f64, band: &str) -> Result<Self> {
        let degenerate = |message: String| SatGridError::Degenerate {
            band: band.to_string(),
            message,
        };

        if !(coeffs.reflectance_max > 0.0) {
            return Err(degenerate(format!(
                "reflectance maximum {} must be positive",
                coeffs.reflectance_max
            )));
        }
        if !(coeffs.earth_sun_distance > 0.0) {
            return Err(degenerate(format!(
                "earth-sun distance {} must be positive",
                coeffs.earth_sun_distance
            )));
        }

        let esun = coeffs.esun();
        let cos_zenith = coeffs.solar_zenith().to_radians().cos();
        let solar_term = esun * cos_zenith;
        if !solar_term.is_finite() || solar_term <= MIN_SOLAR_TERM {
            return Err(degenerate(format!(
                "sun elevation {} leaves no direct irradiance (Esun·cos(z) = {solar_term})",
                coeffs.sun_elevation
            )));
        }

        let d2 = coeffs.earth_sun_distance.powi(2);
        let l_min = coeffs.radiance(min_dn);
        let l_one_percent = 0.01 * solar_term / (PI * d2);

        Ok(Self {
            esun,
            cos_zenith,
            l_min,
            l_one_percent,
            l_path: l_min - l_one_percent,
        })
    }

    /// Surface reflectance of one digital number, before clamping
    pub fn reflectance(&self, coeffs: &ReflectiveCoefficients, dn: f64) -> f64 {
        let d2 = coeffs.earth_sun_distance.powi(2);
        let surface_radiance = coeffs.radiance(dn) - self.l_path;
        (PI * d2 * surface_radiance) / (self.esun * self.cos_zenith)
    }
}

/// DOS1 surface reflectance of a reflective band, clamped to `[0, 1]`.
pub fn dos1_reflectance(raw: &RawBand, coeffs: &ReflectiveCoefficients, band: &str) -> Result<Array2<f64>> {
    let Some(min_dn) = raw.min_valid() else {
        tracing::warn!(band, "every pixel is no-data, output stays masked");
        return Ok(raw.data().clone());
    };

    let terms = Dos1Terms::new(coeffs, min_dn, band)?;
    tracing::debug!(
        band,
        esun = terms.esun,
        l_min = terms.l_min,
        l_path = terms.l_path,
        "DOS1 path radiance"
    );

    let coeffs = *coeffs;
    let mut out = raw.data().clone();
    out.par_mapv_inplace(|dn| terms.reflectance(&coeffs, dn).clamp(0.0, 1.0));
    Ok(out)
}

/// Metadata constants of a thermal band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalCoefficients {
    pub radiance_mult: f64,
    pub radiance_add: f64,
    pub k1: f64,
    pub k2: f64,
}

impl ThermalCoefficients {
    pub fn from_metadata(metadata: &SceneMetadata, band: &BandSpec) -> Result<Self> {
        let name = band.metadata_name;
        let id = band.id;
        Ok(Self {
            radiance_mult: metadata
                .require_f64(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_MULT_{name}")], id)?,
            radiance_add: metadata
                .require_f64(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_ADD_{name}")], id)?,
            k1: metadata.require_f64(&["TIRS_THERMAL_CONSTANTS", &format!("K1_CONSTANT_{name}")], id)?,
            k2: metadata.require_f64(&["TIRS_THERMAL_CONSTANTS", &format!("K2_CONSTANT_{name}")], id)?,
        })
    }

    /// `T = K2 / ln(K1 / L + 1)`; non-positive radiance has no temperature.
    pub fn temperature(&self, dn: f64) -> f64 {
        let radiance = self.radiance_mult * dn + self.radiance_add;
        if radiance > 0.0 {
            self.k2 / (self.k1 / radiance + 1.0).ln()
        } else {
            f64::NAN
        }
    }
}

/// At-sensor brightness temperature in Kelvin. Never clamped.
pub fn brightness_temperature(raw: &RawBand, coeffs: &ThermalCoefficients, band: &str) -> Result<Array2<f64>> {
    if !(coeffs.k1 > 0.0) || !(coeffs.k2 > 0.0) {
        return Err(SatGridError::Degenerate {
            band: band.to_string(),
            message: format!("thermal constants K1={} K2={} must be positive", coeffs.k1, coeffs.k2),
        });
    }

    let coeffs = *coeffs;
    let mut out = raw.data().clone();
    out.par_mapv_inplace(|dn| coeffs.temperature(dn));
    Ok(out)
}

/// Metadata key of a band's radiometric offset, e.g. `RADIO_ADD_OFFSET_B4`
pub fn radiometric_offset_key(band: &BandSpec) -> String {
    format!("RADIO_ADD_OFFSET_{}", band.metadata_name)
}

/// Radiometric offset of a band. Products older than baseline 04.00 carry none.
fn radiometric_offset(metadata: &SceneMetadata, band: &BandSpec) -> Result<f64> {
    let key = radiometric_offset_key(band);
    match metadata.get(&[key.as_str()]) {
        Some(_) => metadata.require_f64(&[key.as_str()], band.id),
        None => Ok(0.0),
    }
}

/// Reflectance `(DN + offset) / quantification` from quantified digital numbers,
/// clamped to `[0, 1]`.
pub fn quantified_reflectance(
    raw: &RawBand,
    quantification: f64,
    offset: f64,
    band: &str,
) -> Result<Array2<f64>> {
    if !(quantification > 0.0) || !quantification.is_finite() {
        return Err(SatGridError::Degenerate {
            band: band.to_string(),
            message: format!("quantification value {quantification} must be positive"),
        });
    }

    let mut out = raw.data().clone();
    out.par_mapv_inplace(|dn| ((dn + offset) / quantification).clamp(0.0, 1.0));
    Ok(out)
}

/// Calibrate one band with the conversion its table row selects.
///
/// Pure function of its inputs: the same band, raw array and metadata always
/// produce bit-identical output.
pub fn calibrate(spec: &'static BandSpec, raw: &RawBand, metadata: &SceneMetadata) -> Result<CalibratedBand> {
    let data = match spec.mode {
        CalibrationMode::Dos1Reflectance => {
            let coeffs = ReflectiveCoefficients::from_metadata(metadata, spec)?;
            dos1_reflectance(raw, &coeffs, spec.id)?
        }
        CalibrationMode::BrightnessTemperature => {
            let coeffs = ThermalCoefficients::from_metadata(metadata, spec)?;
            brightness_temperature(raw, &coeffs, spec.id)?
        }
        CalibrationMode::QuantifiedReflectance => {
            let quantification = metadata.require_f64(&["QUANTIFICATION_VALUE"], spec.id)?;
            let offset = radiometric_offset(metadata, spec)?;
            tracing::debug!(band = spec.id, quantification, offset, "quantified reflectance");
            quantified_reflectance(raw, quantification, offset, spec.id)?
        }
    };

    Ok(CalibratedBand { spec, data })
}
