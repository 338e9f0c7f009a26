//! Conversion of raw counts to physical units
//!
//! Sentinel-2 counts are scaled by the quantification value. Landsat-8 counts go
//! through the per-band radiance rescaling of the MTL file; reflective bands are then
//! turned into top-of-atmosphere reflectance while the thermal bands stay in radiance.

use crate::core::platform::{Calibration, Platform};
use crate::io::metadata::MetadataGroup;
use crate::types::{BandCube, BandImage, SceneError, SceneResult};
use ndarray::{ArrayView2, ArrayViewMut2, Axis};
use std::collections::BTreeMap;

/// Per-band conversion constants read from a Landsat MTL file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandCoefficients {
    pub radiance_mult: f64,
    pub radiance_add: f64,
    pub kind: BandKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandKind {
    Reflective { radiance_max: f64, reflectance_max: f64 },
    Thermal { k1: f64, k2: f64 },
}

/// Landsat-8 radiometric calibration of one scene
#[derive(Debug, Clone, PartialEq)]
pub struct LandsatRadiometry {
    /// Astronomical units
    pub earth_sun_distance: f64,
    /// Degrees
    pub sun_elevation: f64,
    bands: BTreeMap<String, BandCoefficients>,
}

/// MTL key suffix of a band: "B10" -> "BAND_10"
fn mtl_band_key(band: &str) -> String {
    format!("BAND_{}", band.trim_start_matches('B'))
}

impl LandsatRadiometry {
    /// Read the coefficients of every `bands` entry from the `L1_METADATA_FILE` group
    pub fn from_metadata(metadata: &MetadataGroup, bands: &[&str], thermal: &[&str]) -> SceneResult<Self> {
        let earth_sun_distance = metadata.f64_value(&["IMAGE_ATTRIBUTES", "EARTH_SUN_DISTANCE"])?;
        let sun_elevation = metadata.f64_value(&["IMAGE_ATTRIBUTES", "SUN_ELEVATION"])?;

        let mut coefficients = BTreeMap::new();
        for band in bands {
            let key = mtl_band_key(band);
            let radiance_mult =
                metadata.f64_value(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_MULT_{}", key)])?;
            let radiance_add =
                metadata.f64_value(&["RADIOMETRIC_RESCALING", &format!("RADIANCE_ADD_{}", key)])?;

            let kind = if thermal.contains(band) {
                BandKind::Thermal {
                    k1: metadata.f64_value(&["TIRS_THERMAL_CONSTANTS", &format!("K1_CONSTANT_{}", key)])?,
                    k2: metadata.f64_value(&["TIRS_THERMAL_CONSTANTS", &format!("K2_CONSTANT_{}", key)])?,
                }
            } else {
                BandKind::Reflective {
                    radiance_max: metadata
                        .f64_value(&["MIN_MAX_RADIANCE", &format!("RADIANCE_MAXIMUM_{}", key)])?,
                    reflectance_max: metadata
                        .f64_value(&["MIN_MAX_REFLECTANCE", &format!("REFLECTANCE_MAXIMUM_{}", key)])?,
                }
            };

            coefficients.insert(
                band.to_string(),
                BandCoefficients {
                    radiance_mult,
                    radiance_add,
                    kind,
                },
            );
        }

        log::debug!(
            "Landsat radiometry: d={} AU, sun elevation={} deg, {} bands",
            earth_sun_distance,
            sun_elevation,
            coefficients.len()
        );

        Ok(Self {
            earth_sun_distance,
            sun_elevation,
            bands: coefficients,
        })
    }

    pub fn coefficients(&self, band: &str) -> SceneResult<&BandCoefficients> {
        self.bands
            .get(band)
            .ok_or_else(|| SceneError::Metadata(format!("No radiometric coefficients for {}", band)))
    }

    /// Spectral radiance L = ML * Q + AL
    pub fn radiance(&self, band: &str, dn: f64) -> SceneResult<f64> {
        let c = self.coefficients(band)?;
        Ok(c.radiance_mult * dn + c.radiance_add)
    }

    /// Top-of-atmosphere reflectance of a reflective band radiance.
    ///
    /// The solar irradiance is derived from the band's radiance and reflectance maxima.
    pub fn reflectance(&self, band: &str, radiance: f64) -> SceneResult<f64> {
        match self.coefficients(band)?.kind {
            BandKind::Reflective { radiance_max, reflectance_max } => {
                let d2 = self.earth_sun_distance * self.earth_sun_distance;
                let esun = std::f64::consts::PI * d2 * radiance_max / reflectance_max;
                let zenith = (90.0 - self.sun_elevation).to_radians();
                Ok(std::f64::consts::PI * d2 * radiance / (esun * zenith.cos()))
            }
            BandKind::Thermal { .. } => Err(SceneError::Processing(format!(
                "{} is a thermal band and has no reflectance",
                band
            ))),
        }
    }

    /// Brightness temperature in kelvin, T = K2 / ln(K1 / L + 1)
    pub fn brightness_temperature(&self, band: &str, radiance: f64) -> SceneResult<f64> {
        match self.coefficients(band)?.kind {
            BandKind::Thermal { k1, k2 } => Ok(k2 / (k1 / radiance + 1.0).ln()),
            BandKind::Reflective { .. } => Err(SceneError::Processing(format!(
                "{} is not a thermal band",
                band
            ))),
        }
    }

    /// Convert a band of raw counts in place: reflectance, or radiance for thermal bands
    pub fn calibrate(&self, band: &str, mut data: ArrayViewMut2<f32>) -> SceneResult<()> {
        let c = *self.coefficients(band)?;
        match c.kind {
            BandKind::Reflective { radiance_max, reflectance_max } => {
                let d2 = self.earth_sun_distance * self.earth_sun_distance;
                let esun = std::f64::consts::PI * d2 * radiance_max / reflectance_max;
                let cos_zenith = (90.0 - self.sun_elevation).to_radians().cos();
                let scale = std::f64::consts::PI * d2 / (esun * cos_zenith);
                data.mapv_inplace(|dn| {
                    let radiance = c.radiance_mult * dn as f64 + c.radiance_add;
                    (radiance * scale) as f32
                });
            }
            BandKind::Thermal { .. } => {
                data.mapv_inplace(|dn| (c.radiance_mult * dn as f64 + c.radiance_add) as f32);
            }
        }
        Ok(())
    }

    /// Brightness temperature image from a thermal radiance image
    pub fn brightness_temperature_image(&self, band: &str, radiance: ArrayView2<f32>) -> SceneResult<BandImage> {
        match self.coefficients(band)?.kind {
            BandKind::Thermal { k1, k2 } => {
                Ok(radiance.mapv(|l| (k2 / (k1 / l as f64 + 1.0).ln()) as f32))
            }
            BandKind::Reflective { .. } => Err(SceneError::Processing(format!(
                "{} is not a thermal band",
                band
            ))),
        }
    }
}

/// Count-to-physical conversion for one scene
#[derive(Debug, Clone, PartialEq)]
pub enum Radiometry {
    /// Divide every count by a fixed value
    Scale { divisor: f32 },
    Landsat(LandsatRadiometry),
}

impl Radiometry {
    /// Radiometry of a platform; Landsat needs the parsed MTL group
    pub fn for_platform(platform: Platform, metadata: Option<&MetadataGroup>) -> SceneResult<Self> {
        let config = platform.config();
        match config.calibration {
            Calibration::Reflectance { divisor } => Ok(Radiometry::Scale { divisor }),
            Calibration::Radiance => {
                let metadata = metadata.ok_or_else(|| {
                    SceneError::Metadata(format!("{} calibration needs the scene metadata", platform))
                })?;
                let bands: Vec<&str> = config.tiers.iter().flat_map(|t| t.bands.iter().copied()).collect();
                Ok(Radiometry::Landsat(LandsatRadiometry::from_metadata(
                    metadata,
                    &bands,
                    config.thermal_bands,
                )?))
            }
        }
    }

    /// Calibrate one band of a stack in place
    pub fn apply(&self, band: &str, mut data: ArrayViewMut2<f32>) -> SceneResult<()> {
        match self {
            Radiometry::Scale { divisor } => {
                let divisor = *divisor;
                data.mapv_inplace(|v| v / divisor);
                Ok(())
            }
            Radiometry::Landsat(landsat) => landsat.calibrate(band, data),
        }
    }

    /// Calibrate every channel of a (height, width, band) cube
    #[cfg(feature = "parallel")]
    pub fn apply_stack(&self, bands: &[&str], data: &mut BandCube) -> SceneResult<()> {
        use rayon::prelude::*;

        data.axis_iter_mut(Axis(2))
            .into_par_iter()
            .zip(bands.par_iter())
            .map(|(channel, band)| self.apply(band, channel))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    pub fn apply_stack(&self, bands: &[&str], data: &mut BandCube) -> SceneResult<()> {
        for (channel, band) in data.axis_iter_mut(Axis(2)).zip(bands) {
            self.apply(band, channel)?;
        }
        Ok(())
    }
}

/// Brightness temperature for every thermal band present in `radiance`
pub fn brightness_temperatures<'a, I>(radiometry: &LandsatRadiometry, radiance: I) -> SceneResult<BTreeMap<String, BandImage>>
where
    I: IntoIterator<Item = (&'a str, ArrayView2<'a, f32>)>,
{
    let mut out = BTreeMap::new();
    for (band, image) in radiance {
        if let BandKind::Thermal { .. } = radiometry.coefficients(band)?.kind {
            out.insert(band.to_string(), radiometry.brightness_temperature_image(band, image)?);
        }
    }
    Ok(out)
}
