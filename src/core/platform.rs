//! Per-platform band tables
//!
//! Each supported sensor family is a variant of [`Platform`] carrying an immutable
//! [`PlatformConfig`]: resolution tiers in ascending order, the canonical band order
//! inside each tier, band wavelength descriptions and how raw counts are calibrated.

use crate::types::{SceneError, SceneResult, Tier};
use serde::{Deserialize, Serialize};

/// Supported sensor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Sentinel-2 MSI (10/20/60 m tiers, SAFE products with an MTD_*.xml descriptor)
    Sentinel2,
    /// Landsat-8 OLI/TIRS (15/30 m tiers, one GeoTIFF per band plus *_MTL.txt)
    Landsat8,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Sentinel2 => write!(f, "Sentinel-2"),
            Platform::Landsat8 => write!(f, "Landsat-8"),
        }
    }
}

/// Conversion applied to the raw counts of a tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Digital counts divided by a fixed quantification value
    Reflectance { divisor: f32 },
    /// Radiometric rescaling with gain/offset from the scene metadata
    Radiance,
}

/// One resolution tier of a platform
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub resolution: Tier,
    pub bands: &'static [&'static str],
}

/// Immutable band table of a platform
#[derive(Debug)]
pub struct PlatformConfig {
    pub tiers: &'static [TierSpec],
    pub band_descriptions: &'static [(&'static str, &'static str)],
    /// Bands carrying brightness temperature (thermal infrared)
    pub thermal_bands: &'static [&'static str],
    pub calibration: Calibration,
    /// File name pattern of the scene descriptor
    pub descriptor_pattern: &'static str,
}

static SENTINEL2: PlatformConfig = PlatformConfig {
    tiers: &[
        TierSpec { resolution: 10, bands: &["B4", "B3", "B2", "B8"] },
        TierSpec { resolution: 20, bands: &["B5", "B6", "B7", "B8A", "B11", "B12"] },
        TierSpec { resolution: 60, bands: &["B1", "B9"] },
    ],
    band_descriptions: &[
        ("B4", "B4 (665 nm)"),
        ("B3", "B3 (560 nm)"),
        ("B2", "B2 (490 nm)"),
        ("B8", "B8 (842 nm)"),
        ("B5", "B5 (705 nm)"),
        ("B6", "B6 (740 nm)"),
        ("B7", "B7 (783 nm)"),
        ("B8A", "B8A (865 nm)"),
        ("B11", "B11 (1610 nm)"),
        ("B12", "B12 (2190 nm)"),
        ("B1", "B1 (443 nm)"),
        ("B9", "B9 (945 nm)"),
        ("B10", "B10 (1375 nm)"),
    ],
    thermal_bands: &[],
    calibration: Calibration::Reflectance { divisor: 10000.0 },
    descriptor_pattern: r"^MTD_(.*?)xml$",
};

static LANDSAT8: PlatformConfig = PlatformConfig {
    tiers: &[
        TierSpec { resolution: 15, bands: &["B8"] },
        TierSpec {
            resolution: 30,
            bands: &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B9", "B10", "B11"],
        },
    ],
    band_descriptions: &[
        ("B1", "B1 [435nm-451nm]"),
        ("B2", "B2 [452nm-512nm]"),
        ("B3", "B3 [533nm-590nm]"),
        ("B4", "B4 [636nm-673nm]"),
        ("B5", "B5 [851nm-879nm]"),
        ("B6", "B6 [1566nm-1651nm]"),
        ("B7", "B7 [2107nm-2294nm]"),
        ("B8", "B8 [503nm-676nm]"),
        ("B9", "B9 [1363nm-1384nm]"),
        ("B10", "B10 [10600nm-11190nm]"),
        ("B11", "B11 [11500nm-12510nm]"),
    ],
    thermal_bands: &["B10", "B11"],
    calibration: Calibration::Radiance,
    descriptor_pattern: r"^(.*?)MTL.txt$",
};

impl Platform {
    pub fn config(&self) -> &'static PlatformConfig {
        match self {
            Platform::Sentinel2 => &SENTINEL2,
            Platform::Landsat8 => &LANDSAT8,
        }
    }

    /// All tiers, finest first
    pub fn resolutions(&self) -> Vec<Tier> {
        self.config().tiers.iter().map(|t| t.resolution).collect()
    }

    pub fn finest(&self) -> Tier {
        self.config().tiers[0].resolution
    }

    pub fn coarsest(&self) -> Tier {
        self.config().tiers[self.config().tiers.len() - 1].resolution
    }

    /// Tiers whose resolution does not exceed `max_res`
    pub fn tiers_up_to(&self, max_res: Tier) -> SceneResult<Vec<Tier>> {
        let tiers: Vec<Tier> = self
            .resolutions()
            .into_iter()
            .filter(|res| *res <= max_res)
            .collect();

        if tiers.is_empty() {
            return Err(SceneError::UnsupportedFormat(format!(
                "{} has no resolution tier at or below {}m (finest is {}m)",
                self,
                max_res,
                self.finest()
            )));
        }
        Ok(tiers)
    }

    pub fn tier(&self, resolution: Tier) -> SceneResult<&'static TierSpec> {
        self.config()
            .tiers
            .iter()
            .find(|t| t.resolution == resolution)
            .ok_or_else(|| {
                SceneError::UnsupportedFormat(format!(
                    "{}m is not a {} resolution tier",
                    resolution, self
                ))
            })
    }

    /// Canonical band order of a tier
    pub fn bands(&self, resolution: Tier) -> SceneResult<&'static [&'static str]> {
        Ok(self.tier(resolution)?.bands)
    }

    /// Ratio between a tier's pixel size and the finest tier's pixel size
    pub fn upscaling_factor(&self, resolution: Tier) -> SceneResult<usize> {
        self.tier(resolution)?;
        Ok((resolution / self.finest()) as usize)
    }

    pub fn band_description(&self, band: &str) -> SceneResult<&'static str> {
        self.config()
            .band_descriptions
            .iter()
            .find(|(name, _)| *name == band)
            .map(|(_, desc)| *desc)
            .ok_or_else(|| {
                SceneError::UnsupportedFormat(format!("{} is not a {} band", band, self))
            })
    }

    pub fn is_thermal(&self, band: &str) -> bool {
        self.config().thermal_bands.contains(&band)
    }

    pub fn descriptor_regex(&self) -> SceneResult<regex::Regex> {
        regex::Regex::new(self.config().descriptor_pattern)
            .map_err(|e| SceneError::Processing(format!("Bad descriptor pattern: {}", e)))
    }
}
