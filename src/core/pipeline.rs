//! Scene assembly: zone/window selection, per-tier loading and georeferencing

use crate::core::band_stack::{choose_candidate, load_tier, BandStack};
use crate::core::coords::package_coordinates;
use crate::core::platform::Platform;
use crate::core::radiometry::{brightness_temperatures, Radiometry};
use crate::core::region::{select_region, ZoneCandidate};
use crate::io::product::{ProductInfo, SceneId};
use crate::io::raster::RasterSource;
use crate::types::{BandImage, CoordinatePackage, Region, SceneError, SceneResult, Tier};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to load from a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadRequest {
    /// Region of interest; the whole zone when absent
    pub region: Option<Region>,
    /// Coarsest tier to load; all tiers when absent
    pub max_res: Option<Tier>,
    /// UTM zone identifier (or part of it) to load instead of the best-covered one
    pub select_zone: Option<String>,
    /// Also derive brightness temperature from thermal bands
    pub brightness_temperature: bool,
}

impl LoadRequest {
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_max_res(mut self, max_res: Tier) -> Self {
        self.max_res = Some(max_res);
        self
    }

    pub fn with_zone(mut self, zone: &str) -> Self {
        self.select_zone = Some(zone.to_string());
        self
    }
}

/// Opened rasters of a scene
pub struct SceneRasters<R: RasterSource> {
    pub platform: Platform,
    /// One entry per UTM zone the scene is delivered in (finest tier flavour).
    /// When empty, the finest tier's datasets are the zone candidates.
    pub zones: Vec<ZoneCandidate<R>>,
    /// Tier datasets, one per zone
    pub tiers: BTreeMap<Tier, Vec<ZoneCandidate<R>>>,
}

impl<R: RasterSource> SceneRasters<R> {
    pub fn tier(&self, resolution: Tier) -> &[ZoneCandidate<R>] {
        self.tiers.get(&resolution).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn zone_candidates(&self) -> &[ZoneCandidate<R>] {
        if self.zones.is_empty() {
            self.tier(self.platform.finest())
        } else {
            &self.zones
        }
    }
}

/// Loaded bands of a scene plus their georeferencing
#[derive(Debug, Clone)]
pub struct SceneBands {
    pub platform: Platform,
    pub scene: Option<SceneId>,
    pub product: Option<ProductInfo>,
    /// Identifier of the loaded UTM zone
    pub zone: String,
    /// Band stacks in ascending tier order
    pub stacks: BTreeMap<Tier, BandStack>,
    pub coords: CoordinatePackage,
    /// Kelvin, keyed by thermal band
    pub brightness_temperature: Option<BTreeMap<String, BandImage>>,
}

impl SceneBands {
    pub fn stack(&self, tier: Tier) -> Option<&BandStack> {
        self.stacks.get(&tier)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.stacks.keys().copied().collect()
    }
}

/// Load every requested tier of `rasters`.
///
/// Either every tier is loaded or an error is returned.
pub fn assemble<R: RasterSource>(
    rasters: &SceneRasters<R>,
    request: &LoadRequest,
    radiometry: &Radiometry,
) -> SceneResult<SceneBands> {
    let platform = rasters.platform;
    let max_res = request.max_res.unwrap_or_else(|| platform.coarsest());
    let tiers = platform.tiers_up_to(max_res)?;
    log::info!("Loading {} tiers {:?}", platform, tiers);

    let candidates = rasters.zone_candidates();
    if candidates.is_empty() {
        let finest = platform.finest();
        return Err(SceneError::BandMismatch {
            tier: finest,
            expected: platform.bands(finest)?.iter().map(|b| b.to_string()).collect(),
            actual: Vec::new(),
        });
    }

    let selection = select_region(
        candidates,
        request.region.as_ref(),
        &tiers,
        request.select_zone.as_deref(),
    )?;

    let mut stacks = BTreeMap::new();
    for tier in &tiers {
        let stack = load_tier(
            platform,
            *tier,
            &selection.window,
            rasters.tier(*tier),
            &selection.zone,
            selection.index,
            radiometry,
        )?;
        log::info!(
            "Loaded {}m stack {}x{}x{}",
            tier,
            stack.height(),
            stack.width(),
            stack.band_count()
        );
        stacks.insert(*tier, stack);
    }

    let finest = platform.finest();
    let reference = choose_candidate(rasters.tier(finest), &selection.zone, selection.index)
        .ok_or_else(|| SceneError::UnsupportedFormat(format!("No {}m dataset in scene", finest)))?;
    let coords = package_coordinates(&selection.window, &reference.raster)?;

    let brightness_temperature = if request.brightness_temperature {
        match radiometry {
            Radiometry::Landsat(landsat) => {
                let mut temperatures = BTreeMap::new();
                for stack in stacks.values() {
                    let channels = stack
                        .bands
                        .iter()
                        .filter(|band| platform.is_thermal(band))
                        .filter_map(|band| stack.band(band).map(|view| (band.as_str(), view)));
                    temperatures.extend(brightness_temperatures(landsat, channels)?);
                }
                Some(temperatures)
            }
            Radiometry::Scale { .. } => {
                log::warn!("{} has no thermal bands; brightness temperature skipped", platform);
                None
            }
        }
    } else {
        None
    };

    Ok(SceneBands {
        platform,
        scene: None,
        product: None,
        zone: selection.zone,
        stacks,
        coords,
        brightness_temperature,
    })
}

/// Split a stack into its bands, keyed by canonical name
pub fn split_bands(stack: &BandStack) -> BTreeMap<String, BandImage> {
    stack
        .bands
        .iter()
        .enumerate()
        .map(|(i, band)| (band.clone(), stack.data.index_axis(Axis(2), i).to_owned()))
        .collect()
}
