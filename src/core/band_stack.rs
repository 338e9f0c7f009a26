use crate::core::platform::Platform;
use crate::core::radiometry::Radiometry;
use crate::core::region::ZoneCandidate;
use crate::io::raster::RasterSource;
use crate::types::{BandCube, SceneError, SceneResult, Tier, Window};
use ndarray::{Array3, ArrayView2, Axis};
use regex::Regex;
use std::sync::OnceLock;

/// Bands of one resolution tier, channel-last in canonical order
#[derive(Debug, Clone)]
pub struct BandStack {
    pub tier: Tier,
    /// Canonical band names, one per channel
    pub bands: Vec<String>,
    /// Short descriptions, e.g. "B4 (665 nm)"; bare band names fall back to the platform label
    pub descriptions: Vec<String>,
    /// (height, width, band)
    pub data: BandCube,
}

impl BandStack {
    /// Channel of a band by canonical name
    pub fn band(&self, name: &str) -> Option<ArrayView2<'_, f32>> {
        let index = self.bands.iter().position(|b| b == name)?;
        Some(self.data.index_axis(Axis(2), index))
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn band_count(&self) -> usize {
        self.data.dim().2
    }
}

fn central_wavelength_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?), central wavelength (\d+) nm").ok())
        .as_ref()
}

/// "B4, central wavelength 665 nm" -> "B4 (665 nm)"; other descriptions unchanged
pub fn short_description(description: &str) -> String {
    if let Some(caps) = central_wavelength_regex().and_then(|re| re.captures(description)) {
        return format!("{} ({} nm)", &caps[1], &caps[2]);
    }
    description.to_string()
}

/// Band name at the start of a description: up to the first comma, else the first
/// space, else the first three characters
pub fn short_name(description: &str) -> String {
    if let Some(pos) = description.find(',') {
        return description[..pos].to_string();
    }
    if let Some(pos) = description.find(' ') {
        return description[..pos].to_string();
    }
    description.chars().take(3).collect()
}

/// Finest-tier window mapped into a tier whose pixels are `factor` times larger
pub fn tier_window(window: &Window, factor: usize) -> SceneResult<Window> {
    window.validate()?;
    if factor == 0 || window.width() < factor || window.height() < factor {
        return Err(SceneError::InvalidRegion(format!(
            "Window {} is smaller than one {}x pixel",
            window, factor
        )));
    }
    let xmin = window.xmin / factor;
    let ymin = window.ymin / factor;
    Ok(Window {
        xmin,
        ymin,
        xmax: xmin + window.width() / factor - 1,
        ymax: ymin + window.height() / factor - 1,
    })
}

/// Tier dataset of the chosen zone: matched by zone identifier, else by position
pub fn choose_candidate<'a, R: RasterSource>(
    candidates: &'a [ZoneCandidate<R>],
    zone: &str,
    index: usize,
) -> Option<&'a ZoneCandidate<R>> {
    if !zone.is_empty() {
        if let Some(found) = candidates.iter().find(|c| c.zone.contains(zone)) {
            return Some(found);
        }
    }
    candidates.get(index)
}

/// Locate the tier's bands in a raster.
///
/// Returns (band index, short description) per canonical band, in canonical order.
pub fn match_bands<R: RasterSource + ?Sized>(
    raster: &R,
    tier: Tier,
    expected: &[&str],
) -> SceneResult<Vec<(usize, String)>> {
    let mut found: Vec<(String, usize, String)> = Vec::new();
    for index in 0..raster.band_count() {
        let description = short_description(&raster.band_description(index)?);
        let name = short_name(&description);
        if expected.contains(&name.as_str()) {
            found.push((name, index, description));
        }
    }

    let mismatch = || SceneError::BandMismatch {
        tier,
        expected: expected.iter().map(|b| b.to_string()).collect(),
        actual: found.iter().map(|(name, _, _)| name.clone()).collect(),
    };

    if found.len() != expected.len() {
        return Err(mismatch());
    }

    let mut ordered = Vec::with_capacity(expected.len());
    for band in expected {
        let mut matches = found.iter().filter(|(name, _, _)| name == band);
        match (matches.next(), matches.next()) {
            (Some((_, index, description)), None) => ordered.push((*index, description.clone())),
            _ => return Err(mismatch()),
        }
    }

    Ok(ordered)
}

/// Read, validate and calibrate one tier.
///
/// `window` is in finest-tier pixels and already aligned to this tier's factor.
pub fn load_tier<R: RasterSource>(
    platform: Platform,
    tier: Tier,
    window: &Window,
    candidates: &[ZoneCandidate<R>],
    zone: &str,
    index: usize,
    radiometry: &Radiometry,
) -> SceneResult<BandStack> {
    let expected = platform.bands(tier)?;
    let candidate = choose_candidate(candidates, zone, index).ok_or_else(|| SceneError::BandMismatch {
        tier,
        expected: expected.iter().map(|b| b.to_string()).collect(),
        actual: Vec::new(),
    })?;
    let raster = &candidate.raster;

    let matched = match_bands(raster, tier, expected)?;
    log::info!("Selected {}m bands: {}", tier, expected.join(" "));

    let local = tier_window(window, platform.upscaling_factor(tier)?)?;
    log::info!("Loading {}m data from {} window {}", tier, raster.name(), local);

    let mut data: BandCube = Array3::zeros((local.height(), local.width(), expected.len()));
    for (channel, (band_index, _)) in matched.iter().enumerate() {
        let image = raster.read_window(*band_index, &local)?;
        data.index_axis_mut(Axis(2), channel).assign(&image);
    }

    radiometry.apply_stack(expected, &mut data)?;

    Ok(BandStack {
        tier,
        bands: expected.iter().map(|b| b.to_string()).collect(),
        descriptions: expected
            .iter()
            .zip(matched)
            .map(|(band, (_, desc))| {
                // bare band names (Landsat band files) get the platform's label
                if desc == *band {
                    platform.band_description(band).map(str::to_string).unwrap_or(desc)
                } else {
                    desc
                }
            })
            .collect(),
        data,
    })
}
