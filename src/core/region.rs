use crate::core::geo::LonLatToPixel;
use crate::io::raster::RasterSource;
use crate::types::{Region, SceneError, SceneResult, Tier, Window};

/// One UTM-zone flavour of a tier dataset
#[derive(Debug, Clone)]
pub struct ZoneCandidate<R> {
    /// Zone identifier, e.g. "UTM 31N"; empty when unknown
    pub zone: String,
    pub raster: R,
}

impl<R: RasterSource> ZoneCandidate<R> {
    pub fn new(zone: &str, raster: R) -> Self {
        Self {
            zone: zone.to_string(),
            raster,
        }
    }
}

/// Outcome of zone and window selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSelection {
    /// Window aligned to the coarsest served tier
    pub window: Window,
    /// Clamped window before alignment
    pub clamped: Window,
    pub zone: String,
    /// Position of the chosen candidate in the candidate list
    pub index: usize,
}

/// Factor between the coarsest and the finest of the served resolutions
pub fn alignment_factor(resolutions: &[Tier]) -> SceneResult<usize> {
    let finest = resolutions.iter().min().copied();
    let coarsest = resolutions.iter().max().copied();

    match (finest, coarsest) {
        (Some(finest), Some(coarsest)) if finest > 0 && coarsest % finest == 0 => {
            Ok((coarsest / finest) as usize)
        }
        _ => Err(SceneError::UnsupportedFormat(format!(
            "Resolutions {:?} are not integer multiples of the finest tier",
            resolutions
        ))),
    }
}

/// Clamp a corner pair to the raster, per axis.
///
/// Returns `None` when the box does not touch the raster at all.
pub fn clamp_region(x1: i64, y1: i64, x2: i64, y2: i64, size: (usize, usize)) -> Option<Window> {
    let (width, height) = (size.0 as i64, size.1 as i64);
    if width == 0 || height == 0 {
        return None;
    }

    let (lo_x, hi_x) = (x1.min(x2), x1.max(x2));
    let (lo_y, hi_y) = (y1.min(y2), y1.max(y2));
    if hi_x < 0 || lo_x > width - 1 || hi_y < 0 || lo_y > height - 1 {
        return None;
    }

    Some(Window {
        xmin: lo_x.clamp(0, width - 1) as usize,
        ymin: lo_y.clamp(0, height - 1) as usize,
        xmax: hi_x.clamp(0, width - 1) as usize,
        ymax: hi_y.clamp(0, height - 1) as usize,
    })
}

/// Window of the request inside one candidate's raster
pub fn candidate_window<R: RasterSource>(
    candidate: &ZoneCandidate<R>,
    region: Option<&Region>,
) -> SceneResult<Option<Window>> {
    let size = candidate.raster.size();

    match region {
        None => {
            if size.0 == 0 || size.1 == 0 {
                return Ok(None);
            }
            Ok(Some(Window::full(size.0, size.1)))
        }
        Some(Region::Pixel { x1, y1, x2, y2 }) => Ok(clamp_region(*x1, *y1, *x2, *y2, size)),
        Some(Region::LonLat { lon1, lat1, lon2, lat2 }) => {
            // pixel coordinates are zone specific
            let converter = LonLatToPixel::for_raster(&candidate.raster)?;
            let (x1, y1) = converter.to_pixel(*lon1, *lat1)?;
            let (x2, y2) = converter.to_pixel(*lon2, *lat2)?;
            Ok(clamp_region(x1, y1, x2, y2, size))
        }
    }
}

/// Expand a window outward to multiples of `mult`, staying on whole coarse pixels
pub fn align_window(window: &Window, mult: usize, size: (usize, usize)) -> SceneResult<Window> {
    if mult == 0 {
        return Err(SceneError::InvalidRegion("Alignment factor is zero".to_string()));
    }

    let align_axis = |lo: usize, hi: usize, extent: usize| -> Option<(usize, usize)> {
        let lo = lo / mult * mult;
        let mut hi = (hi + 1).div_ceil(mult) * mult - 1;
        let last_full = (extent / mult * mult).checked_sub(1)?;
        if hi > last_full {
            hi = last_full;
        }
        if hi < lo {
            return None;
        }
        Some((lo, hi))
    };

    let x = align_axis(window.xmin, window.xmax, size.0);
    let y = align_axis(window.ymin, window.ymax, size.1);

    match (x, y) {
        (Some((xmin, xmax)), Some((ymin, ymax))) => Ok(Window { xmin, ymin, xmax, ymax }),
        _ => Err(SceneError::InvalidRegion(format!(
            "Window {} collapses when aligned to {}-pixel blocks of a {}x{} raster",
            window, mult, size.0, size.1
        ))),
    }
}

/// Pick the UTM zone and pixel window to load.
///
/// A named `zone` selects the first candidate whose identifier contains it; otherwise
/// the candidate covering the largest area wins, the first one on ties.
pub fn select_region<R: RasterSource>(
    candidates: &[ZoneCandidate<R>],
    region: Option<&Region>,
    resolutions: &[Tier],
    zone: Option<&str>,
) -> SceneResult<RegionSelection> {
    let mult = alignment_factor(resolutions)?;
    let zone = zone.filter(|z| !z.is_empty());

    let mut best: Option<(usize, Option<Window>, usize)> = None;
    let mut named: Option<(usize, Option<Window>)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let window = candidate_window(candidate, region)?;
        let area = window.map(|w| w.area()).unwrap_or(0);
        log::debug!(
            "Zone candidate {} '{}' ({}): area {}",
            index,
            candidate.zone,
            candidate.raster.name(),
            area
        );

        if let Some(requested) = zone {
            if candidate.zone.contains(requested) {
                named = Some((index, window));
                break;
            }
        }

        if best.as_ref().map_or(true, |(_, _, largest)| area > *largest) {
            best = Some((index, window, area));
        }
    }

    let (index, window) = match (zone, named) {
        (_, Some(found)) => found,
        (Some(requested), None) => {
            return Err(SceneError::InvalidRegion(format!(
                "Zone '{}' not found among {} candidates",
                requested,
                candidates.len()
            )))
        }
        (None, None) => match best {
            Some((index, window, _)) => (index, window),
            None => {
                return Err(SceneError::UnsupportedFormat("No zone candidates".to_string()));
            }
        },
    };

    let candidate = &candidates[index];
    let clamped = window.ok_or_else(|| {
        SceneError::InvalidRegion(format!(
            "Region of interest does not overlap zone '{}'",
            candidate.zone
        ))
    })?;

    let aligned = align_window(&clamped, mult, candidate.raster.size())?;

    log::info!("Selected UTM zone: {}", candidate.zone);
    log::info!("Selected pixel region: {}", aligned);

    Ok(RegionSelection {
        window: aligned,
        clamped,
        zone: candidate.zone.clone(),
        index,
    })
}
