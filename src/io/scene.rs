use crate::core::pipeline::{assemble, LoadRequest, SceneBands, SceneRasters};
use crate::core::platform::{Calibration, Platform};
use crate::core::radiometry::Radiometry;
use crate::core::region::ZoneCandidate;
use crate::io::metadata::{find_descriptor, MtlParser};
use crate::io::product::{ProductInfo, SceneId};
use crate::io::raster::{BandFiles, GdalRaster};
use crate::io::subdatasets::{group_by_resolution, parse_subdataset_listing, SubdatasetRef};
use crate::types::{SceneError, SceneResult, Tier};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A scene directory with its located metadata descriptor.
///
/// Rasters are only opened by [`SceneReader::load`] and closed before it returns.
#[derive(Debug, Clone)]
pub struct SceneReader {
    path: PathBuf,
    platform: Platform,
    descriptor: PathBuf,
    scene: Option<SceneId>,
}

impl SceneReader {
    /// Identify the platform from the directory name, or from the descriptor present
    pub fn open<P: AsRef<Path>>(scene_dir: P) -> SceneResult<Self> {
        let path = scene_dir.as_ref();
        let scene = SceneId::from_path(path);
        let platform = match &scene {
            Some(id) => id.platform,
            None => Self::detect_platform(path)?,
        };
        Self::with_scene(path, platform, scene)
    }

    /// Open a scene whose platform is already known
    pub fn with_platform<P: AsRef<Path>>(scene_dir: P, platform: Platform) -> SceneResult<Self> {
        let path = scene_dir.as_ref();
        Self::with_scene(path, platform, SceneId::from_path(path))
    }

    fn with_scene(path: &Path, platform: Platform, scene: Option<SceneId>) -> SceneResult<Self> {
        let descriptor = find_descriptor(path, &platform.descriptor_regex()?)?;
        log::info!("Opened {} scene {} ({})", platform, path.display(), descriptor.display());

        Ok(Self {
            path: path.to_path_buf(),
            platform,
            descriptor,
            scene,
        })
    }

    fn detect_platform(path: &Path) -> SceneResult<Platform> {
        for platform in [Platform::Sentinel2, Platform::Landsat8] {
            if find_descriptor(path, &platform.descriptor_regex()?).is_ok() {
                log::debug!("Detected {} from descriptor in {}", platform, path.display());
                return Ok(platform);
            }
        }
        Err(SceneError::MetadataNotFound(format!(
            "No Sentinel-2 or Landsat-8 descriptor in {}",
            path.display()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    pub fn scene(&self) -> Option<&SceneId> {
        self.scene.as_ref()
    }

    pub fn load(&self, request: &LoadRequest) -> SceneResult<SceneBands> {
        let mut bands = match self.platform {
            Platform::Sentinel2 => self.load_sentinel2(request)?,
            Platform::Landsat8 => self.load_landsat8(request)?,
        };
        bands.scene = self.scene.clone();
        Ok(bands)
    }

    fn served_tiers(&self, request: &LoadRequest) -> SceneResult<Vec<Tier>> {
        self.platform
            .tiers_up_to(request.max_res.unwrap_or_else(|| self.platform.coarsest()))
    }

    fn load_sentinel2(&self, request: &LoadRequest) -> SceneResult<SceneBands> {
        let product = ProductInfo::parse_file(&self.descriptor)?;
        if let (Some(q), Calibration::Reflectance { divisor }) =
            (product.quantification_value, self.platform.config().calibration)
        {
            if (q - divisor as f64).abs() > f64::EPSILON {
                log::warn!("Quantification value {} differs from divisor {}", q, divisor);
            }
        }

        let container = GdalRaster::open(&self.descriptor.to_string_lossy())?;
        let datasets = parse_subdataset_listing(&container.subdataset_entries());
        if datasets.is_empty() {
            return Err(SceneError::UnsupportedFormat(format!(
                "GDAL reports no subdatasets for {}",
                self.descriptor.display()
            )));
        }
        let groups = group_by_resolution(datasets, &self.platform.resolutions());

        let open_all = |refs: &[SubdatasetRef]| -> SceneResult<Vec<ZoneCandidate<GdalRaster>>> {
            refs.iter()
                .map(|ds| Ok(ZoneCandidate::new(&ds.zone(), GdalRaster::open(&ds.name)?)))
                .collect()
        };

        let mut zones = open_all(groups.tier(self.platform.finest()))?;
        zones.extend(open_all(groups.unknown.as_slice())?);

        let mut tiers = BTreeMap::new();
        for tier in self.served_tiers(request)? {
            tiers.insert(tier, open_all(groups.tier(tier))?);
        }

        let rasters = SceneRasters {
            platform: self.platform,
            zones,
            tiers,
        };
        let radiometry = Radiometry::for_platform(self.platform, None)?;

        let mut bands = assemble(&rasters, request, &radiometry)?;
        bands.product = Some(product);
        Ok(bands)
    }

    fn load_landsat8(&self, request: &LoadRequest) -> SceneResult<SceneBands> {
        let root = MtlParser::parse_file(&self.descriptor)?;
        let metadata = root.group_path(&["L1_METADATA_FILE"]).ok_or_else(|| {
            SceneError::Metadata(format!("No L1_METADATA_FILE group in {}", self.descriptor.display()))
        })?;

        let product_id = metadata.str_value(&["METADATA_FILE_INFO", "LANDSAT_PRODUCT_ID"])?;
        let zone = match metadata.str_value(&["PROJECTION_PARAMETERS", "UTM_ZONE"]) {
            Ok(z) => format!("UTM {}", z),
            Err(_) => String::new(),
        };

        let open_tier = |tier: Tier| -> SceneResult<Vec<ZoneCandidate<BandFiles<GdalRaster>>>> {
            let files = BandFiles::open(&self.path, &product_id, tier, self.platform.bands(tier)?)?;
            Ok(vec![ZoneCandidate::new(&zone, files)])
        };

        // the finest tier's band files double as the zone candidate
        let mut tiers = BTreeMap::new();
        for tier in self.served_tiers(request)? {
            tiers.insert(tier, open_tier(tier)?);
        }

        let rasters = SceneRasters {
            platform: self.platform,
            zones: Vec::new(),
            tiers,
        };
        let radiometry = Radiometry::for_platform(self.platform, Some(metadata))?;

        assemble(&rasters, request, &radiometry)
    }
}

/// Load the requested tiers of a scene directory.
///
/// Failures are logged with the scene path before being returned.
pub fn load_bands<P: AsRef<Path>>(scene_dir: P, request: &LoadRequest) -> SceneResult<SceneBands> {
    let path = scene_dir.as_ref();
    log::info!("Loading {}", path.display());

    let result = SceneReader::open(path).and_then(|reader| reader.load(request));
    if let Err(err) = &result {
        match err {
            SceneError::BandMismatch { tier, expected, actual } => log::error!(
                "Failed to load {}: {}m tier expected bands {:?}, found {:?}",
                path.display(),
                tier,
                expected,
                actual
            ),
            other => log::error!("Failed to load {}: {}", path.display(), other),
        }
    }
    result
}
