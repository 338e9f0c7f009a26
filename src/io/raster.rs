//! Raster access behind a small trait so the alignment logic works the same on
//! GDAL datasets, per-band file sets and in-memory rasters.

use crate::types::{BandImage, GeoTransform, SceneError, SceneResult, Tier, Window};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Read-only view of a georeferenced multi-band raster
pub trait RasterSource {
    /// Identifier used in log messages (path or subdataset name)
    fn name(&self) -> &str;

    /// (width, height) in pixels
    fn size(&self) -> (usize, usize);

    fn geo_transform(&self) -> SceneResult<GeoTransform>;

    /// Projection as WKT; empty when the raster has none
    fn projection(&self) -> String;

    fn band_count(&self) -> usize;

    /// Description of a band, 0-based
    fn band_description(&self, band_index: usize) -> SceneResult<String>;

    /// Read a window of one band (0-based) at native sampling
    fn read_window(&self, band_index: usize, window: &Window) -> SceneResult<BandImage>;
}

fn check_window(name: &str, size: (usize, usize), window: &Window) -> SceneResult<()> {
    window.validate()?;
    let (width, height) = size;
    if window.xmax >= width || window.ymax >= height {
        return Err(SceneError::InvalidRegion(format!(
            "Window {} exceeds {}x{} raster {}",
            window, width, height, name
        )));
    }
    Ok(())
}

/// GDAL dataset or subdataset; closed when dropped
pub struct GdalRaster {
    name: String,
    dataset: Dataset,
}

impl GdalRaster {
    /// Open a file path or a GDAL subdataset name
    pub fn open(name: &str) -> SceneResult<Self> {
        log::debug!("Opening raster {}", name);
        let dataset = Dataset::open(Path::new(name))?;
        Ok(Self {
            name: name.to_string(),
            dataset,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Entries of the SUBDATASETS metadata domain, empty if there are none
    pub fn subdataset_entries(&self) -> Vec<String> {
        self.dataset.metadata_domain("SUBDATASETS").unwrap_or_default()
    }
}

impl RasterSource for GdalRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn geo_transform(&self) -> SceneResult<GeoTransform> {
        let gt = self.dataset.geo_transform().map_err(|e| {
            SceneError::Projection(format!("{} has no geotransform: {}", self.name, e))
        })?;
        Ok(GeoTransform::from_gdal(gt))
    }

    fn projection(&self) -> String {
        self.dataset.projection()
    }

    fn band_count(&self) -> usize {
        self.dataset.raster_count().max(0) as usize
    }

    fn band_description(&self, band_index: usize) -> SceneResult<String> {
        let band = self.dataset.rasterband(band_index as isize + 1)?;
        Ok(band.description()?)
    }

    fn read_window(&self, band_index: usize, window: &Window) -> SceneResult<BandImage> {
        check_window(&self.name, self.size(), window)?;

        let band = self.dataset.rasterband(band_index as isize + 1)?;
        let size = (window.width(), window.height());
        let buffer = band.read_as::<f32>(
            (window.xmin as isize, window.ymin as isize),
            size,
            size,
            None,
        )?;

        Array2::from_shape_vec((window.height(), window.width()), buffer.data)
            .map_err(|e| SceneError::Processing(format!("Failed to reshape band data: {}", e)))
    }
}

/// A tier made of one single-band file per band (Landsat layout).
///
/// Band `i` is band 1 of file `i`; its description is the canonical band name.
pub struct BandFiles<R: RasterSource> {
    name: String,
    bands: Vec<(String, R)>,
}

impl<R: RasterSource> BandFiles<R> {
    pub fn new(name: &str, bands: Vec<(String, R)>) -> SceneResult<Self> {
        let first = bands.first().ok_or_else(|| {
            SceneError::UnsupportedFormat(format!("No band files for {}", name))
        })?;

        let size = first.1.size();
        for (band, raster) in &bands {
            if raster.size() != size {
                return Err(SceneError::UnsupportedFormat(format!(
                    "Band {} ({}) is {:?}, expected {:?}",
                    band,
                    raster.name(),
                    raster.size(),
                    size
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            bands,
        })
    }

    fn first(&self) -> &R {
        &self.bands[0].1
    }
}

impl BandFiles<GdalRaster> {
    /// Open `<dir>/<prefix>_<band>.TIF` for each band, in order
    pub fn open(dir: &Path, prefix: &str, tier: Tier, bands: &[&str]) -> SceneResult<Self> {
        let mut opened: Vec<(String, GdalRaster)> = Vec::with_capacity(bands.len());
        for band in bands {
            let path: PathBuf = dir.join(format!("{}_{}.TIF", prefix, band));
            if !path.is_file() {
                return Err(SceneError::BandMismatch {
                    tier,
                    expected: bands.iter().map(|b| b.to_string()).collect(),
                    actual: opened.iter().map(|(b, _)| b.clone()).collect(),
                });
            }
            opened.push((band.to_string(), GdalRaster::open(&path.to_string_lossy())?));
        }
        Self::new(&dir.to_string_lossy(), opened)
    }
}

impl<R: RasterSource> RasterSource for BandFiles<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> (usize, usize) {
        self.first().size()
    }

    fn geo_transform(&self) -> SceneResult<GeoTransform> {
        self.first().geo_transform()
    }

    fn projection(&self) -> String {
        self.first().projection()
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_description(&self, band_index: usize) -> SceneResult<String> {
        self.bands
            .get(band_index)
            .map(|(band, _)| band.clone())
            .ok_or_else(|| SceneError::Processing(format!("No band {} in {}", band_index, self.name)))
    }

    fn read_window(&self, band_index: usize, window: &Window) -> SceneResult<BandImage> {
        let (_, raster) = self
            .bands
            .get(band_index)
            .ok_or_else(|| SceneError::Processing(format!("No band {} in {}", band_index, self.name)))?;
        raster.read_window(0, window)
    }
}

/// In-memory raster with named bands
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    pub name: String,
    pub geo_transform: GeoTransform,
    pub projection: String,
    pub bands: Vec<(String, BandImage)>,
    size: (usize, usize),
}

impl MemoryRaster {
    pub fn new(name: &str, width: usize, height: usize, geo_transform: GeoTransform, projection: &str) -> Self {
        Self {
            name: name.to_string(),
            geo_transform,
            projection: projection.to_string(),
            bands: Vec::new(),
            size: (width, height),
        }
    }

    /// Append a band; `data` must be (height, width)
    pub fn with_band(mut self, description: &str, data: BandImage) -> SceneResult<Self> {
        let (width, height) = self.size;
        if data.dim() != (height, width) {
            return Err(SceneError::Processing(format!(
                "Band {} is {:?}, raster is {}x{}",
                description,
                data.dim(),
                width,
                height
            )));
        }
        self.bands.push((description.to_string(), data));
        Ok(self)
    }
}

impl RasterSource for MemoryRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> (usize, usize) {
        self.size
    }

    fn geo_transform(&self) -> SceneResult<GeoTransform> {
        Ok(self.geo_transform)
    }

    fn projection(&self) -> String {
        self.projection.clone()
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_description(&self, band_index: usize) -> SceneResult<String> {
        self.bands
            .get(band_index)
            .map(|(desc, _)| desc.clone())
            .ok_or_else(|| SceneError::Processing(format!("No band {} in {}", band_index, self.name)))
    }

    fn read_window(&self, band_index: usize, window: &Window) -> SceneResult<BandImage> {
        check_window(&self.name, self.size, window)?;
        let (_, data) = self
            .bands
            .get(band_index)
            .ok_or_else(|| SceneError::Processing(format!("No band {} in {}", band_index, self.name)))?;

        Ok(data
            .slice(ndarray::s![window.ymin..=window.ymax, window.xmin..=window.xmax])
            .to_owned())
    }
}
