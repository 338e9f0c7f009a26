use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Scaled band value (reflectance or radiance)
pub type BandValue = f32;

/// 2D single-band raster (rows x cols)
pub type BandImage = Array2<BandValue>;

/// 3D band cube, channel last (rows x cols x bands)
pub type BandCube = Array3<BandValue>;

/// Resolution tier in meters (10, 20, 60 for Sentinel-2; 15, 30 for Landsat-8)
pub type Tier = u32;

/// Affine georeferencing parameters, in GDAL order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Shift the origin so that pixel (xmin, ymin) becomes (0, 0).
    ///
    /// Rotation terms are carried over unchanged; north-up rasters are assumed.
    pub fn translated(&self, xmin: usize, ymin: usize) -> Self {
        Self {
            top_left_x: self.top_left_x + xmin as f64 * self.pixel_width,
            top_left_y: self.top_left_y + ymin as f64 * self.pixel_height,
            ..*self
        }
    }

    /// Invert the linear part and map native coordinates to fractional pixel/line
    pub fn native_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let a = self.pixel_width;
        let b = self.rotation_x;
        let d = self.rotation_y;
        let e = self.pixel_height;

        let det = a * e - d * b;
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let xp = x - self.top_left_x;
        let yp = y - self.top_left_y;
        let det_inv = 1.0 / det;

        Some(((e * xp - b * yp) * det_inv, (-d * xp + a * yp) * det_inv))
    }
}

/// Inclusive pixel rectangle in the finest tier's pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct Window {
    pub xmin: usize,
    pub ymin: usize,
    pub xmax: usize,
    pub ymax: usize,
}

#[derive(Deserialize)]
struct WindowBounds {
    xmin: usize,
    ymin: usize,
    xmax: usize,
    ymax: usize,
}

impl TryFrom<WindowBounds> for Window {
    type Error = SceneError;

    fn try_from(b: WindowBounds) -> SceneResult<Self> {
        Window::new(b.xmin, b.ymin, b.xmax, b.ymax)
    }
}

impl Window {
    /// Checked constructor; min bounds must not exceed max bounds
    pub fn new(xmin: usize, ymin: usize, xmax: usize, ymax: usize) -> SceneResult<Self> {
        let window = Self { xmin, ymin, xmax, ymax };
        window.validate()?;
        Ok(window)
    }

    /// Fails with `InvalidRegion` for an inverted window
    pub fn validate(&self) -> SceneResult<()> {
        if self.xmin > self.xmax || self.ymin > self.ymax {
            return Err(SceneError::InvalidRegion(format!(
                "Inverted window xmin={}, ymin={}, xmax={}, ymax={}",
                self.xmin, self.ymin, self.xmax, self.ymax
            )));
        }
        Ok(())
    }

    /// Whole-raster window for a (width, height) extent. Extent must be non-empty.
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            xmin: 0,
            ymin: 0,
            xmax: width.saturating_sub(1),
            ymax: height.saturating_sub(1),
        }
    }

    /// Zero for an inverted window
    pub fn width(&self) -> usize {
        self.xmax.checked_sub(self.xmin).map_or(0, |d| d + 1)
    }

    pub fn height(&self) -> usize {
        self.ymax.checked_sub(self.ymin).map_or(0, |d| d + 1)
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn contains(&self, other: &Window) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && self.xmax >= other.xmax
            && self.ymax >= other.ymax
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "xmin={}, ymin={}, xmax={}, ymax={} ({}x{})",
            self.xmin,
            self.ymin,
            self.xmax,
            self.ymax,
            self.width(),
            self.height()
        )
    }
}

/// Region of interest requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Pixel bounds (x1, y1, x2, y2) in the finest tier, any corner order
    Pixel { x1: i64, y1: i64, x2: i64, y2: i64 },
    /// WGS84 bounds (lon1, lat1, lon2, lat2), any corner order
    LonLat { lon1: f64, lat1: f64, lon2: f64, lat2: f64 },
}

/// Georeferencing of a loaded window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatePackage {
    pub xmin: usize,
    pub ymin: usize,
    pub width: usize,
    pub height: usize,
    pub geotransform: GeoTransform,
    pub geoprojection: String,
}

/// Error types for scene loading
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata descriptor not found: {0}")]
    MetadataNotFound(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Error loading bands at {tier}m resolution. Expected band list: {expected:?}. Actual band list: {actual:?}")]
    BandMismatch {
        tier: Tier,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translated_geotransform() {
        let gt = GeoTransform::from_gdal([300000.0, 10.0, 0.0, 4600020.0, 0.0, -10.0]);
        let shifted = gt.translated(12, 30);

        assert_relative_eq!(shifted.top_left_x, 300120.0);
        assert_relative_eq!(shifted.top_left_y, 4599720.0);
        assert_eq!(shifted.pixel_width, 10.0);
        assert_eq!(shifted.pixel_height, -10.0);
    }

    #[test]
    fn test_native_to_pixel_with_rotation() {
        let gt = GeoTransform::from_gdal([100.0, 2.0, 0.5, 200.0, 0.25, -2.0]);
        // forward map of pixel (3, 4)
        let x = 100.0 + 3.0 * 2.0 + 4.0 * 0.5;
        let y = 200.0 + 3.0 * 0.25 + 4.0 * -2.0;

        let (px, py) = gt.native_to_pixel(x, y).unwrap();
        assert_relative_eq!(px, 3.0, epsilon = 1e-9);
        assert_relative_eq!(py, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_transform() {
        let gt = GeoTransform::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(gt.native_to_pixel(1.0, 1.0).is_none());
    }

    #[test]
    fn test_window_dimensions() {
        let w = Window { xmin: 6, ymin: 0, xmax: 17, ymax: 5 };
        assert_eq!(w.width(), 12);
        assert_eq!(w.height(), 6);
        assert_eq!(w.area(), 72);
        assert!(Window::full(20, 10).contains(&w));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        assert!(matches!(Window::new(10, 0, 4, 5), Err(SceneError::InvalidRegion(_))));
        assert!(Window::new(4, 0, 10, 5).is_ok());

        let inverted = Window { xmin: 10, ymin: 8, xmax: 4, ymax: 5 };
        assert_eq!(inverted.width(), 0);
        assert_eq!(inverted.area(), 0);
        assert!(inverted.validate().is_err());

        let parsed: Result<Window, _> = serde_json::from_str(r#"{"xmin": 9, "ymin": 0, "xmax": 3, "ymax": 2}"#);
        assert!(parsed.is_err());
        let parsed: Window = serde_json::from_str(r#"{"xmin": 3, "ymin": 0, "xmax": 9, "ymax": 2}"#).unwrap();
        assert_eq!(parsed.width(), 7);
    }
}
