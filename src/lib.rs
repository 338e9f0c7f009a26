//! wqsat: multi-resolution band extraction for Sentinel-2 and Landsat-8 scenes
//!
//! Loads every resolution tier of a scene over one region of interest, with the
//! windows of all tiers covering exactly the same ground footprint, and returns the
//! georeferencing needed to write the results back out.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BandCube, BandImage, CoordinatePackage, GeoTransform, Region, SceneError, SceneResult, Tier, Window,
};

pub use crate::core::{BandStack, LoadRequest, Platform, SceneBands};
pub use io::{load_bands, SceneReader};

#[cfg(feature = "python")]
mod python {
    use crate::core::LoadRequest;
    use crate::types::{Region, SceneError};
    use numpy::IntoPyArray;
    use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    fn to_py_err(err: SceneError) -> PyErr {
        match err {
            SceneError::MetadataNotFound(_) => PyFileNotFoundError::new_err(err.to_string()),
            SceneError::InvalidRegion(_) | SceneError::BandMismatch { .. } => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }

    fn corners<T: Copy>(values: &[T], name: &str) -> PyResult<[T; 4]> {
        match values {
            [a, b, c, d] => Ok([*a, *b, *c, *d]),
            _ => Err(PyValueError::new_err(format!(
                "{} must have 4 values, got {}",
                name,
                values.len()
            ))),
        }
    }

    /// Load the bands of a scene.
    ///
    /// Returns a dict of resolution -> (H, W, N) float32 array and the coordinate dict.
    #[pyfunction]
    #[pyo3(signature = (tile_path, roi_x_y=None, roi_lon_lat=None, max_res=None, select_utm=None))]
    fn load_bands(
        py: Python<'_>,
        tile_path: String,
        roi_x_y: Option<Vec<i64>>,
        roi_lon_lat: Option<Vec<f64>>,
        max_res: Option<u32>,
        select_utm: Option<String>,
    ) -> PyResult<(PyObject, PyObject)> {
        let mut request = LoadRequest {
            max_res,
            select_zone: select_utm,
            ..LoadRequest::default()
        };
        if let Some(values) = roi_lon_lat {
            let [lon1, lat1, lon2, lat2] = corners(&values, "roi_lon_lat")?;
            request.region = Some(Region::LonLat { lon1, lat1, lon2, lat2 });
        } else if let Some(values) = roi_x_y {
            let [x1, y1, x2, y2] = corners(&values, "roi_x_y")?;
            request.region = Some(Region::Pixel { x1, y1, x2, y2 });
        }

        let bands = py
            .allow_threads(|| crate::io::load_bands(&tile_path, &request))
            .map_err(to_py_err)?;

        let arrays = PyDict::new(py);
        for (tier, stack) in bands.stacks {
            arrays.set_item(tier, stack.data.into_pyarray(py))?;
        }

        let coords = PyDict::new(py);
        coords.set_item("xmin", bands.coords.xmin)?;
        coords.set_item("ymin", bands.coords.ymin)?;
        coords.set_item("width", bands.coords.width)?;
        coords.set_item("height", bands.coords.height)?;
        let gt = bands.coords.geotransform.to_gdal();
        coords.set_item("geotransform", (gt[0], gt[1], gt[2], gt[3], gt[4], gt[5]))?;
        coords.set_item("geoprojection", bands.coords.geoprojection)?;
        coords.set_item("utm_zone", bands.zone)?;

        Ok((arrays.into(), coords.into()))
    }

    /// Python module definition
    #[pymodule]
    fn wqsat(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(load_bands, m)?)?;
        Ok(())
    }
}
