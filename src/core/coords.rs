use crate::io::raster::RasterSource;
use crate::types::{CoordinatePackage, SceneResult, Window};

/// Georeferencing of `window` inside the finest-tier raster.
///
/// The geotransform origin moves to the window's top-left corner; a window starting at
/// the raster origin keeps the raster's geotransform untouched.
pub fn package_coordinates<R: RasterSource + ?Sized>(window: &Window, raster: &R) -> SceneResult<CoordinatePackage> {
    window.validate()?;
    let geo = raster.geo_transform()?;
    let geotransform = if window.xmin == 0 && window.ymin == 0 {
        geo
    } else {
        geo.translated(window.xmin, window.ymin)
    };

    Ok(CoordinatePackage {
        xmin: window.xmin,
        ymin: window.ymin,
        width: window.width(),
        height: window.height(),
        geotransform,
        geoprojection: raster.projection(),
    })
}
