use crate::io::raster::RasterSource;
use crate::types::{GeoTransform, SceneError, SceneResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal_sys::OSRAxisMappingStrategy;

/// WGS84 longitude/latitude to pixel/line conversion for one raster
pub struct LonLatToPixel {
    transform: CoordTransform,
    geo_transform: GeoTransform,
}

impl LonLatToPixel {
    /// Build the conversion from the raster's projection and geotransform
    pub fn for_raster<R: RasterSource + ?Sized>(raster: &R) -> SceneResult<Self> {
        let wkt = raster.projection();
        if wkt.trim().is_empty() {
            return Err(SceneError::Projection(format!(
                "{} has no spatial reference",
                raster.name()
            )));
        }

        let target = SpatialRef::from_wkt(&wkt).map_err(|e| {
            SceneError::Projection(format!("Invalid spatial reference in {}: {}", raster.name(), e))
        })?;
        let source = SpatialRef::from_epsg(4326)
            .map_err(|e| SceneError::Projection(format!("WGS84 unavailable: {}", e)))?;

        // lon/lat order on both sides regardless of the CRS authority axis order
        source.set_axis_mapping_strategy(OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        target.set_axis_mapping_strategy(OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);

        let transform = CoordTransform::new(&source, &target).map_err(|e| {
            SceneError::Projection(format!("No transform WGS84 -> {}: {}", raster.name(), e))
        })?;

        Ok(Self {
            transform,
            geo_transform: raster.geo_transform()?,
        })
    }

    /// Convert to integer pixel coordinates, truncating toward zero
    pub fn to_pixel(&self, lon: f64, lat: f64) -> SceneResult<(i64, i64)> {
        let mut xs = [lon];
        let mut ys = [lat];
        let mut zs = [0.0];
        self.transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| SceneError::Projection(format!("Cannot project ({}, {}): {}", lon, lat, e)))?;

        let (x, y) = self
            .geo_transform
            .native_to_pixel(xs[0], ys[0])
            .ok_or_else(|| SceneError::Projection("Degenerate geotransform".to_string()))?;

        log::debug!("lon/lat ({}, {}) -> native ({:.3}, {:.3}) -> pixel ({:.3}, {:.3})", lon, lat, xs[0], ys[0], x, y);
        Ok((x as i64, y as i64))
    }
}

/// Convert one lon/lat pair to pixel/line in `raster`
pub fn lonlat_to_pixel<R: RasterSource + ?Sized>(lon: f64, lat: f64, raster: &R) -> SceneResult<(i64, i64)> {
    LonLatToPixel::for_raster(raster)?.to_pixel(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::raster::MemoryRaster;

    #[test]
    fn test_missing_projection() {
        let gt = GeoTransform::from_gdal([0.0, 10.0, 0.0, 0.0, 0.0, -10.0]);
        let raster = MemoryRaster::new("no-srs", 10, 10, gt, "");

        let result = lonlat_to_pixel(1.0, 1.0, &raster);
        assert!(matches!(result, Err(SceneError::Projection(_))));
    }

    #[test]
    fn test_geographic_raster() {
        let wkt = SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap();
        let gt = GeoTransform::from_gdal([10.0, 0.25, 0.0, 50.0, 0.0, -0.25]);
        let raster = MemoryRaster::new("wgs84", 40, 40, gt, &wkt);

        assert_eq!(lonlat_to_pixel(11.1, 48.9, &raster).unwrap(), (4, 4));
        // west of the origin truncates toward zero
        assert_eq!(lonlat_to_pixel(9.9, 49.9, &raster).unwrap(), (0, 0));
    }
}
