use approx::assert_relative_eq;
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use wqsat::core::pipeline::{assemble, SceneRasters};
use wqsat::core::radiometry::Radiometry;
use wqsat::core::region::ZoneCandidate;
use wqsat::io::{MemoryRaster, MtlParser};
use wqsat::{load_bands, GeoTransform, LoadRequest, Platform, Region, SceneError, Tier};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Raster whose pixel values encode (band position, row, col) so reads can be traced
fn tier_raster(tier: Tier, size: usize, descriptions: &[String]) -> MemoryRaster {
    let gt = GeoTransform::from_gdal([600000.0, tier as f64, 0.0, 5000040.0, 0.0, -(tier as f64)]);
    let mut raster = MemoryRaster::new(&format!("{}m", tier), size, size, gt, "PROJCS[\"WGS 84 / UTM zone 31N\"]");
    for (i, desc) in descriptions.iter().enumerate() {
        let data = Array2::from_shape_fn((size, size), |(r, c)| (i * 1_000_000 + r * 1000 + c) as f32);
        raster = raster.with_band(desc, data).unwrap();
    }
    raster
}

fn gdal_descriptions(bands: &[&str]) -> Vec<String> {
    bands
        .iter()
        .map(|b| format!("{}, central wavelength 500 nm", b))
        .collect()
}

fn synthetic_scene(platform: Platform, finest_size: usize) -> SceneRasters<MemoryRaster> {
    let mut tiers = BTreeMap::new();
    for tier in platform.resolutions() {
        let factor = platform.upscaling_factor(tier).unwrap();
        let descriptions = gdal_descriptions(platform.bands(tier).unwrap());
        tiers.insert(
            tier,
            vec![ZoneCandidate::new("UTM 31N", tier_raster(tier, finest_size / factor, &descriptions))],
        );
    }
    let finest = platform.finest();
    let zone_raster = tier_raster(finest, finest_size, &gdal_descriptions(platform.bands(finest).unwrap()));
    SceneRasters {
        platform,
        zones: vec![ZoneCandidate::new("UTM 31N", zone_raster)],
        tiers,
    }
}

const LANDSAT_PRODUCT_ID: &str = "LC08_L1TP_199032_20150101_20170415_01_T1";

/// Single-band UInt16 GeoTIFF in UTM 31N with its top-left corner at (399000, 4800000)
fn write_band_file(path: &Path, size: usize, pixel: f64, value: impl Fn(usize, usize) -> u16) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<u16, _>(path, size as isize, size as isize, 1)
        .unwrap();
    dataset
        .set_geo_transform(&[399000.0, pixel, 0.0, 4800000.0, 0.0, -pixel])
        .unwrap();
    dataset.set_spatial_ref(&SpatialRef::from_epsg(32631).unwrap()).unwrap();

    let data: Vec<u16> = (0..size * size).map(|i| value(i / size, i % size)).collect();
    let mut band = dataset.rasterband(1).unwrap();
    band.write((0, 0), (size, size), &Buffer::new((size, size), data)).unwrap();
}

/// Landsat scene directory: MTL file, 40x40 panchromatic band and 20x20 multispectral bands
fn write_landsat_scene(root: &Path) -> std::path::PathBuf {
    let dir = root.join(LANDSAT_PRODUCT_ID);
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join(format!("{}_MTL.txt", LANDSAT_PRODUCT_ID)), landsat_mtl()).unwrap();

    let band_path = |band: &str| dir.join(format!("{}_{}.TIF", LANDSAT_PRODUCT_ID, band));
    write_band_file(&band_path("B8"), 40, 15.0, |r, c| (r * 40 + c + 1) as u16);
    for (i, band) in Platform::Landsat8.bands(30).unwrap().iter().enumerate() {
        write_band_file(&band_path(band), 20, 30.0, |r, c| ((i + 1) * 2000 + r * 40 + c) as u16);
    }
    dir
}

fn landsat_mtl() -> String {
    let mut groups = String::new();
    let mut rescaling = String::new();
    let mut rad_max = String::new();
    let mut ref_max = String::new();
    for n in 1..=11 {
        rescaling.push_str(&format!("    RADIANCE_MULT_BAND_{} = 1.0E-02\n    RADIANCE_ADD_BAND_{} = 0.0\n", n, n));
        rad_max.push_str(&format!("    RADIANCE_MAXIMUM_BAND_{} = 500.0\n", n));
        ref_max.push_str(&format!("    REFLECTANCE_MAXIMUM_BAND_{} = 1.0\n", n));
    }
    groups.push_str("GROUP = L1_METADATA_FILE\n");
    groups.push_str(&format!(
        "  GROUP = METADATA_FILE_INFO\n    LANDSAT_PRODUCT_ID = \"{}\"\n  END_GROUP = METADATA_FILE_INFO\n",
        LANDSAT_PRODUCT_ID
    ));
    groups.push_str("  GROUP = PROJECTION_PARAMETERS\n    MAP_PROJECTION = \"UTM\"\n    UTM_ZONE = 31\n  END_GROUP = PROJECTION_PARAMETERS\n");
    groups.push_str("  GROUP = IMAGE_ATTRIBUTES\n    SUN_ELEVATION = 90.0\n    EARTH_SUN_DISTANCE = 1.0\n  END_GROUP = IMAGE_ATTRIBUTES\n");
    groups.push_str(&format!("  GROUP = MIN_MAX_RADIANCE\n{}  END_GROUP = MIN_MAX_RADIANCE\n", rad_max));
    groups.push_str(&format!("  GROUP = MIN_MAX_REFLECTANCE\n{}  END_GROUP = MIN_MAX_REFLECTANCE\n", ref_max));
    groups.push_str(&format!("  GROUP = RADIOMETRIC_RESCALING\n{}  END_GROUP = RADIOMETRIC_RESCALING\n", rescaling));
    groups.push_str("  GROUP = TIRS_THERMAL_CONSTANTS\n");
    groups.push_str("    K1_CONSTANT_BAND_10 = 774.8853\n    K2_CONSTANT_BAND_10 = 1321.0789\n");
    groups.push_str("    K1_CONSTANT_BAND_11 = 480.8883\n    K2_CONSTANT_BAND_11 = 1201.1442\n");
    groups.push_str("  END_GROUP = TIRS_THERMAL_CONSTANTS\n");
    groups.push_str("END_GROUP = L1_METADATA_FILE\nEND\n");
    groups
}

#[test]
fn test_tier_shapes_cover_same_footprint() {
    init_logging();

    let scene = synthetic_scene(Platform::Sentinel2, 120);
    let request = LoadRequest::default().with_region(Region::Pixel { x1: 7, y1: 13, x2: 50, y2: 40 });
    let bands = assemble(&scene, &request, &Radiometry::Scale { divisor: 1.0 }).unwrap();

    // aligned to 6-pixel blocks: x 6..=53, y 12..=41
    assert_eq!(bands.coords.xmin, 6);
    assert_eq!(bands.coords.ymin, 12);
    assert_eq!(bands.coords.width, 48);
    assert_eq!(bands.coords.height, 30);

    let w10 = bands.stack(10).unwrap().width();
    let w20 = bands.stack(20).unwrap().width();
    let w60 = bands.stack(60).unwrap().width();
    assert_eq!(w20, w10 * 10 / 20);
    assert_eq!(w60, w10 * 10 / 60);
    assert_eq!(bands.stack(60).unwrap().height(), 5);

    // first pixel of each tier is the window origin divided by the tier factor
    assert_eq!(bands.stack(10).unwrap().band("B4").unwrap()[[0, 0]], (12 * 1000 + 6) as f32);
    assert_eq!(bands.stack(20).unwrap().band("B5").unwrap()[[0, 0]], (6 * 1000 + 3) as f32);
    assert_eq!(bands.stack(60).unwrap().band("B1").unwrap()[[0, 0]], (2 * 1000 + 1) as f32);
}

#[test]
fn test_geotransform_follows_window() {
    init_logging();

    let scene = synthetic_scene(Platform::Sentinel2, 120);
    let request = LoadRequest::default().with_region(Region::Pixel { x1: 7, y1: 13, x2: 50, y2: 40 });
    let bands = assemble(&scene, &request, &Radiometry::Scale { divisor: 1.0 }).unwrap();

    assert_eq!(
        bands.coords.geotransform.to_gdal(),
        [600060.0, 10.0, 0.0, 4999920.0, 0.0, -10.0]
    );
    assert_eq!(bands.coords.geoprojection, "PROJCS[\"WGS 84 / UTM zone 31N\"]");
}

#[test]
fn test_channels_follow_canonical_order() {
    init_logging();

    let platform = Platform::Sentinel2;
    let mut scene = synthetic_scene(platform, 12);
    // deliver the 10 m bands as B8, B2, B3, B4
    let shuffled = gdal_descriptions(&["B8", "B2", "B3", "B4"]);
    scene.tiers.insert(10, vec![ZoneCandidate::new("UTM 31N", tier_raster(10, 12, &shuffled))]);

    let bands = assemble(&scene, &LoadRequest::default(), &Radiometry::Scale { divisor: 1.0 }).unwrap();
    let stack = bands.stack(10).unwrap();
    assert_eq!(stack.bands, vec!["B4", "B3", "B2", "B8"]);
    // B4 was the fourth source band, B8 the first
    assert_eq!(stack.data[[0, 0, 0]], 3_000_000.0);
    assert_eq!(stack.data[[0, 0, 3]], 0.0);
    assert_eq!(stack.descriptions[0], "B4 (500 nm)");
}

#[test]
fn test_max_res_20_loads_two_tiers() {
    init_logging();

    let scene = synthetic_scene(Platform::Sentinel2, 60);
    let request = LoadRequest::default().with_max_res(20);
    let bands = assemble(&scene, &request, &Radiometry::Scale { divisor: 10000.0 }).unwrap();

    assert_eq!(bands.tiers(), vec![10, 20]);
    assert!(bands.stack(60).is_none());
    // alignment only needs 2-pixel blocks without the 60 m tier
    assert_eq!(bands.coords.width, 60);
}

#[test]
fn test_missing_tier_band_fails_whole_load() {
    init_logging();

    let mut scene = synthetic_scene(Platform::Sentinel2, 60);
    let partial = gdal_descriptions(&["B5", "B6", "B7", "B11", "B12"]);
    scene.tiers.insert(20, vec![ZoneCandidate::new("UTM 31N", tier_raster(20, 30, &partial))]);

    match assemble(&scene, &LoadRequest::default(), &Radiometry::Scale { divisor: 10000.0 }) {
        Err(SceneError::BandMismatch { tier, expected, actual }) => {
            assert_eq!(tier, 20);
            assert_eq!(expected, vec!["B5", "B6", "B7", "B8A", "B11", "B12"]);
            assert_eq!(actual, vec!["B5", "B6", "B7", "B11", "B12"]);
        }
        other => panic!("expected BandMismatch, got {:?}", other.map(|b| b.tiers())),
    }
}

#[test]
fn test_landsat_reflectance_and_brightness_temperature() {
    init_logging();

    let root = MtlParser::parse(&landsat_mtl()).unwrap();
    let metadata = root.group_path(&["L1_METADATA_FILE"]).unwrap();
    let radiometry = Radiometry::for_platform(Platform::Landsat8, Some(metadata)).unwrap();

    let scene = synthetic_scene(Platform::Landsat8, 8);
    let request = LoadRequest {
        brightness_temperature: true,
        ..LoadRequest::default()
    };
    let bands = assemble(&scene, &request, &radiometry).unwrap();
    assert_eq!(bands.tiers(), vec![15, 30]);
    assert_eq!(bands.stack(30).unwrap().data.dim(), (4, 4, 10));

    // sun at zenith, d = 1: reflectance = L * ref_max / rad_max = DN * 0.01 / 500
    let b1 = bands.stack(30).unwrap().band("B1").unwrap();
    assert_relative_eq!(b1[[1, 2]], (1002.0f32 * 0.01) / 500.0, epsilon = 1e-6);

    // thermal bands stay in radiance
    let b10 = bands.stack(30).unwrap().band("B10").unwrap();
    assert_relative_eq!(b10[[1, 2]], 8_001_002.0f32 * 0.01, max_relative = 1e-5);

    let temperatures = bands.brightness_temperature.as_ref().unwrap();
    assert_eq!(temperatures.keys().collect::<Vec<_>>(), vec!["B10", "B11"]);
    let expected = 1321.0789 / (774.8853f64 / (8_001_002.0f64 * 0.01) + 1.0).ln();
    assert_relative_eq!(temperatures["B10"][[1, 2]] as f64, expected, max_relative = 1e-5);
}

#[test]
fn test_missing_descriptor_is_reported_first() {
    init_logging();

    let dir = TempDir::new().unwrap();
    // band files alone are not a scene
    std::fs::write(dir.path().join("LC08_L1TP_199032_20150101_20170415_01_T1_B8.TIF"), b"").unwrap();

    let result = load_bands(dir.path(), &LoadRequest::default());
    assert!(matches!(result, Err(SceneError::MetadataNotFound(_))));
}

#[test]
fn test_landsat_scene_from_band_files() {
    init_logging();

    let root = TempDir::new().unwrap();
    let scene_dir = write_landsat_scene(root.path());

    let request = LoadRequest {
        region: Some(Region::Pixel { x1: 5, y1: 9, x2: 30, y2: 20 }),
        brightness_temperature: true,
        ..LoadRequest::default()
    };
    let bands = load_bands(&scene_dir, &request).unwrap();

    assert_eq!(bands.platform, Platform::Landsat8);
    assert_eq!(bands.zone, "UTM 31");
    assert_eq!(bands.tiers(), vec![15, 30]);

    // aligned to 2-pixel blocks: x 4..=31, y 8..=21 in 15 m pixels
    let pan = bands.stack(15).unwrap();
    let multi = bands.stack(30).unwrap();
    assert_eq!(pan.data.dim(), (14, 28, 1));
    assert_eq!(multi.data.dim(), (7, 14, 10));

    // rows read in file order: 15 m (2, 3) is file pixel (10, 7)
    let dn = (10 * 40 + 7 + 1) as f32;
    assert_relative_eq!(pan.band("B8").unwrap()[[2, 3]], dn * 0.01 / 500.0, max_relative = 1e-5);
    // 30 m (1, 2) is file pixel (5, 4)
    let dn = (2000 + 5 * 40 + 4) as f32;
    assert_relative_eq!(multi.band("B1").unwrap()[[1, 2]], dn * 0.01 / 500.0, max_relative = 1e-5);
    let dn = (9 * 2000 + 5 * 40 + 4) as f32;
    assert_relative_eq!(multi.band("B10").unwrap()[[1, 2]], dn * 0.01, max_relative = 1e-5);

    assert_eq!(bands.coords.xmin, 4);
    assert_eq!(bands.coords.ymin, 8);
    assert_eq!(bands.coords.width, 28);
    assert_eq!(bands.coords.height, 14);
    assert_eq!(
        bands.coords.geotransform.to_gdal(),
        [399060.0, 15.0, 0.0, 4799880.0, 0.0, -15.0]
    );
    assert!(bands.coords.geoprojection.contains("UTM zone 31N"));

    let temperatures = bands.brightness_temperature.as_ref().unwrap();
    assert_eq!(temperatures["B11"].dim(), (7, 14));
    assert!(bands.scene.is_some());
}
