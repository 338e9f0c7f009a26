//! Scene input: descriptors, subdataset listings and raster access

pub mod metadata;
pub mod product;
pub mod raster;
pub mod scene;
pub mod subdatasets;

pub use metadata::{find_descriptor, MetadataGroup, MetadataNode, MtlParser};
pub use product::{ProductInfo, SceneId};
pub use raster::{BandFiles, GdalRaster, MemoryRaster, RasterSource};
pub use scene::{load_bands, SceneReader};
pub use subdatasets::{group_by_resolution, parse_subdataset_listing, SubdatasetGroups, SubdatasetRef};
