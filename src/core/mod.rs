//! Core band alignment modules

pub mod band_stack;
pub mod coords;
pub mod geo;
pub mod pipeline;
pub mod platform;
pub mod radiometry;
pub mod region;

// Re-export main types
pub use band_stack::{load_tier, short_description, short_name, BandStack};
pub use coords::package_coordinates;
pub use geo::{lonlat_to_pixel, LonLatToPixel};
pub use pipeline::{assemble, LoadRequest, SceneBands, SceneRasters};
pub use platform::{Platform, PlatformConfig, TierSpec};
pub use radiometry::{LandsatRadiometry, Radiometry};
pub use region::{align_window, select_region, RegionSelection, ZoneCandidate};
