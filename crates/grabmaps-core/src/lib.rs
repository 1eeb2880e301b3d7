//! Core types for grabbing calibrated map tiles from a map viewer.
//!
//! This crate is purely geometric. It knows how a captured view maps pixels
//! to coordinates, how that mapping is recorded next to a saved tile, and
//! which fixed constants describe a viewer. It does not drive any viewer.

mod bounds;
mod calibration;
mod fit;
mod geo;
mod logger;
mod profile;

pub use bounds::{center_pixel, sample_pixels, CornerSamples, GeoBounds, MapGeometry};
pub use calibration::{CalibrationError, CalibrationPoint, CalibrationRecord, GDM_VERSION};
pub use fit::{fit_axis_aligned, AxisAlignedFit};
pub use geo::{GeoError, GeoPoint, GeoRect};
pub use profile::{
    CaptureMargins, PollPolicy, ProfileError, ProfileIoError, ViewerProfile, MAX_FRAME_SIDE,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, DEFAULT_FILTER};

/// Base name of a tile: `{map_name}_{zoom}_{x}_{y}`.
pub fn tile_file_stem(map_name: &str, zoom_step: u32, x: u32, y: u32) -> String {
    format!("{map_name}_{zoom_step}_{x}_{y}")
}
