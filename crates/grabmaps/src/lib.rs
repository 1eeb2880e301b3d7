//! Facade crate for the `grabmaps-*` workspace.
//!
//! `grabmaps` captures overlapping, calibrated tiles of a map region from an
//! interactive map viewer, at several zoom levels, and writes each tile as a
//! PNG plus a GDM calibration file that an offline map tool can load.
//!
//! ## Quickstart
//!
//! ```no_run
//! use grabmaps::grab;
//! use grabmaps::session::{BoundsMode, GrabConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GrabConfig {
//!     zoom_steps: 2,
//!     ..grab::preset_config(BoundsMode::SampledCorners)
//! };
//! let report = grab::simulate(&config, &grab::SimulationParams::default())?;
//! println!("{} tiles in {}", report.tiles_written, config.map_folder.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `grabmaps::core`: coordinates, view bounds, GDM calibration records, viewer profiles.
//! - `grabmaps::session`: the viewer trait, discovery, traversal and the grab session.
//! - `grabmaps::grab`: end-to-end helpers used by the `grabmaps` binary.

pub use grabmaps_core as core;
pub use grabmaps_session as session;

pub use grabmaps_core::{CalibrationRecord, GeoBounds, GeoPoint, GeoRect, ViewerProfile};
pub use grabmaps_session::{
    BoundsMode, GrabConfig, GrabError, GrabSession, SessionReport, SessionStatus, ViewAdapter,
};

pub mod grab;
