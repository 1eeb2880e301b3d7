//! Driving a map viewer through a calibrated tile grab.
//!
//! A [`GrabSession`] captures a reference view, then zooms in step by step
//! and covers the reference extent with overlapping tiles at each level.
//! Viewers plug in through [`ViewAdapter`]; tiles go to a [`TileSink`].
//!
//! ```no_run
//! use grabmaps_core::{GeoRect, ViewerProfile};
//! use grabmaps_session::{
//!     DirectorySink, GeoRaster, GrabConfig, GrabSession, SimOptions, SyntheticViewer,
//! };
//!
//! let config = GrabConfig {
//!     map_name: "Demo".into(),
//!     zoom_steps: 2,
//!     viewer: ViewerProfile::direct_bounds(),
//!     ..GrabConfig::default()
//! };
//! let raster = GeoRaster::checkerboard(GeoRect::new(51.0, 50.0, 11.0, 10.0), 2048, 2048, 32);
//! let view = SyntheticViewer::new(raster, config.viewer.clone(), SimOptions::direct(1e-4, 1e-4));
//! let sink = DirectorySink::create(&config.map_folder)?;
//! let report = GrabSession::new(config, view, sink)?.run()?;
//! println!("{} tiles", report.tiles_written);
//! # Ok::<(), grabmaps_session::GrabError>(())
//! ```

mod capture;
mod discovery;
mod driver;
mod error;
mod session;
mod sim;
mod sink;
mod traversal;
mod view;

pub use capture::{check_tile, crop_frame};
pub use discovery::{DiscoveredExtent, ExtentDiscoverer, DEFAULT_MAX_SLICES};
pub use driver::ViewDriver;
pub use error::{ConfigError, GrabError, ViewError};
pub use session::{
    GrabConfig, GrabSession, LevelReport, SessionHandle, SessionReport, SessionState,
    SessionStatus, StatusCallback,
};
pub use sim::{GeoRaster, SimOptions, SimStats, SyntheticViewer};
pub use sink::{DirectorySink, MemorySink, StoredTile, TileArtifact, TileSink};
pub use traversal::{
    rewind_step_count, Cell, DirectPlan, PlanStep, SerpentinePlan, Strategy, TileProbe,
};
pub use view::{BoundsMode, CancelToken, PanDirection, ReportedBounds, ViewAdapter};
