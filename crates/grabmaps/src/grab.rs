//! End-to-end helpers: presets, dry runs and tile inspection.

use std::path::{Path, PathBuf};

use grabmaps_core::{
    fit_axis_aligned, AxisAlignedFit, CalibrationError, CalibrationRecord, GeoRect, PollPolicy,
    ViewerProfile,
};
use grabmaps_session::{
    BoundsMode, DirectorySink, GeoRaster, GrabConfig, GrabError, GrabSession, SessionReport,
    SimOptions, SyntheticViewer,
};
use log::info;
use serde::{Deserialize, Serialize};

/// Built-in profile for a viewer mode.
pub fn preset_profile(mode: BoundsMode) -> ViewerProfile {
    match mode {
        BoundsMode::DirectBounds => ViewerProfile::direct_bounds(),
        BoundsMode::SampledCorners => ViewerProfile::sampled_corners(),
    }
}

pub fn preset_config(mode: BoundsMode) -> GrabConfig {
    GrabConfig {
        viewer: preset_profile(mode),
        ..GrabConfig::default()
    }
}

/// Synthetic map and viewer behavior for [`simulate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub mode: BoundsMode,
    /// PNG stretched over `extent`. A checkerboard is generated when unset.
    pub raster: Option<PathBuf>,
    /// Region covered by the synthetic map.
    pub extent: GeoRect,
    /// Raster size in pixels along each axis.
    pub raster_size: u32,
    /// Screen scale before the first zoom-in.
    pub lng_per_px: f64,
    pub lat_per_px: f64,
    pub settle_polls: u32,
    pub query_latency: u32,
    /// Keep the profile's sleep intervals instead of polling without delay.
    pub realtime: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            mode: BoundsMode::DirectBounds,
            raster: None,
            extent: GeoRect::new(51.0, 50.0, 11.0, 10.0),
            raster_size: 2048,
            lng_per_px: 1e-4,
            lat_per_px: 1e-4,
            settle_polls: 1,
            query_latency: 1,
            realtime: false,
        }
    }
}

/// Run `config` against a synthetic viewer and write the tiles to
/// `config.map_folder`.
pub fn simulate(config: &GrabConfig, params: &SimulationParams) -> Result<SessionReport, GrabError> {
    let mut config = config.clone();
    if !params.realtime {
        let viewer = &mut config.viewer;
        viewer.zoom_settle_ms = 0;
        viewer.settle = PollPolicy::new(viewer.settle.max_attempts, 0);
        viewer.query = PollPolicy::new(viewer.query.max_attempts, 0);
    }

    let raster = match &params.raster {
        Some(path) => GeoRaster::new(image::open(path)?.to_rgb8(), params.extent),
        None => GeoRaster::checkerboard(params.extent, params.raster_size, params.raster_size, 32),
    };
    let mut options = match params.mode {
        BoundsMode::DirectBounds => SimOptions::direct(params.lng_per_px, params.lat_per_px),
        BoundsMode::SampledCorners => SimOptions::sampled(params.lng_per_px, params.lat_per_px),
    };
    options.settle_polls = params.settle_polls;
    options.query_latency = params.query_latency;
    let view = SyntheticViewer::new(raster, config.viewer.clone(), options);

    let sink = DirectorySink::create(&config.map_folder)?;
    info!(
        "simulating `{}` ({:?}) into {}",
        config.map_name,
        params.mode,
        config.map_folder.display()
    );
    GrabSession::new(config, view, sink)?.run()
}

#[derive(thiserror::Error, Debug)]
pub enum InspectError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("anchor ({x}, {y}) lies outside the {width}x{height} image")]
    AnchorOutsideImage { x: u32, y: u32, width: u32, height: u32 },
}

/// What a saved tile's calibration says about it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileInspection {
    pub record: CalibrationRecord,
    /// Size of the image next to the `.gdm`, if present.
    pub image_size: Option<(u32, u32)>,
    pub fit: Option<AxisAlignedFit>,
}

/// Read a `.gdm` file and check it against its image.
pub fn inspect_tile(gdm_path: impl AsRef<Path>) -> Result<TileInspection, InspectError> {
    let gdm_path = gdm_path.as_ref();
    let record = CalibrationRecord::read_file(gdm_path)?;

    let image_path = gdm_path.with_file_name(&record.image_file_name);
    let image_size = if image_path.is_file() {
        let (width, height) = image::image_dimensions(&image_path)?;
        if let Some(p) = record.points.iter().find(|p| p.x >= width || p.y >= height) {
            return Err(InspectError::AnchorOutsideImage {
                x: p.x,
                y: p.y,
                width,
                height,
            });
        }
        Some((width, height))
    } else {
        None
    };

    let fit = fit_axis_aligned(&record.points);
    Ok(TileInspection {
        record,
        image_size,
        fit,
    })
}
