//! The grab session: reference capture, zoom loop and per-level traversal.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use grabmaps_core::{tile_file_stem, CalibrationRecord, GeoBounds, GeoPoint, ViewerProfile};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::discovery::{DiscoveredExtent, ExtentDiscoverer};
use crate::driver::ViewDriver;
use crate::error::{ConfigError, GrabError};
use crate::sink::{TileArtifact, TileSink};
use crate::traversal::{Cell, DirectPlan, SerpentinePlan, Strategy, TileProbe};
use crate::view::{CancelToken, PanDirection, ViewAdapter};

fn default_map_folder() -> PathBuf {
    PathBuf::from("maps")
}

fn default_map_name() -> String {
    "Map".to_string()
}

fn default_zoom_steps() -> u32 {
    1
}

/// Everything a session needs besides the viewer itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrabConfig {
    #[serde(default = "default_map_folder")]
    pub map_folder: PathBuf,
    #[serde(default = "default_map_name")]
    pub map_name: String,
    /// Zoom-ins applied after the reference before any level is captured.
    #[serde(default)]
    pub initial_zoom: u32,
    /// Zoom levels captured below the reference.
    #[serde(default = "default_zoom_steps")]
    pub zoom_steps: u32,
    #[serde(default = "ViewerProfile::direct_bounds")]
    pub viewer: ViewerProfile,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            map_folder: default_map_folder(),
            map_name: default_map_name(),
            initial_zoom: 0,
            zoom_steps: default_zoom_steps(),
            viewer: ViewerProfile::direct_bounds(),
        }
    }
}

impl GrabConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_name.trim().is_empty() {
            return Err(ConfigError::EmptyMapName);
        }
        self.viewer.validate()?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Where a session currently is. Zoom step 0 is the reference view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Positioning { zoom_step: u32 },
    CapturingReference,
    ZoomingIn { zoom_step: u32 },
    Discovering { zoom_step: u32 },
    PlanningGrid { zoom_step: u32 },
    Traversing { zoom_step: u32 },
    Done,
    Cancelled,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Cancelled,
}

/// Summary of one captured zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelReport {
    pub zoom_step: u32,
    pub strategy: Strategy,
    pub slices_x: u32,
    pub slices_y: u32,
    pub tiles: u32,
    pub pans: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub status: SessionStatus,
    pub map_name: String,
    pub tiles_written: u32,
    /// Bounds of the reference tile, if it was captured.
    pub reference: Option<GeoBounds>,
    /// Completed levels. A cancelled level is not listed.
    pub levels: Vec<LevelReport>,
}

pub type StatusCallback = Box<dyn FnMut(&str) + Send>;

/// Drives one viewer through a complete grab.
///
/// The reference view is captured as zoom step 0. Each later step zooms in
/// once, moves to the reference's upper-left corner and covers the
/// reference extent with tiles. Cancellation is checked after every pan and
/// every capture; a cancelled run returns `Ok` with
/// [`SessionStatus::Cancelled`] and keeps the tiles already written.
pub struct GrabSession<V, S> {
    config: GrabConfig,
    driver: ViewDriver<V>,
    sink: S,
    state: SessionState,
    on_status: Option<StatusCallback>,
    reference: Option<GeoBounds>,
    levels: Vec<LevelReport>,
    tiles_written: u32,
}

impl<V: ViewAdapter, S: TileSink> GrabSession<V, S> {
    pub fn new(config: GrabConfig, view: V, sink: S) -> Result<Self, GrabError> {
        config.validate()?;
        let driver = ViewDriver::new(view, config.viewer.clone(), CancelToken::new());
        Ok(Self {
            config,
            driver,
            sink,
            state: SessionState::Idle,
            on_status: None,
            reference: None,
            levels: Vec::new(),
            tiles_written: 0,
        })
    }

    /// Share an externally created stop flag.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.driver = self.driver.with_cancel_token(cancel);
        self
    }

    /// Receive the one-line progress texts a UI would show.
    pub fn on_status(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_status = Some(Box::new(callback));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.driver.cancel_token().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &GrabConfig {
        &self.config
    }

    pub fn view(&self) -> &V {
        self.driver.view()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (V, S) {
        (self.driver.into_view(), self.sink)
    }

    /// Run the session to completion, cancellation or the first fatal error.
    ///
    /// The viewer is released on every path.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip(self), fields(map = %self.config.map_name))
    )]
    pub fn run(&mut self) -> Result<SessionReport, GrabError> {
        let result = self.run_levels();
        self.driver.release();
        match result {
            Ok(()) => {
                self.state = SessionState::Done;
                info!(
                    "grab of `{}` finished: {} tiles",
                    self.config.map_name, self.tiles_written
                );
                self.status("Finished.");
                Ok(self.report(SessionStatus::Completed))
            }
            Err(GrabError::Cancelled) => {
                self.state = SessionState::Cancelled;
                info!(
                    "grab of `{}` cancelled after {} tiles",
                    self.config.map_name, self.tiles_written
                );
                self.status("Cancelled.");
                Ok(self.report(SessionStatus::Cancelled))
            }
            Err(e) => {
                self.state = SessionState::Failed;
                error!("grab of `{}` failed: {e}", self.config.map_name);
                self.status(&format!("Error: {e}"));
                Err(e)
            }
        }
    }

    fn run_levels(&mut self) -> Result<(), GrabError> {
        let zoom_steps = self.config.zoom_steps;

        self.state = SessionState::Positioning { zoom_step: 0 };
        self.driver.wait_settled()?;
        self.driver.cancel_token().checkpoint()?;

        self.state = SessionState::CapturingReference;
        self.status(&format!("Grabbing: z=0/{zoom_steps} => x=0/0, y=0/0 (0%)..."));
        let reference = self.grab_tile(0, Cell::new(0, 0))?;
        self.reference = Some(reference);
        info!(
            "reference: N {:.6} S {:.6} E {:.6} W {:.6}",
            reference.north(),
            reference.south(),
            reference.east(),
            reference.west()
        );

        if zoom_steps == 0 {
            return Ok(());
        }

        for _ in 0..self.config.initial_zoom {
            self.state = SessionState::ZoomingIn { zoom_step: 0 };
            self.status("Setting initial zoom...");
            self.driver.zoom_in()?;
        }

        for zoom_step in 1..=zoom_steps {
            self.state = SessionState::ZoomingIn { zoom_step };
            self.status("Zooming in...");
            self.driver.zoom_in()?;

            self.state = SessionState::Positioning { zoom_step };
            self.status("Going to upper left corner...");
            self.driver
                .move_to(GeoPoint::new(reference.west(), reference.north()))?;

            let level = self.grab_level(zoom_step, &reference)?;
            info!(
                "zoom step {zoom_step}: {}x{} tiles, {} pans",
                level.slices_x, level.slices_y, level.pans
            );
            self.levels.push(level);
        }
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "info", skip(self, reference))
    )]
    fn grab_level(&mut self, zoom_step: u32, reference: &GeoBounds) -> Result<LevelReport, GrabError> {
        let pans_before = self.driver.pans();
        let edges = reference.edges();

        let (strategy, slices_x, slices_y, tiles) = if self.driver.view().supports_pan_to() {
            self.state = SessionState::PlanningGrid { zoom_step };
            let start = self.driver.read_bounds()?;
            let viewer = &self.config.viewer;
            let plan = DirectPlan::new(&edges, &start, viewer.overlap_x, viewer.overlap_y);
            debug!(
                "direct plan {}x{}, offsets ({:.6}, {:.6})",
                plan.slices_x, plan.slices_y, plan.x_offset, plan.y_offset
            );

            self.state = SessionState::Traversing { zoom_step };
            let mut probe = LevelProbe::new(self, zoom_step);
            probe.grid = Some((plan.slices_x, plan.slices_y));
            plan.execute(&mut probe)?;
            (
                Strategy::DirectAddressing,
                plan.slices_x,
                plan.slices_y,
                probe.captured,
            )
        } else {
            self.state = SessionState::Discovering { zoom_step };
            let mut probe = LevelProbe::new(self, zoom_step);
            let DiscoveredExtent {
                slices_x, slices_y, ..
            } = ExtentDiscoverer::new(edges).discover(&mut probe)?;

            probe.session.state = SessionState::Traversing { zoom_step };
            probe.grid = Some((slices_x, slices_y));
            SerpentinePlan::after_discovery(slices_x, slices_y).execute(&mut probe)?;
            (Strategy::Serpentine, slices_x, slices_y, probe.captured)
        };

        Ok(LevelReport {
            zoom_step,
            strategy,
            slices_x,
            slices_y,
            tiles,
            pans: self.driver.pans() - pans_before,
        })
    }

    /// Read bounds, capture, calibrate and store the tile at the current view.
    fn grab_tile(&mut self, zoom_step: u32, cell: Cell) -> Result<GeoBounds, GrabError> {
        self.driver.cancel_token().checkpoint()?;
        let stem = tile_file_stem(&self.config.map_name, zoom_step, cell.x, cell.y);
        let bounds = self.driver.read_bounds()?;
        let image = self.driver.capture(&stem)?;
        let calibration = CalibrationRecord::from_bounds(format!("{stem}.png"), zoom_step, &bounds);
        self.sink.store(&TileArtifact {
            stem: &stem,
            zoom_step,
            cell,
            image: &image,
            calibration: &calibration,
            bounds: &bounds,
        })?;
        self.tiles_written += 1;
        debug!("stored {stem}");
        self.driver.cancel_token().checkpoint()?;
        Ok(bounds)
    }

    fn status(&mut self, text: &str) {
        info!("{text}");
        if let Some(callback) = self.on_status.as_mut() {
            callback(text);
        }
    }

    fn report(&self, status: SessionStatus) -> SessionReport {
        SessionReport {
            status,
            map_name: self.config.map_name.clone(),
            tiles_written: self.tiles_written,
            reference: self.reference,
            levels: self.levels.clone(),
        }
    }
}

/// Progress line for the tile about to be captured.
fn progress_text(
    zoom_step: u32,
    zoom_steps: u32,
    cell: Cell,
    grid: Option<(u32, u32)>,
    captured: u32,
) -> String {
    match grid {
        Some((sx, sy)) => {
            let total = (sx as f64 * sy as f64).max(1.0);
            format!(
                "Grabbing: z={zoom_step}/{zoom_steps} => x={}/{}, y={}/{} ({:.0}%)...",
                cell.x,
                sx.saturating_sub(1),
                cell.y,
                sy.saturating_sub(1),
                100.0 * captured as f64 / total
            )
        }
        None => format!(
            "Grabbing: z={zoom_step}/{zoom_steps} => x={}/?, y={}/? (?%)...",
            cell.x, cell.y
        ),
    }
}

/// Session side of a level traversal.
struct LevelProbe<'a, V, S> {
    session: &'a mut GrabSession<V, S>,
    zoom_step: u32,
    grid: Option<(u32, u32)>,
    captured: u32,
}

impl<'a, V: ViewAdapter, S: TileSink> LevelProbe<'a, V, S> {
    fn new(session: &'a mut GrabSession<V, S>, zoom_step: u32) -> Self {
        Self {
            session,
            zoom_step,
            grid: None,
            captured: 0,
        }
    }
}

impl<V: ViewAdapter, S: TileSink> TileProbe for LevelProbe<'_, V, S> {
    fn capture(&mut self, cell: Cell) -> Result<GeoBounds, GrabError> {
        let text = progress_text(
            self.zoom_step,
            self.session.config.zoom_steps,
            cell,
            self.grid,
            self.captured,
        );
        self.session.status(&text);
        let bounds = self.session.grab_tile(self.zoom_step, cell)?;
        self.captured += 1;
        Ok(bounds)
    }

    fn step(&mut self, direction: PanDirection) -> Result<(), GrabError> {
        let steps = self.session.config.viewer.steps_per_tile;
        self.session.driver.pan_steps(direction, steps)
    }

    fn move_to(&mut self, target: GeoPoint) -> Result<(), GrabError> {
        self.session.driver.move_to(target).map(|_| ())
    }
}

/// A session running on its own thread.
pub struct SessionHandle<V, S> {
    cancel: CancelToken,
    join: JoinHandle<(GrabSession<V, S>, Result<SessionReport, GrabError>)>,
}

impl<V, S> GrabSession<V, S>
where
    V: ViewAdapter + Send + 'static,
    S: TileSink + Send + 'static,
{
    /// Move the session to a worker thread and start it.
    pub fn spawn(mut self) -> Result<SessionHandle<V, S>, GrabError> {
        let cancel = self.cancel_token();
        let join = thread::Builder::new()
            .name("grab-session".to_string())
            .spawn(move || {
                let result = self.run();
                (self, result)
            })?;
        Ok(SessionHandle { cancel, join })
    }
}

impl<V, S> SessionHandle<V, S> {
    /// Ask the worker to stop after its current pan or capture.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn join(self) -> Result<SessionReport, GrabError> {
        self.join_session()?.1
    }

    /// Wait for the worker and take the session back, e.g. to inspect its sink.
    #[allow(clippy::type_complexity)]
    pub fn join_session(self) -> Result<(GrabSession<V, S>, Result<SessionReport, GrabError>), GrabError> {
        self.join.join().map_err(|_| GrabError::WorkerPanicked)
    }
}
