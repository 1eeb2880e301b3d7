use grabmaps_core::{CalibrationError, GeoError, ProfileError};

/// Problems with a [`crate::GrabConfig`] file or its contents.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ProfileError),
    #[error("map name must not be empty")]
    EmptyMapName,
}

/// Failures reported by a [`crate::ViewAdapter`].
#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    #[error("could not locate the viewer window: {0}")]
    WindowNotFound(String),
    #[error("viewer does not support `{0}`")]
    Unsupported(&'static str),
    #[error("captured frame {width}x{height} is smaller than the configured margins")]
    FrameTooSmall { width: u32, height: u32 },
    #[error("viewer failure: {0}")]
    Backend(String),
}

/// Errors that end a grab session.
///
/// Every variant except `Cancelled` is fatal. `Cancelled` only unwinds the
/// worker back to [`crate::GrabSession::run`], which reports it as a status.
#[derive(thiserror::Error, Debug)]
pub enum GrabError {
    #[error(transparent)]
    View(#[from] ViewError),
    #[error("invalid view bounds: {0}")]
    Geo(#[from] GeoError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("view did not settle after {attempts} polls")]
    SettleTimeout { attempts: u32 },
    #[error("no coordinate for pixel ({px}, {py}) after {attempts} attempts")]
    CoordinateQueryTimeout { px: u32, py: u32, attempts: u32 },
    #[error(
        "dimension of map ({width}x{height}) does not match the required values \
         ({expected_width}x{expected_height})"
    )]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
    #[error("target ({lng}, {lat}) not reached within {steps} pan steps")]
    PositioningFailed { lng: f64, lat: f64, steps: u32 },
    #[error("extent not bounded after {probes} tiles along one axis")]
    ExtentUnbounded { probes: u32 },
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("grab worker panicked")]
    WorkerPanicked,
    #[error("cancelled")]
    Cancelled,
}

impl GrabError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GrabError::Cancelled)
    }
}
