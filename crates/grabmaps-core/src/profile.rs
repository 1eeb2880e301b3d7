//! Per-viewer capture constants and JSON helpers.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::bounds::MapGeometry;

#[derive(thiserror::Error, Debug)]
pub enum ProfileIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ProfileError),
}

/// Reasons a profile is rejected by [`ViewerProfile::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("tile must be at least 2x2 pixels (got {width}x{height})")]
    TileTooSmall { width: u32, height: u32 },
    #[error("overlap {overlap} px must be smaller than the tile extent {extent} px")]
    OverlapTooLarge { overlap: u32, extent: u32 },
    #[error("steps_per_tile must be at least 1")]
    ZeroSteps,
    #[error("poll policy `{name}` must allow at least one attempt")]
    ZeroAttempts { name: &'static str },
    #[error("raw frame {width}x{height} exceeds {max} px per side", max = MAX_FRAME_SIDE)]
    FrameTooLarge { width: u64, height: u64 },
}

/// Largest raw frame side, margins and borders included, a profile may ask for.
pub const MAX_FRAME_SIDE: u32 = 1 << 16;

/// Pixels of viewer chrome around the map in a raw frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMargins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CaptureMargins {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Bounded polling: `max_attempts` tries separated by `interval_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_steps_per_tile() -> u32 {
    2
}

fn default_settle() -> PollPolicy {
    PollPolicy::new(100, 100)
}

fn default_query() -> PollPolicy {
    PollPolicy::new(10, 1000)
}

fn default_zoom_settle_ms() -> u64 {
    3000
}

fn default_max_positioning_steps() -> u32 {
    1000
}

/// Fixed capture constants of one map viewer.
///
/// The saved tile is the raw frame minus `margins`, minus `border_x` on the
/// left and right and `border_y` on the top and bottom. Its size must equal
/// `tile_width` x `tile_height` exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewerProfile {
    pub name: String,
    #[serde(default)]
    pub margins: CaptureMargins,
    #[serde(default)]
    pub border_x: u32,
    #[serde(default)]
    pub border_y: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub overlap_x: u32,
    pub overlap_y: u32,
    /// Native pan steps that advance the view by one tile.
    ///
    /// Tuned per viewer; a new viewer needs its own calibration.
    #[serde(default = "default_steps_per_tile")]
    pub steps_per_tile: u32,
    #[serde(default = "default_settle")]
    pub settle: PollPolicy,
    #[serde(default = "default_query")]
    pub query: PollPolicy,
    #[serde(default = "default_zoom_settle_ms")]
    pub zoom_settle_ms: u64,
    #[serde(default = "default_max_positioning_steps")]
    pub max_positioning_steps: u32,
}

impl ViewerProfile {
    /// Browser-style viewer that reports its bounds and pans to coordinates.
    pub fn direct_bounds() -> Self {
        Self {
            name: "direct-bounds".to_string(),
            margins: CaptureMargins::new(0, 119, 0, 0),
            border_x: 64,
            border_y: 30,
            tile_width: 800,
            tile_height: 800,
            overlap_x: 160,
            overlap_y: 160,
            steps_per_tile: default_steps_per_tile(),
            settle: default_settle(),
            query: default_query(),
            zoom_settle_ms: default_zoom_settle_ms(),
            max_positioning_steps: default_max_positioning_steps(),
        }
    }

    /// Desktop atlas viewer with point queries and arrow-key panning only.
    pub fn sampled_corners() -> Self {
        Self {
            name: "sampled-corners".to_string(),
            margins: CaptureMargins::new(6, 104, 27, 48),
            border_x: 0,
            border_y: 0,
            tile_width: 1024,
            tile_height: 768,
            overlap_x: 160,
            overlap_y: 160,
            steps_per_tile: default_steps_per_tile(),
            settle: default_settle(),
            query: default_query(),
            zoom_settle_ms: default_zoom_settle_ms(),
            max_positioning_steps: default_max_positioning_steps(),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.tile_width < 2 || self.tile_height < 2 {
            return Err(ProfileError::TileTooSmall {
                width: self.tile_width,
                height: self.tile_height,
            });
        }
        if self.overlap_x >= self.tile_width {
            return Err(ProfileError::OverlapTooLarge {
                overlap: self.overlap_x,
                extent: self.tile_width,
            });
        }
        if self.overlap_y >= self.tile_height {
            return Err(ProfileError::OverlapTooLarge {
                overlap: self.overlap_y,
                extent: self.tile_height,
            });
        }
        if self.steps_per_tile == 0 {
            return Err(ProfileError::ZeroSteps);
        }
        if self.settle.max_attempts == 0 {
            return Err(ProfileError::ZeroAttempts { name: "settle" });
        }
        if self.query.max_attempts == 0 {
            return Err(ProfileError::ZeroAttempts { name: "query" });
        }
        let (width, height) = self.frame_extent();
        if width > u64::from(MAX_FRAME_SIDE) || height > u64::from(MAX_FRAME_SIDE) {
            return Err(ProfileError::FrameTooLarge { width, height });
        }
        Ok(())
    }

    /// Geometry used to derive bounds for a saved tile.
    pub fn geometry(&self) -> MapGeometry {
        MapGeometry::new(self.tile_width, self.tile_height).with_border(self.border_x, self.border_y)
    }

    fn frame_extent(&self) -> (u64, u64) {
        let m = &self.margins;
        (
            u64::from(self.tile_width)
                + u64::from(m.left)
                + u64::from(m.right)
                + 2 * u64::from(self.border_x),
            u64::from(self.tile_height)
                + u64::from(m.top)
                + u64::from(m.bottom)
                + 2 * u64::from(self.border_y),
        )
    }

    /// Size of the raw frame a capture must have before cropping.
    ///
    /// Saturates at `u32::MAX` for profiles that fail [`Self::validate`].
    pub fn frame_size(&self) -> (u32, u32) {
        let (w, h) = self.frame_extent();
        (
            u32::try_from(w).unwrap_or(u32::MAX),
            u32::try_from(h).unwrap_or(u32::MAX),
        )
    }

    /// Top-left pixel of the saved tile inside the raw frame.
    pub fn crop_origin(&self) -> (u32, u32) {
        (
            self.margins.left.saturating_add(self.border_x),
            self.margins.top.saturating_add(self.border_y),
        )
    }

    pub fn zoom_settle(&self) -> Duration {
        Duration::from_millis(self.zoom_settle_ms)
    }

    /// Load a JSON profile from disk and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ProfileIoError> {
        let raw = fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Write this profile to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ProfileIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
