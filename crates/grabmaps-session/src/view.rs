//! Capability interface of a map viewer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use grabmaps_core::{GeoPoint, GeoRect};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{GrabError, ViewError};

/// One native pan of the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    Left,
    Right,
    Up,
    Down,
}

impl PanDirection {
    pub fn opposite(self) -> Self {
        match self {
            PanDirection::Left => PanDirection::Right,
            PanDirection::Right => PanDirection::Left,
            PanDirection::Up => PanDirection::Down,
            PanDirection::Down => PanDirection::Up,
        }
    }
}

/// How a viewer exposes the geographic extent of its current view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    /// Reports north/south/east/west of its map widget directly.
    DirectBounds,
    /// Answers "what coordinate is under pixel (x, y)" queries.
    SampledCorners,
}

/// Edges and center reported by a direct-bounds viewer.
///
/// The rectangle covers the map widget including its unsaved border.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportedBounds {
    pub rect: GeoRect,
    pub center: GeoPoint,
}

/// Operations a map viewer must provide to be grabbed.
///
/// Every call is a single attempt. Waiting and retrying live in
/// [`crate::ViewDriver`], so implementations stay free of timing policy.
pub trait ViewAdapter {
    fn bounds_mode(&self) -> BoundsMode;

    /// Whether [`ViewAdapter::pan_to`] is available.
    fn supports_pan_to(&self) -> bool {
        false
    }

    /// Current edges of the map widget. `None` if the viewer cannot report them.
    fn read_bounds(&mut self) -> Result<Option<ReportedBounds>, ViewError>;

    /// Coordinate under tile pixel `(px, py)`, or `None` while unresolved.
    fn query_point(&mut self, px: u32, py: u32) -> Result<Option<GeoPoint>, ViewError>;

    /// Move the view by one native step.
    fn pan(&mut self, direction: PanDirection) -> Result<(), ViewError>;

    /// Center the view on `target`.
    fn pan_to(&mut self, target: GeoPoint) -> Result<(), ViewError> {
        let _ = target;
        Err(ViewError::Unsupported("pan_to"))
    }

    fn zoom_in(&mut self) -> Result<(), ViewError>;

    /// `true` once rendering has finished after the last motion.
    fn is_settled(&mut self) -> Result<bool, ViewError>;

    /// Visible map region with the viewer chrome already cropped away.
    fn capture_tile(&mut self, name: &str) -> Result<RgbImage, ViewError>;

    /// Free viewer-side resources. Called once when a session ends.
    fn release(&mut self) {}
}

impl<T: ViewAdapter + ?Sized> ViewAdapter for Box<T> {
    fn bounds_mode(&self) -> BoundsMode {
        (**self).bounds_mode()
    }
    fn supports_pan_to(&self) -> bool {
        (**self).supports_pan_to()
    }
    fn read_bounds(&mut self) -> Result<Option<ReportedBounds>, ViewError> {
        (**self).read_bounds()
    }
    fn query_point(&mut self, px: u32, py: u32) -> Result<Option<GeoPoint>, ViewError> {
        (**self).query_point(px, py)
    }
    fn pan(&mut self, direction: PanDirection) -> Result<(), ViewError> {
        (**self).pan(direction)
    }
    fn pan_to(&mut self, target: GeoPoint) -> Result<(), ViewError> {
        (**self).pan_to(target)
    }
    fn zoom_in(&mut self) -> Result<(), ViewError> {
        (**self).zoom_in()
    }
    fn is_settled(&mut self) -> Result<bool, ViewError> {
        (**self).is_settled()
    }
    fn capture_tile(&mut self, name: &str) -> Result<RgbImage, ViewError> {
        (**self).capture_tile(name)
    }
    fn release(&mut self) {
        (**self).release()
    }
}

/// Shared stop flag polled by a running session.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(GrabError::Cancelled)` once [`CancelToken::cancel`] was called.
    pub fn checkpoint(&self) -> Result<(), GrabError> {
        if self.is_cancelled() {
            Err(GrabError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.checkpoint().is_ok());
        token.cancel();
        assert!(worker.is_cancelled());
        assert!(worker.checkpoint().unwrap_err().is_cancelled());
    }

    #[test]
    fn opposite_directions() {
        for d in [
            PanDirection::Left,
            PanDirection::Right,
            PanDirection::Up,
            PanDirection::Down,
        ] {
            assert_ne!(d, d.opposite());
            assert_eq!(d, d.opposite().opposite());
        }
    }
}
