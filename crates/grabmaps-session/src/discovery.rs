//! Tile-count discovery for viewers without absolute positioning.
//!
//! A relative-only viewer cannot compute its grid in advance because the
//! on-screen pan step is not known in degrees. Instead the discoverer walks
//! down column 0 until a tile reaches the reference south edge, then along
//! the bottom row until a tile reaches the east edge. Every probe is a real
//! capture, so nothing is thrown away.

use grabmaps_core::GeoRect;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::GrabError;
use crate::traversal::{Cell, TileProbe};
use crate::view::PanDirection;

/// Default cap on tiles per axis before discovery gives up.
pub const DEFAULT_MAX_SLICES: u32 = 10_000;

/// Grid dimensions found by [`ExtentDiscoverer::discover`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredExtent {
    pub slices_x: u32,
    pub slices_y: u32,
    /// Tiles captured while discovering: column 0 plus the rest of the bottom row.
    pub captured: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct ExtentDiscoverer {
    reference: GeoRect,
    max_slices: u32,
}

impl ExtentDiscoverer {
    pub fn new(reference: GeoRect) -> Self {
        Self {
            reference,
            max_slices: DEFAULT_MAX_SLICES,
        }
    }

    pub fn with_max_slices(mut self, max_slices: u32) -> Self {
        self.max_slices = max_slices.max(1);
        self
    }

    /// Sweep down column 0, then right along the bottom row.
    ///
    /// The probe must be positioned on cell `(0, 0)`. On return it sits on
    /// cell `(slices_x - 1, slices_y - 1)`. The counts never under-cover the
    /// reference; they can over-cover it by at most one tile per axis.
    pub fn discover<P: TileProbe + ?Sized>(&self, probe: &mut P) -> Result<DiscoveredExtent, GrabError> {
        let mut y = 0;
        let bottom_left = loop {
            let bounds = probe.capture(Cell::new(0, y))?;
            y += 1;
            if bounds.south() <= self.reference.south {
                break bounds;
            }
            if y >= self.max_slices {
                return Err(GrabError::ExtentUnbounded { probes: y });
            }
            probe.step(PanDirection::Down)?;
        };
        let slices_y = y;
        debug!("discovered {slices_y} rows");

        let row = slices_y - 1;
        let mut x = 1;
        let mut east = bottom_left.east();
        while east < self.reference.east {
            if x >= self.max_slices {
                return Err(GrabError::ExtentUnbounded { probes: x });
            }
            probe.step(PanDirection::Right)?;
            east = probe.capture(Cell::new(x, row))?.east();
            x += 1;
        }
        let slices_x = x;
        debug!("discovered {slices_x} columns");

        Ok(DiscoveredExtent {
            slices_x,
            slices_y,
            captured: slices_y + slices_x - 1,
        })
    }
}
