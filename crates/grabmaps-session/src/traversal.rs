//! Orders in which the tiles of one zoom level are visited.
//!
//! A viewer with `pan_to` is addressed cell by cell ([`DirectPlan`]). A
//! viewer with only relative pans is walked in a serpentine
//! ([`SerpentinePlan`]): alternate rows run in opposite directions so no
//! pans are spent rewinding to the start of a row.

use std::ops::Range;

use grabmaps_core::{GeoBounds, GeoPoint, GeoRect};
use serde::{Deserialize, Serialize};

use crate::error::GrabError;
use crate::view::PanDirection;

/// Grid position of a tile within one zoom level. `(0, 0)` is the upper-left tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectAddressing,
    Serpentine,
}

/// Side effects a traversal needs from the session.
pub trait TileProbe {
    /// Capture and store the tile at the current view position as `cell`.
    fn capture(&mut self, cell: Cell) -> Result<GeoBounds, GrabError>;

    /// Move the view by one tile footprint minus overlap.
    fn step(&mut self, direction: PanDirection) -> Result<(), GrabError>;

    /// Center the view on `target`.
    fn move_to(&mut self, target: GeoPoint) -> Result<(), GrabError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanStep {
    Capture(Cell),
    Step(PanDirection),
}

/// Alternating-row walk over a rectangular block of cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerpentinePlan {
    steps: Vec<PlanStep>,
}

impl SerpentinePlan {
    /// Walk an `slices_x` x `slices_y` grid starting at `(0, 0)`, first row left to right.
    pub fn full(slices_x: u32, slices_y: u32) -> Self {
        Self::build(0..slices_x, (0..slices_y).collect(), PanDirection::Down, false, false)
    }

    /// Cells left after extent discovery.
    ///
    /// Discovery captures column 0 and the bottom row and leaves the view on
    /// the bottom-right cell. The remaining block is walked upward from
    /// there, the first row right to left.
    pub fn after_discovery(slices_x: u32, slices_y: u32) -> Self {
        let rows: Vec<u32> = (0..slices_y.saturating_sub(1)).rev().collect();
        Self::build(1..slices_x, rows, PanDirection::Up, true, true)
    }

    fn build(
        columns: Range<u32>,
        rows: Vec<u32>,
        row_step: PanDirection,
        leading_row_step: bool,
        first_reversed: bool,
    ) -> Self {
        let mut steps = Vec::new();
        if columns.is_empty() || rows.is_empty() {
            return Self { steps };
        }
        let mut reversed = first_reversed;
        for (i, &y) in rows.iter().enumerate() {
            if i > 0 || leading_row_step {
                steps.push(PlanStep::Step(row_step));
            }
            let (across, xs): (PanDirection, Vec<u32>) = if reversed {
                (PanDirection::Left, columns.clone().rev().collect())
            } else {
                (PanDirection::Right, columns.clone().collect())
            };
            for (j, &x) in xs.iter().enumerate() {
                if j > 0 {
                    steps.push(PlanStep::Step(across));
                }
                steps.push(PlanStep::Capture(Cell::new(x, y)));
            }
            reversed = !reversed;
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Capture(c) => Some(*c),
            PlanStep::Step(_) => None,
        })
    }

    /// Tile steps between captures.
    pub fn step_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, PlanStep::Step(_)))
            .count()
    }

    pub fn execute<P: TileProbe + ?Sized>(&self, probe: &mut P) -> Result<(), GrabError> {
        for step in &self.steps {
            match *step {
                PlanStep::Capture(cell) => {
                    probe.capture(cell)?;
                }
                PlanStep::Step(direction) => probe.step(direction)?,
            }
        }
        Ok(())
    }
}

/// Tile steps needed to cover an `m` x `n` grid row by row when every row
/// starts at column 0: `m - 1` steps along each row, `m - 1` steps back
/// before each new row, and one step down between rows.
pub fn rewind_step_count(slices_x: u32, slices_y: u32) -> usize {
    let (m, n) = (slices_x as usize, slices_y as usize);
    if m == 0 || n == 0 {
        return 0;
    }
    n * (m - 1) + (n - 1) * (m - 1) + (n - 1)
}

/// Grid of absolute tile centers for a viewer with `pan_to`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectPlan {
    pub slices_x: u32,
    pub slices_y: u32,
    pub start_center: GeoPoint,
    /// Longitude between neighbouring tile centers.
    pub x_offset: f64,
    /// Latitude between neighbouring tile centers, negative going south.
    pub y_offset: f64,
}

impl DirectPlan {
    /// Plan tiles over `reference`, the first one centered where `start` is.
    ///
    /// Neighbouring tiles share `overlap_x` / `overlap_y` pixels and the slice
    /// counts are `ceil(extent / offset)`. With the first tile centered on
    /// the reference's north-west corner, the last column's center can land
    /// short of the east edge, leaving up to half a tile minus the overlap
    /// uncovered on the east side, and likewise on the south side.
    pub fn new(reference: &GeoRect, start: &GeoBounds, overlap_x: u32, overlap_y: u32) -> Self {
        let x_offset = start.width().saturating_sub(overlap_x).max(1) as f64 * start.lng_per_pixel();
        let y_offset = start.height().saturating_sub(overlap_y).max(1) as f64 * start.lat_per_pixel();
        Self {
            slices_x: slice_count(reference.width_deg(), x_offset),
            slices_y: slice_count(reference.height_deg(), y_offset),
            start_center: start.center(),
            x_offset,
            y_offset,
        }
    }

    pub fn target(&self, cell: Cell) -> GeoPoint {
        self.start_center.offset(
            cell.x as f64 * self.x_offset,
            cell.y as f64 * self.y_offset,
        )
    }

    /// Row-major, top row first.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.slices_y).flat_map(move |y| (0..self.slices_x).map(move |x| Cell::new(x, y)))
    }

    pub fn tile_count(&self) -> usize {
        self.slices_x as usize * self.slices_y as usize
    }

    pub fn execute<P: TileProbe + ?Sized>(&self, probe: &mut P) -> Result<(), GrabError> {
        for cell in self.cells() {
            probe.move_to(self.target(cell))?;
            probe.capture(cell)?;
        }
        Ok(())
    }
}

fn slice_count(extent: f64, offset: f64) -> u32 {
    let n = (extent / offset).abs().ceil();
    if n.is_finite() && n >= 1.0 {
        n.min(u32::MAX as f64) as u32
    } else {
        1
    }
}
