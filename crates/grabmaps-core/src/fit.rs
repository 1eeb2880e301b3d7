use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationPoint;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Least-squares axis-aligned model `lng = a*x + b`, `lat = c*y + d`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedFit {
    pub lng_per_px: f64,
    pub lng_origin: f64,
    pub lat_per_px: f64,
    pub lat_origin: f64,
    /// Largest absolute residual over all anchors, in pixels.
    pub max_residual_px: f64,
}

impl AxisAlignedFit {
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.lng_per_px * x + self.lng_origin,
            self.lat_per_px * y + self.lat_origin,
        )
    }
}

fn solve_line(samples: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = samples.len();
    let mut a = DMatrix::<f64>::zeros(n, 2);
    let mut b = DVector::<f64>::zeros(n);
    for (i, &(t, v)) in samples.iter().enumerate() {
        a[(i, 0)] = t;
        a[(i, 1)] = 1.0;
        b[i] = v;
    }
    let sol = a.svd(true, true).solve(&b, 1e-12).ok()?;
    let (slope, offset) = (sol[0], sol[1]);
    (slope.is_finite() && offset.is_finite() && slope != 0.0).then_some((slope, offset))
}

/// Fit the axis-aligned model to calibration anchors.
///
/// Returns `None` with fewer than two distinct pixel positions per axis. A
/// large residual means the anchors disagree, i.e. the view was distorted
/// or the coordinate queries were noisy.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(points), fields(anchors = points.len()))
)]
pub fn fit_axis_aligned(points: &[CalibrationPoint]) -> Option<AxisAlignedFit> {
    if points.len() < 2 {
        return None;
    }
    let xs: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.x as f64, p.position.lng))
        .collect();
    let ys: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.y as f64, p.position.lat))
        .collect();
    let (lng_per_px, lng_origin) = solve_line(&xs)?;
    let (lat_per_px, lat_origin) = solve_line(&ys)?;

    let mut max_residual_px = 0.0_f64;
    for p in points {
        let rx = (p.position.lng - (lng_per_px * p.x as f64 + lng_origin)) / lng_per_px;
        let ry = (p.position.lat - (lat_per_px * p.y as f64 + lat_origin)) / lat_per_px;
        max_residual_px = max_residual_px.max(rx.abs()).max(ry.abs());
    }

    Some(AxisAlignedFit {
        lng_per_px,
        lng_origin,
        lat_per_px,
        lat_origin,
        max_residual_px,
    })
}
