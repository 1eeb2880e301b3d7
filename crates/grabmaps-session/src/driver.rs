//! Bounded waiting, bounds reading and positioning on top of a [`ViewAdapter`].

use std::thread;

use grabmaps_core::{center_pixel, sample_pixels, CornerSamples, GeoBounds, GeoPoint, ViewerProfile};
use image::RgbImage;
use log::{debug, trace};

use crate::capture::check_tile;
use crate::error::{GrabError, ViewError};
use crate::view::{BoundsMode, CancelToken, PanDirection, ViewAdapter};

/// Owns a viewer and applies the profile's timing and retry budgets to it.
///
/// Every motion waits for the view to settle and then checks the cancel
/// token, so a stop request is honored between units of work.
pub struct ViewDriver<V> {
    view: V,
    profile: ViewerProfile,
    cancel: CancelToken,
    pans: u64,
}

impl<V: ViewAdapter> ViewDriver<V> {
    pub fn new(view: V, profile: ViewerProfile, cancel: CancelToken) -> Self {
        Self {
            view,
            profile,
            cancel,
            pans: 0,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    pub fn profile(&self) -> &ViewerProfile {
        &self.profile
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Native pans issued so far.
    pub fn pans(&self) -> u64 {
        self.pans
    }

    /// Poll until the viewer reports it has finished rendering.
    pub fn wait_settled(&mut self) -> Result<u32, GrabError> {
        let policy = self.profile.settle;
        for attempt in 1..=policy.max_attempts {
            if self.view.is_settled()? {
                return Ok(attempt);
            }
            if attempt < policy.max_attempts {
                thread::sleep(policy.interval());
            }
        }
        Err(GrabError::SettleTimeout {
            attempts: policy.max_attempts,
        })
    }

    /// Query one pixel, retrying while the viewer has no answer yet.
    pub fn query_point(&mut self, px: u32, py: u32) -> Result<GeoPoint, GrabError> {
        let policy = self.profile.query;
        for attempt in 1..=policy.max_attempts {
            if let Some(p) = self.view.query_point(px, py)? {
                trace!("pixel ({px}, {py}) -> ({:.6}, {:.6})", p.lng, p.lat);
                return Ok(p);
            }
            if attempt < policy.max_attempts {
                thread::sleep(policy.interval());
            }
        }
        Err(GrabError::CoordinateQueryTimeout {
            px,
            py,
            attempts: policy.max_attempts,
        })
    }

    /// Bounds of the tile the viewer would capture right now.
    pub fn read_bounds(&mut self) -> Result<GeoBounds, GrabError> {
        let (w, h) = (self.profile.tile_width, self.profile.tile_height);
        match self.view.bounds_mode() {
            BoundsMode::DirectBounds => {
                let reported = self
                    .view
                    .read_bounds()?
                    .ok_or(ViewError::Unsupported("read_bounds"))?;
                Ok(GeoBounds::from_reported(
                    reported.rect,
                    reported.center,
                    &self.profile.geometry(),
                )?)
            }
            BoundsMode::SampledCorners => {
                let mut points = [GeoPoint::new(0.0, 0.0); 5];
                for (slot, (px, py)) in points.iter_mut().zip(sample_pixels(w, h)) {
                    self.cancel.checkpoint()?;
                    *slot = self.query_point(px, py)?;
                }
                let [upper_left, upper_right, lower_right, lower_left, center] = points;
                let samples = CornerSamples {
                    upper_left,
                    upper_right,
                    lower_right,
                    lower_left,
                    center,
                };
                Ok(GeoBounds::from_samples(&samples, w, h)?)
            }
        }
    }

    /// One native pan, then settle.
    pub fn pan(&mut self, direction: PanDirection) -> Result<(), GrabError> {
        self.view.pan(direction)?;
        self.pans += 1;
        self.wait_settled()?;
        self.cancel.checkpoint()
    }

    /// `count` native pans in one direction.
    pub fn pan_steps(&mut self, direction: PanDirection, count: u32) -> Result<(), GrabError> {
        for _ in 0..count {
            self.pan(direction)?;
        }
        Ok(())
    }

    /// Zoom in one level, wait out the viewer's reload delay, then settle.
    pub fn zoom_in(&mut self) -> Result<(), GrabError> {
        self.view.zoom_in()?;
        thread::sleep(self.profile.zoom_settle());
        self.wait_settled()?;
        self.cancel.checkpoint()
    }

    /// Bring `target` into view.
    ///
    /// Uses the viewer's own `pan_to` when it has one, otherwise steps
    /// toward the target with native pans. Returns the number of pans used.
    pub fn move_to(&mut self, target: GeoPoint) -> Result<u32, GrabError> {
        if self.view.supports_pan_to() {
            self.view.pan_to(target)?;
            self.wait_settled()?;
            self.cancel.checkpoint()?;
            return Ok(0);
        }
        self.position_relative(target)
    }

    fn position_relative(&mut self, target: GeoPoint) -> Result<u32, GrabError> {
        let (w, h) = (self.profile.tile_width, self.profile.tile_height);
        let (mid_x, mid_y) = (center_pixel(w), center_pixel(h));
        let start = self.read_bounds()?;
        let mut steps = 0;

        let mut edge = start.west();
        while target.lng < edge {
            self.positioning_pan(PanDirection::Left, target, &mut steps)?;
            edge = self.edge_coordinate(0, mid_y)?.lng;
        }
        let mut edge = start.east();
        while target.lng > edge {
            self.positioning_pan(PanDirection::Right, target, &mut steps)?;
            edge = self.edge_coordinate(w - 1, mid_y)?.lng;
        }
        let mut edge = start.north();
        while target.lat > edge {
            self.positioning_pan(PanDirection::Up, target, &mut steps)?;
            edge = self.edge_coordinate(mid_x, 0)?.lat;
        }
        let mut edge = start.south();
        while target.lat < edge {
            self.positioning_pan(PanDirection::Down, target, &mut steps)?;
            edge = self.edge_coordinate(mid_x, h - 1)?.lat;
        }

        debug!(
            "positioned on ({:.6}, {:.6}) after {steps} pans",
            target.lng, target.lat
        );
        Ok(steps)
    }

    fn positioning_pan(
        &mut self,
        direction: PanDirection,
        target: GeoPoint,
        steps: &mut u32,
    ) -> Result<(), GrabError> {
        if *steps >= self.profile.max_positioning_steps {
            return Err(GrabError::PositioningFailed {
                lng: target.lng,
                lat: target.lat,
                steps: *steps,
            });
        }
        self.pan(direction)?;
        *steps += 1;
        Ok(())
    }

    fn edge_coordinate(&mut self, px: u32, py: u32) -> Result<GeoPoint, GrabError> {
        match self.view.bounds_mode() {
            BoundsMode::SampledCorners => self.query_point(px, py),
            BoundsMode::DirectBounds => Ok(self.read_bounds()?.pixel_to_geo(px as f64, py as f64)),
        }
    }

    /// Capture the current view and verify the tile size.
    pub fn capture(&mut self, name: &str) -> Result<RgbImage, GrabError> {
        let tile = self.view.capture_tile(name)?;
        check_tile(&tile, &self.profile)?;
        Ok(tile)
    }

    pub fn release(&mut self) {
        self.view.release();
    }
}
