//! An in-memory map viewer for tests and dry runs.
//!
//! [`SyntheticViewer`] renders a georeferenced raster the way a real viewer
//! shows a map: a frame of `profile.frame_size()` pixels with chrome in the
//! margins, a view that moves by a fixed native step per pan, and a scale
//! that halves with every zoom-in.

use grabmaps_core::{GeoPoint, GeoRect, ViewerProfile};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::capture::crop_frame;
use crate::error::ViewError;
use crate::view::{BoundsMode, PanDirection, ReportedBounds, ViewAdapter};

/// North-up raster with a fixed degrees-per-pixel scale.
#[derive(Clone, Debug)]
pub struct GeoRaster {
    image: RgbImage,
    west: f64,
    north: f64,
    lng_per_px: f64,
    lat_per_px: f64,
    background: Rgb<u8>,
}

impl GeoRaster {
    /// `image` stretched over `extent`.
    pub fn new(image: RgbImage, extent: GeoRect) -> Self {
        let (w, h) = image.dimensions();
        Self {
            lng_per_px: extent.width_deg() / w.max(1) as f64,
            lat_per_px: extent.height_deg() / h.max(1) as f64,
            west: extent.west,
            north: extent.north,
            image,
            background: Rgb([255, 255, 255]),
        }
    }

    /// Colored checkerboard, useful where tile content only has to differ.
    pub fn checkerboard(extent: GeoRect, width: u32, height: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let image = RgbImage::from_fn(width, height, |x, y| {
            let (cx, cy) = (x / cell, y / cell);
            if (cx + cy) % 2 == 0 {
                Rgb([(cx * 37 % 256) as u8, (cy * 59 % 256) as u8, 160])
            } else {
                Rgb([235, 230, 215])
            }
        });
        Self::new(image, extent)
    }

    pub fn extent(&self) -> GeoRect {
        let (w, h) = self.image.dimensions();
        GeoRect::new(
            self.north,
            self.north - h as f64 * self.lat_per_px,
            self.west + w as f64 * self.lng_per_px,
            self.west,
        )
    }

    pub fn sample(&self, p: GeoPoint) -> Rgb<u8> {
        let x = ((p.lng - self.west) / self.lng_per_px).floor();
        let y = ((self.north - p.lat) / self.lat_per_px).floor();
        let (w, h) = self.image.dimensions();
        if x >= 0.0 && y >= 0.0 && x < w as f64 && y < h as f64 {
            *self.image.get_pixel(x as u32, y as u32)
        } else {
            self.background
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    pub mode: BoundsMode,
    pub pan_to: bool,
    /// Screen scale at the starting zoom.
    pub lng_per_px: f64,
    pub lat_per_px: f64,
    /// `is_settled` answers `false` this many times after every motion.
    pub settle_polls: u32,
    /// `query_point` answers `None` this many times before each coordinate.
    pub query_latency: u32,
    pub chrome: [u8; 3],
}

impl SimOptions {
    /// Browser-like viewer: reports bounds and pans to coordinates.
    pub fn direct(lng_per_px: f64, lat_per_px: f64) -> Self {
        Self {
            mode: BoundsMode::DirectBounds,
            pan_to: true,
            lng_per_px,
            lat_per_px,
            settle_polls: 0,
            query_latency: 0,
            chrome: [64, 64, 64],
        }
    }

    /// Desktop-like viewer: point queries and relative pans only.
    pub fn sampled(lng_per_px: f64, lat_per_px: f64) -> Self {
        Self {
            mode: BoundsMode::SampledCorners,
            pan_to: false,
            ..Self::direct(lng_per_px, lat_per_px)
        }
    }
}

/// Counters of what a session asked the viewer to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub pans: u64,
    pub pans_to: u64,
    pub zooms: u32,
    pub captures: u32,
    pub queries: u64,
    pub released: bool,
}

pub struct SyntheticViewer {
    raster: GeoRaster,
    profile: ViewerProfile,
    options: SimOptions,
    center: GeoPoint,
    zoom: u32,
    unsettled: u32,
    pending_query: u32,
    stats: SimStats,
}

impl SyntheticViewer {
    /// Viewer showing the center of `raster`, framed per `profile`.
    pub fn new(raster: GeoRaster, profile: ViewerProfile, options: SimOptions) -> Self {
        let center = raster.extent().center();
        Self {
            unsettled: options.settle_polls,
            pending_query: options.query_latency,
            raster,
            profile,
            options,
            center,
            zoom: 0,
            stats: SimStats::default(),
        }
    }

    pub fn with_center(mut self, center: GeoPoint) -> Self {
        self.center = center;
        self
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Native pan distance in screen pixels, `(x, y)`.
    pub fn native_step_px(&self) -> (u32, u32) {
        let p = &self.profile;
        let steps = p.steps_per_tile.max(1);
        (
            (p.tile_width.saturating_sub(p.overlap_x) / steps).max(1),
            (p.tile_height.saturating_sub(p.overlap_y) / steps).max(1),
        )
    }

    fn scale(&self) -> (f64, f64) {
        let f = 0.5_f64.powi(self.zoom as i32);
        (self.options.lng_per_px * f, self.options.lat_per_px * f)
    }

    /// Map widget size, tile plus border.
    fn area_size(&self) -> (u32, u32) {
        let p = &self.profile;
        (p.tile_width + 2 * p.border_x, p.tile_height + 2 * p.border_y)
    }

    /// Coordinate of the upper-left corner of the map widget.
    fn area_origin(&self) -> GeoPoint {
        let (dx, dy) = self.scale();
        let (aw, ah) = self.area_size();
        GeoPoint::new(
            self.center.lng - aw as f64 / 2.0 * dx,
            self.center.lat + ah as f64 / 2.0 * dy,
        )
    }

    fn area_pixel_to_geo(&self, ax: f64, ay: f64) -> GeoPoint {
        let (dx, dy) = self.scale();
        let origin = self.area_origin();
        GeoPoint::new(origin.lng + ax * dx, origin.lat - ay * dy)
    }

    fn moved(&mut self) {
        self.unsettled = self.options.settle_polls;
    }

    fn render_frame(&self) -> RgbImage {
        let (fw, fh) = self.profile.frame_size();
        let (aw, ah) = self.area_size();
        let (left, top) = (self.profile.margins.left, self.profile.margins.top);
        let chrome = Rgb(self.options.chrome);
        RgbImage::from_fn(fw, fh, |x, y| {
            let inside = x >= left && y >= top && x < left + aw && y < top + ah;
            if inside {
                let p = self.area_pixel_to_geo((x - left) as f64 + 0.5, (y - top) as f64 + 0.5);
                self.raster.sample(p)
            } else {
                chrome
            }
        })
    }
}

impl ViewAdapter for SyntheticViewer {
    fn bounds_mode(&self) -> BoundsMode {
        self.options.mode
    }

    fn supports_pan_to(&self) -> bool {
        self.options.pan_to
    }

    fn read_bounds(&mut self) -> Result<Option<ReportedBounds>, ViewError> {
        if self.options.mode != BoundsMode::DirectBounds {
            return Ok(None);
        }
        let (aw, ah) = self.area_size();
        let nw = self.area_pixel_to_geo(0.0, 0.0);
        let se = self.area_pixel_to_geo(aw as f64, ah as f64);
        Ok(Some(ReportedBounds {
            rect: GeoRect::new(nw.lat, se.lat, se.lng, nw.lng),
            center: self.center,
        }))
    }

    fn query_point(&mut self, px: u32, py: u32) -> Result<Option<GeoPoint>, ViewError> {
        if self.options.mode != BoundsMode::SampledCorners {
            return Err(ViewError::Unsupported("query_point"));
        }
        self.stats.queries += 1;
        if self.pending_query > 0 {
            self.pending_query -= 1;
            return Ok(None);
        }
        self.pending_query = self.options.query_latency;
        let (bx, by) = (self.profile.border_x, self.profile.border_y);
        Ok(Some(self.area_pixel_to_geo((px + bx) as f64, (py + by) as f64)))
    }

    fn pan(&mut self, direction: PanDirection) -> Result<(), ViewError> {
        let (sx, sy) = self.native_step_px();
        let (dx, dy) = self.scale();
        let (d_lng, d_lat) = match direction {
            PanDirection::Left => (-(sx as f64) * dx, 0.0),
            PanDirection::Right => (sx as f64 * dx, 0.0),
            PanDirection::Up => (0.0, sy as f64 * dy),
            PanDirection::Down => (0.0, -(sy as f64) * dy),
        };
        self.center = self.center.offset(d_lng, d_lat);
        self.stats.pans += 1;
        self.moved();
        Ok(())
    }

    fn pan_to(&mut self, target: GeoPoint) -> Result<(), ViewError> {
        if !self.options.pan_to {
            return Err(ViewError::Unsupported("pan_to"));
        }
        self.center = target;
        self.stats.pans_to += 1;
        self.moved();
        Ok(())
    }

    fn zoom_in(&mut self) -> Result<(), ViewError> {
        self.zoom += 1;
        self.stats.zooms += 1;
        self.moved();
        Ok(())
    }

    fn is_settled(&mut self) -> Result<bool, ViewError> {
        if self.unsettled > 0 {
            self.unsettled -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn capture_tile(&mut self, _name: &str) -> Result<RgbImage, ViewError> {
        self.stats.captures += 1;
        crop_frame(&self.render_frame(), &self.profile)
    }

    fn release(&mut self) {
        self.stats.released = true;
    }
}
