//! Pixel <-> geographic model for one captured view.
//!
//! Two derivations produce a [`GeoBounds`]:
//! - [`GeoBounds::from_reported`] for viewers that report the bounds of their
//!   map widget, including a fixed border that is trimmed from the saved tile;
//! - [`GeoBounds::from_samples`] for viewers that only answer "which coordinate
//!   is under this pixel"; the four corners are averaged per edge.

use serde::{Deserialize, Serialize};

use crate::geo::{GeoError, GeoPoint, GeoRect};

/// Pixel geometry of the map area a viewer reports or samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGeometry {
    /// Width of the saved tile in pixels.
    pub width: u32,
    /// Height of the saved tile in pixels.
    pub height: u32,
    /// Pixels trimmed at the left and at the right of the reported area.
    pub border_x: u32,
    /// Pixels trimmed at the top and at the bottom of the reported area.
    pub border_y: u32,
}

impl MapGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            border_x: 0,
            border_y: 0,
        }
    }

    pub fn with_border(mut self, border_x: u32, border_y: u32) -> Self {
        self.border_x = border_x;
        self.border_y = border_y;
        self
    }

    /// Pixel size of the area covered by reported bounds, saturating at
    /// `u32::MAX`.
    pub fn reported_size(&self) -> (u32, u32) {
        let side = |n: u32, border: u32| n.saturating_add(border.saturating_mul(2));
        (side(self.width, self.border_x), side(self.height, self.border_y))
    }

    fn check(&self) -> Result<(), GeoError> {
        if self.width == 0 || self.height == 0 {
            return Err(GeoError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Coordinates sampled at the four corner pixels and the center pixel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CornerSamples {
    pub upper_left: GeoPoint,
    pub upper_right: GeoPoint,
    pub lower_right: GeoPoint,
    pub lower_left: GeoPoint,
    pub center: GeoPoint,
}

/// Pixel positions queried for [`CornerSamples`], in the order
/// upper-left, upper-right, lower-right, lower-left, center.
pub fn sample_pixels(width: u32, height: u32) -> [(u32, u32); 5] {
    let (r, b) = (width.saturating_sub(1), height.saturating_sub(1));
    [
        (0, 0),
        (r, 0),
        (r, b),
        (0, b),
        (center_pixel(width), center_pixel(height)),
    ]
}

/// Center pixel index along one axis (`n/2 - 1`, clamped at zero).
#[inline]
pub fn center_pixel(n: u32) -> u32 {
    (n / 2).saturating_sub(1)
}

/// Immutable snapshot of a captured view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    edges: GeoRect,
    upper_left: GeoPoint,
    upper_right: GeoPoint,
    lower_right: GeoPoint,
    lower_left: GeoPoint,
    center: GeoPoint,
    width: u32,
    height: u32,
    lng_per_pixel: f64,
    lat_per_pixel: f64,
    scale_x: f64,
    scale_y: f64,
}

impl GeoBounds {
    /// Derive bounds from a viewer that reports the edges of its map widget.
    ///
    /// The reported rectangle spans `width + 2*border_x` by
    /// `height + 2*border_y` pixels; each edge is moved inward by
    /// `border * degrees_per_pixel` so the result describes the saved tile.
    pub fn from_reported(
        reported: GeoRect,
        center: GeoPoint,
        geometry: &MapGeometry,
    ) -> Result<Self, GeoError> {
        geometry.check()?;
        reported.validate()?;
        let center = center.check_finite()?;

        let (frame_w, frame_h) = geometry.reported_size();
        let lng_per_pixel = (reported.east - reported.west) / frame_w as f64;
        let lat_per_pixel = (reported.south - reported.north) / frame_h as f64;

        let bx = geometry.border_x as f64;
        let by = geometry.border_y as f64;
        let edges = GeoRect {
            west: reported.west + lng_per_pixel * bx,
            east: reported.east - lng_per_pixel * bx,
            north: reported.north + lat_per_pixel * by,
            south: reported.south - lat_per_pixel * by,
        };
        edges.validate()?;

        Ok(Self::assemble(
            edges,
            [
                edges.upper_left(),
                edges.upper_right(),
                edges.lower_right(),
                edges.lower_left(),
            ],
            center,
            geometry.width,
            geometry.height,
            lng_per_pixel,
            lat_per_pixel,
        ))
    }

    /// Derive bounds from five point samples.
    ///
    /// Edges are the averages of the two corners on that edge, which
    /// symmetrizes small per-query noise. The corner samples themselves are
    /// kept verbatim for calibration.
    pub fn from_samples(samples: &CornerSamples, width: u32, height: u32) -> Result<Self, GeoError> {
        MapGeometry::new(width, height).check()?;
        for p in [
            samples.upper_left,
            samples.upper_right,
            samples.lower_right,
            samples.lower_left,
            samples.center,
        ] {
            p.check_finite()?;
        }

        let edges = GeoRect {
            north: (samples.upper_left.lat + samples.upper_right.lat) / 2.0,
            south: (samples.lower_left.lat + samples.lower_right.lat) / 2.0,
            west: (samples.upper_left.lng + samples.lower_left.lng) / 2.0,
            east: (samples.upper_right.lng + samples.lower_right.lng) / 2.0,
        };
        edges.validate()?;

        let lng_per_pixel = (edges.east - edges.west) / width as f64;
        let lat_per_pixel = (edges.south - edges.north) / height as f64;

        Ok(Self::assemble(
            edges,
            [
                samples.upper_left,
                samples.upper_right,
                samples.lower_right,
                samples.lower_left,
            ],
            samples.center,
            width,
            height,
            lng_per_pixel,
            lat_per_pixel,
        ))
    }

    fn assemble(
        edges: GeoRect,
        corners: [GeoPoint; 4],
        center: GeoPoint,
        width: u32,
        height: u32,
        lng_per_pixel: f64,
        lat_per_pixel: f64,
    ) -> Self {
        let [upper_left, upper_right, lower_right, lower_left] = corners;
        Self {
            edges,
            upper_left,
            upper_right,
            lower_right,
            lower_left,
            center,
            width,
            height,
            lng_per_pixel,
            lat_per_pixel,
            scale_x: width as f64 / (edges.west - edges.east).abs(),
            scale_y: height as f64 / (edges.north - edges.south).abs(),
        }
    }

    pub fn edges(&self) -> GeoRect {
        self.edges
    }

    pub fn north(&self) -> f64 {
        self.edges.north
    }

    pub fn south(&self) -> f64 {
        self.edges.south
    }

    pub fn east(&self) -> f64 {
        self.edges.east
    }

    pub fn west(&self) -> f64 {
        self.edges.west
    }

    pub fn upper_left(&self) -> GeoPoint {
        self.upper_left
    }

    pub fn upper_right(&self) -> GeoPoint {
        self.upper_right
    }

    pub fn lower_right(&self) -> GeoPoint {
        self.lower_right
    }

    pub fn lower_left(&self) -> GeoPoint {
        self.lower_left
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Longitude degrees per pixel (signed, west to east).
    pub fn lng_per_pixel(&self) -> f64 {
        self.lng_per_pixel
    }

    /// Latitude degrees per pixel (signed, north to south, so usually negative).
    pub fn lat_per_pixel(&self) -> f64 {
        self.lat_per_pixel
    }

    /// Pixels per degree of longitude.
    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    /// Pixels per degree of latitude.
    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    /// Map a pixel of the tile to a coordinate, interpolating between the
    /// edge anchors at pixel 0 and pixel `n-1`.
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> GeoPoint {
        let (fx, fy) = (self.axis_span(self.width), self.axis_span(self.height));
        GeoPoint::new(
            self.edges.west + px / fx * (self.edges.east - self.edges.west),
            self.edges.north + py / fy * (self.edges.south - self.edges.north),
        )
    }

    /// Inverse of [`GeoBounds::pixel_to_geo`].
    pub fn geo_to_pixel(&self, p: GeoPoint) -> (f64, f64) {
        let (fx, fy) = (self.axis_span(self.width), self.axis_span(self.height));
        (
            (p.lng - self.edges.west) / (self.edges.east - self.edges.west) * fx,
            (p.lat - self.edges.north) / (self.edges.south - self.edges.north) * fy,
        )
    }

    fn axis_span(&self, n: u32) -> f64 {
        n.saturating_sub(1).max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() <= tol,
            "expected {a:.12} ~ {b:.12} within {tol}"
        );
    }

    fn sample_set() -> CornerSamples {
        CornerSamples {
            upper_left: GeoPoint::new(-1.0002, 52.0001),
            upper_right: GeoPoint::new(-0.8999, 51.9998),
            lower_right: GeoPoint::new(-0.9001, 51.9003),
            lower_left: GeoPoint::new(-0.9998, 51.8999),
            center: GeoPoint::new(-0.95, 51.95),
        }
    }

    #[test]
    fn sampled_edges_average_corner_pairs() {
        let s = sample_set();
        let b = GeoBounds::from_samples(&s, 1024, 768).expect("bounds");
        assert_eq!(b.north(), (s.upper_left.lat + s.upper_right.lat) / 2.0);
        assert_eq!(b.south(), (s.lower_left.lat + s.lower_right.lat) / 2.0);
        assert_eq!(b.west(), (s.upper_left.lng + s.lower_left.lng) / 2.0);
        assert_eq!(b.east(), (s.upper_right.lng + s.lower_right.lng) / 2.0);
        assert_eq!(b.upper_left(), s.upper_left);
        assert_eq!(b.lower_right(), s.lower_right);
    }

    #[test]
    fn scale_is_pixels_per_degree() {
        let s = sample_set();
        let b = GeoBounds::from_samples(&s, 1024, 768).expect("bounds");
        assert_close(b.scale_x(), 1024.0 / (b.west() - b.east()).abs(), 1e-9);
        assert_close(b.scale_y(), 768.0 / (b.north() - b.south()).abs(), 1e-9);
        assert!(b.lat_per_pixel() < 0.0);
        assert!(b.lng_per_pixel() > 0.0);
    }

    #[test]
    fn reported_bounds_are_trimmed_by_border() {
        // 100 px wide tile with a 10 px border: reported area is 120 px.
        let geometry = MapGeometry::new(100, 50).with_border(10, 5);
        let reported = GeoRect::new(10.0, 9.0, 2.2, 1.0);
        let b = GeoBounds::from_reported(reported, GeoPoint::new(1.6, 9.5), &geometry)
            .expect("bounds");
        assert_close(b.lng_per_pixel(), 0.01, 1e-12);
        assert_close(b.lat_per_pixel(), -0.0166666666667, 1e-9);
        assert_close(b.west(), 1.1, 1e-12);
        assert_close(b.east(), 2.1, 1e-12);
        assert_close(b.north(), 10.0 - 5.0 / 60.0, 1e-12);
        assert_close(b.south(), 9.0 + 5.0 / 60.0, 1e-12);
        assert_eq!(b.upper_left(), GeoPoint::new(b.west(), b.north()));
        assert_eq!(b.lower_right(), GeoPoint::new(b.east(), b.south()));
    }

    #[test]
    fn rederiving_trimmed_bounds_without_border_is_identity() {
        let geometry = MapGeometry::new(800, 800).with_border(64, 30);
        let first = GeoBounds::from_reported(
            GeoRect::new(52.05, 51.85, -0.85, -1.05),
            GeoPoint::new(-0.95, 51.95),
            &geometry,
        )
        .expect("bounds");

        let again =
            GeoBounds::from_reported(first.edges(), first.center(), &MapGeometry::new(800, 800))
                .expect("bounds");

        for (a, b) in [
            (first.north(), again.north()),
            (first.south(), again.south()),
            (first.east(), again.east()),
            (first.west(), again.west()),
            (first.scale_x(), again.scale_x()),
            (first.scale_y(), again.scale_y()),
            (first.lng_per_pixel(), again.lng_per_pixel()),
            (first.lat_per_pixel(), again.lat_per_pixel()),
        ] {
            assert_close(a, b, 1e-9);
        }
    }

    #[test]
    fn degenerate_samples_are_rejected() {
        let mut s = sample_set();
        s.lower_left.lat = 53.0;
        s.lower_right.lat = 53.0;
        assert!(matches!(
            GeoBounds::from_samples(&s, 100, 100),
            Err(GeoError::InvertedLatitude { .. })
        ));
        assert!(matches!(
            GeoBounds::from_samples(&sample_set(), 0, 100),
            Err(GeoError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn pixel_mapping_hits_corner_anchors() {
        let b = GeoBounds::from_reported(
            GeoRect::new(52.0, 51.9, -0.9, -1.0),
            GeoPoint::new(-0.95, 51.95),
            &MapGeometry::new(800, 800),
        )
        .expect("bounds");
        let p = b.pixel_to_geo(799.0, 799.0);
        assert_close(p.lng, -0.9, 1e-12);
        assert_close(p.lat, 51.9, 1e-12);
        let (x, y) = b.geo_to_pixel(GeoPoint::new(-1.0, 52.0));
        assert_close(x, 0.0, 1e-9);
        assert_close(y, 0.0, 1e-9);
    }

    #[test]
    fn sample_pixels_follow_corner_order() {
        assert_eq!(
            sample_pixels(800, 600),
            [(0, 0), (799, 0), (799, 599), (0, 599), (399, 299)]
        );
    }
}
