use serde::{Deserialize, Serialize};

/// Errors raised by the geographic primitives.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("non-finite coordinate (lng={lng}, lat={lat})")]
    NonFinite { lng: f64, lat: f64 },
    #[error("degenerate bounds: north={north} must be greater than south={south}")]
    InvertedLatitude { north: f64, south: f64 },
    #[error("degenerate bounds: west={west} and east={east} span no longitude")]
    EmptyLongitude { west: f64, east: f64 },
    #[error("invalid pixel dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// A geographic coordinate in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    pub(crate) fn check_finite(self) -> Result<Self, GeoError> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(GeoError::NonFinite {
                lng: self.lng,
                lat: self.lat,
            })
        }
    }

    /// Shift by a longitude/latitude delta.
    pub fn offset(self, d_lng: f64, d_lat: f64) -> Self {
        Self::new(self.lng + d_lng, self.lat + d_lat)
    }

    /// Midpoint of two coordinates.
    pub fn midpoint(a: Self, b: Self) -> Self {
        Self::new((a.lng + b.lng) / 2.0, (a.lat + b.lat) / 2.0)
    }
}

/// Edges of an axis-aligned geographic rectangle.
///
/// Longitude wraparound at the antimeridian is not modelled: `east - west`
/// carries the viewer's sign convention as reported.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoRect {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Check the `north > south` invariant and that longitude spans something.
    pub fn validate(&self) -> Result<(), GeoError> {
        GeoPoint::new(self.west, self.north).check_finite()?;
        GeoPoint::new(self.east, self.south).check_finite()?;
        if self.north <= self.south {
            return Err(GeoError::InvertedLatitude {
                north: self.north,
                south: self.south,
            });
        }
        if self.east == self.west {
            return Err(GeoError::EmptyLongitude {
                west: self.west,
                east: self.east,
            });
        }
        Ok(())
    }

    pub fn width_deg(&self) -> f64 {
        (self.east - self.west).abs()
    }

    pub fn height_deg(&self) -> f64 {
        (self.north - self.south).abs()
    }

    pub fn upper_left(&self) -> GeoPoint {
        GeoPoint::new(self.west, self.north)
    }

    pub fn upper_right(&self) -> GeoPoint {
        GeoPoint::new(self.east, self.north)
    }

    pub fn lower_right(&self) -> GeoPoint {
        GeoPoint::new(self.east, self.south)
    }

    pub fn lower_left(&self) -> GeoPoint {
        GeoPoint::new(self.west, self.south)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::midpoint(self.upper_left(), self.lower_right())
    }

    /// Whether `p` lies inside or on the edge of the rectangle.
    pub fn contains(&self, p: GeoPoint) -> bool {
        let (lo, hi) = if self.west <= self.east {
            (self.west, self.east)
        } else {
            (self.east, self.west)
        };
        p.lat <= self.north && p.lat >= self.south && p.lng >= lo && p.lng <= hi
    }
}
