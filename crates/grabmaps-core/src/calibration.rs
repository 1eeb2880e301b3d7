//! Calibration records in the GDM XML format.
//!
//! A record anchors five tile pixels to coordinates: the four corners
//! `(0,0)`, `(w-1,0)`, `(w-1,h-1)`, `(0,h-1)` and the center pixel
//! `(w/2-1, h/2-1)`. Five anchors over-determine the axis-aligned model on
//! purpose, see [`crate::fit_axis_aligned`].
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <GDM version="1.0">
//!   <imageFileName>Map_1_0_0.png</imageFileName>
//!   <zoomLevel>1</zoomLevel>
//!   <calibrationPoint>
//!     <x>0</x>
//!     <y>0</y>
//!     <longitude>-1.000000</longitude>
//!     <latitude>52.000000</latitude>
//!   </calibrationPoint>
//!   ...
//! </GDM>
//! ```

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path};

use crate::bounds::{center_pixel, GeoBounds};
use crate::geo::GeoPoint;

pub const GDM_VERSION: &str = "1.0";

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(String),
    #[error("unsupported GDM version `{0}`")]
    Version(String),
    #[error("missing <{0}> element")]
    Missing(&'static str),
    #[error("invalid value `{value}` in <{element}>")]
    InvalidValue { element: String, value: String },
    #[error("expected 5 calibration points, found {0}")]
    PointCount(usize),
}

fn xml_err(e: impl std::fmt::Display) -> CalibrationError {
    CalibrationError::Xml(e.to_string())
}

/// One pixel-to-coordinate anchor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: u32,
    pub y: u32,
    pub position: GeoPoint,
}

impl CalibrationPoint {
    pub fn new(x: u32, y: u32, position: GeoPoint) -> Self {
        Self { x, y, position }
    }
}

/// Calibration of one saved tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub image_file_name: String,
    pub zoom_level: u32,
    /// Upper-left, upper-right, lower-right, lower-left, center.
    pub points: [CalibrationPoint; 5],
}

impl CalibrationRecord {
    /// Anchor the tile's corner and center pixels to `bounds`.
    pub fn from_bounds(
        image_file_name: impl Into<String>,
        zoom_level: u32,
        bounds: &GeoBounds,
    ) -> Self {
        let (w, h) = (bounds.width(), bounds.height());
        let (r, b) = (w.saturating_sub(1), h.saturating_sub(1));
        Self {
            image_file_name: image_file_name.into(),
            zoom_level,
            points: [
                CalibrationPoint::new(0, 0, bounds.upper_left()),
                CalibrationPoint::new(r, 0, bounds.upper_right()),
                CalibrationPoint::new(r, b, bounds.lower_right()),
                CalibrationPoint::new(0, b, bounds.lower_left()),
                CalibrationPoint::new(center_pixel(w), center_pixel(h), bounds.center()),
            ],
        }
    }

    /// Serialize as a GDM document.
    pub fn write_xml<W: Write>(&self, out: W) -> Result<(), CalibrationError> {
        let mut w = Writer::new_with_indent(out, b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        w.write_event(Event::Start(
            BytesStart::new("GDM").with_attributes([("version", GDM_VERSION)]),
        ))
        .map_err(xml_err)?;
        write_text_element(&mut w, "imageFileName", &self.image_file_name)?;
        write_text_element(&mut w, "zoomLevel", &self.zoom_level.to_string())?;
        for p in &self.points {
            w.write_event(Event::Start(BytesStart::new("calibrationPoint")))
                .map_err(xml_err)?;
            write_text_element(&mut w, "x", &p.x.to_string())?;
            write_text_element(&mut w, "y", &p.y.to_string())?;
            write_text_element(&mut w, "longitude", &format!("{:.6}", p.position.lng))?;
            write_text_element(&mut w, "latitude", &format!("{:.6}", p.position.lat))?;
            w.write_event(Event::End(BytesEnd::new("calibrationPoint")))
                .map_err(xml_err)?;
        }
        w.write_event(Event::End(BytesEnd::new("GDM")))
            .map_err(xml_err)?;
        w.get_mut().write_all(b"\n")?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String, CalibrationError> {
        let mut buf = Vec::new();
        self.write_xml(&mut buf)?;
        String::from_utf8(buf).map_err(xml_err)
    }

    /// Write the GDM document to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        fs::write(path, self.to_xml_string()?)?;
        Ok(())
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let raw = fs::read_to_string(path)?;
        Self::from_xml_str(&raw)
    }

    /// Parse a GDM document.
    pub fn from_xml_str(xml: &str) -> Result<Self, CalibrationError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut image_file_name = None;
        let mut zoom_level = None;
        let mut points = Vec::new();
        let mut current = PartialPoint::default();

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "GDM" {
                        let version = e
                            .try_get_attribute("version")
                            .map_err(xml_err)?
                            .ok_or(CalibrationError::Missing("GDM version"))?
                            .unescape_value()
                            .map_err(xml_err)?
                            .into_owned();
                        if version != GDM_VERSION {
                            return Err(CalibrationError::Version(version));
                        }
                    } else if name == "calibrationPoint" {
                        current = PartialPoint::default();
                    }
                    stack.push(name);
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"calibrationPoint" {
                        points.push(current.finish()?);
                    }
                    stack.pop();
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_err)?;
                    let Some(element) = stack.last() else {
                        continue;
                    };
                    match element.as_str() {
                        "imageFileName" => image_file_name = Some(text.into_owned()),
                        "zoomLevel" => zoom_level = Some(parse_value(element, &text)?),
                        "x" => current.x = Some(parse_value(element, &text)?),
                        "y" => current.y = Some(parse_value(element, &text)?),
                        "longitude" => current.lng = Some(parse_value(element, &text)?),
                        "latitude" => current.lat = Some(parse_value(element, &text)?),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let count = points.len();
        let points: [CalibrationPoint; 5] = points
            .try_into()
            .map_err(|_| CalibrationError::PointCount(count))?;

        Ok(Self {
            image_file_name: image_file_name.ok_or(CalibrationError::Missing("imageFileName"))?,
            zoom_level: zoom_level.ok_or(CalibrationError::Missing("zoomLevel"))?,
            points,
        })
    }
}

fn write_text_element<W: Write>(
    w: &mut Writer<W>,
    name: &str,
    value: &str,
) -> Result<(), CalibrationError> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn parse_value<T: std::str::FromStr>(element: &str, text: &str) -> Result<T, CalibrationError> {
    text.trim()
        .parse()
        .map_err(|_| CalibrationError::InvalidValue {
            element: element.to_string(),
            value: text.to_string(),
        })
}

#[derive(Default)]
struct PartialPoint {
    x: Option<u32>,
    y: Option<u32>,
    lng: Option<f64>,
    lat: Option<f64>,
}

impl PartialPoint {
    fn finish(&self) -> Result<CalibrationPoint, CalibrationError> {
        Ok(CalibrationPoint::new(
            self.x.ok_or(CalibrationError::Missing("x"))?,
            self.y.ok_or(CalibrationError::Missing("y"))?,
            GeoPoint::new(
                self.lng.ok_or(CalibrationError::Missing("longitude"))?,
                self.lat.ok_or(CalibrationError::Missing("latitude"))?,
            ),
        ))
    }
}
