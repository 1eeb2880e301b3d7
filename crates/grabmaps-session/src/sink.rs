//! Destinations for captured tiles.

use std::fs;
use std::path::{Path, PathBuf};

use grabmaps_core::{CalibrationRecord, GeoBounds};
use image::RgbImage;
use log::debug;

use crate::error::GrabError;
use crate::traversal::Cell;

/// A captured tile together with its calibration.
#[derive(Clone, Copy, Debug)]
pub struct TileArtifact<'a> {
    /// File name without extension, `{map_name}_{zoom}_{x}_{y}`.
    pub stem: &'a str,
    pub zoom_step: u32,
    pub cell: Cell,
    pub image: &'a RgbImage,
    pub calibration: &'a CalibrationRecord,
    pub bounds: &'a GeoBounds,
}

pub trait TileSink {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError>;
}

impl<T: TileSink + ?Sized> TileSink for &mut T {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError> {
        (**self).store(tile)
    }
}

impl<T: TileSink + ?Sized> TileSink for Box<T> {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError> {
        (**self).store(tile)
    }
}

/// Writes `<stem>.png` and then `<stem>.gdm` into a folder.
///
/// The image is written first, so a `.gdm` file never exists without its tile.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    folder: PathBuf,
}

impl DirectorySink {
    /// Use `folder`, creating it if needed.
    pub fn create(folder: impl Into<PathBuf>) -> Result<Self, GrabError> {
        let folder = folder.into();
        fs::create_dir_all(&folder)?;
        Ok(Self { folder })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn image_path(&self, stem: &str) -> PathBuf {
        self.folder.join(format!("{stem}.png"))
    }

    pub fn calibration_path(&self, stem: &str) -> PathBuf {
        self.folder.join(format!("{stem}.gdm"))
    }
}

impl TileSink for DirectorySink {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError> {
        let image_path = self.image_path(tile.stem);
        tile.image.save(&image_path)?;
        tile.calibration.write_file(self.calibration_path(tile.stem))?;
        debug!("wrote {}", image_path.display());
        Ok(())
    }
}

/// A tile kept in memory by [`MemorySink`].
#[derive(Clone, Debug)]
pub struct StoredTile {
    pub stem: String,
    pub zoom_step: u32,
    pub cell: Cell,
    pub image: RgbImage,
    pub calibration: CalibrationRecord,
    pub bounds: GeoBounds,
}

#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub tiles: Vec<StoredTile>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiles of one zoom step, in capture order.
    pub fn level(&self, zoom_step: u32) -> impl Iterator<Item = &StoredTile> {
        self.tiles.iter().filter(move |t| t.zoom_step == zoom_step)
    }
}

impl TileSink for MemorySink {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError> {
        self.tiles.push(StoredTile {
            stem: tile.stem.to_string(),
            zoom_step: tile.zoom_step,
            cell: tile.cell,
            image: tile.image.clone(),
            calibration: tile.calibration.clone(),
            bounds: *tile.bounds,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabmaps_core::{CornerSamples, GeoPoint};
    use image::Rgb;

    fn artifact_parts() -> (RgbImage, CalibrationRecord, GeoBounds) {
        let samples = CornerSamples {
            upper_left: GeoPoint::new(1.0, 2.0),
            upper_right: GeoPoint::new(1.5, 2.0),
            lower_right: GeoPoint::new(1.5, 1.5),
            lower_left: GeoPoint::new(1.0, 1.5),
            center: GeoPoint::new(1.25, 1.75),
        };
        let bounds = GeoBounds::from_samples(&samples, 8, 4).unwrap();
        let record = CalibrationRecord::from_bounds("M_1_2_3.png", 1, &bounds);
        (RgbImage::from_pixel(8, 4, Rgb([10, 20, 30])), record, bounds)
    }

    #[test]
    fn directory_sink_writes_png_and_gdm() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path().join("tiles")).unwrap();
        let (image, calibration, bounds) = artifact_parts();
        sink.store(&TileArtifact {
            stem: "M_1_2_3",
            zoom_step: 1,
            cell: Cell::new(2, 3),
            image: &image,
            calibration: &calibration,
            bounds: &bounds,
        })
        .unwrap();

        let png = image::open(sink.image_path("M_1_2_3")).unwrap().to_rgb8();
        assert_eq!(png, image);
        let back = CalibrationRecord::read_file(sink.calibration_path("M_1_2_3")).unwrap();
        assert_eq!(back.image_file_name, "M_1_2_3.png");
        assert_eq!(back.zoom_level, 1);
    }

    #[test]
    fn memory_sink_groups_by_level() {
        let (image, calibration, bounds) = artifact_parts();
        let mut sink = MemorySink::new();
        for (zoom_step, x) in [(0, 0), (1, 0), (1, 1)] {
            sink.store(&TileArtifact {
                stem: "t",
                zoom_step,
                cell: Cell::new(x, 0),
                image: &image,
                calibration: &calibration,
                bounds: &bounds,
            })
            .unwrap();
        }
        assert_eq!(sink.level(1).count(), 2);
        assert_eq!(sink.level(0).count(), 1);
    }
}
