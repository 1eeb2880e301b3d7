//! Cropping raw frames to tiles and checking tile size.

use grabmaps_core::ViewerProfile;
use image::{imageops, RgbImage};

use crate::error::{GrabError, ViewError};

/// Cut the map tile out of a raw viewer frame.
///
/// Removes the profile margins and then the border on each side. The
/// result is not size-checked; see [`check_tile`].
pub fn crop_frame(frame: &RgbImage, profile: &ViewerProfile) -> Result<RgbImage, ViewError> {
    let (fw, fh) = frame.dimensions();
    let (x0, y0) = profile.crop_origin();
    let x1 = fw.checked_sub(profile.margins.right + profile.border_x);
    let y1 = fh.checked_sub(profile.margins.bottom + profile.border_y);
    match (x1, y1) {
        (Some(x1), Some(y1)) if x1 > x0 && y1 > y0 => {
            Ok(imageops::crop_imm(frame, x0, y0, x1 - x0, y1 - y0).to_image())
        }
        _ => Err(ViewError::FrameTooSmall {
            width: fw,
            height: fh,
        }),
    }
}

/// A tile whose size differs from the profile is fatal: its calibration
/// would not describe the pixels on disk.
pub fn check_tile(tile: &RgbImage, profile: &ViewerProfile) -> Result<(), GrabError> {
    let (width, height) = tile.dimensions();
    if (width, height) != (profile.tile_width, profile.tile_height) {
        return Err(GrabError::DimensionMismatch {
            width,
            height,
            expected_width: profile.tile_width,
            expected_height: profile.tile_height,
        });
    }
    Ok(())
}
