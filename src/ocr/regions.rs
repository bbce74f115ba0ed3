//! Region-of-interest layout for a card framed in a square viewport.
//!
//! The capture UI shows the central square of the camera frame, and the user
//! lines the card up inside it. Both text bands are placed relative to that
//! square, so the layout is independent of the source aspect ratio.

use serde::{Deserialize, Serialize};

use super::ScanError;

/// Name band: offset and size as fractions of the central square.
const NAME_BAND: BandLayout = BandLayout {
    x: 0.10,
    y: 0.04,
    width: 0.80,
    height: 0.12,
};

/// Footer band (set code and collector number).
const FOOTER_BAND: BandLayout = BandLayout {
    x: 0.15,
    y: 0.82,
    width: 0.70,
    height: 0.12,
};

struct BandLayout {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// A rectangle in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// Bottom edge (exclusive).
    #[cfg(test)]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Right edge (exclusive).
    #[cfg(test)]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Computes the (name, footer) regions for an image of the given size.
///
/// Returns `InvalidImageKind` for zero-area images.
pub fn compute_regions(width: u32, height: u32) -> Result<(Region, Region), ScanError> {
    if width == 0 || height == 0 {
        return Err(ScanError::InvalidImageKind { width, height });
    }

    let min_dim = width.min(height) as f32;
    let start_x = (width as f32 - min_dim) / 2.0;
    let start_y = (height as f32 - min_dim) / 2.0;

    let place = |band: &BandLayout| Region {
        x: start_x + band.x * min_dim,
        y: start_y + band.y * min_dim,
        width: band.width * min_dim,
        height: band.height * min_dim,
    };

    Ok((place(&NAME_BAND), place(&FOOTER_BAND)))
}
