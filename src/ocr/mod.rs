pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod regions;
pub mod setup;

pub use engine::{RecognizerFactory, RecognizerGuard, TesseractFactory, TextRecognizer};
pub use extract::{parse_identity, ParsedIdentity};
pub use preprocess::{binarize, BinaryImage};
pub use regions::{compute_regions, Region};
pub use setup::ensure_tessdata;

use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

use preprocess::save_band_preview;

/// Failures that discard a single capture.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid image: {width}x{height} has no usable area")]
    InvalidImageKind { width: u32, height: u32 },

    #[error("Text recognition failed: {0}")]
    Recognition(String),
}

/// High-level function: card image → parsed identity.
///
/// Crops and binarizes the name and footer bands, runs each through the
/// recognizer once, and parses the combined text.
pub fn read_card(
    img: &RgbaImage,
    recognizer: &mut RecognizerGuard,
    preview_dir: Option<&Path>,
) -> Result<ParsedIdentity, ScanError> {
    let (width, height) = img.dimensions();
    let (name_region, footer_region) = compute_regions(width, height)?;

    crate::log(&format!(
        "Image {}x{}: name band y={:.0} h={:.0}, footer band y={:.0} h={:.0}",
        width, height, name_region.y, name_region.height, footer_region.y, footer_region.height
    ));

    let name_binary = binarize(img, &name_region)?;
    save_band_preview(&name_binary, preview_dir, "name");
    let footer_binary = binarize(img, &footer_region)?;
    save_band_preview(&footer_binary, preview_dir, "footer");

    let name_lines = recognizer
        .recognize(&name_binary)
        .map_err(|e| ScanError::Recognition(e.to_string()))?;
    let footer_lines = recognizer
        .recognize(&footer_binary)
        .map_err(|e| ScanError::Recognition(e.to_string()))?;

    Ok(parse_identity(&name_lines, &footer_lines))
}
