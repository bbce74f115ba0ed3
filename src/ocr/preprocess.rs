use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use super::regions::Region;
use super::ScanError;

/// Crops are rescaled so that the text band is about this tall.
/// Tesseract's line segmenter is most reliable around this size.
const TARGET_HEIGHT: f32 = 250.0;
const MIN_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 4.0;
/// Hard cap on either output dimension.
pub const MAX_OUTPUT_DIM: u32 = 4000;

/// Mean luminance below which the band is treated as light text on a dark background.
const DARK_BACKGROUND_LUMA: f32 = 110.0;
const LIGHT_CUTOFF_FACTOR: f32 = 0.85;
const DARK_CUTOFF_FACTOR: f32 = 1.15;

/// A black-on-white binarized crop, ready for OCR.
///
/// Stored as RGBA with R=G=B in {0, 255} and A=255.
#[derive(Clone, Debug)]
pub struct BinaryImage {
    pub pixels: RgbaImage,
    /// Region of the source image this crop was taken from.
    pub source: Region,
    /// True if the band was detected as a dark background and inverted.
    pub inverted: bool,
}

impl BinaryImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Writes a PNG copy of the crop for inspection.
    pub fn save_preview(&self, path: &Path) -> Result<()> {
        self.pixels
            .save(path)
            .context(format!("Failed to save preview: {}", path.display()))
    }
}

/// Computes the rescaled (width, height) for a region.
///
/// The scale targets a fixed band height, clamped to [0.1, 4.0]; if that would
/// make the crop wider than the cap, the width cap wins.
pub fn target_dimensions(region: &Region) -> (u32, u32) {
    let mut scale = (TARGET_HEIGHT / region.height).clamp(MIN_SCALE, MAX_SCALE);
    if region.width * scale > MAX_OUTPUT_DIM as f32 {
        scale = MAX_OUTPUT_DIM as f32 / region.width;
    }

    let w = ((region.width * scale).floor() as u32).clamp(1, MAX_OUTPUT_DIM);
    let h = ((region.height * scale).floor() as u32).clamp(1, MAX_OUTPUT_DIM);
    (w, h)
}

/// Crops a sub-region from an image using absolute pixel coordinates.
///
/// Clamps to image bounds. Returns `InvalidImageKind` if nothing of the
/// region lies inside the image.
pub fn crop_region(img: &RgbaImage, region: &Region) -> Result<RgbaImage, ScanError> {
    let (w, h) = img.dimensions();

    let x0 = (region.x.max(0.0) as u32).min(w);
    let y0 = (region.y.max(0.0) as u32).min(h);
    // Sub-pixel bands on tiny images still get one row or column.
    let rw = (region.width.max(0.0) as u32).max(1).min(w - x0);
    let rh = (region.height.max(0.0) as u32).max(1).min(h - y0);

    if rw == 0 || rh == 0 {
        return Err(ScanError::InvalidImageKind {
            width: rw,
            height: rh,
        });
    }

    Ok(image::imageops::crop_imm(img, x0, y0, rw, rh).to_image())
}

fn luminance(pixel: &Rgba<u8>) -> f32 {
    (pixel[0] as f32 + pixel[1] as f32 + pixel[2] as f32) / 3.0
}

/// Crops, rescales and binarizes one text band.
///
/// The threshold adapts to the band's mean luminance: on light card stock ink
/// sits well below the mean, on dark frames text sits well above it. Dark
/// bands are inverted so text always comes out black on white.
pub fn binarize(img: &RgbaImage, region: &Region) -> Result<BinaryImage, ScanError> {
    let cropped = crop_region(img, region)?;
    let (target_w, target_h) = target_dimensions(region);

    crate::log(&format!(
        "OCR crop: {}x{} (src: {:.0}x{:.0})",
        target_w, target_h, region.width, region.height
    ));

    let resized = image::imageops::resize(&cropped, target_w, target_h, FilterType::Triangle);

    let pixel_count = (target_w as f64) * (target_h as f64);
    let total: f64 = resized.pixels().map(|p| luminance(p) as f64).sum();
    let avg = (total / pixel_count) as f32;

    let reverse = avg < DARK_BACKGROUND_LUMA;
    let cutoff = if reverse {
        avg * DARK_CUTOFF_FACTOR
    } else {
        avg * LIGHT_CUTOFF_FACTOR
    };

    let pixels: RgbaImage = ImageBuffer::from_fn(target_w, target_h, |x, y| {
        let bright = luminance(resized.get_pixel(x, y)) > cutoff;
        let value = if bright != reverse { 255u8 } else { 0u8 };
        Rgba([value, value, value, 255])
    });

    Ok(BinaryImage {
        pixels,
        source: *region,
        inverted: reverse,
    })
}

/// Saves a preview for a band if a preview directory is configured.
///
/// Preview failures are logged and otherwise ignored.
pub fn save_band_preview(binary: &BinaryImage, preview_dir: Option<&Path>, band: &str) {
    let Some(dir) = preview_dir else {
        return;
    };
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    let path: PathBuf = dir.join(format!("{}_{}.png", stamp, band));
    match binary.save_preview(&path) {
        Ok(()) => crate::log(&format!("Saved {} preview: {}", band, path.display())),
        Err(e) => crate::log(&format!("Preview save failed: {}", e)),
    }
}
