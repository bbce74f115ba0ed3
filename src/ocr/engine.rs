use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

use super::preprocess::BinaryImage;
use super::setup::{find_tessdata_dir, find_tesseract_executable};

/// A text recognition engine.
///
/// Receives a binarized crop and returns recognized lines in reading order.
/// Output quality is untrusted and callers never retry a failed call.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, image: &BinaryImage) -> Result<Vec<String>>;

    /// Releases engine resources. Called exactly once, when the session ends.
    fn terminate(&mut self) {}
}

/// Creates a recognizer when a local scanning session starts.
pub trait RecognizerFactory {
    fn acquire(&self) -> Result<Box<dyn TextRecognizer>>;
}

/// Scoped ownership of a recognizer.
///
/// The recognizer is terminated when the guard is dropped, however the
/// session ended.
pub struct RecognizerGuard {
    inner: Box<dyn TextRecognizer>,
}

impl RecognizerGuard {
    pub fn acquire(factory: &dyn RecognizerFactory) -> Result<Self> {
        crate::log("[OCR] Initializing recognizer...");
        let inner = factory.acquire()?;
        crate::log("[OCR] Recognizer ready");
        Ok(Self { inner })
    }

    pub fn recognize(&mut self, image: &BinaryImage) -> Result<Vec<String>> {
        self.inner.recognize(image)
    }
}

impl Drop for RecognizerGuard {
    fn drop(&mut self) {
        self.inner.terminate();
        crate::log("[OCR] Recognizer terminated");
    }
}

/// Tesseract command-line engine.
///
/// Crops are written into a private scratch directory that lives as long
/// as the recognizer.
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    scratch: Option<TempDir>,
    calls: u32,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("card-lens-ocr")
            .tempdir()
            .context("Failed to create OCR scratch directory")?;
        Ok(Self {
            executable,
            tessdata,
            scratch: Some(scratch),
            calls: 0,
        })
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&mut self, image: &BinaryImage) -> Result<Vec<String>> {
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| anyhow!("Recognizer already terminated"))?;

        self.calls += 1;
        let input = scratch.path().join(format!("crop_{:05}.png", self.calls));
        image.save_preview(&input)?;

        let mut cmd = Command::new(&self.executable);
        cmd.arg(&input).arg("stdout");
        if let Some(tessdata) = &self.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }
        let output = cmd
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("6") // Assume single uniform block of text
            .output()
            .context("Failed to run Tesseract")?;

        let _ = std::fs::remove_file(&input);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(split_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    fn terminate(&mut self) {
        // Dropping the TempDir removes any leftover crops.
        self.scratch.take();
    }
}

/// Finds Tesseract on this machine using the configured overrides.
pub struct TesseractFactory {
    pub executable: Option<PathBuf>,
    pub tessdata: Option<PathBuf>,
}

impl RecognizerFactory for TesseractFactory {
    fn acquire(&self) -> Result<Box<dyn TextRecognizer>> {
        let executable = match &self.executable {
            Some(path) => path.clone(),
            None => find_tesseract_executable()?,
        };
        let tessdata = match &self.tessdata {
            Some(dir) => Some(dir.clone()),
            // The engine falls back to its compiled-in location when we find nothing.
            None => find_tessdata_dir().ok(),
        };
        crate::log(&format!("Using Tesseract at: {}", executable.display()));
        Ok(Box::new(TesseractRecognizer::new(executable, tessdata)?))
    }
}

/// Splits raw engine output into lines, keeping order and dropping blanks.
fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
