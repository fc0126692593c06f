//! Image OCR strategy.
//!
//! Decodes the image, rejects thumbnails and icons below a minimum size
//! (as a skip, not a failure), downscales large images to keep OCR latency
//! bounded, and hands the result to the shared OCR engine.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use super::{
    Extraction, ExtractionError, OcrHandle, Strategy, StrategyInput, StrategyResult,
};

/// Images with a shorter edge below this are skipped.
pub const MIN_EDGE_PX: u32 = 32;

/// Images smaller than this many bytes are skipped.
pub const MIN_BYTES: u64 = 1024;

/// Longest edge after downscaling.
pub const MAX_EDGE_PX: u32 = 1024;

/// OCR transcription of raster images.
pub struct ImageStrategy {
    ocr: OcrHandle,
}

impl ImageStrategy {
    #[must_use]
    pub fn new(ocr: OcrHandle) -> Self {
        Self { ocr }
    }
}

impl Strategy for ImageStrategy {
    fn name(&self) -> &'static str {
        "image-ocr"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError> {
        if (input.bytes.len() as u64) < MIN_BYTES {
            return Ok(StrategyResult::Skipped(format!(
                "image below {MIN_BYTES} bytes, likely an icon"
            )));
        }

        let decoded = image::load_from_memory(&input.bytes)
            .map_err(|e| ExtractionError::Decode(format!("image decode failed: {e}")))?;

        let (width, height) = decoded.dimensions();
        if width.min(height) < MIN_EDGE_PX {
            return Ok(StrategyResult::Skipped(format!(
                "image {width}x{height} below minimum edge of {MIN_EDGE_PX}px"
            )));
        }

        let prepared = downscale(decoded);

        let mut engine = self
            .ocr
            .try_lock()
            .map_err(|_| ExtractionError::OcrBusy("a previous transcription has not returned"))?;
        let text = engine.transcribe(&prepared);

        Ok(StrategyResult::Extracted(Extraction::Single(text)))
    }
}

/// Downscale so the longest edge is at most [`MAX_EDGE_PX`].
fn downscale(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width.max(height) <= MAX_EDGE_PX {
        return image;
    }
    log::debug!(
        "Downscaling {}x{} image for OCR (max edge {})",
        width,
        height,
        MAX_EDGE_PX
    );
    image.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Lanczos3)
}
