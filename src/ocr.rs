//! OCR engine collaborator.
//!
//! The pipeline owns exactly one engine instance for its whole lifetime;
//! strategies borrow it through a mutex so only one transcription runs at a
//! time. Engines never fail: transcription returns either recognized text or
//! a fixed sentinel naming why no text is available, so OCR problems degrade
//! the artifact instead of failing the file.

use image::DynamicImage;

/// Sentinel emitted when transcription is unavailable or produced nothing.
pub const OCR_UNAVAILABLE: &str = "[no text recognized]";

/// A text transcription engine for raster images.
///
/// Implementations must be infallible at the call boundary: any internal
/// error is folded into the returned text.
pub trait OcrEngine: Send {
    /// Engine name, for logs and artifacts.
    fn name(&self) -> &'static str;

    /// Transcribe an image to plain text.
    ///
    /// Returns recognized text, or a bracketed sentinel line when nothing
    /// could be recognized.
    fn transcribe(&mut self, image: &DynamicImage) -> String;
}

/// Engine used when OCR support is not compiled in or not wanted.
///
/// Always returns the sentinel, so image-family files still produce a
/// deterministic artifact.
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn transcribe(&mut self, _image: &DynamicImage) -> String {
        format!("{OCR_UNAVAILABLE}: OCR support is disabled in this build")
    }
}

/// Tesseract-backed engine.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    language: String,
    /// Page segmentation mode; 3 is fully automatic.
    page_seg_mode: i32,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Create an engine for the given language code (e.g. "eng", "spa").
    #[must_use]
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            page_seg_mode: 3,
        }
    }

    fn run_tesseract(&self, png_bytes: &[u8]) -> Result<String, String> {
        use tesseract::Tesseract;

        let mut tess = Tesseract::new(None, Some(&self.language))
            .map_err(|e| format!("initialization failed: {e}"))?
            .set_variable("tessedit_pageseg_mode", &self.page_seg_mode.to_string())
            .map_err(|e| format!("failed to set page segmentation mode: {e}"))?
            .set_image_from_mem(png_bytes)
            .map_err(|e| format!("failed to set image: {e}"))?;
        let text = tess.get_text().map_err(|e| format!("recognition failed: {e}"))?;
        Ok(clean_ocr_text(&text))
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn transcribe(&mut self, image: &DynamicImage) -> String {
        let mut png_bytes = Vec::new();
        if let Err(e) = image.write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        ) {
            log::warn!("Failed to encode image for OCR: {}", e);
            return format!("{OCR_UNAVAILABLE}: image encoding failed");
        }

        match self.run_tesseract(&png_bytes) {
            Ok(text) if text.is_empty() => OCR_UNAVAILABLE.to_string(),
            Ok(text) => text,
            Err(e) => {
                log::warn!("Tesseract transcription failed: {}", e);
                format!("{OCR_UNAVAILABLE}: {e}")
            }
        }
    }
}

/// Collapse runs of whitespace and strip control characters from OCR output.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn clean_ocr_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = false;
    let mut prev_was_newline = false;

    for c in text.chars() {
        if c == '\n' {
            if !prev_was_newline {
                result.push(c);
                prev_was_newline = true;
                prev_was_space = false;
            }
        } else if c.is_whitespace() {
            if !prev_was_space && !prev_was_newline {
                result.push(' ');
                prev_was_space = true;
            }
        } else if c.is_control() || c == '\u{FFFD}' {
            continue;
        } else {
            result.push(c);
            prev_was_space = false;
            prev_was_newline = false;
        }
    }

    result.trim().to_string()
}

/// Build the default engine for this build configuration.
#[must_use]
pub fn default_engine(language: &str) -> Box<dyn OcrEngine> {
    #[cfg(feature = "ocr")]
    {
        Box::new(TesseractOcr::new(language))
    }
    #[cfg(not(feature = "ocr"))]
    {
        let _ = language;
        Box::new(DisabledOcr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_engine_returns_sentinel() {
        let mut engine = DisabledOcr;
        let image = DynamicImage::new_rgb8(4, 4);
        let text = engine.transcribe(&image);
        assert!(text.starts_with(OCR_UNAVAILABLE));
    }

    #[test]
    fn test_clean_ocr_text_collapses_whitespace() {
        let dirty = "Hello   World\n\n\nNext  line\u{0}text";
        let cleaned = clean_ocr_text(dirty);

        assert!(!cleaned.contains("   "));
        assert!(!cleaned.contains("\n\n"));
        assert!(!cleaned.contains('\u{0}'));
        assert!(cleaned.starts_with("Hello World"));
    }

    #[test]
    fn test_clean_ocr_text_trims() {
        assert_eq!(clean_ocr_text("  spaced out  "), "spaced out");
        assert_eq!(clean_ocr_text(""), "");
    }
}
