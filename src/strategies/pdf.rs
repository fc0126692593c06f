//! Hybrid PDF strategy.
//!
//! Walks the document page by page. Pages with a usable text layer are
//! extracted directly; pages that are raster scans (embedded images, little
//! or no text) go through the shared OCR engine instead. Page results are
//! concatenated in page order, with a heading per page for multi-page
//! documents.

use lopdf::Document;

use super::{
    Extraction, ExtractionError, OcrHandle, Strategy, StrategyInput, StrategyResult,
};

/// A page whose trimmed text layer is shorter than this is treated as a
/// scan when it also carries raster images.
const MIN_PAGE_TEXT_CHARS: usize = 24;

/// Per-page text extraction with OCR fallback for scanned pages.
pub struct PdfStrategy {
    ocr: OcrHandle,
}

impl PdfStrategy {
    #[must_use]
    pub fn new(ocr: OcrHandle) -> Self {
        Self { ocr }
    }

    /// OCR the largest decodable raster image embedded in a page.
    ///
    /// Only JPEG-compressed (`DCTDecode`) streams can be decoded without a
    /// full page rasterizer; other filters produce a marker line instead.
    fn ocr_page(
        &self,
        doc: &Document,
        page_id: lopdf::ObjectId,
        page_num: u32,
    ) -> Result<String, ExtractionError> {
        let images = doc.get_page_images(page_id).unwrap_or_default();
        let jpeg = images
            .iter()
            .filter(|img| {
                img.filters
                    .as_ref()
                    .is_some_and(|f| f.iter().any(|name| name == "DCTDecode"))
            })
            .max_by_key(|img| img.width.max(0) as i128 * img.height.max(0) as i128);

        let Some(jpeg) = jpeg else {
            return Ok(format!(
                "[page {page_num}: raster content in an unsupported encoding]"
            ));
        };

        let decoded = match image::load_from_memory(jpeg.content) {
            Ok(img) => img,
            Err(e) => {
                log::debug!("Page {} image decode failed: {}", page_num, e);
                return Ok(format!(
                    "[page {page_num}: raster content could not be decoded]"
                ));
            }
        };

        let mut engine = self
            .ocr
            .try_lock()
            .map_err(|_| ExtractionError::OcrBusy("a previous transcription has not returned"))?;
        Ok(engine.transcribe(&decoded))
    }
}

impl Strategy for PdfStrategy {
    fn name(&self) -> &'static str {
        "pdf-hybrid"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError> {
        let doc = match Document::load_mem(&input.bytes) {
            Ok(doc) => doc,
            Err(e) => {
                // Some malformed files lopdf rejects still have a
                // recoverable text layer.
                log::debug!("lopdf rejected {}: {}, trying fallback", input.rel_path, e);
                return fallback_whole_document(input, &e.to_string());
            }
        };

        if doc.is_encrypted() {
            return Ok(StrategyResult::Skipped(
                "PDF is encrypted".to_string(),
            ));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Ok(StrategyResult::Skipped("PDF has no pages".to_string()));
        }

        let multi_page = pages.len() > 1;
        let mut page_texts = Vec::with_capacity(pages.len());
        for (&page_num, &page_id) in &pages {
            let layer = doc.extract_text(&[page_num]).unwrap_or_default();
            let layer = layer.trim();

            let has_images = !doc.get_page_images(page_id).unwrap_or_default().is_empty();
            let body = if has_images && layer.chars().count() < MIN_PAGE_TEXT_CHARS {
                self.ocr_page(&doc, page_id, page_num)?
            } else if layer.is_empty() {
                format!("[page {page_num}: no extractable text]")
            } else {
                layer.to_string()
            };

            if multi_page {
                page_texts.push(format!("## Page {page_num}\n\n{body}"));
            } else {
                page_texts.push(body);
            }
        }

        Ok(StrategyResult::Extracted(Extraction::Single(
            page_texts.join("\n\n"),
        )))
    }
}

/// Whole-document text extraction for files lopdf cannot parse.
fn fallback_whole_document(
    input: &StrategyInput,
    parse_error: &str,
) -> Result<StrategyResult, ExtractionError> {
    match pdf_extract::extract_text_from_mem(&input.bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(StrategyResult::Extracted(
            Extraction::Single(text.trim().to_string()),
        )),
        Ok(_) => Err(ExtractionError::Pdf(format!(
            "no extractable text ({parse_error})"
        ))),
        Err(e) => Err(ExtractionError::Pdf(format!("{parse_error}; fallback: {e}"))),
    }
}
