//! Extraction strategies: one per format family.
//!
//! The strategy set is a closed enumeration. Routing a new format means
//! adding a [`StrategyKind`] variant and its implementation here; there is
//! deliberately no runtime plugin registry.
//!
//! A strategy is a pure function from file bytes to an [`Extraction`] (or a
//! deliberate skip). Strategies never touch the registry, the cache, or the
//! output tree, and they never enforce their own timeout; the dispatcher
//! does all of that.

pub mod image;
pub mod office;
pub mod pdf;
pub mod placeholder;
pub mod sheet;
pub mod text;

pub use image::ImageStrategy;
pub use office::OfficeStrategy;
pub use pdf::PdfStrategy;
pub use placeholder::PlaceholderStrategy;
pub use sheet::SheetStrategy;
pub use text::TextStrategy;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::ocr::OcrEngine;
use crate::scanner::DetectedType;

/// Shared handle to the single OCR engine instance.
///
/// Strategies `try_lock` it: if a timed-out invocation still holds the
/// engine, later OCR attempts fail fast instead of queueing behind a thread
/// that may never finish.
pub type OcrHandle = Arc<Mutex<Box<dyn OcrEngine>>>;

/// One named sheet extracted from a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    /// Sheet name, sanitized for use as a file name.
    pub name: String,
    /// Extracted sheet content (a Markdown table).
    pub text: String,
}

/// The payload a strategy produces.
///
/// Most strategies produce one text unit per file; the spreadsheet strategy
/// explodes a workbook into an index plus one unit per sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Extraction {
    /// One output unit.
    Single(String),
    /// An index unit plus one unit per sheet.
    Multi { index: String, sheets: Vec<Sheet> },
}

/// Successful strategy outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyResult {
    /// Text was extracted.
    Extracted(Extraction),
    /// The file was deliberately not extracted, with a reason.
    Skipped(String),
}

/// Errors a strategy can raise. All of them mark the file failed; none of
/// them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Reading the source failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The bytes could not be decoded as the expected format.
    #[error("Decode error: {0}")]
    Decode(String),

    /// PDF parsing or extraction failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Office document parsing failed.
    #[error("Office document error: {0}")]
    Office(String),

    /// Workbook parsing failed.
    #[error("Spreadsheet error: {0}")]
    Sheet(String),

    /// The shared OCR engine is held by an abandoned invocation.
    #[error("OCR engine busy: {0}")]
    OcrBusy(&'static str),
}

/// Everything a strategy gets to look at.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    /// Absolute path of the source file (for logs and placeholder bodies).
    pub path: PathBuf,
    /// Input-relative path, `/`-separated.
    pub rel_path: String,
    /// The full file content.
    pub bytes: Vec<u8>,
}

/// A format-family extraction strategy.
pub trait Strategy: Send + Sync {
    /// Stable strategy name, recorded in artifacts and the cache.
    fn name(&self) -> &'static str;

    /// Cache-key version. Bump when output for the same bytes changes.
    fn version(&self) -> &'static str;

    /// Extract text from the input.
    ///
    /// # Errors
    ///
    /// Returns an `ExtractionError` when the bytes cannot be processed;
    /// deliberate non-extraction is `Ok(StrategyResult::Skipped)`.
    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError>;
}

/// The closed set of strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Text,
    Image,
    Pdf,
    Sheet,
    Office,
    Placeholder,
}

impl StrategyKind {
    /// Route a detected format family to its strategy.
    ///
    /// Email routes to the placeholder strategy until thread-aware
    /// extraction exists.
    #[must_use]
    pub fn for_type(detected: DetectedType) -> Self {
        match detected {
            DetectedType::Text => Self::Text,
            DetectedType::Image => Self::Image,
            DetectedType::Pdf => Self::Pdf,
            DetectedType::Spreadsheet => Self::Sheet,
            DetectedType::Office => Self::Office,
            DetectedType::Email | DetectedType::Other => Self::Placeholder,
        }
    }
}

/// All strategy instances for one pipeline run.
pub struct StrategySet {
    text: Arc<dyn Strategy>,
    image: Arc<dyn Strategy>,
    pdf: Arc<dyn Strategy>,
    sheet: Arc<dyn Strategy>,
    office: Arc<dyn Strategy>,
    placeholder: Arc<dyn Strategy>,
}

impl StrategySet {
    /// Build the full set, sharing one OCR engine between the image and PDF
    /// strategies.
    #[must_use]
    pub fn new(ocr: OcrHandle) -> Self {
        Self {
            text: Arc::new(TextStrategy::new()),
            image: Arc::new(ImageStrategy::new(Arc::clone(&ocr))),
            pdf: Arc::new(PdfStrategy::new(ocr)),
            sheet: Arc::new(SheetStrategy::new()),
            office: Arc::new(OfficeStrategy::new()),
            placeholder: Arc::new(PlaceholderStrategy::new()),
        }
    }

    /// Get the strategy instance for a kind.
    #[must_use]
    pub fn get(&self, kind: StrategyKind) -> Arc<dyn Strategy> {
        match kind {
            StrategyKind::Text => Arc::clone(&self.text),
            StrategyKind::Image => Arc::clone(&self.image),
            StrategyKind::Pdf => Arc::clone(&self.pdf),
            StrategyKind::Sheet => Arc::clone(&self.sheet),
            StrategyKind::Office => Arc::clone(&self.office),
            StrategyKind::Placeholder => Arc::clone(&self.placeholder),
        }
    }

    /// Route a detected format family to its strategy instance.
    #[must_use]
    pub fn resolve(&self, detected: DetectedType) -> Arc<dyn Strategy> {
        self.get(StrategyKind::for_type(detected))
    }
}
