//! Plain-text copy strategy.
//!
//! Decodes bytes as UTF-8 (lossily, so byte junk never fails a text file)
//! and caps the output at a fixed line budget. The cap exists because a
//! single pathological log file should not dominate the output tree.

use super::{Extraction, ExtractionError, Strategy, StrategyInput, StrategyResult};

/// Maximum number of lines carried into the artifact.
pub const MAX_LINES: usize = 50_000;

/// Marker line appended when output is truncated at `max_lines`.
#[must_use]
pub fn truncation_marker(max_lines: usize) -> String {
    format!("[truncated: output limited to {max_lines} lines]")
}

/// Lossy UTF-8 copy with a line budget.
pub struct TextStrategy;

impl TextStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for TextStrategy {
    fn name(&self) -> &'static str {
        "text-copy"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError> {
        let text = String::from_utf8_lossy(&input.bytes);
        Ok(StrategyResult::Extracted(Extraction::Single(
            truncate_lines(&text, MAX_LINES),
        )))
    }
}

/// Keep at most `max_lines` lines, appending the truncation marker when
/// anything was dropped.
#[must_use]
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let mut end = 0;
    let mut lines = 0;
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            lines += 1;
            if lines == max_lines {
                end = idx + 1;
                break;
            }
        }
    }

    if lines < max_lines {
        return text.to_string();
    }
    // More than max_lines only if content follows the final counted newline.
    if end == text.len() {
        return text.to_string();
    }

    let marker = truncation_marker(max_lines);
    let mut out = String::with_capacity(end + marker.len() + 1);
    out.push_str(&text[..end]);
    out.push_str(&marker);
    out.push('\n');
    out
}
