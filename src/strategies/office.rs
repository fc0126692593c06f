//! Office document strategy.
//!
//! Full extraction is implemented for `.docx` (paragraphs and tables, in
//! document order). Legacy and other office formats have no converter here;
//! they degrade to a short descriptive body instead of failing, so every
//! office file still reaches a terminal state with an artifact.

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use super::{Extraction, ExtractionError, Strategy, StrategyInput, StrategyResult};

/// Word-processor and presentation extraction.
pub struct OfficeStrategy;

impl OfficeStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfficeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for OfficeStrategy {
    fn name(&self) -> &'static str {
        "office-doc"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError> {
        let extension = input
            .rel_path
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if extension != "docx" {
            return Ok(StrategyResult::Extracted(Extraction::Single(
                degraded_body(&input.rel_path, &extension, "no converter for this format"),
            )));
        }

        match docx_rs::read_docx(&input.bytes) {
            Ok(docx) => {
                let mut text = String::new();
                for child in &docx.document.children {
                    walk_document_child(child, &mut text);
                }
                Ok(StrategyResult::Extracted(Extraction::Single(text)))
            }
            Err(e) => {
                // A corrupt docx still gets an artifact rather than a
                // failed record.
                log::warn!("DOCX parse failed for {}: {}", input.rel_path, e);
                Ok(StrategyResult::Extracted(Extraction::Single(
                    degraded_body(&input.rel_path, &extension, &format!("parse failed: {e}")),
                )))
            }
        }
    }
}

/// Body emitted when a document cannot be converted.
fn degraded_body(rel_path: &str, extension: &str, reason: &str) -> String {
    format!(
        "Office document `{rel_path}` (.{extension}) was not converted: {reason}.\n"
    )
}

/// Append text from a document node, paragraph per line.
fn walk_document_child(child: &DocumentChild, text: &mut String) {
    match child {
        DocumentChild::Paragraph(p) => walk_paragraph(p, text),
        DocumentChild::Table(t) => walk_table(t, text),
        _ => {}
    }
}

fn walk_paragraph(paragraph: &Paragraph, text: &mut String) {
    for child in &paragraph.children {
        if let ParagraphChild::Run(r) = child {
            for child in &r.children {
                if let RunChild::Text(t) = child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text.push('\n');
}

fn walk_table(table: &Table, text: &mut String) {
    for TableChild::TableRow(tr) in &table.rows {
        for TableRowChild::TableCell(tc) in &tr.cells {
            for content in &tc.children {
                match content {
                    TableCellContent::Paragraph(p) => walk_paragraph(p, text),
                    TableCellContent::Table(t) => walk_table(t, text),
                    _ => {}
                }
            }
        }
    }
}
