//! Spreadsheet strategy.
//!
//! The one strategy with a 1-to-N output shape: a workbook becomes an index
//! unit plus one Markdown-table unit per sheet. Sheet names are sanitized so
//! the output layer can use them as file names.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use super::{
    Extraction, ExtractionError, Sheet, Strategy, StrategyInput, StrategyResult,
};

/// Workbook explosion into per-sheet Markdown tables.
pub struct SheetStrategy;

impl SheetStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for SheetStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SheetStrategy {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(&self, input: &StrategyInput) -> Result<StrategyResult, ExtractionError> {
        let cursor = Cursor::new(input.bytes.as_slice());
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| ExtractionError::Sheet(format!("workbook open failed: {e}")))?;

        let names: Vec<String> = workbook.sheet_names().to_owned();
        if names.is_empty() {
            return Ok(StrategyResult::Skipped("workbook has no sheets".to_string()));
        }

        let mut sheets = Vec::with_capacity(names.len());
        let mut index_rows = Vec::with_capacity(names.len());
        for name in &names {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| ExtractionError::Sheet(format!("sheet {name:?}: {e}")))?;
            let safe_name = unique_name(sanitize_sheet_name(name), &sheets);
            index_rows.push(format!(
                "- {} ({} rows, {} columns)",
                safe_name,
                range.height(),
                range.width()
            ));
            sheets.push(Sheet {
                name: safe_name,
                text: markdown_table(&range),
            });
        }

        let index = format!(
            "# Workbook: {}\n\n{} sheet(s):\n\n{}\n",
            input.rel_path,
            sheets.len(),
            index_rows.join("\n")
        );

        Ok(StrategyResult::Extracted(Extraction::Multi { index, sheets }))
    }
}

/// Render a sheet range as a Markdown table with the first row as header.
fn markdown_table(range: &Range<Data>) -> String {
    if range.is_empty() {
        return "(empty sheet)".to_string();
    }

    let width = range.width();
    let mut out = String::new();
    let mut rows = range.rows();

    if let Some(header) = rows.next() {
        out.push('|');
        for cell in header {
            out.push_str(&format!(" {} |", cell_text(cell)));
        }
        out.push('\n');
        out.push('|');
        for _ in 0..width {
            out.push_str(" --- |");
        }
        out.push('\n');
    }

    for row in rows {
        out.push('|');
        for cell in row {
            out.push_str(&format!(" {} |", cell_text(cell)));
        }
        out.push('\n');
    }
    out
}

/// One cell as Markdown-safe text.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().replace('|', "\\|").replace('\n', " "),
    }
}

/// Replace file-system-hostile characters so a sheet name can be a file
/// stem.
fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "sheet".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Suffix a name until it collides with no already-emitted sheet.
fn unique_name(candidate: String, taken: &[Sheet]) -> String {
    if !taken.iter().any(|s| s.name == candidate) {
        return candidate;
    }
    let mut n = 2;
    loop {
        let next = format!("{candidate}-{n}");
        if !taken.iter().any(|s| s.name == next) {
            return next;
        }
        n += 1;
    }
}
