//! File type detection: magic bytes first, extension second.
//!
//! Magic-byte signatures win over the extension for formats that carry an
//! unambiguous signature (PDF and the raster image formats), so a PDF
//! renamed to `.txt` still routes to the PDF strategy. Zip-based container
//! formats (docx, xlsx, odt, ...) all share the same `PK` signature, so they
//! stay extension-routed.

use std::path::Path;

/// The format family a file routes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedType {
    /// Plain text and text-like source/markup files.
    Text,
    /// Raster images (png, jpeg, gif, bmp, tiff, webp).
    Image,
    /// PDF documents.
    Pdf,
    /// Spreadsheet workbooks (xlsx, xls, ods).
    Spreadsheet,
    /// Word-processing and presentation documents.
    Office,
    /// Email messages.
    Email,
    /// Everything else.
    Other,
}

impl DetectedType {
    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Office => "office",
            Self::Email => "email",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DetectedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of leading bytes needed for signature matching.
pub const SNIFF_LEN: usize = 16;

/// Detect the format family for a file from its leading bytes and path.
#[must_use]
pub fn detect_type(path: &Path, head: &[u8]) -> DetectedType {
    if let Some(detected) = sniff_magic(head) {
        let by_ext = type_from_extension(path);
        if detected != by_ext {
            log::debug!(
                "Magic bytes override extension for {}: {} (extension said {})",
                path.display(),
                detected,
                by_ext
            );
        }
        return detected;
    }
    type_from_extension(path)
}

/// Match unambiguous magic-byte signatures.
#[must_use]
pub fn sniff_magic(head: &[u8]) -> Option<DetectedType> {
    if head.starts_with(b"%PDF-") {
        return Some(DetectedType::Pdf);
    }
    if head.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(DetectedType::Image); // PNG
    }
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DetectedType::Image); // JPEG
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return Some(DetectedType::Image);
    }
    // BMP's two-byte "BM" signature is too weak to override an extension.
    if head.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || head.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some(DetectedType::Image); // TIFF little/big endian
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
        return Some(DetectedType::Image);
    }
    None
}

/// Classify by lowercase file extension.
#[must_use]
pub fn type_from_extension(path: &Path) -> DetectedType {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" | "markdown" | "rst" | "csv" | "tsv" | "json" | "xml" | "html" | "htm"
        | "css" | "js" | "ts" | "py" | "rs" | "c" | "h" | "cpp" | "hpp" | "java" | "go" | "rb"
        | "sh" | "bat" | "toml" | "yaml" | "yml" | "ini" | "cfg" | "log" | "sql" => {
            DetectedType::Text
        }
        "pdf" => DetectedType::Pdf,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "tif" | "webp" => DetectedType::Image,
        "xlsx" | "xls" | "ods" => DetectedType::Spreadsheet,
        "doc" | "docx" | "rtf" | "odt" | "ppt" | "pptx" | "odp" => DetectedType::Office,
        "eml" => DetectedType::Email,
        _ => DetectedType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extension_routing() {
        assert_eq!(
            type_from_extension(&PathBuf::from("a/notes.md")),
            DetectedType::Text
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("report.PDF")),
            DetectedType::Pdf
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("photo.JPG")),
            DetectedType::Image
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("budget.xlsx")),
            DetectedType::Spreadsheet
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("memo.docx")),
            DetectedType::Office
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("thread.eml")),
            DetectedType::Email
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("blob.bin")),
            DetectedType::Other
        );
        assert_eq!(
            type_from_extension(&PathBuf::from("Makefile")),
            DetectedType::Other
        );
    }

    #[test]
    fn test_magic_overrides_extension() {
        // A PDF renamed to .txt must still route to the PDF strategy.
        let detected = detect_type(&PathBuf::from("misnamed.txt"), b"%PDF-1.7 rest");
        assert_eq!(detected, DetectedType::Pdf);
    }

    #[test]
    fn test_magic_png() {
        let head = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(sniff_magic(&head), Some(DetectedType::Image));
    }

    #[test]
    fn test_magic_webp_needs_full_header() {
        assert_eq!(sniff_magic(b"RIFF1234WEBP"), Some(DetectedType::Image));
        assert_eq!(sniff_magic(b"RIFF1234WAVE"), None);
        assert_eq!(sniff_magic(b"RIFF"), None);
    }

    #[test]
    fn test_no_magic_falls_back_to_extension() {
        let detected = detect_type(&PathBuf::from("notes.txt"), b"hello world");
        assert_eq!(detected, DetectedType::Text);
    }

    #[test]
    fn test_zip_container_stays_extension_routed() {
        // docx and xlsx share the PK signature, so the extension decides.
        let head = b"PK\x03\x04rest";
        assert_eq!(sniff_magic(head), None);
        assert_eq!(
            detect_type(&PathBuf::from("a.docx"), head),
            DetectedType::Office
        );
        assert_eq!(
            detect_type(&PathBuf::from("a.xlsx"), head),
            DetectedType::Spreadsheet
        );
    }

    #[test]
    fn test_empty_head() {
        assert_eq!(sniff_magic(b""), None);
        assert_eq!(
            detect_type(&PathBuf::from("empty.txt"), b""),
            DetectedType::Text
        );
    }
}
