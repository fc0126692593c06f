//! Placeholder strategy for formats with no extractor.
//!
//! Always succeeds: the artifact body names the file and why it was not
//! extracted, so the output tree stays in one-to-one correspondence with
//! the input tree even for unhandled formats.

use super::{Extraction, Strategy, StrategyInput, StrategyResult};

/// Fixed body for anything nothing else claims.
pub struct PlaceholderStrategy;

impl PlaceholderStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlaceholderStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for PlaceholderStrategy {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extract(
        &self,
        input: &StrategyInput,
    ) -> Result<StrategyResult, super::ExtractionError> {
        let extension = extension_of(&input.rel_path);
        let reason = match extension.as_str() {
            "eml" => "email extraction is deferred until thread-aware handling exists".to_string(),
            "" => "the file has no extension and no recognized format".to_string(),
            ext => format!("no extraction strategy handles `.{ext}` files"),
        };
        let body = format!(
            "No text was extracted from `{}` ({} bytes): {reason}.\n",
            input.rel_path,
            input.bytes.len()
        );
        Ok(StrategyResult::Extracted(Extraction::Single(body)))
    }
}

fn extension_of(rel_path: &str) -> String {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn extract(rel_path: &str) -> String {
        let input = StrategyInput {
            path: PathBuf::from("/in").join(rel_path),
            rel_path: rel_path.to_string(),
            bytes: vec![0u8; 10],
        };
        match PlaceholderStrategy::new().extract(&input).unwrap() {
            StrategyResult::Extracted(Extraction::Single(body)) => body,
            other => panic!("Expected single extraction, got {other:?}"),
        }
    }

    #[test]
    fn test_body_names_the_extension() {
        let body = extract("data/blob.bin");
        assert!(body.contains("`.bin`"));
        assert!(body.contains("data/blob.bin"));
        assert!(body.contains("10 bytes"));
    }

    #[test]
    fn test_email_reason_mentions_deferral() {
        let body = extract("inbox/msg.eml");
        assert!(body.contains("deferred"));
    }

    #[test]
    fn test_extensionless_file() {
        let body = extract("Makefile.d/LICENSE");
        assert!(body.contains("no extension"));
    }

    #[test]
    fn test_hidden_style_name_has_no_extension() {
        assert_eq!(extension_of(".profile"), "");
        assert_eq!(extension_of("a/b.tar.gz"), "gz");
    }
}
