//! Output mirror writer.
//!
//! Serializes one artifact per input file into a directory tree that
//! mirrors the input tree: `<output_root>/<rel_path>.md`. Every terminal
//! record gets an artifact, including failures and skips, so the mirror
//! always has full coverage. Workbooks additionally get a
//! `<rel_path>.sheets/` directory with one file per sheet; the `.md`
//! artifact is then the sheet index.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::FileStatus;
use crate::strategies::Extraction;

/// Errors raised while writing the output mirror.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Creating a directory under the output root failed.
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an artifact file failed.
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Front-matter fields of one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHeader {
    /// Input-relative source path.
    pub source: String,
    /// Terminal status of the record.
    pub status: FileStatus,
    /// Strategy that produced the content, when one ran or was cached.
    pub strategy: Option<String>,
    /// For duplicates, the owning path.
    pub duplicate_of: Option<String>,
    /// Failure or skip reason.
    pub detail: Option<String>,
    /// Artifact generation time.
    pub generated: DateTime<Utc>,
}

impl ArtifactHeader {
    fn render(&self) -> String {
        let mut out = String::from("---\n");
        out.push_str(&format!("source: {}\n", self.source));
        out.push_str(&format!("status: {}\n", self.status.as_str()));
        if let Some(strategy) = &self.strategy {
            out.push_str(&format!("strategy: {strategy}\n"));
        }
        if let Some(owner) = &self.duplicate_of {
            out.push_str(&format!("duplicate_of: {owner}\n"));
        }
        if let Some(detail) = &self.detail {
            out.push_str(&format!("detail: {}\n", detail.replace('\n', " ")));
        }
        out.push_str(&format!(
            "generated: {}\n",
            self.generated.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
        out.push_str("---\n\n");
        out
    }
}

/// Writes artifacts under one output root.
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path of the primary artifact for a source file.
    #[must_use]
    pub fn artifact_path(&self, rel_path: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in rel_path.split('/') {
            path.push(part);
        }
        append_md(&path)
    }

    /// Write an artifact with extracted content.
    ///
    /// Returns the paths written. A [`Extraction::Multi`] payload writes
    /// the index at the primary path plus one file per sheet.
    ///
    /// # Errors
    ///
    /// Returns an `OutputError` when a directory or file cannot be written.
    pub fn write_extraction(
        &self,
        rel_path: &str,
        header: &ArtifactHeader,
        extraction: &Extraction,
    ) -> Result<Vec<PathBuf>, OutputError> {
        let primary = self.artifact_path(rel_path);
        match extraction {
            Extraction::Single(text) => {
                self.write_file(&primary, &format!("{}{}", header.render(), text))?;
                Ok(vec![primary])
            }
            Extraction::Multi { index, sheets } => {
                let mut written = Vec::with_capacity(sheets.len() + 1);
                self.write_file(&primary, &format!("{}{}", header.render(), index))?;
                written.push(primary.clone());

                let sheet_dir = sheets_dir(&primary);
                for sheet in sheets {
                    let sheet_path = sheet_dir.join(format!("{}.md", sheet.name));
                    self.write_file(
                        &sheet_path,
                        &format!("{}{}", header.render(), sheet.text),
                    )?;
                    written.push(sheet_path);
                }
                Ok(written)
            }
        }
    }

    /// Write an artifact whose body is only the header's detail line
    /// (failures and skips).
    ///
    /// # Errors
    ///
    /// Returns an `OutputError` when the file cannot be written.
    pub fn write_notice(
        &self,
        rel_path: &str,
        header: &ArtifactHeader,
    ) -> Result<PathBuf, OutputError> {
        let primary = self.artifact_path(rel_path);
        let body = header
            .detail
            .as_deref()
            .unwrap_or("no further detail recorded");
        self.write_file(&primary, &format!("{}{}\n", header.render(), body))?;
        Ok(primary)
    }

    /// Write the run summary at the output root.
    ///
    /// # Errors
    ///
    /// Returns an `OutputError` when the file cannot be written.
    pub fn write_summary(&self, body: &str) -> Result<PathBuf, OutputError> {
        let path = self.root.join("_ingest_summary.md");
        self.write_file(&path, body)?;
        Ok(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), OutputError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| OutputError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, content).map_err(|e| OutputError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// `dir/a.txt` -> `dir/a.txt.md`; keeps the original extension visible.
fn append_md(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".md");
    path.with_file_name(name)
}

/// Sheet directory sits next to the index artifact.
fn sheets_dir(primary: &Path) -> PathBuf {
    let mut name = primary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // a.xlsx.md -> a.xlsx.sheets
    if let Some(stripped) = name.strip_suffix(".md") {
        name = stripped.to_string();
    }
    name.push_str(".sheets");
    primary.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::Sheet;
    use tempfile::TempDir;

    fn header(status: FileStatus) -> ArtifactHeader {
        ArtifactHeader {
            source: "docs/a.txt".to_string(),
            status,
            strategy: Some("text-copy".to_string()),
            duplicate_of: None,
            detail: None,
            generated: Utc::now(),
        }
    }

    #[test]
    fn test_single_artifact_mirrors_path() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        let written = writer
            .write_extraction(
                "docs/a.txt",
                &header(FileStatus::Processed),
                &Extraction::Single("hello".to_string()),
            )
            .unwrap();

        assert_eq!(written, vec![dir.path().join("docs").join("a.txt.md")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert!(content.starts_with("---\n"));
        assert!(content.contains("source: docs/a.txt"));
        assert!(content.contains("status: processed"));
        assert!(content.contains("strategy: text-copy"));
        assert!(content.contains("generated: "));
        assert!(content.ends_with("hello"));
    }

    #[test]
    fn test_multi_artifact_writes_index_and_sheets() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        let extraction = Extraction::Multi {
            index: "2 sheets".to_string(),
            sheets: vec![
                Sheet { name: "Alpha".to_string(), text: "| a |".to_string() },
                Sheet { name: "Beta".to_string(), text: "| b |".to_string() },
            ],
        };
        let mut h = header(FileStatus::Processed);
        h.source = "book.xlsx".to_string();
        let written = writer.write_extraction("book.xlsx", &h, &extraction).unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(written[0], dir.path().join("book.xlsx.md"));
        assert_eq!(
            written[1],
            dir.path().join("book.xlsx.sheets").join("Alpha.md")
        );
        assert!(written[2].ends_with("book.xlsx.sheets/Beta.md"));
    }

    #[test]
    fn test_notice_artifact_for_failure() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        let mut h = header(FileStatus::Failed);
        h.strategy = None;
        h.detail = Some("timed out after 60s".to_string());
        let path = writer.write_notice("docs/a.txt", &h).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("status: failed"));
        assert!(content.contains("detail: timed out after 60s"));
        assert!(content.trim_end().ends_with("timed out after 60s"));
    }

    #[test]
    fn test_duplicate_header_names_owner() {
        let h = ArtifactHeader {
            source: "b.txt".to_string(),
            status: FileStatus::Duplicate,
            strategy: Some("text-copy".to_string()),
            duplicate_of: Some("a.txt".to_string()),
            detail: None,
            generated: Utc::now(),
        };
        let rendered = h.render();
        assert!(rendered.contains("status: duplicate"));
        assert!(rendered.contains("duplicate_of: a.txt"));
    }

    #[test]
    fn test_summary_lands_at_root() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path());
        let path = writer.write_summary("# Run summary\n").unwrap();
        assert_eq!(path, dir.path().join("_ingest_summary.md"));
    }
}
