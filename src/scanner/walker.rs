//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing the input tree
//! and collecting file metadata for the scan phase. It uses [`jwalk`] for
//! parallel directory walking (4x faster than walkdir).
//!
//! Hidden files and directories (names starting with `.`) are always
//! skipped: extraction state, version control metadata, and editor
//! droppings are not documents. Additional gitignore-style patterns come
//! from `--ignore`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::ScanError;

/// One file discovered under the input root.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Path relative to the input root, `/`-separated.
    pub rel_path: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Directory walker for file discovery.
///
/// Yields entries in a deterministic order (children sorted by name) so
/// repeated runs over the same tree visit files identically.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Gitignore-style patterns to exclude
    ignore_patterns: Vec<String>,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given input root.
    #[must_use]
    pub fn new(root: &Path, ignore_patterns: Vec<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore_patterns,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops iteration as soon
    /// as possible. This allows for clean Ctrl+C handling.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build a gitignore matcher from the configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Check if a path should be ignored based on configured patterns.
    fn should_ignore(&self, path: &Path, is_dir: bool, gitignore: &Option<Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        // Gitignore matching expects paths relative to the root with
        // forward slashes, even on Windows.
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        let path_str = relative_path.to_string_lossy();
        let normalized_path = if cfg!(windows) {
            path_str.replace('\\', "/")
        } else {
            path_str.into_owned()
        };

        gi.matched(normalized_path, is_dir).is_ignore()
    }

    /// Compute the `/`-separated relative path for an entry.
    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let s = relative.to_string_lossy();
        Some(if cfg!(windows) {
            s.replace('\\', "/")
        } else {
            s.into_owned()
        })
    }

    /// Walk the input tree, yielding file entries.
    ///
    /// Returns an iterator over [`FileEntry`] results. Errors are yielded
    /// as [`ScanError`] values rather than stopping iteration, so one
    /// unreadable subtree never aborts the scan.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(true)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    // Skip the root directory itself
                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    if self.should_ignore(&path, false, &gitignore) {
                        log::trace!("Ignoring file: {}", path.display());
                        return None;
                    }

                    let metadata = match std::fs::symlink_metadata(&path) {
                        Ok(m) => m,
                        Err(e) => return Some(Err(io_scan_error(&path, e))),
                    };
                    if !metadata.is_file() {
                        return None;
                    }

                    let Some(rel_path) = self.relative_path(&path) else {
                        log::warn!("Path escapes input root, skipping: {}", path.display());
                        return None;
                    };

                    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    Some(Ok(FileEntry {
                        path,
                        rel_path,
                        size: metadata.len(),
                        modified,
                    }))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            }
        })
    }
}

/// Map an I/O error during file access to a `ScanError`.
fn io_scan_error(path: &Path, error: std::io::Error) -> ScanError {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path.to_path_buf())
        }
        ErrorKind::NotFound => {
            log::debug!("File not found (may have been deleted): {}", path.display());
            ScanError::NotFound(path.to_path_buf())
        }
        _ => {
            log::warn!("I/O error for {}: {}", path.display(), error);
            ScanError::Io {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    /// Create a test directory with some files.
    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();

        let file1 = dir.path().join("file1.txt");
        let mut f = File::create(&file1).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let file2 = dir.path().join("file2.txt");
        let mut f = File::create(&file2).unwrap();
        writeln!(f, "Another file").unwrap();

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let file3 = subdir.join("nested.txt");
        let mut f = File::create(&file3).unwrap();
        writeln!(f, "Nested file content").unwrap();

        dir
    }

    #[test]
    fn test_walker_finds_files() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), Vec::new());

        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();

        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(file.size > 0);
            assert!(file.path.exists());
        }
    }

    #[test]
    fn test_walker_relative_paths_use_forward_slashes() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), Vec::new());

        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        let rels: Vec<_> = files.iter().map(|f| f.rel_path.as_str()).collect();

        assert!(rels.contains(&"file1.txt"));
        assert!(rels.contains(&"subdir/nested.txt"));
    }

    #[test]
    fn test_walker_deterministic_order() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), Vec::new());
        let first: Vec<_> = walker
            .walk()
            .filter_map(Result::ok)
            .map(|f| f.rel_path)
            .collect();

        let walker = Walker::new(dir.path(), Vec::new());
        let second: Vec<_> = walker
            .walk()
            .filter_map(Result::ok)
            .map(|f| f.rel_path)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_walker_skips_hidden_files() {
        let dir = create_test_dir();

        let hidden_file = dir.path().join(".hidden");
        let mut f = File::create(&hidden_file).unwrap();
        writeln!(f, "Hidden content").unwrap();

        let hidden_dir = dir.path().join(".state");
        fs::create_dir(&hidden_dir).unwrap();
        let mut f = File::create(hidden_dir.join("inner.txt")).unwrap();
        writeln!(f, "Inside hidden dir").unwrap();

        let walker = Walker::new(dir.path(), Vec::new());
        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();

        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(!file.rel_path.contains(".hidden"));
            assert!(!file.rel_path.contains(".state"));
        }
    }

    #[test]
    fn test_walker_ignore_patterns() {
        let dir = create_test_dir();

        let tmp_file = dir.path().join("temp.tmp");
        let mut f = File::create(&tmp_file).unwrap();
        writeln!(f, "Temporary file").unwrap();

        let log_file = dir.path().join("debug.log");
        let mut f = File::create(&log_file).unwrap();
        writeln!(f, "Log content").unwrap();

        let walker = Walker::new(
            dir.path(),
            vec!["*.tmp".to_string(), "*.log".to_string()],
        );
        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();

        for file in &files {
            assert!(!file.rel_path.ends_with(".tmp"), "Should skip .tmp files");
            assert!(!file.rel_path.ends_with(".log"), "Should skip .log files");
        }
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_walker_includes_empty_files() {
        let dir = create_test_dir();
        File::create(dir.path().join("empty.txt")).unwrap();

        let walker = Walker::new(dir.path(), Vec::new());
        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();

        assert!(files.iter().any(|f| f.rel_path == "empty.txt"));
    }

    #[test]
    fn test_walker_shutdown_flag() {
        let dir = create_test_dir();

        for i in 0..10 {
            let file = dir.path().join(format!("extra{}.txt", i));
            let mut f = File::create(&file).unwrap();
            writeln!(f, "Content {}", i).unwrap();
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let walker =
            Walker::new(dir.path(), Vec::new()).with_shutdown_flag(Arc::clone(&shutdown));

        // Set shutdown flag immediately
        shutdown.store(true, Ordering::SeqCst);

        let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        assert!(
            files.len() < 5,
            "Expected early termination, got {} files",
            files.len()
        );
    }

    #[test]
    fn test_walker_handles_nonexistent_path() {
        let walker = Walker::new(Path::new("/nonexistent/path/12345"), Vec::new());
        let results: Vec<_> = walker.walk().collect();
        assert!(results.is_empty() || results.iter().all(|r| r.is_err()));
    }
}
