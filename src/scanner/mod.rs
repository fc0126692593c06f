//! Input discovery and change detection.
//!
//! The scanner walks the input tree, decides per file whether work is
//! needed, and emits [`WorkItem`]s for the dispatcher. Change detection has
//! two tiers:
//!
//! - **fast path**: if a registered file's size and mtime are unchanged and
//!   its status is `processed` or `duplicate`, it is not rehashed and not
//!   re-emitted;
//! - **slow path**: new or changed files are BLAKE3-hashed (in parallel) and
//!   re-registered as pending.
//!
//! A registered file whose status is still `pending` (an interrupted run)
//! or `failed` is re-emitted without rehashing, which is what makes runs
//! resumable and failures retryable.

pub mod hasher;
pub mod sniff;
pub mod walker;

pub use sniff::DetectedType;
pub use walker::{FileEntry, Walker};

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use rayon::prelude::*;

use crate::progress::ProgressCallback;
use crate::store::{FileRegistry, FileStatus, StoreError};

/// Non-fatal errors encountered while scanning.
///
/// These are collected and reported; they never abort the scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Permission denied accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File disappeared between discovery and inspection.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One file that needs dispatching.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Absolute path to the source file.
    pub path: PathBuf,
    /// Path relative to the input root, `/`-separated.
    pub rel_path: String,
    /// BLAKE3 hex digest of the file content.
    pub content_hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format family.
    pub detected: DetectedType,
}

/// Result of a completed scan phase.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Files that need dispatching, ordered by relative path.
    pub items: Vec<WorkItem>,
    /// Files whose state was unchanged since the last run.
    pub unchanged: usize,
    /// Non-fatal per-file errors.
    pub errors: Vec<ScanError>,
}

/// The scan phase: discovery, change detection, and hashing.
pub struct Scanner {
    root: PathBuf,
    ignore_patterns: Vec<String>,
    threads: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Scanner {
    /// Create a scanner for the given input root.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore_patterns: Vec::new(),
            threads: 4,
            shutdown_flag: None,
        }
    }

    /// Set gitignore-style exclusion patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Set the hashing thread count.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree, detect changes against the registry, and hash what
    /// needs hashing.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the registry itself fails; per-file I/O
    /// problems are collected in the outcome instead.
    pub fn scan(
        &self,
        registry: &FileRegistry,
        progress: &dyn ProgressCallback,
    ) -> Result<ScanOutcome, StoreError> {
        let mut outcome = ScanOutcome::default();
        let mut to_hash: Vec<FileEntry> = Vec::new();
        let mut resumed: Vec<(FileEntry, String)> = Vec::new();

        progress.on_phase_start("scanning", 0);
        let mut walker = Walker::new(&self.root, self.ignore_patterns.clone());
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut seen = 0usize;
        for result in walker.walk() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    outcome.errors.push(e);
                    continue;
                }
            };
            seen += 1;
            progress.on_progress(seen, &entry.rel_path);

            let modified_secs = system_time_secs(entry.modified);
            match registry.get(&entry.rel_path)? {
                Some(record)
                    if record.size_bytes == entry.size
                        && record.modified_secs == modified_secs =>
                {
                    if matches!(record.status, FileStatus::Pending | FileStatus::Failed) {
                        // Interrupted or failed previously; dispatch again.
                        match record.content_hash {
                            Some(hash) => resumed.push((entry, hash)),
                            None => to_hash.push(entry),
                        }
                    } else {
                        registry.touch(&entry.rel_path)?;
                        outcome.unchanged += 1;
                    }
                }
                _ => to_hash.push(entry),
            }
        }
        progress.on_phase_end("scanning");

        if self.is_shutdown_requested() {
            return Ok(outcome);
        }

        // Hash new and changed content in parallel, then register serially.
        progress.on_phase_start("hashing", to_hash.len());
        let hashed = self.hash_entries(to_hash, progress);
        progress.on_phase_end("hashing");

        for (entry, result) in hashed {
            let modified_secs = system_time_secs(entry.modified);
            match result {
                Ok(hash) => {
                    registry.record_scanned(
                        &entry.rel_path,
                        Some(&hash),
                        entry.size,
                        modified_secs,
                    )?;
                    match self.make_item(entry, hash) {
                        Ok(item) => outcome.items.push(item),
                        Err(e) => outcome.errors.push(e),
                    }
                }
                Err(e) => outcome.errors.push(e),
            }
        }

        for (entry, hash) in resumed {
            match self.make_item(entry, hash) {
                Ok(item) => outcome.items.push(item),
                Err(e) => outcome.errors.push(e),
            }
        }

        outcome.items.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        log::info!(
            "Scan complete: {} to process, {} unchanged, {} errors",
            outcome.items.len(),
            outcome.unchanged,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    fn hash_entries(
        &self,
        entries: Vec<FileEntry>,
        progress: &dyn ProgressCallback,
    ) -> Vec<(FileEntry, Result<String, ScanError>)> {
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let work = |entries: Vec<FileEntry>| {
            entries
                .into_par_iter()
                .filter_map(|entry| {
                    if self.is_shutdown_requested() {
                        return None;
                    }
                    let result = hasher::hash_file(&entry.path).map_err(|source| ScanError::Io {
                        path: entry.path.clone(),
                        source,
                    });
                    let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.on_progress(done, &entry.rel_path);
                    progress.on_item_completed(entry.size);
                    Some((entry, result))
                })
                .collect::<Vec<_>>()
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
        {
            Ok(pool) => pool.install(|| work(entries)),
            Err(e) => {
                log::warn!("Failed to build hashing pool, using default: {}", e);
                work(entries)
            }
        }
    }

    fn make_item(&self, entry: FileEntry, content_hash: String) -> Result<WorkItem, ScanError> {
        let head = read_head(&entry.path).map_err(|source| ScanError::Io {
            path: entry.path.clone(),
            source,
        })?;
        let detected = sniff::detect_type(&entry.path, &head);
        Ok(WorkItem {
            path: entry.path,
            rel_path: entry.rel_path,
            content_hash,
            size_bytes: entry.size,
            detected,
        })
    }
}

/// Read the leading bytes used for magic sniffing.
fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    let mut head = vec![0u8; sniff::SNIFF_LEN];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    head.truncate(filled);
    Ok(head)
}

/// Unix seconds for a `SystemTime`; times before the epoch clamp to zero.
fn system_time_secs(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
