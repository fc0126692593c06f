//! Progress reporting using indicatif.
//!
//! The pipeline reports through the [`ProgressCallback`] trait; [`Progress`]
//! renders one bar per phase in the terminal and [`SilentProgress`] discards
//! everything for tests and library use.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for the ingestion phases.
///
/// Implement this trait to receive progress updates while the pipeline
/// scans, hashes, and extracts files.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts, with the number of items it will handle
    /// (0 when unknown, as during scanning).
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed, with the 1-based item number and the
    /// path being worked on.
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// No-op progress callback, for tests and library use.
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_progress(&self, _current: usize, _path: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

/// Progress reporter using indicatif.
///
/// Manages one bar per pipeline phase: a spinner while the input tree is
/// walked, a bar while new content is hashed, and a bar while files are
/// dispatched to extraction strategies.
pub struct Progress {
    multi: MultiProgress,
    scanning: Mutex<Option<ProgressBar>>,
    hashing: Mutex<Option<ProgressBar>>,
    extracting: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. With `quiet`, nothing is displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            scanning: Mutex::new(None),
            hashing: Mutex::new(None),
            extracting: Mutex::new(None),
            quiet,
        }
    }

    fn scanning_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn hashing_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn extracting_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg} {per_sec} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            "scanning" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::scanning_style());
                pb.set_message("Scanning input tree");
                pb.enable_steady_tick(Duration::from_millis(100));
                let mut scanning = self.scanning.lock().unwrap();
                *scanning = Some(pb);
            }
            "hashing" => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::hashing_style());
                pb.set_message("Hashing");
                let mut hashing = self.hashing.lock().unwrap();
                *hashing = Some(pb);
            }
            "extracting" => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::extracting_style());
                pb.set_message("Extracting");
                let mut extracting = self.extracting.lock().unwrap();
                *extracting = Some(pb);
            }
            _ => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::hashing_style());
                pb.set_message(phase.to_string());
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        let display_msg = truncate_path(path, 30);

        // Update the active progress bar
        if let Some(ref pb) = *self.extracting.lock().unwrap() {
            pb.set_position(current as u64);
            pb.set_message(display_msg);
        } else if let Some(ref pb) = *self.hashing.lock().unwrap() {
            pb.set_position(current as u64);
            pb.set_message(display_msg);
        } else if let Some(ref pb) = *self.scanning.lock().unwrap() {
            pb.set_position(current as u64);
            pb.set_message(display_msg);
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        match phase {
            "scanning" => {
                if let Some(pb) = self.scanning.lock().unwrap().take() {
                    pb.finish_with_message("Scan complete");
                }
            }
            "hashing" => {
                if let Some(pb) = self.hashing.lock().unwrap().take() {
                    pb.finish_with_message("Hashing complete");
                }
            }
            "extracting" => {
                if let Some(pb) = self.extracting.lock().unwrap().take() {
                    pb.finish_with_message("Extraction complete");
                }
            }
            _ => {}
        }
    }
}

/// Truncate a path for display in the progress bar.
///
/// Counts and cuts in characters, never bytes, so multibyte file names
/// cannot split mid-character.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let keep = max_len.saturating_sub(3);
        let tail: String = file_name.chars().skip(name_len - keep).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
