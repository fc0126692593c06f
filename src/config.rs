//! Pipeline configuration and validation.
//!
//! Configuration errors are the only fatal error class: anything wrong here
//! aborts the run before any file is touched. Per-file problems later in the
//! pipeline are recorded against the file and never abort the run.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::RunArgs;

/// Errors raised by configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The input path does not exist.
    #[error("Input path does not exist: {0}")]
    InputMissing(PathBuf),

    /// The input path exists but is not a directory.
    #[error("Input path is not a directory: {0}")]
    InputNotADirectory(PathBuf),

    /// The output directory could not be created or written to.
    #[error("Output directory is not writable: {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The output directory lies inside the input tree.
    #[error("Output directory must not be inside the input tree: {0}")]
    OutputInsideInput(PathBuf),

    /// No usable location for the registry/cache database.
    #[error("Cannot determine a cache database location: {0}")]
    CacheDirUnavailable(String),

    /// The timeout must be non-zero.
    #[error("Per-file timeout must be at least 1 second")]
    ZeroTimeout,
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the input tree to ingest.
    pub input_root: PathBuf,
    /// Root of the mirrored output tree.
    pub output_root: PathBuf,
    /// Location of the registry/cache database.
    pub cache_path: PathBuf,
    /// Hard wall-clock deadline for a single strategy invocation.
    pub timeout: Duration,
    /// Thread count for content hashing during the scan phase.
    pub scan_threads: usize,
    /// Discard all registry and cache state before running.
    pub reset: bool,
    /// Gitignore-style patterns to exclude from the scan.
    pub ignore_patterns: Vec<String>,
    /// Language hint handed to the OCR engine.
    pub ocr_lang: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::new(),
            output_root: PathBuf::new(),
            cache_path: PathBuf::new(),
            timeout: Duration::from_secs(60),
            scan_threads: 4,
            reset: false,
            ignore_patterns: Vec::new(),
            ocr_lang: "eng".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from parsed CLI arguments.
    ///
    /// The cache database defaults to `.docmill.db` inside the output
    /// directory so that deleting the output tree also discards the state
    /// that described it.
    #[must_use]
    pub fn from_args(args: &RunArgs) -> Self {
        let cache_path = args
            .cache
            .clone()
            .unwrap_or_else(|| args.output.join(".docmill.db"));
        Self {
            input_root: args.input.clone(),
            output_root: args.output.clone(),
            cache_path,
            timeout: Duration::from_secs(args.timeout),
            scan_threads: args.scan_threads.max(1),
            reset: args.reset,
            ignore_patterns: args.ignore_patterns.clone(),
            ocr_lang: args.ocr_lang.clone(),
        }
    }

    /// Set the input root (builder-style, mainly for tests).
    #[must_use]
    pub fn with_input_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_root = path.into();
        self
    }

    /// Set the output root (builder-style, mainly for tests).
    #[must_use]
    pub fn with_output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = path.into();
        self
    }

    /// Set the cache database location.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Set the per-file timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Request a state reset before the run.
    #[must_use]
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Validate the configuration, creating the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the input is missing or not a directory,
    /// the output cannot be created or written, the output nests inside the
    /// input, or the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input_root.exists() {
            return Err(ConfigError::InputMissing(self.input_root.clone()));
        }
        if !self.input_root.is_dir() {
            return Err(ConfigError::InputNotADirectory(self.input_root.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        std::fs::create_dir_all(&self.output_root).map_err(|source| {
            ConfigError::OutputUnwritable {
                path: self.output_root.clone(),
                source,
            }
        })?;

        // Canonicalize after creation so relative paths compare correctly.
        let input = self
            .input_root
            .canonicalize()
            .map_err(|_| ConfigError::InputMissing(self.input_root.clone()))?;
        let output =
            self.output_root
                .canonicalize()
                .map_err(|source| ConfigError::OutputUnwritable {
                    path: self.output_root.clone(),
                    source,
                })?;
        if output.starts_with(&input) {
            return Err(ConfigError::OutputInsideInput(self.output_root.clone()));
        }

        let probe = self.output_root.join(".docmill-write-probe");
        std::fs::write(&probe, b"").map_err(|source| ConfigError::OutputUnwritable {
            path: self.output_root.clone(),
            source,
        })?;
        let _ = std::fs::remove_file(&probe);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(input: &TempDir, output: &TempDir) -> PipelineConfig {
        PipelineConfig::default()
            .with_input_root(input.path())
            .with_output_root(output.path().join("out"))
            .with_cache_path(output.path().join("state.db"))
    }

    #[test]
    fn test_validate_ok_creates_output() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = valid_config(&input, &output);

        config.validate().unwrap();
        assert!(output.path().join("out").is_dir());
    }

    #[test]
    fn test_validate_missing_input() {
        let output = TempDir::new().unwrap();
        let config = PipelineConfig::default()
            .with_input_root("/nonexistent/docmill/input")
            .with_output_root(output.path().join("out"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InputMissing(_))
        ));
    }

    #[test]
    fn test_validate_input_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let config = PipelineConfig::default()
            .with_input_root(&file)
            .with_output_root(dir.path().join("out"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InputNotADirectory(_))
        ));
    }

    #[test]
    fn test_validate_output_inside_input() {
        let input = TempDir::new().unwrap();
        let config = PipelineConfig::default()
            .with_input_root(input.path())
            .with_output_root(input.path().join("out"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutputInsideInput(_))
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = valid_config(&input, &output).with_timeout(Duration::from_secs(0));

        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_from_args_defaults_cache_into_output() {
        use crate::cli::{Cli, Commands};
        use clap::Parser;

        let cli = Cli::try_parse_from(["docmill", "run", "/in", "--output", "/out"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        let config = PipelineConfig::from_args(&args);
        assert_eq!(config.cache_path, PathBuf::from("/out/.docmill.db"));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
