//! Pipeline orchestration: scan, dispatch, summarize.
//!
//! The orchestrator is deliberately sequential on the dispatch side: one
//! work item at a time, with a shutdown check between items, so Ctrl+C
//! always lands on a clean boundary and the registry never sees a half
//! item. Hashing parallelism lives in the scanner.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;

use crate::cli::{Cli, Commands, RunArgs, StatusArgs};
use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::ocr;
use crate::output::OutputWriter;
use crate::progress::{Progress, ProgressCallback, SilentProgress};
use crate::scanner::Scanner;
use crate::signal;
use crate::store::{FileStatus, Store};
use crate::strategies::StrategySet;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Items dispatched this run (new, changed, or resumed files).
    pub dispatched: usize,
    /// Files skipped by change detection.
    pub unchanged: usize,
    /// Files that could not be scanned at all.
    pub scan_errors: usize,
    pub processed: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Strategy invocations (cache hits cost zero).
    pub invocations: u64,
    /// Whether the run stopped early on a shutdown request.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunStats {
    /// Map the run outcome to a process exit code.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            ExitCode::Interrupted
        } else if self.failed > 0 || self.scan_errors > 0 {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        }
    }
}

/// One configured ingestion pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag checked between work items.
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

    /// Run the full pipeline: scan, dispatch every item, write the
    /// summary.
    ///
    /// # Errors
    ///
    /// Only configuration and infrastructure problems (store, output
    /// mirror) are errors; per-file extraction failures become `failed`
    /// records inside the returned stats.
    pub fn run(&self, progress: &dyn ProgressCallback) -> anyhow::Result<RunStats> {
        let started = Instant::now();
        self.config.validate().context("Invalid configuration")?;

        let store = Store::open(&self.config.cache_path).with_context(|| {
            format!("Failed to open cache at {}", self.config.cache_path.display())
        })?;
        if self.config.reset {
            store.reset().context("Failed to reset cache")?;
        }

        let mut scanner = Scanner::new(&self.config.input_root)
            .with_ignore_patterns(self.config.ignore_patterns.clone())
            .with_threads(self.config.scan_threads);
        if let Some(flag) = &self.shutdown_flag {
            scanner = scanner.with_shutdown_flag(Arc::clone(flag));
        }
        let scan = scanner
            .scan(&store.registry, progress)
            .context("Scan failed")?;
        for error in &scan.errors {
            log::warn!("Scan error: {}", error);
        }

        let mut stats = RunStats {
            dispatched: 0,
            unchanged: scan.unchanged,
            scan_errors: scan.errors.len(),
            ..RunStats::default()
        };

        let engine = ocr::default_engine(&self.config.ocr_lang);
        let strategies = StrategySet::new(Arc::new(Mutex::new(engine)));
        let writer = OutputWriter::new(&self.config.output_root);
        let dispatcher = Dispatcher::new(&store, &strategies, &writer, self.config.timeout);

        progress.on_phase_start("extracting", scan.items.len());
        for (i, item) in scan.items.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!(
                    "Shutdown requested, stopping after {} of {} items",
                    i,
                    scan.items.len()
                );
                stats.interrupted = true;
                break;
            }
            progress.on_progress(i + 1, &item.rel_path);

            let outcome = dispatcher
                .dispatch(item)
                .with_context(|| format!("Dispatch failed for {}", item.rel_path))?;
            stats.dispatched += 1;
            match outcome.status {
                FileStatus::Processed => stats.processed += 1,
                FileStatus::Duplicate => stats.duplicates += 1,
                FileStatus::Failed => stats.failed += 1,
                FileStatus::Skipped => stats.skipped += 1,
                FileStatus::Pending => {}
            }
            progress.on_item_completed(item.size_bytes);
        }
        progress.on_phase_end("extracting");

        // A shutdown during the scan phase also counts as interrupted.
        if self.is_shutdown_requested() {
            stats.interrupted = true;
        }

        stats.invocations = dispatcher.invocations();
        stats.elapsed = started.elapsed();

        writer
            .write_summary(&render_summary(&self.config, &stats))
            .context("Failed to write run summary")?;

        log::info!(
            "Run complete: {} dispatched, {} unchanged, {} processed, {} duplicates, {} failed, {} skipped, {} invocations",
            stats.dispatched,
            stats.unchanged,
            stats.processed,
            stats.duplicates,
            stats.failed,
            stats.skipped,
            stats.invocations
        );
        Ok(stats)
    }
}

/// Render the `_ingest_summary.md` body.
fn render_summary(config: &PipelineConfig, stats: &RunStats) -> String {
    let mut out = String::from("# Ingestion run summary\n\n");
    out.push_str(&format!(
        "- generated: {}\n",
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("- input: {}\n", config.input_root.display()));
    out.push_str(&format!("- elapsed: {:.1}s\n", stats.elapsed.as_secs_f64()));
    if stats.interrupted {
        out.push_str("- interrupted: yes (rerun to resume)\n");
    }
    out.push_str("\n| Outcome | Count |\n| --- | --- |\n");
    out.push_str(&format!("| processed | {} |\n", stats.processed));
    out.push_str(&format!("| duplicate | {} |\n", stats.duplicates));
    out.push_str(&format!("| failed | {} |\n", stats.failed));
    out.push_str(&format!("| skipped | {} |\n", stats.skipped));
    out.push_str(&format!("| unchanged | {} |\n", stats.unchanged));
    out.push_str(&format!("| scan errors | {} |\n", stats.scan_errors));
    out.push_str(&format!(
        "\n{} strategy invocation(s) this run.\n",
        stats.invocations
    ));
    out
}

/// Top-level application entry, shared by `main` and integration tests.
///
/// # Errors
///
/// Returns an error for configuration and infrastructure failures; the
/// caller maps it to an exit code and message.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => run_command(&args, cli.quiet),
        Commands::Status(args) => status_command(&args),
    }
}

fn run_command(args: &RunArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let config = PipelineConfig::from_args(args);

    let shutdown = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("Signal handler unavailable ({}), Ctrl+C will not be graceful", e);
        signal::detached_flag()
    });

    let pipeline = Pipeline::new(config).with_shutdown_flag(shutdown);
    let stats = if quiet {
        pipeline.run(&SilentProgress)?
    } else {
        pipeline.run(&Progress::new(false))?
    };

    if !quiet {
        println!(
            "{} processed, {} duplicates, {} failed, {} skipped ({} unchanged, {} invocations, {:.1}s)",
            stats.processed,
            stats.duplicates,
            stats.failed,
            stats.skipped,
            stats.unchanged,
            stats.invocations,
            stats.elapsed.as_secs_f64()
        );
        if stats.interrupted {
            println!("Interrupted; rerun the same command to resume.");
        }
    }

    Ok(stats.exit_code())
}

fn status_command(args: &StatusArgs) -> anyhow::Result<ExitCode> {
    if !Path::new(&args.cache).exists() {
        anyhow::bail!("No cache database at {}", args.cache.display());
    }
    let store = Store::open(&args.cache)
        .with_context(|| format!("Failed to open cache at {}", args.cache.display()))?;
    let stats = store.registry.stats()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Registry: {} file(s)", stats.total);
        println!("  pending:   {}", stats.pending);
        println!("  processed: {}", stats.processed);
        println!("  duplicate: {}", stats.duplicate);
        println!("  failed:    {}", stats.failed);
        println!("  skipped:   {}", stats.skipped);

        let failed = store.registry.list_by_status(FileStatus::Failed)?;
        if !failed.is_empty() {
            println!("\nFailed files:");
            for record in failed {
                println!(
                    "  {} ({})",
                    record.rel_path,
                    record.error_detail.as_deref().unwrap_or("no detail")
                );
            }
        }
    }

    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_once(input: &Path, output: &Path, cache: &Path) -> RunStats {
        let config = PipelineConfig::default()
            .with_input_root(input)
            .with_output_root(output)
            .with_cache_path(cache)
            .with_timeout(Duration::from_secs(10));
        Pipeline::new(config).run(&SilentProgress).unwrap()
    }

    #[test]
    fn test_run_produces_full_coverage() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("a.txt"), "alpha").unwrap();
        std::fs::create_dir(input.path().join("sub")).unwrap();
        std::fs::write(input.path().join("sub").join("b.md"), "beta").unwrap();

        let cache = output.path().join("cache.db");
        let stats = run_once(input.path(), output.path(), &cache);

        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 0);
        assert!(output.path().join("a.txt.md").exists());
        assert!(output.path().join("sub").join("b.md.md").exists());
        assert!(output.path().join("_ingest_summary.md").exists());
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("a.txt"), "alpha").unwrap();

        let cache = output.path().join("cache.db");
        let first = run_once(input.path(), output.path(), &cache);
        let second = run_once(input.path(), output.path(), &cache);

        assert_eq!(first.invocations, 1);
        assert_eq!(second.invocations, 0);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[test]
    fn test_missing_input_is_a_config_error() {
        let output = TempDir::new().unwrap();
        let config = PipelineConfig::default()
            .with_input_root("/nonexistent/input/tree")
            .with_output_root(output.path())
            .with_cache_path(output.path().join("cache.db"));

        let err = Pipeline::new(config).run(&SilentProgress).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_shutdown_before_dispatch_interrupts() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("a.txt"), "alpha").unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let config = PipelineConfig::default()
            .with_input_root(input.path())
            .with_output_root(output.path())
            .with_cache_path(output.path().join("cache.db"));
        let stats = Pipeline::new(config)
            .with_shutdown_flag(flag)
            .run(&SilentProgress)
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.exit_code(), ExitCode::Interrupted);
    }

    #[test]
    fn test_exit_code_mapping() {
        let mut stats = RunStats::default();
        assert_eq!(stats.exit_code(), ExitCode::Success);
        stats.failed = 1;
        assert_eq!(stats.exit_code(), ExitCode::PartialSuccess);
        stats.interrupted = true;
        assert_eq!(stats.exit_code(), ExitCode::Interrupted);
    }
}
