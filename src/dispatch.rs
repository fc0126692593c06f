//! The dispatcher: resolves one work item to a terminal record.
//!
//! For each item the dispatcher consults the content cache first; a hit
//! costs no strategy invocation. On a miss the routed strategy runs on a
//! worker thread under a deadline. A strategy that overruns is abandoned,
//! the record is marked failed with a timeout reason, and dispatch moves
//! on. Every outcome, including failure, produces both a registry update
//! and an output artifact, so nothing a strategy does can abort the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::output::{ArtifactHeader, OutputError, OutputWriter};
use crate::scanner::WorkItem;
use crate::store::{CacheEntry, FileStatus, Store, StoreError};
use crate::strategies::{
    Extraction, ExtractionError, Strategy, StrategyInput, StrategyResult, StrategySet,
};

/// Infrastructure failures during dispatch. Strategy failures are not
/// errors here; they become `failed` records.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// What dispatching one item concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Terminal status recorded for the item.
    pub status: FileStatus,
    /// Failure or skip reason, when there is one.
    pub detail: Option<String>,
    /// Whether the content came from the cache.
    pub cache_hit: bool,
}

/// Sequentially resolves work items against the store and output mirror.
pub struct Dispatcher<'a> {
    store: &'a Store,
    strategies: &'a StrategySet,
    output: &'a OutputWriter,
    timeout: Duration,
    invocations: AtomicU64,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(
        store: &'a Store,
        strategies: &'a StrategySet,
        output: &'a OutputWriter,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            strategies,
            output,
            timeout,
            invocations: AtomicU64::new(0),
        }
    }

    /// Number of strategy invocations so far (cache hits cost zero).
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Resolve one item to a terminal status, artifact included.
    ///
    /// # Errors
    ///
    /// Returns a `DispatchError` only for store or output-mirror failures;
    /// anything the strategy does wrong becomes a `failed` record instead.
    pub fn dispatch(&self, item: &WorkItem) -> Result<DispatchOutcome, DispatchError> {
        let strategy = self.strategies.resolve(item.detected);

        if let Some(entry) = self
            .store
            .content
            .get(&item.content_hash, strategy.version())?
        {
            log::debug!("Cache hit for {}", item.rel_path);
            return self.settle_extracted(item, &entry, true);
        }

        self.invocations.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Dispatching {} to strategy {}",
            item.rel_path,
            strategy.name()
        );

        let verdict = run_with_deadline(Arc::clone(&strategy), item, self.timeout);
        match verdict {
            WorkerVerdict::Extracted(extraction) => {
                let entry = CacheEntry {
                    content_hash: item.content_hash.clone(),
                    strategy_name: strategy.name().to_string(),
                    strategy_version: strategy.version().to_string(),
                    extraction,
                };
                self.store.content.insert(&entry)?;
                self.settle_extracted(item, &entry, false)
            }
            WorkerVerdict::Skipped(reason) => {
                self.settle_notice(item, FileStatus::Skipped, &reason, strategy.name(), false)
            }
            WorkerVerdict::Errored(detail) => {
                self.settle_notice(item, FileStatus::Failed, &detail, strategy.name(), false)
            }
            WorkerVerdict::TimedOut => {
                let detail = format!("timed out after {}s", self.timeout.as_secs());
                log::warn!("Strategy {} {} for {}", strategy.name(), detail, item.rel_path);
                self.settle_notice(item, FileStatus::Failed, &detail, strategy.name(), false)
            }
        }
    }

    /// Record a processed-or-duplicate outcome and write the content
    /// artifact. Ownership of a hash goes to the first path that completed
    /// with it; every later content-identical path is a duplicate of that
    /// owner but still gets a full artifact.
    fn settle_extracted(
        &self,
        item: &WorkItem,
        entry: &CacheEntry,
        cache_hit: bool,
    ) -> Result<DispatchOutcome, DispatchError> {
        let owner = self.store.registry.owner_of_hash(&item.content_hash)?;
        let (status, duplicate_of) = match owner {
            Some(owner) if owner != item.rel_path => (FileStatus::Duplicate, Some(owner)),
            _ => (FileStatus::Processed, None),
        };

        let header = ArtifactHeader {
            source: item.rel_path.clone(),
            status,
            strategy: Some(entry.strategy_name.clone()),
            duplicate_of: duplicate_of.clone(),
            detail: None,
            generated: Utc::now(),
        };
        self.output
            .write_extraction(&item.rel_path, &header, &entry.extraction)?;
        self.store
            .registry
            .mark_outcome(&item.rel_path, status, None)?;

        Ok(DispatchOutcome {
            status,
            detail: duplicate_of.map(|o| format!("duplicate of {o}")),
            cache_hit,
        })
    }

    /// Record a skip or failure and write its explanatory artifact.
    fn settle_notice(
        &self,
        item: &WorkItem,
        status: FileStatus,
        detail: &str,
        strategy_name: &str,
        cache_hit: bool,
    ) -> Result<DispatchOutcome, DispatchError> {
        let header = ArtifactHeader {
            source: item.rel_path.clone(),
            status,
            strategy: Some(strategy_name.to_string()),
            duplicate_of: None,
            detail: Some(detail.to_string()),
            generated: Utc::now(),
        };
        self.output.write_notice(&item.rel_path, &header)?;
        self.store
            .registry
            .mark_outcome(&item.rel_path, status, Some(detail))?;

        Ok(DispatchOutcome {
            status,
            detail: Some(detail.to_string()),
            cache_hit,
        })
    }
}

enum WorkerVerdict {
    Extracted(Extraction),
    Skipped(String),
    Errored(String),
    TimedOut,
}

/// Run a strategy on a worker thread with a hard deadline.
///
/// The file is read on the worker so a hanging read also counts against
/// the deadline. On timeout the worker is abandoned, not joined; a stuck
/// OCR call keeps its engine lock and later OCR attempts fail fast
/// instead of queueing behind it.
fn run_with_deadline(
    strategy: Arc<dyn Strategy>,
    item: &WorkItem,
    timeout: Duration,
) -> WorkerVerdict {
    let (tx, rx) = mpsc::channel();
    let path = item.path.clone();
    let rel_path = item.rel_path.clone();

    let spawned = thread::Builder::new()
        .name(format!("extract-{}", strategy.name()))
        .spawn(move || {
            let result = std::fs::read(&path)
                .map_err(|source| ExtractionError::Io {
                    path: path.clone(),
                    source,
                })
                .and_then(|bytes| {
                    strategy.extract(&StrategyInput {
                        path,
                        rel_path,
                        bytes,
                    })
                });
            // The receiver may have given up; nothing to do then.
            let _ = tx.send(result);
        });

    if let Err(e) = spawned {
        return WorkerVerdict::Errored(format!("failed to spawn extraction thread: {e}"));
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(StrategyResult::Extracted(extraction))) => WorkerVerdict::Extracted(extraction),
        Ok(Ok(StrategyResult::Skipped(reason))) => WorkerVerdict::Skipped(reason),
        Ok(Err(e)) => WorkerVerdict::Errored(e.to_string()),
        Err(mpsc::RecvTimeoutError::Timeout) => WorkerVerdict::TimedOut,
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            WorkerVerdict::Errored("extraction thread panicked".to_string())
        }
    }
}
