//! Persistent run state: the file registry and the content cache.
//!
//! Both components share one SQLite database so that a run's state lives in a
//! single file and `--reset` can discard it atomically. The registry tracks
//! every discovered path and its terminal status; the content cache maps
//! `(content hash, strategy version)` to a finished extraction so identical
//! bytes are never extracted twice.

pub mod content;
pub mod registry;

pub use content::{CacheEntry, ContentStore};
pub use registry::{FileRecord, FileRegistry, FileStatus, RegistryStats};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

/// Errors raised by the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        source: rusqlite::Error,
    },

    /// A query or statement failed.
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A cached payload could not be serialized or deserialized.
    #[error("Cache payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking thread.
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Shared handle to the SQLite connection.
#[derive(Clone)]
pub(crate) struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// The combined persistent store for one pipeline run.
pub struct Store {
    /// Path-keyed registry of every discovered file.
    pub registry: FileRegistry,
    /// Content-hash-keyed cache of finished extractions.
    pub content: ContentStore,
    db: Database,
}

impl Store {
    /// Open (or create) the store at the given path and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` if the file cannot be opened, or a SQL
    /// error if migrations fail.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        let store = Self {
            registry: FileRegistry::new(db.clone()),
            content: ContentStore::new(db.clone()),
            db,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.db.lock()?;

        // WAL keeps readers unblocked while the dispatch loop writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            r#"
            -- File registry: one row per discovered path
            CREATE TABLE IF NOT EXISTS file_registry (
                rel_path TEXT PRIMARY KEY,
                content_hash TEXT,
                size_bytes INTEGER NOT NULL,
                modified_secs INTEGER NOT NULL,
                status TEXT NOT NULL,
                error_detail TEXT,
                first_seen_at TEXT NOT NULL,
                last_scanned_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_file_registry_status ON file_registry(status);
            CREATE INDEX IF NOT EXISTS idx_file_registry_content_hash ON file_registry(content_hash);

            -- Content cache: one row per (content hash, strategy version)
            CREATE TABLE IF NOT EXISTS content_cache (
                content_hash TEXT NOT NULL,
                strategy_version TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                extracted_text TEXT NOT NULL,
                sheets_json TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (content_hash, strategy_version)
            );
            "#,
        )?;

        log::debug!("Database migrations complete");
        Ok(())
    }

    /// Discard all registry and cache state.
    pub fn reset(&self) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        conn.execute_batch(
            r#"
            DELETE FROM file_registry;
            DELETE FROM content_cache;
            "#,
        )?;
        log::info!("Registry and content cache reset");
        Ok(())
    }
}
