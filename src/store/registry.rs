//! The file registry: per-path processing state.
//!
//! Every file discovered under the input root gets exactly one row, keyed by
//! its input-relative path. The registry is what makes runs resumable: a file
//! whose size and mtime are unchanged and whose status is `processed` or
//! `duplicate` is never re-dispatched, while `pending` and `failed` rows are
//! picked up again by the next run.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, StoreError};

/// Processing state of a single registered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Discovered (or changed) but not yet dispatched to completion.
    Pending,
    /// Extraction succeeded and this path owns the cached result.
    Processed,
    /// Content-identical to an already-processed file.
    Duplicate,
    /// Extraction failed or timed out.
    Failed,
    /// Deliberately not extracted (e.g. image below the size threshold).
    Skipped,
}

impl FileStatus {
    /// Stable string form used in the database and status output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "processed" => Self::Processed,
            "duplicate" => Self::Duplicate,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Path relative to the input root, with `/` separators.
    pub rel_path: String,
    /// BLAKE3 hex digest of the file content, if hashed.
    pub content_hash: Option<String>,
    /// File size in bytes at last scan.
    pub size_bytes: u64,
    /// Modification time (Unix seconds) at last scan.
    pub modified_secs: i64,
    /// Current processing state.
    pub status: FileStatus,
    /// Human-readable failure or skip detail, if any.
    pub error_detail: Option<String>,
    /// When this path was first registered.
    pub first_seen_at: DateTime<Utc>,
    /// When this path was last confirmed present by a scan.
    pub last_scanned_at: DateTime<Utc>,
}

/// Registry counts by status.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub pending: usize,
    pub processed: usize,
    pub duplicate: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Path-keyed view over the shared database.
pub struct FileRegistry {
    db: Database,
}

impl FileRegistry {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new or changed file and reset its status to pending.
    ///
    /// `first_seen_at` is preserved across rescans; everything else is
    /// overwritten from the fresh scan observation.
    pub fn record_scanned(
        &self,
        rel_path: &str,
        content_hash: Option<&str>,
        size_bytes: u64,
        modified_secs: i64,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO file_registry (
                rel_path, content_hash, size_bytes, modified_secs, status,
                error_detail, first_seen_at, last_scanned_at
            ) VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?5)
            ON CONFLICT(rel_path) DO UPDATE SET
                content_hash = excluded.content_hash,
                size_bytes = excluded.size_bytes,
                modified_secs = excluded.modified_secs,
                status = 'pending',
                error_detail = NULL,
                last_scanned_at = excluded.last_scanned_at
            "#,
            params![rel_path, content_hash, size_bytes as i64, modified_secs, now],
        )?;
        Ok(())
    }

    /// Refresh `last_scanned_at` for an unchanged file.
    pub fn touch(&self, rel_path: &str) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE file_registry SET last_scanned_at = ?1 WHERE rel_path = ?2",
            params![Utc::now().to_rfc3339(), rel_path],
        )?;
        Ok(())
    }

    /// Record the terminal outcome of dispatching a file.
    ///
    /// Status and error detail change in a single statement so an interrupt
    /// can never leave the two halves disagreeing.
    pub fn mark_outcome(
        &self,
        rel_path: &str,
        status: FileStatus,
        error_detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE file_registry SET status = ?1, error_detail = ?2 WHERE rel_path = ?3",
            params![status.as_str(), error_detail, rel_path],
        )?;
        Ok(())
    }

    /// Look up a single record by relative path.
    pub fn get(&self, rel_path: &str) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rel_path, content_hash, size_bytes, modified_secs, status,
                    error_detail, first_seen_at, last_scanned_at
             FROM file_registry WHERE rel_path = ?1",
        )?;
        let record = stmt
            .query_row(params![rel_path], row_to_file_record)
            .optional()?;
        Ok(record)
    }

    /// Find the path that owns the processed extraction for a content hash.
    ///
    /// Returns the first path recorded as `processed` with this hash, or
    /// `None` if the hash has never completed. The owner is what later
    /// content-identical files are marked duplicates of.
    pub fn owner_of_hash(&self, content_hash: &str) -> Result<Option<String>, StoreError> {
        let conn = self.db.lock()?;
        let owner = conn
            .query_row(
                "SELECT rel_path FROM file_registry
                 WHERE content_hash = ?1 AND status = 'processed'
                 ORDER BY first_seen_at LIMIT 1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    /// List records with the given status, ordered by path.
    pub fn list_by_status(&self, status: FileStatus) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT rel_path, content_hash, size_bytes, modified_secs, status,
                    error_detail, first_seen_at, last_scanned_at
             FROM file_registry WHERE status = ?1 ORDER BY rel_path",
        )?;
        let records = stmt
            .query_map(params![status.as_str()], row_to_file_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Count records by status.
    pub fn stats(&self) -> Result<RegistryStats, StoreError> {
        let conn = self.db.lock()?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM file_registry GROUP BY status")?;
        let mut stats = RegistryStats::default();
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count as usize))
        })?;
        for row in rows {
            let (status, count) = row?;
            stats.total += count;
            match FileStatus::from_str(&status) {
                FileStatus::Pending => stats.pending += count,
                FileStatus::Processed => stats.processed += count,
                FileStatus::Duplicate => stats.duplicate += count,
                FileStatus::Failed => stats.failed += count,
                FileStatus::Skipped => stats.skipped += count,
            }
        }
        Ok(stats)
    }
}

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let rel_path: String = row.get(0)?;
    let content_hash: Option<String> = row.get(1)?;
    let size_bytes: i64 = row.get(2)?;
    let modified_secs: i64 = row.get(3)?;
    let status_str: String = row.get(4)?;
    let error_detail: Option<String> = row.get(5)?;
    let first_seen_at_str: String = row.get(6)?;
    let last_scanned_at_str: String = row.get(7)?;

    Ok(FileRecord {
        rel_path,
        content_hash,
        size_bytes: size_bytes as u64,
        modified_secs,
        status: FileStatus::from_str(&status_str),
        error_detail,
        first_seen_at: parse_timestamp(&first_seen_at_str),
        last_scanned_at: parse_timestamp(&last_scanned_at_str),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
