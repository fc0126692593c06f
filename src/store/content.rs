//! The content cache: finished extractions keyed by content identity.
//!
//! The key is `(content hash, strategy version)` so that bumping a strategy's
//! version invalidates exactly that strategy's cached work. Entries are
//! immutable once written; a second insert for the same key is a no-op.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{Database, StoreError};
use crate::strategies::{Extraction, Sheet};

/// One cached extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// BLAKE3 hex digest of the source bytes.
    pub content_hash: String,
    /// Name of the strategy that produced the extraction.
    pub strategy_name: String,
    /// Version of that strategy at production time.
    pub strategy_version: String,
    /// The extraction payload.
    pub extraction: Extraction,
}

/// Content-hash-keyed view over the shared database.
pub struct ContentStore {
    db: Database,
}

impl ContentStore {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Look up a cached extraction.
    pub fn get(
        &self,
        content_hash: &str,
        strategy_version: &str,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.db.lock()?;
        let row = conn
            .query_row(
                "SELECT strategy_name, extracted_text, sheets_json FROM content_cache
                 WHERE content_hash = ?1 AND strategy_version = ?2",
                params![content_hash, strategy_version],
                |row| {
                    let strategy_name: String = row.get(0)?;
                    let extracted_text: String = row.get(1)?;
                    let sheets_json: Option<String> = row.get(2)?;
                    Ok((strategy_name, extracted_text, sheets_json))
                },
            )
            .optional()?;

        let Some((strategy_name, extracted_text, sheets_json)) = row else {
            return Ok(None);
        };

        let extraction = match sheets_json {
            Some(json) => {
                let sheets: Vec<Sheet> = serde_json::from_str(&json)?;
                Extraction::Multi {
                    index: extracted_text,
                    sheets,
                }
            }
            None => Extraction::Single(extracted_text),
        };

        Ok(Some(CacheEntry {
            content_hash: content_hash.to_string(),
            strategy_name,
            strategy_version: strategy_version.to_string(),
            extraction,
        }))
    }

    /// Insert a finished extraction. Existing entries are never overwritten.
    pub fn insert(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let (extracted_text, sheets_json) = match &entry.extraction {
            Extraction::Single(text) => (text.as_str(), None),
            Extraction::Multi { index, sheets } => {
                (index.as_str(), Some(serde_json::to_string(sheets)?))
            }
        };

        let conn = self.db.lock()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO content_cache (
                content_hash, strategy_version, strategy_name,
                extracted_text, sheets_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.content_hash,
                entry.strategy_version,
                entry.strategy_name,
                extracted_text,
                sheets_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Number of cached extractions.
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM content_cache", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
