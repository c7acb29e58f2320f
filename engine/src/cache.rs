//! Result cache keyed by (context fingerprint, consultant role).
//!
//! Invalidation is driven entirely by the fingerprint: any material change
//! to the repository context yields a new key. There is no TTL;
//! `prune_older_than` exists for maintenance only.

use crate::context::RepositoryContext;
use crate::errors::{FacultyError, Result};
use crate::types::ConsultantRole;
use crate::types::db_timestamp;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS result_cache (
    fingerprint TEXT NOT NULL,
    role TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_hit_at TEXT,
    PRIMARY KEY (fingerprint, role)
);
CREATE INDEX IF NOT EXISTS idx_result_cache_created ON result_cache(created_at);
"#;

const MAX_PRUNE_HOURS: u64 = 24 * 365 * 100;

/// SQLite-backed consultant result cache
pub struct ResultCache {
    conn: Connection,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl ResultCache {
    /// Open (creating if needed) the cache database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FacultyError::cache_with_source(
                    format!("failed to create cache directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            FacultyError::cache_with_source(
                format!("failed to open cache at {}", path.display()),
                e,
            )
        })?;
        Self::apply_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Result cache initialized");
        Ok(Self { conn })
    }

    /// Cache that lives only as long as this value (preview runs, tests)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FacultyError::cache_with_source("failed to open in-memory cache", e))?;
        Self::apply_schema(&conn)?;
        Ok(Self { conn })
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| FacultyError::cache_with_source("failed to apply cache schema", e))?;
        Ok(())
    }

    /// Deterministic fingerprint of a context
    pub fn fingerprint(context: &RepositoryContext) -> Result<String> {
        context.fingerprint()
    }

    /// Look up a stored result.
    ///
    /// A payload that no longer deserializes into `T` is treated as a miss.
    pub fn get<T: DeserializeOwned>(
        &self,
        fingerprint: &str,
        role: ConsultantRole,
    ) -> Result<Option<T>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM result_cache WHERE fingerprint = ?1 AND role = ?2",
                params![fingerprint, role.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FacultyError::cache_with_source("failed to read cache entry", e))?;

        let Some(payload) = payload else {
            tracing::debug!(role = %role, fingerprint = short(fingerprint), "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                self.record_hit(fingerprint, role)?;
                tracing::info!(role = %role, fingerprint = short(fingerprint), "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(
                    role = %role,
                    fingerprint = short(fingerprint),
                    error = %e,
                    "Cached payload no longer decodes, treating as miss"
                );
                Ok(None)
            }
        }
    }

    /// Store a result, replacing any previous entry for the same key
    pub fn put<T: Serialize>(&self, fingerprint: &str, role: ConsultantRole, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)
            .map_err(|e| FacultyError::cache_with_source("failed to encode cache payload", e))?;
        let now = db_timestamp(Utc::now());
        self.conn
            .execute(
                r#"
                INSERT OR REPLACE INTO result_cache
                (fingerprint, role, payload, created_at, hit_count, last_hit_at)
                VALUES (?1, ?2, ?3, ?4, 0, NULL)
                "#,
                params![fingerprint, role.as_str(), payload, now],
            )
            .map_err(|e| FacultyError::cache_with_source("failed to write cache entry", e))?;
        tracing::debug!(role = %role, fingerprint = short(fingerprint), "Cached result");
        Ok(())
    }

    fn record_hit(&self, fingerprint: &str, role: ConsultantRole) -> Result<()> {
        let now = db_timestamp(Utc::now());
        self.conn
            .execute(
                r#"
                UPDATE result_cache
                SET hit_count = hit_count + 1,
                    last_hit_at = ?3
                WHERE fingerprint = ?1 AND role = ?2
                "#,
                params![fingerprint, role.as_str(), now],
            )
            .map_err(|e| FacultyError::cache_with_source("failed to record cache hit", e))?;
        Ok(())
    }

    /// Number of hits recorded for one entry (0 when absent)
    pub fn hit_count(&self, fingerprint: &str, role: ConsultantRole) -> Result<u32> {
        let count: Option<u32> = self
            .conn
            .query_row(
                "SELECT hit_count FROM result_cache WHERE fingerprint = ?1 AND role = ?2",
                params![fingerprint, role.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FacultyError::cache_with_source("failed to read hit count", e))?;
        Ok(count.unwrap_or(0))
    }

    /// Number of stored entries
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM result_cache", [], |row| row.get(0))
            .map_err(|e| FacultyError::cache_with_source("failed to count cache entries", e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete entries created more than `hours` ago
    pub fn prune_older_than(&self, hours: u64) -> Result<usize> {
        // Capped at a century; chrono panics on out-of-range durations
        let hours = i64::try_from(hours.min(MAX_PRUNE_HOURS)).unwrap_or(0);
        let cutoff = db_timestamp(Utc::now() - chrono::Duration::hours(hours));
        let deleted = self
            .conn
            .execute(
                "DELETE FROM result_cache WHERE created_at < ?1",
                params![cutoff],
            )
            .map_err(|e| FacultyError::cache_with_source("failed to prune cache", e))?;
        if deleted > 0 {
            tracing::info!(deleted, hours, "Pruned result cache");
        }
        Ok(deleted)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
