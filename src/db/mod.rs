// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module: durable fingerprint index and placement log

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::dedup::GlobalDedupStore;
use crate::identity::Fingerprint;
use crate::{Result, SortwiseError};

/// Database manager for Sortwise (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A file move recorded by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub id: String,
    pub original_path: String,
    pub new_path: String,
    pub fingerprint: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub fingerprint_count: i64,
    pub placement_count: i64,
    pub category_count: i64,
}

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SortwiseError::LockPoisoned("database"))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS fingerprints (
                fingerprint TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                first_seen TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS placements (
                id TEXT PRIMARY KEY,
                original_path TEXT NOT NULL,
                new_path TEXT NOT NULL,
                fingerprint TEXT,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_placements_category ON placements(category);
        "#)?;
        Ok(())
    }

    /// Path first seen with this fingerprint
    pub fn lookup_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<PathBuf>> {
        let conn = self.lock_conn()?;
        let path: Option<String> = conn
            .query_row(
                "SELECT path FROM fingerprints WHERE fingerprint = ?1",
                params![fingerprint.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    /// Record a first sighting; returns false if the fingerprint was already known
    pub fn insert_fingerprint(&self, fingerprint: &Fingerprint, path: &Path) -> Result<bool> {
        let conn = self.lock_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO fingerprints (fingerprint, path, first_seen) VALUES (?1, ?2, ?3)",
            params![fingerprint.to_hex(), path.to_string_lossy(), Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    /// Point a known fingerprint at the original's new location
    pub fn update_fingerprint_path(&self, fingerprint: &Fingerprint, path: &Path) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE fingerprints SET path = ?2 WHERE fingerprint = ?1",
            params![fingerprint.to_hex(), path.to_string_lossy()],
        )?;
        Ok(())
    }

    /// Forget every known fingerprint
    pub fn clear_fingerprints(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        Ok(conn.execute("DELETE FROM fingerprints", [])?)
    }

    /// Log a completed move
    pub fn record_placement(
        &self,
        original_path: &Path,
        new_path: &Path,
        fingerprint: Option<&Fingerprint>,
        category: &str,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO placements (id, original_path, new_path, fingerprint, category, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                new_record_id(),
                original_path.to_string_lossy(),
                new_path.to_string_lossy(),
                fingerprint.map(|f| f.to_hex()),
                category,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent placements first
    pub fn get_recent_placements(&self, limit: usize) -> Result<Vec<PlacementRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, original_path, new_path, fingerprint, category, created_at
               FROM placements ORDER BY created_at DESC LIMIT ?1"#
        )?;

        let records = stmt.query_map(params![limit as i64], |row| {
            let created_str: String = row.get(5)?;
            Ok(PlacementRecord {
                id: row.get(0)?,
                original_path: row.get(1)?,
                new_path: row.get(2)?,
                fingerprint: row.get(3)?,
                category: row.get(4)?,
                created_at: DateTime::parse_from_rfc3339(&created_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Files placed per category
    pub fn get_category_stats(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) AS cnt FROM placements GROUP BY category ORDER BY cnt DESC"
        )?;
        let stats = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let fingerprint_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        let placement_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM placements", [], |row| row.get(0))?;
        let category_count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT category) FROM placements", [], |row| row.get(0))?;
        Ok(DbStats { fingerprint_count, placement_count, category_count })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

impl GlobalDedupStore for Database {
    fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<PathBuf>> {
        self.lookup_fingerprint(fingerprint)
    }

    fn insert(&self, fingerprint: &Fingerprint, path: &Path) -> Result<()> {
        self.insert_fingerprint(fingerprint, path).map(|_| ())
    }

    fn relocate(&self, fingerprint: &Fingerprint, path: &Path) -> Result<()> {
        self.update_fingerprint_path(fingerprint, path)
    }
}

/// Generate a new UUID for placement records
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
