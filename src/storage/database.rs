//! SQLite store history with fuzzy duplicate lookup
//!
//! The table is append-only. Uniqueness is approximate: a name counts as
//! seen when its normalized form scores at least the fuzzy threshold
//! against any stored normalized name.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::normalize_for_match;
use crate::analysis::similarity::{max_ratio, ratio};

/// Default similarity (0-100) at which two names are the same store
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 90;

/// Scores within float rounding of the threshold count as reaching it
const SCORE_EPSILON: f64 = 1e-9;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot prepare database directory {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A previously accepted store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub id: i64,
    pub display_name: String,
    pub normalized_name: String,
    /// Message the screenshot came from
    pub source_ref: Option<i64>,
    /// Message produced by the relay
    pub relay_ref: Option<i64>,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub created_at: String,
}

/// Stored record that a query name matched
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub id: i64,
    pub display_name: String,
    pub similarity: f64,
}

/// Aggregate counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_stores: u64,
}

/// Store history backed by a single SQLite connection
pub struct StoreDatabase {
    conn: Mutex<Connection>,
    fuzzy_threshold: u8,
}

impl StoreDatabase {
    /// Open or create the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Self::from_connection(conn)?;

        info!("Opened store database at {:?}", path);
        Ok(db)
    }

    /// Private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Override the similarity threshold (clamped to 0-100)
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.fuzzy_threshold = threshold.min(100);
        self
    }

    /// Current similarity threshold
    pub fn fuzzy_threshold(&self) -> u8 {
        self.fuzzy_threshold
    }

    /// Initialize database schema
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS processed_stores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_name TEXT NOT NULL,
                normalized_name TEXT NOT NULL,
                original_message_id INTEGER,
                forwarded_message_id INTEGER,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_normalized_name
                ON processed_stores(normalized_name);",
        )?;
        Ok(())
    }

    /// Look for a stored store that `name` is a near-duplicate of.
    ///
    /// Returns the first match in ascending id order.
    pub fn is_duplicate(&self, name: &str) -> Result<Option<DuplicateMatch>, StoreError> {
        let normalized = normalize_for_match(name);
        let conn = self.conn.lock();
        find_match(&conn, &normalized, self.fuzzy_threshold)
    }

    /// Append a store. Committed before this returns.
    pub fn add_store(
        &self,
        display_name: &str,
        source_ref: Option<i64>,
        relay_ref: Option<i64>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        let id = insert(&conn, display_name, source_ref, relay_ref)?;
        debug!("Stored '{}' as record {}", display_name, id);
        Ok(id)
    }

    /// Database statistics
    pub fn get_stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM processed_stores", [], |row| row.get(0))?;
        Ok(StoreStats {
            total_stores: count.max(0) as u64,
        })
    }

    /// Fetch one record by id
    #[cfg(test)]
    pub fn get_store(&self, id: i64) -> Result<Option<StoreRecord>, StoreError> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, store_name, normalized_name, original_message_id,
                        forwarded_message_id, timestamp
                 FROM processed_stores WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recently added records, newest first
    pub fn recent_stores(&self, limit: usize) -> Result<Vec<StoreRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, store_name, normalized_name, original_message_id,
                    forwarded_message_id, timestamp
             FROM processed_stores ORDER BY id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoreRecord> {
    Ok(StoreRecord {
        id: row.get(0)?,
        display_name: row.get(1)?,
        normalized_name: row.get(2)?,
        source_ref: row.get(3)?,
        relay_ref: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn insert(
    conn: &Connection,
    display_name: &str,
    source_ref: Option<i64>,
    relay_ref: Option<i64>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO processed_stores
            (store_name, normalized_name, original_message_id, forwarded_message_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![display_name, normalize_for_match(display_name), source_ref, relay_ref],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Linear scan in id order. Records whose length alone rules out reaching
/// the threshold are not scored.
fn find_match(conn: &Connection, normalized: &str, threshold: u8) -> Result<Option<DuplicateMatch>, StoreError> {
    let threshold = f64::from(threshold);
    let query_len = normalized.chars().count();

    let mut stmt = conn.prepare_cached(
        "SELECT id, store_name, normalized_name FROM processed_stores ORDER BY id ASC",
    )?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let existing: String = row.get(2)?;
        if max_ratio(query_len, existing.chars().count()) + SCORE_EPSILON < threshold {
            continue;
        }

        let similarity = ratio(normalized, &existing);
        if similarity + SCORE_EPSILON >= threshold {
            return Ok(Some(DuplicateMatch {
                id: row.get(0)?,
                display_name: row.get(1)?,
                similarity,
            }));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db() -> StoreDatabase {
        StoreDatabase::open_in_memory().unwrap()
    }

    #[test]
    fn test_database_initialization() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("stores.db");

        let db = StoreDatabase::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.get_stats().unwrap().total_stores, 0);
        assert_eq!(db.fuzzy_threshold(), DEFAULT_FUZZY_THRESHOLD);
    }

    #[test]
    fn test_add_store() {
        let db = db();
        let id = db.add_store("Nike Store", Some(12345), Some(67890)).unwrap();
        assert!(id > 0);

        let record = db.get_store(id).unwrap().unwrap();
        assert_eq!(record.display_name, "Nike Store");
        assert_eq!(record.normalized_name, "nike store");
        assert_eq!(record.source_ref, Some(12345));
        assert_eq!(record.relay_ref, Some(67890));
        assert!(!record.created_at.is_empty());
    }

    #[test]
    fn test_ids_increase() {
        let db = db();
        let a = db.add_store("Store 1", None, None).unwrap();
        let b = db.add_store("Store 2", None, None).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_is_duplicate_exact_match() {
        let db = db();
        db.add_store("Nike Store", None, None).unwrap();

        let found = db.is_duplicate("Nike Store").unwrap().unwrap();
        assert_eq!(found.display_name, "Nike Store");

        assert!(db.is_duplicate("NIKE STORE").unwrap().is_some());
    }

    #[test]
    fn test_is_duplicate_fuzzy_match() {
        let db = db();
        db.add_store("Nike Store", None, None).unwrap();

        assert!(db.is_duplicate("Nike Stor").unwrap().is_some());
        assert!(db.is_duplicate("NikeStore").unwrap().is_some());
    }

    #[test]
    fn test_is_duplicate_no_match() {
        let db = db();
        db.add_store("Nike Store", None, None).unwrap();

        assert_eq!(db.is_duplicate("Adidas Shop").unwrap(), None);
        assert_eq!(db.is_duplicate("Completely Different Store Name").unwrap(), None);
    }

    #[test]
    fn test_is_duplicate_empty_database() {
        assert_eq!(db().is_duplicate("Nike Store").unwrap(), None);
    }

    #[test]
    fn test_multiple_stores() {
        let db = db();
        let stores = ["Nike Store", "Adidas Shop", "Puma Outlet", "The Store"];
        for store in stores {
            db.add_store(store, None, None).unwrap();
        }

        for store in stores {
            let found = db.is_duplicate(store).unwrap().unwrap();
            assert_eq!(found.display_name, store);
        }

        assert_eq!(db.is_duplicate("New Store").unwrap(), None);
    }

    #[test]
    fn test_first_match_by_id_wins() {
        let db = db();
        let first = db.add_store("Nike Store", None, None).unwrap();
        db.add_store("Nike Stores", None, None).unwrap();

        let found = db.is_duplicate("Nike Store!").unwrap().unwrap();
        assert_eq!(found.id, first);
        assert_eq!(found.display_name, "Nike Store");
    }

    #[test]
    fn test_fuzzy_match_similar_stores() {
        let db = db();
        db.add_store("The Big Store", None, None).unwrap();

        for variation in ["The Big Store", "the big store", "TheBigStore", "The  Big  Store", "The Big Stor"] {
            assert!(
                db.is_duplicate(variation).unwrap().is_some(),
                "'{}' should match 'The Big Store'",
                variation
            );
        }
    }

    #[test]
    fn test_fuzzy_match_different_stores() {
        let db = db();
        db.add_store("Nike", None, None).unwrap();

        for store in ["Adidas", "Puma", "Reebok", "Under Armour"] {
            assert!(db.is_duplicate(store).unwrap().is_none(), "'{}' should not match 'Nike'", store);
        }
    }

    #[test]
    fn test_custom_threshold() {
        let db = db().with_threshold(100);
        db.add_store("Nike Store", None, None).unwrap();

        assert!(db.is_duplicate("nike store!").unwrap().is_some());
        assert!(db.is_duplicate("Nike Stor").unwrap().is_none());
    }

    #[test]
    fn test_score_at_threshold_is_duplicate() {
        let db = db();
        db.add_store("abcdefghix", None, None).unwrap();

        // One substitution in ten characters scores exactly 90
        let found = db.is_duplicate("abcdefghiy").unwrap().unwrap();
        assert_eq!(found.display_name, "abcdefghix");
        assert!((found.similarity - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_below_threshold_is_not_duplicate() {
        let db = db();
        db.add_store("abcdefghx", None, None).unwrap();

        // One substitution in nine characters scores 88.9
        assert_eq!(db.is_duplicate("abcdefghy").unwrap(), None);
    }

    #[test]
    fn test_get_stats() {
        let db = db();
        assert_eq!(db.get_stats().unwrap().total_stores, 0);

        db.add_store("Store 1", None, None).unwrap();
        db.add_store("Store 2", None, None).unwrap();
        db.add_store("Store 3", None, None).unwrap();

        assert_eq!(db.get_stats().unwrap().total_stores, 3);
    }

    #[test]
    fn test_recent_stores_newest_first() {
        let db = db();
        db.add_store("Alpha", None, None).unwrap();
        db.add_store("Beta", None, None).unwrap();
        db.add_store("Gamma", None, None).unwrap();

        let names: Vec<String> = db
            .recent_stores(2)
            .unwrap()
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, vec!["Gamma", "Beta"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stores.db");

        {
            let db = StoreDatabase::open(&path).unwrap();
            db.add_store("Nike Store", Some(1), Some(2)).unwrap();
        }

        let db = StoreDatabase::open(&path).unwrap();
        assert_eq!(db.get_stats().unwrap().total_stores, 1);
        assert!(db.is_duplicate("nike store").unwrap().is_some());
    }

    #[test]
    fn test_open_fails_on_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stores.db");
        std::fs::write(&path, "this is not a sqlite database, just text ".repeat(200)).unwrap();

        let result = StoreDatabase::open(&path);
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
