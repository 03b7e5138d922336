//! Persistent record store
//!
//! Card records and the foreign key table live in a SQLite database inside the
//! cache directory; images are plain files under `art_cache/<format>/`.
//! Uses parameterized queries exclusively. Record writes are transactional and
//! image writes go through a temporary file followed by a rename, so readers
//! never observe a partial value.

use crate::error::{CacheError, Result};
use crate::models::{CardRecord, ImageFormat, LookupKey};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub const DATABASE_FILENAME: &str = "scryfallcache.sqlite3";

/// Directory under the cache root holding downloaded images
pub const IMAGE_DIR: &str = "art_cache";

/// Bump when the table layout changes; older databases are rebuilt
const SCHEMA_VERSION: i64 = 1;

/// Counts reported by [`RecordStore::stats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub cards: usize,
    pub lookup_keys: usize,
    pub images: usize,
}

/// Durable storage for card records and images, scoped to one cache directory
pub struct RecordStore {
    root: PathBuf,
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) the store in `root`
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;

        let db_path = root.join(DATABASE_FILENAME);
        log::debug!("Scryfall cache database path: {}", db_path.display());

        let conn = Connection::open(&db_path)?;
        // Several processes may share one cache directory
        conn.busy_timeout(Duration::from_secs(5))?;
        init_schema(&conn)?;

        log::info!("Opened card cache in {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// The cache directory; other code may keep its own files beside ours
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::StoreUnavailable("database lock poisoned".to_string()))
    }

    /// Whether a record with this Scryfall ID is stored
    pub fn has(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row("SELECT 1 FROM cards WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Load a stored record
    ///
    /// Returns `CorruptRecord` when the stored JSON no longer parses.
    pub fn load(&self, id: &str) -> Result<Option<CardRecord>> {
        let data: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT data FROM cards WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
        };

        match data {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CacheError::CorruptRecord {
                    id: id.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Insert or replace a record
    pub fn store(&self, record: &CardRecord) -> Result<()> {
        self.write(record, None)
    }

    /// Insert or replace a record and remember that `key` resolves to it
    pub fn store_with_key(&self, key: &LookupKey, record: &CardRecord) -> Result<()> {
        self.write(record, Some(key))
    }

    fn write(&self, record: &CardRecord, key: Option<&LookupKey>) -> Result<()> {
        let json = serde_json::to_string(record).map_err(|e| {
            CacheError::StoreUnavailable(format!("failed to serialize {}: {}", record.id, e))
        })?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_tx(&tx, record, &json, key)?;
        tx.commit()?;

        log::debug!("Saved card information to database for {}", record.id);
        Ok(())
    }

    /// Look up the Scryfall ID a foreign key resolved to previously
    pub fn resolve_key(&self, key: &LookupKey) -> Result<Option<String>> {
        if let LookupKey::Id(id) = key {
            return Ok(Some(id.to_lowercase()));
        }
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT card_id FROM lookup_keys WHERE key = ?1",
                params![key.cache_key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Local file location for an image; stable for a given (id, format)
    pub fn resolve_path(&self, id: &str, format: ImageFormat) -> PathBuf {
        self.root
            .join(IMAGE_DIR)
            .join(format.as_str())
            .join(format!("{}.{}", id, format.extension()))
    }

    pub fn has_image(&self, id: &str, format: ImageFormat) -> Result<bool> {
        Ok(self.resolve_path(id, format).try_exists()?)
    }

    pub fn load_image(&self, id: &str, format: ImageFormat) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.resolve_path(id, format)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write image bytes, replacing any existing file atomically
    pub fn store_image(&self, id: &str, format: ImageFormat, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve_path(id, format);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path(&path);
        if let Err(e) = std::fs::write(&tmp_path, bytes) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        log::debug!("Cached {} image for {} at {}", format, id, path.display());
        Ok(path)
    }

    /// Record, foreign key and image counts
    pub fn stats(&self) -> Result<StoreStats> {
        let (cards, lookup_keys) = {
            let conn = self.conn()?;
            let cards: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
            let keys: i64 =
                conn.query_row("SELECT COUNT(*) FROM lookup_keys", [], |row| row.get(0))?;
            (cards as usize, keys as usize)
        };

        let mut images = 0;
        for format in ImageFormat::ALL {
            let dir = self.root.join(IMAGE_DIR).join(format.as_str());
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some(format.extension()) {
                    images += 1;
                }
            }
        }

        Ok(StoreStats {
            cards,
            lookup_keys,
            images,
        })
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling temp file, unique per process and per call so concurrent writers
/// never share one
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{}.part", std::process::id(), seq));
    path.with_file_name(name)
}

/// Create the cache tables, rebuilding them if the schema version changed
///
/// Tables:
/// - `metadata`: key/value pairs, currently only the schema version
/// - `cards`: one JSON record per Scryfall ID with indexed lookup columns
/// - `lookup_keys`: foreign key (name, MTGO id, set/number, ...) to Scryfall ID
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(version) = version {
        if version != SCHEMA_VERSION.to_string() {
            log::warn!(
                "Cache schema version {} does not match {}, recreating tables",
                version,
                SCHEMA_VERSION
            );
            conn.execute_batch(
                "DROP TABLE IF EXISTS lookup_keys;
                 DROP TABLE IF EXISTS cards;",
            )?;
        }
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            set_code TEXT NOT NULL,
            collector_number TEXT NOT NULL,
            mtgo_id INTEGER,
            mtgo_foil_id INTEGER,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
        CREATE INDEX IF NOT EXISTS idx_cards_mtgo ON cards(mtgo_id);

        CREATE TABLE IF NOT EXISTS lookup_keys (
            key TEXT PRIMARY KEY,
            card_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_lookup_keys_card ON lookup_keys(card_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    log::debug!("Cache schema initialized (version {})", SCHEMA_VERSION);
    Ok(())
}

fn write_tx(
    tx: &Transaction<'_>,
    record: &CardRecord,
    json: &str,
    key: Option<&LookupKey>,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT OR REPLACE INTO cards
         (id, name, set_code, collector_number, mtgo_id, mtgo_foil_id, data, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))",
        params![
            &record.id,
            &record.name,
            &record.set,
            &record.collector_number,
            record.mtgo_id.map(|v| v as i64),
            record.mtgo_foil_id.map(|v| v as i64),
            json,
        ],
    )?;

    let mut stmt =
        tx.prepare_cached("INSERT OR REPLACE INTO lookup_keys (key, card_id) VALUES (?1, ?2)")?;
    let explicit = key.filter(|k| !k.is_canonical());
    for key in record.intrinsic_keys().iter().chain(explicit) {
        stmt.execute(params![key.cache_key(), &record.id])?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
