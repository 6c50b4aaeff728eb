//! Key/value persistence for every study model.
//!
//! Each model owns one namespaced key and writes a full JSON snapshot of its
//! state on every mutation. Backends only deal in strings; the typed
//! [`load`] and [`save`] helpers do the (de)serialization and treat failures
//! as best-effort so in-memory state stays authoritative.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StudyError};

pub const FLASHCARDS_KEY: &str = "flashcards";
pub const TIMER_KEY: &str = "timer.state";
pub const STUDY_CONFIG_KEY: &str = "studyConfig";
pub const ANALYTICS_KEY: &str = "analytics";
pub const RECENT_FILES_KEY: &str = "recentFiles";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

pub type SharedStore = Rc<dyn KeyValueStore>;

/// Read and decode a value, logging and returning `None` on any failure.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "store read failed");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "stored value is malformed");
            set_aside(store, key, &raw);
            None
        }
    }
}

/// Key a value is copied to when it cannot be read back.
pub fn corrupt_key(key: &str) -> String {
    format!("{}.corrupt", key)
}

/// Copy an unreadable value next to its key so the next save cannot lose it.
pub fn set_aside(store: &dyn KeyValueStore, key: &str, raw: &str) {
    let backup = corrupt_key(key);
    match store.set(&backup, raw) {
        Ok(()) => warn!(key, backup = %backup, "kept a copy of the unreadable value"),
        Err(err) => warn!(key, error = %err, "could not keep a copy of the unreadable value"),
    }
}

/// Decode a stored list entry by entry. Entries that no longer parse are
/// dropped, and the raw value under `key` is set aside first.
pub fn decode_items<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    items: Vec<serde_json::Value>,
) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, position, error = %err, "skipping unreadable entry");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        if let Ok(Some(raw)) = store.get(key) {
            set_aside(store, key, &raw);
        }
    }
    decoded
}

/// Encode and write a value. Failures are logged, never propagated.
pub fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(err) => {
            warn!(key, error = %err, "failed to encode value for store");
            return;
        }
    };

    if let Err(err) = store.set(key, &json) {
        warn!(key, error = %err, "store write failed");
    } else {
        debug!(key, bytes = json.len(), "saved");
    }
}

// ══════════════════════════════════════════════════════════════════════════
// Backends
// ══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

/// One `<key>.json` file per key.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(|e| {
            StudyError::Storage(format!("failed to create store directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // Write beside the target and rename so a failed write leaves the
        // previous snapshot intact.
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Json,
    Sqlite,
    Memory,
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::Json
    }
}

/// Get default data location.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studious")
}

pub fn open_store(kind: StoreKind, data_dir: &Path) -> Result<SharedStore> {
    let store: SharedStore = match kind {
        StoreKind::Json => Rc::new(JsonFileStore::new(data_dir.join("store"))?),
        StoreKind::Sqlite => Rc::new(SqliteStore::open(&data_dir.join("studious.db"))?),
        StoreKind::Memory => Rc::new(MemoryStore::new()),
    };
    debug!(?kind, dir = ?data_dir, "opened store");
    Ok(store)
}

// ══════════════════════════════════════════════════════════════════════════
// Backup
// ══════════════════════════════════════════════════════════════════════════

/// Backup format containing every stored key.
#[derive(Debug, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub created_at: DateTime<Local>,
    pub entries: BTreeMap<String, serde_json::Value>,
}

/// Export all keys to a backup file. Returns the number of keys written.
pub fn export_backup(store: &dyn KeyValueStore, path: &Path) -> Result<usize> {
    let mut entries = BTreeMap::new();
    for key in store.keys()? {
        if let Some(raw) = store.get(&key)? {
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            entries.insert(key, value);
        }
    }

    let backup = Backup {
        version: 1,
        created_at: Local::now(),
        entries,
    };

    fs::write(path, serde_json::to_string_pretty(&backup)?)?;
    Ok(backup.entries.len())
}

/// Import keys from a backup file, leaving existing keys untouched.
/// Returns (imported_count, skipped_count).
pub fn import_backup(store: &dyn KeyValueStore, path: &Path) -> Result<(usize, usize)> {
    let json = fs::read_to_string(path)?;
    let backup: Backup = serde_json::from_str(&json)?;

    let mut imported = 0;
    let mut skipped = 0;

    for (key, value) in backup.entries {
        if store.get(&key)?.is_some() {
            skipped += 1;
        } else {
            store.set(&key, &serde_json::to_string(&value)?)?;
            imported += 1;
        }
    }

    Ok((imported, skipped))
}

/// Get default backup path.
pub fn default_backup_path() -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("studious_backup_{}.json", timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("missing").unwrap(), None);
        store.set("analytics", "{\"a\":1}").unwrap();
        store.set("analytics", "{\"a\":2}").unwrap();
        store.set("timer.state", "{}").unwrap();
        assert_eq!(store.get("analytics").unwrap().as_deref(), Some("{\"a\":2}"));
        assert_eq!(store.keys().unwrap(), vec!["analytics", "timer.state"]);
        store.remove("analytics").unwrap();
        assert_eq!(store.get("analytics").unwrap(), None);
    }

    #[test]
    fn memory_store_roundtrip() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn json_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&JsonFileStore::new(dir.path().join("kv")).unwrap());
    }

    #[test]
    fn sqlite_store_roundtrip() {
        exercise(&SqliteStore::in_memory().unwrap());
    }

    #[test]
    fn typed_load_ignores_malformed_values() {
        let store = MemoryStore::new();
        store.set("analytics", "not json").unwrap();
        assert_eq!(load::<Vec<u32>>(&store, "analytics"), None);
        assert_eq!(store.get("analytics.corrupt").unwrap().as_deref(), Some("not json"));

        save(&store, "analytics", &vec![1u32, 2, 3]);
        assert_eq!(load::<Vec<u32>>(&store, "analytics"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn decode_items_drops_only_bad_entries() {
        let store = MemoryStore::new();
        let raw = r#"[1, "two", 3]"#;
        store.set("numbers", raw).unwrap();

        let items: Vec<serde_json::Value> = load(&store, "numbers").unwrap();
        let numbers: Vec<u32> = decode_items(&store, "numbers", items);
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(store.get("numbers.corrupt").unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn decode_items_leaves_clean_values_alone() {
        let store = MemoryStore::new();
        store.set("numbers", "[1, 2]").unwrap();
        let items: Vec<serde_json::Value> = load(&store, "numbers").unwrap();
        assert_eq!(decode_items::<u32>(&store, "numbers", items), vec![1, 2]);
        assert_eq!(store.get("numbers.corrupt").unwrap(), None);
    }

    #[test]
    fn backup_skips_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");

        let source = MemoryStore::new();
        save(&source, "flashcards", &vec!["a"]);
        save(&source, "analytics", &7u32);
        assert_eq!(export_backup(&source, &path).unwrap(), 2);

        let target = MemoryStore::new();
        save(&target, "analytics", &1u32);
        assert_eq!(import_backup(&target, &path).unwrap(), (1, 1));
        assert_eq!(load::<u32>(&target, "analytics"), Some(1));
        assert_eq!(load::<Vec<String>>(&target, "flashcards"), Some(vec!["a".to_string()]));
    }
}
