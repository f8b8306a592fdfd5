//! SQLite-backed record store.
//!
//! All collections share one `records` table keyed by `(collection, id)`;
//! record bodies are stored as JSON text.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use super::{data_dir, migrations, Collection, RecordStore, ID_FIELD};
use crate::error::{Result, StorageError};

/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "focusflow.db";

/// SQLite database for settings, sessions and stats.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at `~/.config/focusflow/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join(DEFAULT_DB_FILE);
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
            path: Some(path),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database. Nothing survives the handle.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        db.migrate()?;
        Ok(db)
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        migrations::migrate(&conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Locked)
    }
}

fn decode(collection: Collection, body: &str) -> Result<Value, StorageError> {
    serde_json::from_str(body).map_err(|e| StorageError::Malformed {
        collection,
        message: e.to_string(),
    })
}

impl RecordStore for Database {
    fn read_record(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.lock()?;
        let body = conn
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        body.map(|b| decode(collection, &b)).transpose()
    }

    fn read_records(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT body FROM records WHERE collection = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![collection.as_str()], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(collection, &row?)?);
        }
        Ok(records)
    }

    fn write_record(&self, collection: Collection, mut record: Value) -> Result<Value, StorageError> {
        let obj = record.as_object_mut().ok_or_else(|| StorageError::Malformed {
            collection,
            message: "record is not a JSON object".into(),
        })?;

        let id = match obj.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::now_v7().to_string();
                obj.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let body = serde_json::to_string(&record).map_err(|e| StorageError::Malformed {
            collection,
            message: e.to_string(),
        })?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO records (collection, id, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id)
             DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![collection.as_str(), id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(record)
    }

    fn delete_record(&self, collection: Collection, id: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_assigns_id_when_missing() {
        let db = Database::open_memory().unwrap();
        let stored = db
            .write_record(Collection::Sessions, json!({ "duration": 25 }))
            .unwrap();
        let id = stored["id"].as_str().unwrap();
        assert!(!id.is_empty());

        let read = db.read_record(Collection::Sessions, id).unwrap().unwrap();
        assert_eq!(read["duration"], 25);
    }

    #[test]
    fn upsert_replaces_body_and_keeps_order() {
        let db = Database::open_memory().unwrap();
        db.write_record(Collection::Sessions, json!({ "id": "a", "n": 1 }))
            .unwrap();
        db.write_record(Collection::Sessions, json!({ "id": "b", "n": 2 }))
            .unwrap();
        db.write_record(Collection::Sessions, json!({ "id": "a", "n": 3 }))
            .unwrap();

        let all = db.read_records(Collection::Sessions).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["id"], "a");
        assert_eq!(all[0]["n"], 3);
        assert_eq!(all[1]["id"], "b");
    }

    #[test]
    fn collections_are_isolated() {
        let db = Database::open_memory().unwrap();
        db.write_record(Collection::Settings, json!({ "id": "current" }))
            .unwrap();
        assert!(db.read_record(Collection::Stats, "current").unwrap().is_none());
        assert!(db.read_records(Collection::Sessions).unwrap().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let db = Database::open_memory().unwrap();
        db.write_record(Collection::Sessions, json!({ "id": "x" }))
            .unwrap();
        assert!(db.delete_record(Collection::Sessions, "x").unwrap());
        assert!(!db.delete_record(Collection::Sessions, "x").unwrap());
    }

    #[test]
    fn rejects_non_object_records() {
        let db = Database::open_memory().unwrap();
        let err = db.write_record(Collection::Stats, json!([1, 2])).unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("focusflow.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.write_record(Collection::Settings, json!({ "id": "current", "workDuration": 50 }))
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        let record = db.read_record(Collection::Settings, "current").unwrap().unwrap();
        assert_eq!(record["workDuration"], 50);
    }
}
