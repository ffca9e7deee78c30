use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::models::Task;

/// Slot holding the JSON array of tasks
pub const TASKS_SLOT: &str = "tasks";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create storage directory: {0}")]
    DirectoryError(String),
    #[error("Malformed task data: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A durable key-value store of string slots
pub trait SlotStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and initialize the schema
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::DirectoryError(e.to_string()))?;
        }

        let conn = Connection::open(&db_path)?;
        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// A throwaway database, mostly for tests
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Database { conn: Connection::open_in_memory()? };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl SlotStorage for Database {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        Ok(())
    }
}

/// Read the persisted task list.
/// `Ok(None)` when nothing has been saved yet; malformed data is an `Err`.
pub fn load_tasks(storage: &dyn SlotStorage) -> Result<Option<Vec<Task>>, StorageError> {
    let Some(raw) = storage.read_slot(TASKS_SLOT)? else {
        debug!("no saved tasks found");
        return Ok(None);
    };
    let tasks: Vec<Task> = serde_json::from_str(&raw)?;
    debug!(count = tasks.len(), "loaded saved tasks");
    Ok(Some(tasks))
}

/// Replace the persisted task list with `tasks`
pub fn save_tasks(storage: &dyn SlotStorage, tasks: &[Task]) -> Result<(), StorageError> {
    let raw = serde_json::to_string(tasks)?;
    storage.write_slot(TASKS_SLOT, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority};
    use chrono::{TimeZone, Utc};

    #[test]
    fn missing_slot_reads_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.read_slot(TASKS_SLOT).unwrap().is_none());
        assert!(load_tasks(&db).unwrap().is_none());
    }

    #[test]
    fn write_slot_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.write_slot("k", "first").unwrap();
        db.write_slot("k", "second").unwrap();
        assert_eq!(db.read_slot("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn save_then_load_restores_tasks() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = NewTask::new("Pay rent", "2024-02-01", "Home");
        draft.due_time = Some("10:15".to_string());
        draft.priority = Priority::High;
        let task = draft.into_task(
            "id-1".to_string(),
            Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap(),
        );

        save_tasks(&db, std::slice::from_ref(&task)).unwrap();
        let loaded = load_tasks(&db).unwrap().unwrap();
        assert_eq!(loaded, vec![task]);
    }

    #[test]
    fn malformed_slot_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.write_slot(TASKS_SLOT, "{not json").unwrap();
        assert!(matches!(load_tasks(&db), Err(StorageError::JsonError(_))));
    }
}
