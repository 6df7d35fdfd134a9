use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use subtle::ConstantTimeEq;
use vouch_core::{RecordId, StorageBackend, VouchError, VouchResult};

/// SQLite storage backend.
///
/// One flat table of opaque ids and blobs. Wrapped in a
/// [`crate::BlindStorageWrapper`] the table never holds plaintext.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> VouchError + '_ {
    move |e| VouchError::Storage(format!("{}: {}", context, e))
}

impl SqliteBackend {
    /// Open or create a database at `path`.
    pub fn open(path: impl AsRef<Path>) -> VouchResult<Self> {
        let conn = Connection::open(path).map_err(storage_err("failed to open database"))?;
        Self::init(conn)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> VouchResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err("failed to open database"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> VouchResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                record_id TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT DEFAULT (datetime('now'))
            );",
        )
        .map_err(storage_err("failed to create tables"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> VouchResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VouchError::Storage(format!("lock poisoned: {}", e)))
    }

    fn read(conn: &Connection, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>> {
        conn.query_row(
            "SELECT value FROM records WHERE record_id = ?1",
            params![record_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("query failed"))
    }

    fn write(conn: &Connection, record_id: &RecordId, value: &[u8]) -> VouchResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO records (record_id, value, updated_at)
             VALUES (?1, ?2, datetime('now'))",
            params![record_id.as_str(), value],
        )
        .map_err(storage_err("write failed"))?;
        Ok(())
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, record_id: &RecordId) -> VouchResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        Self::read(&conn, record_id)
    }

    fn put(&self, record_id: &RecordId, value: &[u8]) -> VouchResult<()> {
        let conn = self.lock()?;
        Self::write(&conn, record_id, value)
    }

    fn delete(&self, record_id: &RecordId) -> VouchResult<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "DELETE FROM records WHERE record_id = ?1",
                params![record_id.as_str()],
            )
            .map_err(storage_err("delete failed"))?;
        Ok(rows > 0)
    }

    fn compare_and_swap(
        &self,
        record_id: &RecordId,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> VouchResult<bool> {
        let conn = self.lock()?;
        let current = Self::read(&conn, record_id)?;
        let matches = match (&current, expected) {
            (None, None) => true,
            (Some(curr), Some(exp)) => curr.as_slice().ct_eq(exp).into(),
            _ => false,
        };
        if matches {
            Self::write(&conn, record_id, new_value)?;
        }
        Ok(matches)
    }

    fn exists(&self, record_id: &RecordId) -> VouchResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE record_id = ?1",
                params![record_id.as_str()],
                |row| row.get(0),
            )
            .map_err(storage_err("exists query failed"))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend() -> SqliteBackend {
        SqliteBackend::in_memory().unwrap()
    }

    #[test]
    fn test_get_missing() {
        let backend = test_backend();
        assert!(backend.get(&RecordId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_put_get_overwrite() {
        let backend = test_backend();
        let id = RecordId::new("credential:a");
        backend.put(&id, b"one").unwrap();
        backend.put(&id, b"two").unwrap();
        assert_eq!(backend.get(&id).unwrap().unwrap(), b"two");
    }

    #[test]
    fn test_delete_reports_presence() {
        let backend = test_backend();
        let id = RecordId::new("credential:a");
        backend.put(&id, b"one").unwrap();
        assert!(backend.exists(&id).unwrap());
        assert!(backend.delete(&id).unwrap());
        assert!(!backend.delete(&id).unwrap());
        assert!(!backend.exists(&id).unwrap());
    }

    #[test]
    fn test_create_if_absent() {
        let backend = test_backend();
        let id = RecordId::new("credential:a");
        assert!(backend.compare_and_swap(&id, None, b"first").unwrap());
        assert!(!backend.compare_and_swap(&id, None, b"second").unwrap());
        assert_eq!(backend.get(&id).unwrap().unwrap(), b"first");
    }

    #[test]
    fn test_cas_conflict_leaves_value() {
        let backend = test_backend();
        let id = RecordId::new("credential:a");
        backend.put(&id, b"actual").unwrap();
        assert!(!backend
            .compare_and_swap(&id, Some(b"stale"), b"new")
            .unwrap());
        assert_eq!(backend.get(&id).unwrap().unwrap(), b"actual");
    }

    #[test]
    fn test_persists_across_connections() {
        let path = std::env::temp_dir().join(format!(
            "vouch-sqlite-test-{}.db",
            vouch_core::CredentialId::generate()
        ));
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.put(&RecordId::new("k"), b"v").unwrap();
        }
        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.get(&RecordId::new("k")).unwrap().unwrap(), b"v");
        let _ = std::fs::remove_file(&path);
    }
}
