//! Single-slot credential storage.
//!
//! The slot is last-writer-wins. Reads and writes replace the whole value,
//! so no caller ever sees a torn intermediate state.
//!
//! The SQLite-backed store is only available with the `native` feature.

use crate::models::Credential;
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "native")]
use rusqlite::{params, Connection, OptionalExtension};

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: Option<Credential>);
}

/// Process-lifetime slot, used by tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Option<Credential>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = credential;
    }
}

#[cfg(feature = "native")]
const SLOT: &str = "current";

/// Durable slot in a small SQLite file. The row is mirrored in memory so
/// `get` never touches the disk.
#[cfg(feature = "native")]
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cache: Mutex<Option<Credential>>,
}

#[cfg(feature = "native")]
impl SqliteCredentialStore {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 250)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credential(
                slot  TEXT PRIMARY KEY,
                token TEXT NOT NULL
            );
        "#,
        )?;

        let token: Option<String> = conn
            .query_row(
                "SELECT token FROM credential WHERE slot = ?",
                params![SLOT],
                |row| row.get(0),
            )
            .optional()?;
        let cached = token.map(Credential::new).filter(|c| !c.is_empty());
        log::debug!(
            "[store] opened {} (credential present: {})",
            path,
            cached.is_some()
        );

        Ok(Self {
            conn: Mutex::new(conn),
            cache: Mutex::new(cached),
        })
    }

    fn persist(&self, credential: Option<&Credential>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        match credential {
            Some(c) => conn.execute(
                "INSERT OR REPLACE INTO credential(slot, token) VALUES (?, ?)",
                params![SLOT, c.as_str()],
            )?,
            None => conn.execute("DELETE FROM credential WHERE slot = ?", params![SLOT])?,
        };
        Ok(())
    }
}

#[cfg(feature = "native")]
impl CredentialStore for SqliteCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: Option<Credential>) {
        if let Err(e) = self.persist(credential.as_ref()) {
            log::error!("❌ [store] failed to persist credential: {e}");
        }
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = credential;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_is_last_writer_wins() {
        let store = MemoryCredentialStore::new();
        assert!(store.get().is_none());

        store.set(Some(Credential::new("a")));
        store.set(Some(Credential::new("b")));
        assert_eq!(store.get(), Some(Credential::new("b")));

        store.set(None);
        assert!(store.get().is_none());
    }

    #[cfg(feature = "native")]
    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteCredentialStore::open(path).unwrap();
            assert!(store.get().is_none());
            store.set(Some(Credential::new("tok-1")));
        }

        let reopened = SqliteCredentialStore::open(path).unwrap();
        assert_eq!(reopened.get(), Some(Credential::new("tok-1")));

        reopened.set(None);
        drop(reopened);
        let cleared = SqliteCredentialStore::open(path).unwrap();
        assert!(cleared.get().is_none());
    }
}
