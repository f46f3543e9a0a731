use std::path::Path;

use parking_lot::RwLock;
use redb::{Database as RedbDatabase, ReadableTable, TableDefinition};
use thiserror::Error;

use super::models::CredentialPair;

/// Stored credentials: "access_token" / "refresh_token" -> token value
const CREDENTIALS: TableDefinition<&str, &str> = TableDefinition::new("credentials");

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Persistent home of the credential pair.
///
/// Both tokens live in one redb table and are written and removed inside
/// a single transaction, so a reader can never observe a half-rotated
/// pair. An in-memory snapshot mirrors the persisted state; [`get`]
/// serves from the snapshot and never touches disk.
///
/// The on-disk file survives process restarts. A logout performed by a
/// different process is not observed until the store is reopened.
///
/// [`get`]: CredentialStore::get
pub struct CredentialStore {
    db: RedbDatabase,
    snapshot: RwLock<Option<CredentialPair>>,
}

impl CredentialStore {
    /// Open or create the store under the given data directory.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("subman-client.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
        }
        write_txn.commit()?;

        let snapshot = Self::load(&db)?;
        Ok(Self {
            db,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Read the persisted pair at open time.
    fn load(db: &RedbDatabase) -> Result<Option<CredentialPair>, StoreError> {
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;

        let access = table.get(ACCESS_TOKEN_KEY)?.map(|v| v.value().to_string());
        let refresh = table.get(REFRESH_TOKEN_KEY)?.map(|v| v.value().to_string());

        match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Ok(Some(CredentialPair {
                access_token,
                refresh_token,
            })),
            // A lone token is unusable; treat it as logged out.
            _ => Ok(None),
        }
    }

    /// Current snapshot of the stored pair. Never blocks on I/O.
    pub fn get(&self) -> Option<CredentialPair> {
        self.snapshot.read().clone()
    }

    /// Replace the stored pair. Both tokens are written in one
    /// transaction; the snapshot is updated only after the commit.
    pub fn set(&self, pair: CredentialPair) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.insert(ACCESS_TOKEN_KEY, pair.access_token.as_str())?;
            table.insert(REFRESH_TOKEN_KEY, pair.refresh_token.as_str())?;
        }
        write_txn.commit()?;

        *snapshot = Some(pair);
        tracing::debug!("Stored credential pair");
        Ok(())
    }

    /// Remove the stored pair. Safe to call when nothing is stored.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CREDENTIALS)?;
            table.remove(ACCESS_TOKEN_KEY)?;
            table.remove(REFRESH_TOKEN_KEY)?;
        }
        write_txn.commit()?;

        *snapshot = None;
        tracing::debug!("Cleared stored credentials");
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("logged_in", &self.snapshot.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (CredentialStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn pair(tag: &str) -> CredentialPair {
        CredentialPair {
            access_token: format!("access_{tag}"),
            refresh_token: format!("refresh_{tag}"),
        }
    }

    #[test]
    fn test_set_and_get() {
        let (store, _temp) = setup_store();
        assert!(store.get().is_none());

        store.set(pair("a")).unwrap();
        assert_eq!(store.get(), Some(pair("a")));
    }

    #[test]
    fn test_set_replaces_whole_pair() {
        let (store, _temp) = setup_store();

        store.set(pair("old")).unwrap();
        store.set(pair("new")).unwrap();

        // Never a mix of old and new halves.
        assert_eq!(store.get(), Some(pair("new")));
    }

    #[test]
    fn test_clear() {
        let (store, _temp) = setup_store();

        store.set(pair("a")).unwrap();
        store.clear().unwrap();
        assert!(store.get().is_none());

        // Clearing an empty store is a no-op.
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = CredentialStore::open(temp_dir.path()).unwrap();
            store.set(pair("persisted")).unwrap();
        }

        let store = CredentialStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get(), Some(pair("persisted")));
    }

    #[test]
    fn test_clear_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = CredentialStore::open(temp_dir.path()).unwrap();
            store.set(pair("gone")).unwrap();
            store.clear().unwrap();
        }

        let store = CredentialStore::open(temp_dir.path()).unwrap();
        assert!(store.get().is_none());
    }
}
