use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use redb::{Database, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
pub(crate) const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");
pub(crate) const CONTENT: TableDefinition<&str, &[u8]> = TableDefinition::new("content");
pub(crate) const TAGS: TableDefinition<&str, &[u8]> = TableDefinition::new("tags");
pub(crate) const TAG_TITLES: TableDefinition<&str, &str> = TableDefinition::new("tag_titles");
pub(crate) const SHARE_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("share_links");

/// Thread-safe handle to the redb store.
///
/// Operations are grouped by entity in sibling modules (`users`, `content`,
/// `links`), each adding methods to this type.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).context("open redb database")?;

        // Ensure all tables exist so read transactions never miss one.
        let write_txn = db.begin_write()?;
        write_txn.open_table(USERS)?;
        write_txn.open_table(USERNAMES)?;
        write_txn.open_table(CONTENT)?;
        write_txn.open_table(TAGS)?;
        write_txn.open_table(TAG_TITLES)?;
        write_txn.open_table(SHARE_LINKS)?;
        write_txn.commit()?;

        debug!(path = %path.display(), "opened store");
        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Generate a record ID: 12 random bytes, hex-encoded (24 chars).
pub fn generate_id() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(record, bincode::config::standard()).context("bincode encode")
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .context("bincode decode")?;
    Ok(record)
}

#[cfg(test)]
pub(crate) fn test_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("test.db")).unwrap();
    (store, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_24_hex_chars() {
        let id = generate_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let store = Store::open(&path).unwrap();
            let user = crate::store::UserRecord {
                id: generate_id(),
                username: "alice".into(),
                password_hash: "x".into(),
                created_at: Store::now(),
            };
            assert!(store.insert_user(&user).unwrap());
        }
        let store = Store::open(&path).unwrap();
        assert!(store.find_user_by_username("alice").unwrap().is_some());
    }
}
