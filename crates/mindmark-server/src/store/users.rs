use anyhow::Result;
use redb::ReadableTable;

use super::db::{decode, encode, Store, USERNAMES, USERS};
use super::model::UserRecord;

impl Store {
    /// Insert a user, claiming its username in the same transaction.
    /// Returns false (and writes nothing) if the username is already taken.
    pub fn insert_user(&self, record: &UserRecord) -> Result<bool> {
        let bytes = encode(record)?;

        let write_txn = self.db.begin_write()?;
        let created = {
            let mut usernames = write_txn.open_table(USERNAMES)?;
            let taken = usernames.get(record.username.as_str())?.is_some();
            if taken {
                false
            } else {
                usernames.insert(record.username.as_str(), record.id.as_str())?;
                let mut users = write_txn.open_table(USERS)?;
                users.insert(record.id.as_str(), bytes.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(created)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let usernames = read_txn.open_table(USERNAMES)?;
        let user_id: Option<String> = usernames.get(username)?.map(|g| g.value().to_owned());

        match user_id {
            None => Ok(None),
            Some(id) => {
                let users = read_txn.open_table(USERS)?;
                let raw: Option<Vec<u8>> = users.get(id.as_str())?.map(|g| g.value().to_vec());
                raw.map(|bytes| decode(&bytes)).transpose()
            }
        }
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let raw: Option<Vec<u8>> = users.get(id)?.map(|g| g.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }
}
