use anyhow::{Context, Result};
use redb::{ReadTransaction, ReadableTable, WriteTransaction};
use tracing::debug;

use super::db::{decode, encode, generate_id, Store, CONTENT, TAGS, TAG_TITLES, USERS};
use super::model::{ContentRecord, ContentView, NewContent, OwnerRef, TagRecord, UserRecord};

/// Result of an owner-scoped delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed, belonged to the caller, and was removed.
    Deleted,
    /// No content with that ID.
    NotFound,
    /// Content exists but belongs to someone else. Nothing was removed.
    NotOwner,
}

impl Store {
    /// Persist new content for `owner_id`, creating any tags not seen before.
    /// Returns `Ok(None)` without writing anything if no such user exists.
    pub fn insert_content(
        &self,
        owner_id: &str,
        new: NewContent,
    ) -> Result<Option<ContentRecord>> {
        let tag_titles = normalize_tags(new.tags);

        let write_txn = self.db.begin_write()?;
        if !user_exists(&write_txn, owner_id)? {
            debug!(owner_id, "refusing content for unknown owner");
            write_txn.abort()?;
            return Ok(None);
        }
        let record = {
            let mut titles = write_txn.open_table(TAG_TITLES)?;
            let mut tags = write_txn.open_table(TAGS)?;

            let mut tag_ids = Vec::with_capacity(tag_titles.len());
            for title in &tag_titles {
                let existing: Option<String> =
                    titles.get(title.as_str())?.map(|g| g.value().to_owned());
                let id = match existing {
                    Some(id) => id,
                    None => {
                        let tag = TagRecord {
                            id: generate_id(),
                            title: title.clone(),
                        };
                        tags.insert(tag.id.as_str(), encode(&tag)?.as_slice())?;
                        titles.insert(title.as_str(), tag.id.as_str())?;
                        debug!(tag = %title, "created tag");
                        tag.id
                    }
                };
                tag_ids.push(id);
            }

            let record = ContentRecord {
                id: generate_id(),
                link: new.link,
                kind: new.kind,
                title: new.title,
                tag_ids,
                owner_id: owner_id.to_owned(),
                created_at: Self::now(),
            };
            let mut content = write_txn.open_table(CONTENT)?;
            content.insert(record.id.as_str(), encode(&record)?.as_slice())?;
            record
        };
        write_txn.commit()?;

        debug!(content_id = %record.id, owner_id, "stored content");
        Ok(Some(record))
    }

    pub fn get_content(&self, id: &str) -> Result<Option<ContentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONTENT)?;
        let raw: Option<Vec<u8>> = table.get(id)?.map(|g| g.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    /// Resolve a record's owner and tag titles for display.
    pub fn content_view(&self, record: ContentRecord) -> Result<ContentView> {
        let read_txn = self.db.begin_read()?;
        let owner = owner_ref(&read_txn, &record.owner_id)?;
        to_view(&read_txn, record, owner)
    }

    /// All content owned by `owner_id`, oldest first. Scans the table.
    pub fn list_content_by_owner(&self, owner_id: &str) -> Result<Vec<ContentView>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONTENT)?;

        let mut records = Vec::new();
        for item in table.iter()? {
            let (_k, v) = item?;
            let record: ContentRecord = decode(v.value())?;
            if record.owner_id == owner_id {
                records.push(record);
            }
        }
        if records.is_empty() {
            return Ok(vec![]);
        }
        records.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let owner = owner_ref(&read_txn, owner_id)?;
        records
            .into_iter()
            .map(|record| to_view(&read_txn, record, owner.clone()))
            .collect()
    }

    /// Delete content only if `owner_id` owns it.
    pub fn delete_content(&self, id: &str, owner_id: &str) -> Result<DeleteOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(CONTENT)?;
            let raw: Option<Vec<u8>> = table.get(id)?.map(|g| g.value().to_vec());

            match raw {
                None => DeleteOutcome::NotFound,
                Some(bytes) => {
                    let record: ContentRecord = decode(&bytes)?;
                    if record.owner_id != owner_id {
                        DeleteOutcome::NotOwner
                    } else {
                        table.remove(id)?;
                        DeleteOutcome::Deleted
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }
}

/// Trim tag titles, drop empties, and collapse duplicates keeping first-seen order.
pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}

pub(crate) fn user_exists(txn: &WriteTransaction, user_id: &str) -> Result<bool> {
    let users = txn.open_table(USERS)?;
    let exists = users.get(user_id)?.is_some();
    Ok(exists)
}

pub(crate) fn owner_ref(txn: &ReadTransaction, owner_id: &str) -> Result<OwnerRef> {
    let users = txn.open_table(USERS)?;
    let raw = users
        .get(owner_id)?
        .map(|g| g.value().to_vec())
        .with_context(|| format!("content owner {owner_id} does not exist"))?;
    let user: UserRecord = decode(&raw)?;
    Ok(OwnerRef {
        id: user.id,
        username: user.username,
    })
}

pub(crate) fn to_view(
    txn: &ReadTransaction,
    record: ContentRecord,
    owner: OwnerRef,
) -> Result<ContentView> {
    let tags = txn.open_table(TAGS)?;
    let mut titles = Vec::with_capacity(record.tag_ids.len());
    for id in &record.tag_ids {
        let raw: Option<Vec<u8>> = tags.get(id.as_str())?.map(|g| g.value().to_vec());
        if let Some(bytes) = raw {
            let tag: TagRecord = decode(&bytes)?;
            titles.push(tag.title);
        }
    }

    Ok(ContentView {
        id: record.id,
        link: record.link,
        kind: record.kind,
        title: record.title,
        tags: titles,
        owner,
        created_at: record.created_at,
    })
}
