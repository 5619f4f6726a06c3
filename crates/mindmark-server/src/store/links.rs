use anyhow::Result;
use rand::RngCore;
use redb::ReadableTable;
use tracing::{debug, warn};

use super::content::{owner_ref, to_view, user_exists};
use super::db::{decode, encode, generate_id, Store, CONTENT, SHARE_LINKS};
use super::model::{ContentRecord, ContentView, ShareLinkRecord};

/// Bytes of OS randomness in a share hash (128 bits, 32 hex chars).
pub const SHARE_HASH_BYTES: usize = 16;
const MAX_HASH_ATTEMPTS: usize = 4;

/// Result of resolving a share hash.
#[derive(Debug, PartialEq)]
pub enum ResolveOutcome {
    Content(ContentView),
    /// No share link with that hash.
    LinkNotFound,
    /// The link exists but its content has since been deleted.
    ContentMissing,
}

/// Generate an unguessable share hash: 16 OS-random bytes, hex-encoded.
pub fn generate_share_hash() -> String {
    let mut bytes = [0u8; SHARE_HASH_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Store {
    /// Create a new share link for content owned by `owner_id`.
    /// Returns `Ok(None)` if the owner is unknown, or the content does not
    /// exist or belongs to someone else.
    pub fn create_share_link(
        &self,
        owner_id: &str,
        content_id: &str,
    ) -> Result<Option<ShareLinkRecord>> {
        self.create_share_link_with(owner_id, content_id, generate_share_hash)
    }

    /// As `create_share_link`, drawing candidate hashes from `next_hash`.
    /// A candidate already present in the table is discarded and redrawn.
    pub(crate) fn create_share_link_with(
        &self,
        owner_id: &str,
        content_id: &str,
        mut next_hash: impl FnMut() -> String,
    ) -> Result<Option<ShareLinkRecord>> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let content = write_txn.open_table(CONTENT)?;
            let raw: Option<Vec<u8>> = content.get(content_id)?.map(|g| g.value().to_vec());
            let owned = match raw {
                Some(bytes) => decode::<ContentRecord>(&bytes)?.owner_id == owner_id,
                None => false,
            };
            let owned = owned && user_exists(&write_txn, owner_id)?;

            if !owned {
                None
            } else {
                let mut links = write_txn.open_table(SHARE_LINKS)?;
                let mut hash = None;
                for _ in 0..MAX_HASH_ATTEMPTS {
                    let candidate = next_hash();
                    let exists = links.get(candidate.as_str())?.is_some();
                    if exists {
                        warn!("share hash collision, regenerating");
                        continue;
                    }
                    hash = Some(candidate);
                    break;
                }
                let Some(hash) = hash else {
                    anyhow::bail!("could not allocate a unique share hash");
                };

                let record = ShareLinkRecord {
                    id: generate_id(),
                    hash,
                    owner_id: owner_id.to_owned(),
                    content_id: content_id.to_owned(),
                    created_at: Self::now(),
                };
                links.insert(record.hash.as_str(), encode(&record)?.as_slice())?;
                Some(record)
            }
        };
        write_txn.commit()?;

        if let Some(ref record) = created {
            debug!(content_id, owner_id, link_id = %record.id, "created share link");
        }
        Ok(created)
    }

    /// Look up a share hash and fetch the content it points at.
    pub fn resolve_share_link(&self, hash: &str) -> Result<ResolveOutcome> {
        let read_txn = self.db.begin_read()?;
        let links = read_txn.open_table(SHARE_LINKS)?;
        let raw: Option<Vec<u8>> = links.get(hash)?.map(|g| g.value().to_vec());
        let Some(bytes) = raw else {
            return Ok(ResolveOutcome::LinkNotFound);
        };
        let link: ShareLinkRecord = decode(&bytes)?;

        let content = read_txn.open_table(CONTENT)?;
        let raw: Option<Vec<u8>> = content
            .get(link.content_id.as_str())?
            .map(|g| g.value().to_vec());
        let Some(bytes) = raw else {
            return Ok(ResolveOutcome::ContentMissing);
        };
        let record: ContentRecord = decode(&bytes)?;

        let owner = owner_ref(&read_txn, &record.owner_id)?;
        Ok(ResolveOutcome::Content(to_view(&read_txn, record, owner)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::test_store;
    use crate::store::model::{ContentKind, NewContent, UserRecord};
    use redb::ReadableTableMetadata;

    fn setup(s: &Store) -> (String, String) {
        let owner = UserRecord {
            id: generate_id(),
            username: "alice".into(),
            password_hash: "unused".into(),
            created_at: Store::now(),
        };
        assert!(s.insert_user(&owner).unwrap());
        let content = s
            .insert_content(
                &owner.id,
                NewContent {
                    link: "http://x".into(),
                    kind: ContentKind::Video,
                    title: "t".into(),
                    tags: vec![],
                },
            )
            .unwrap()
            .unwrap();
        (owner.id, content.id)
    }

    #[test]
    fn share_hash_format() {
        let hash = generate_share_hash();
        assert_eq!(hash.len(), SHARE_HASH_BYTES * 2);
        assert!(hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn two_links_for_same_content_are_distinct_and_resolve() {
        let (s, _dir) = test_store();
        let (owner, content_id) = setup(&s);

        let a = s.create_share_link(&owner, &content_id).unwrap().unwrap();
        let b = s.create_share_link(&owner, &content_id).unwrap().unwrap();
        assert_ne!(a.hash, b.hash);

        for hash in [&a.hash, &b.hash] {
            match s.resolve_share_link(hash).unwrap() {
                ResolveOutcome::Content(view) => assert_eq!(view.id, content_id),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[test]
    fn cannot_share_missing_or_foreign_content() {
        let (s, _dir) = test_store();
        let (owner, content_id) = setup(&s);
        assert!(s.create_share_link(&owner, "nope").unwrap().is_none());
        assert!(s.create_share_link("someone-else", &content_id).unwrap().is_none());
    }

    #[test]
    fn cannot_share_as_unknown_owner() {
        let (s, _dir) = test_store();
        let orphan = ContentRecord {
            id: generate_id(),
            link: "http://x".into(),
            kind: ContentKind::Image,
            title: "orphan".into(),
            tag_ids: vec![],
            owner_id: "ghost".into(),
            created_at: Store::now(),
        };
        let write_txn = s.db.begin_write().unwrap();
        {
            let mut content = write_txn.open_table(CONTENT).unwrap();
            content
                .insert(orphan.id.as_str(), encode(&orphan).unwrap().as_slice())
                .unwrap();
        }
        write_txn.commit().unwrap();

        assert!(s.create_share_link("ghost", &orphan.id).unwrap().is_none());
        let read_txn = s.db.begin_read().unwrap();
        assert_eq!(read_txn.open_table(SHARE_LINKS).unwrap().len().unwrap(), 0);
    }

    #[test]
    fn unknown_hash_is_link_not_found() {
        let (s, _dir) = test_store();
        assert_eq!(
            s.resolve_share_link(&generate_share_hash()).unwrap(),
            ResolveOutcome::LinkNotFound
        );
    }

    #[test]
    fn deleted_content_leaves_dangling_link() {
        let (s, _dir) = test_store();
        let (owner, content_id) = setup(&s);
        let link = s.create_share_link(&owner, &content_id).unwrap().unwrap();
        s.delete_content(&content_id, &owner).unwrap();
        assert_eq!(
            s.resolve_share_link(&link.hash).unwrap(),
            ResolveOutcome::ContentMissing
        );
    }

    #[test]
    fn colliding_hash_is_regenerated() {
        let (s, _dir) = test_store();
        let (owner, content_id) = setup(&s);
        let fixed = "a".repeat(32);
        let first = s
            .create_share_link_with(&owner, &content_id, || fixed.clone())
            .unwrap()
            .unwrap();
        assert_eq!(first.hash, fixed);

        let mut candidates = vec!["b".repeat(32), fixed.clone()];
        let second = s
            .create_share_link_with(&owner, &content_id, || candidates.pop().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(second.hash, "b".repeat(32));
    }

    #[test]
    fn exhausted_hash_attempts_is_an_error() {
        let (s, _dir) = test_store();
        let (owner, content_id) = setup(&s);
        let fixed = "c".repeat(32);
        s.create_share_link_with(&owner, &content_id, || fixed.clone())
            .unwrap();
        assert!(s
            .create_share_link_with(&owner, &content_id, || fixed.clone())
            .is_err());
    }
}
