use serde::{Deserialize, Serialize};

/// Authenticated user identity attached to requests by the session gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored in redb as bincode-encoded bytes, keyed by `id`.
/// `password_hash` is an Argon2id PHC string, never the raw password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// Unix timestamp (seconds) of signup.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
    Article,
    Audio,
}

impl ContentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "article" => Some(Self::Article),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Article => "article",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookmarked item. Tags are held by id; titles are resolved on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub link: String,
    pub kind: ContentKind,
    pub title: String,
    pub tag_ids: Vec<String>,
    pub owner_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: String,
    pub title: String,
}

/// Keyed by `hash` so the table itself enforces hash uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLinkRecord {
    pub id: String,
    pub hash: String,
    pub owner_id: String,
    pub content_id: String,
    pub created_at: i64,
}

/// Input for content creation, already validated.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub link: String,
    pub kind: ContentKind,
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: String,
    pub username: String,
}

/// Content as returned over the API, with owner and tags resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentView {
    pub id: String,
    pub link: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub tags: Vec<String>,
    pub owner: OwnerRef,
    pub created_at: i64,
}
