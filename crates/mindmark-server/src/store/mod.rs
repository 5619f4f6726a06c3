pub mod content;
pub mod crypto;
pub mod db;
pub mod links;
pub mod model;
pub mod users;

pub use content::DeleteOutcome;
pub use db::{generate_id, Store};
pub use links::{generate_share_hash, ResolveOutcome};
pub use model::{
    ContentKind, ContentRecord, ContentView, NewContent, OwnerRef, ShareLinkRecord, TagRecord,
    UserId, UserRecord,
};
