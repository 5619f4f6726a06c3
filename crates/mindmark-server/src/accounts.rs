use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::store::{crypto, generate_id, Store, UserId, UserRecord};

/// Signup/signin request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(
        min = 4,
        max = 16,
        message = "Password must be between 4 and 16 characters"
    ))]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Create a user. The password is stored as a salted Argon2id hash.
pub fn register(store: &Store, creds: &Credentials) -> Result<UserRecord> {
    creds.validate()?;

    let record = UserRecord {
        id: generate_id(),
        username: creds.username.clone(),
        password_hash: crypto::hash_password(&creds.password)?,
        created_at: Store::now(),
    };
    if !store.insert_user(&record)? {
        debug!(username = %creds.username, "signup rejected: username taken");
        return Err(AppError::DuplicateUsername);
    }

    info!(user_id = %record.id, username = %record.username, "user registered");
    Ok(record)
}

/// Hash of a random throwaway password, verified against when the username
/// is unknown so both failure paths pay for one Argon2 verification.
fn dummy_hash() -> Result<&'static str> {
    static DUMMY: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DUMMY.get() {
        return Ok(hash.as_str());
    }
    let hash = crypto::hash_password(&generate_id())?;
    Ok(DUMMY.get_or_init(|| hash).as_str())
}

/// Check a username/password pair, returning the user's ID on success.
pub fn authenticate(store: &Store, creds: &Credentials) -> Result<UserId> {
    creds.validate()?;

    let Some(user) = store.find_user_by_username(&creds.username)? else {
        crypto::verify_password(&creds.password, dummy_hash()?)?;
        debug!(username = %creds.username, "signin rejected: unknown user");
        return Err(AppError::InvalidCredentials);
    };
    if !crypto::verify_password(&creds.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }
    Ok(UserId(user.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::db::test_store;

    #[test]
    fn register_then_authenticate() {
        let (s, _dir) = test_store();
        let user = register(&s, &Credentials::new("alice", "pass1")).unwrap();
        assert_ne!(user.password_hash, "pass1");

        let id = authenticate(&s, &Credentials::new("alice", "pass1")).unwrap();
        assert_eq!(id.as_str(), user.id);
    }

    #[test]
    fn duplicate_username_rejected_even_with_other_password() {
        let (s, _dir) = test_store();
        register(&s, &Credentials::new("alice", "pass1")).unwrap();
        assert!(matches!(
            register(&s, &Credentials::new("alice", "pass2")),
            Err(AppError::DuplicateUsername)
        ));
        // The original password still works; the second one never took.
        assert!(authenticate(&s, &Credentials::new("alice", "pass1")).is_ok());
        assert!(matches!(
            authenticate(&s, &Credentials::new("alice", "pass2")),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn validation_bounds() {
        let (s, _dir) = test_store();
        let too_long = "a".repeat(17);
        for (username, password) in [("", "pass1"), ("bob", "abc"), ("bob", too_long.as_str())] {
            assert!(matches!(
                register(&s, &Credentials::new(username, password)),
                Err(AppError::Validation(_))
            ));
        }
        assert!(register(&s, &Credentials::new("four", "abcd")).is_ok());
        assert!(register(&s, &Credentials::new("sixteen", "a".repeat(16))).is_ok());
    }

    #[test]
    fn dummy_hash_is_stable_and_matches_nothing() {
        let hash = dummy_hash().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(dummy_hash().unwrap(), hash);
        assert!(!crypto::verify_password("pass1", hash).unwrap());
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        let (s, _dir) = test_store();
        register(&s, &Credentials::new("alice", "pass1")).unwrap();
        assert!(matches!(
            authenticate(&s, &Credentials::new("nobody", "pass1")),
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&s, &Credentials::new("alice", "wrong")),
            Err(AppError::InvalidCredentials)
        ));
    }
}
