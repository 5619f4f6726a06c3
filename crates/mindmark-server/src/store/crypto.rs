use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash `password` with Argon2id and a fresh random salt.
/// Returns a PHC string carrying algorithm, params, salt and hash.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string in constant time.
/// A mismatch is `Ok(false)`; a corrupt stored hash is an error.
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| anyhow::anyhow!("stored hash: {e}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("argon2 verify: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let phc = hash_password("pass1").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(!phc.contains("pass1"));
        assert!(verify_password("pass1", &phc).unwrap());
        assert!(!verify_password("pass2", &phc).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("pass1").unwrap(), hash_password("pass1").unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(verify_password("pass1", "not-a-phc-string").is_err());
    }
}
