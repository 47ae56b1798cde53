use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Hash a plaintext password with a fresh random salt. Only the encoded
/// hash string ever reaches the store.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("could not hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Check a login candidate against the stored hash. Returns Ok(false) on
/// mismatch; an error means the stored hash itself is unreadable.
pub fn verify_password(candidate: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {e}"))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "secret1";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert!(!verify_password("secret2", &hash).expect("verify should not error"));
    }

    #[test]
    fn hash_is_salted() {
        let a = hash_password("secret1").expect("hash");
        let b = hash_password("secret1").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_never_contains_the_plaintext() {
        let hash = hash_password("hunter2-plaintext").expect("hash");
        assert!(!hash.contains("hunter2"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
