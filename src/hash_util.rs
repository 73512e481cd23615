//! Password hashing (argon2) and session id hashing (keyed blake3).

use argon2::{
    password_hash::{
        rand_core::OsRng,
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString
    },
    Argon2
};
use blake3::Hasher;

use crate::def_boxed_thiserror;

def_boxed_thiserror!(HashingError, pub enum HashingErrorKind {
    #[error("argon2 hashing error: {0}")]
    Argon2(argon2::password_hash::Error),
});
// password_hash::Error doesn't implement std::error::Error without
// its "std" feature, thus no #[from] above:
impl From<argon2::password_hash::Error> for HashingErrorKind {
    fn from(e: argon2::password_hash::Error) -> Self {
        HashingErrorKind::Argon2(e)
    }
}

/// PHC string (`$argon2id$v=19$...`) with a fresh random salt.
pub fn create_password_hash(password: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    let pw = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(pw.to_string())
}

pub fn verify_password(password: &str,
                       existing_hash: &str) -> Result<bool, HashingError> {
    let parsed_hash = PasswordHash::new(existing_hash)?;
    match Argon2::default().verify_password(password.as_bytes(),
                                            &parsed_hash)
    {
        Ok(()) => Ok(true),
        Err(e) => match e {
            argon2::password_hash::Error::Password => Ok(false),
            _ => Err(e.into())
        }
    }
}

/// `hasher` carries the server secret; only this hash of a session
/// id is ever stored.
pub fn sessionid_hash(hasher: &Hasher, session_id: &str) -> [u8; 32] {
    let mut h = hasher.clone();
    h.update(session_id.as_bytes());
    *h.finalize().as_bytes()
}

/// A hasher keyed with `secret`, for `sessionid_hash`.
pub fn sessionid_hasher(secret: &str) -> Hasher {
    let mut h = Hasher::new();
    h.update(secret.as_bytes());
    h
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn t_password_hash() -> Result<()> {
        let hash = create_password_hash("correct horse")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash)?);
        assert!(! verify_password("wrong horse", &hash)?);
        assert!(verify_password("correct horse", "not a phc string").is_err());
        // salted
        assert_ne!(create_password_hash("correct horse")?, hash);
        Ok(())
    }

    #[test]
    fn t_sessionid_hash() {
        let a = sessionid_hasher("secret a");
        let b = sessionid_hasher("secret b");
        assert_eq!(sessionid_hash(&a, "sid1"), sessionid_hash(&a, "sid1"));
        assert_ne!(sessionid_hash(&a, "sid1"), sessionid_hash(&a, "sid2"));
        assert_ne!(sessionid_hash(&a, "sid1"), sessionid_hash(&b, "sid1"));
    }
}
