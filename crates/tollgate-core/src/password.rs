//! Password hashing and verification.
//!
//! Every password gets its own 32-byte salt from the OS RNG. The salt is
//! appended to the plaintext and also used as the Argon2id salt; the PHC
//! string keeps the cost parameters so verification does not depend on the
//! codec's current settings.

use argon2::password_hash::{self, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::{DateTime, Utc};
use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::{TollgateError, TollgateResult};
use crate::models::user::Password;

pub const SALT_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct CredentialCodec {
    params: Params,
}

impl Default for CredentialCodec {
    /// OWASP-recommended Argon2id cost: m=19456 (19 MiB), t=2, p=1.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost. Mostly useful to make tests cheaper.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> TollgateResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| TollgateError::HashingFailure(format!("argon2 params error: {e}")))?;
        Ok(Self { params })
    }

    pub fn hash(&self, plaintext: &str) -> TollgateResult<Password> {
        self.hash_at(plaintext, Utc::now())
    }

    pub fn hash_at(&self, plaintext: &str, now: DateTime<Utc>) -> TollgateResult<Password> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| TollgateError::HashingFailure(format!("rng failure: {e}")))?;

        let salt_string = SaltString::encode_b64(&salt)
            .map_err(|e| TollgateError::HashingFailure(format!("salt encoding: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2
            .hash_password(&salted(plaintext, &salt), &salt_string)
            .map_err(|e| TollgateError::HashingFailure(format!("password hash error: {e}")))?
            .to_string();

        Ok(Password {
            salt,
            hash,
            created_at: now,
        })
    }

    /// `Ok(())` on match, [`TollgateError::CredentialMismatch`] otherwise.
    pub fn verify(&self, plaintext: &str, stored: &Password) -> TollgateResult<()> {
        let parsed = PasswordHash::new(&stored.hash)
            .map_err(|e| TollgateError::HashingFailure(format!("invalid hash format: {e}")))?;

        match Argon2::default().verify_password(&salted(plaintext, &stored.salt), &parsed) {
            Ok(()) => Ok(()),
            Err(password_hash::Error::Password) => Err(TollgateError::CredentialMismatch),
            Err(e) => Err(TollgateError::HashingFailure(format!("verify error: {e}"))),
        }
    }
}

fn salted(plaintext: &str, salt: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(plaintext.len() + salt.len());
    input.extend_from_slice(plaintext.as_bytes());
    input.extend_from_slice(salt);
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CredentialCodec {
        CredentialCodec::with_cost(1024, 1, 1).unwrap()
    }

    #[test]
    fn correct_password_matches() {
        let codec = codec();
        let stored = codec.hash("zaq123456").unwrap();
        assert!(stored.hash.starts_with("$argon2id$"));
        codec.verify("zaq123456", &stored).unwrap();
    }

    #[test]
    fn wrong_password_is_a_mismatch() {
        let codec = codec();
        let stored = codec.hash("zaq123456").unwrap();
        let err = codec.verify("zaq1234567", &stored).unwrap_err();
        assert!(matches!(err, TollgateError::CredentialMismatch));
    }

    #[test]
    fn salts_are_random_and_full_length() {
        let codec = codec();
        let a = codec.hash("same-password").unwrap();
        let b = codec.hash("same-password").unwrap();
        assert_eq!(a.salt.len(), SALT_LEN);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn stored_salt_takes_part_in_verification() {
        let codec = codec();
        let mut stored = codec.hash("zaq123456").unwrap();
        stored.salt[0] ^= 0xff;
        assert!(matches!(
            codec.verify("zaq123456", &stored),
            Err(TollgateError::CredentialMismatch)
        ));
    }

    #[test]
    fn verification_reads_cost_from_the_hash() {
        let stored = codec().hash("zaq123456").unwrap();
        CredentialCodec::default().verify("zaq123456", &stored).unwrap();
    }

    #[test]
    fn malformed_hash_is_a_hashing_failure() {
        let stored = Password {
            salt: vec![0; SALT_LEN],
            hash: "not-a-hash".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            codec().verify("pw", &stored),
            Err(TollgateError::HashingFailure(_))
        ));
    }

    #[test]
    fn hash_at_records_creation_time() {
        let now = Utc::now() - chrono::Duration::days(3);
        let stored = codec().hash_at("zaq123456", now).unwrap();
        assert_eq!(stored.created_at, now);
    }

    #[test]
    fn verify_reads_cost_from_stored_hash() {
        let stored = codec().hash("zaq123456").unwrap();
        CredentialCodec::default().verify("zaq123456", &stored).unwrap();
    }
}
