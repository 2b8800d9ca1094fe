//! Opaque random tokens: session tokens and confirmation codes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::id::{OBJECT_ID_HEX_LEN, ObjectId};

/// Random bytes behind every session token and confirmation code.
pub const TOKEN_ENTROPY_BYTES: usize = 64;

fn random_b64(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Session token: the owner's hex id followed by 64 random bytes,
/// base64url-encoded without padding.
pub fn generate_session_token(user_id: &ObjectId) -> String {
    let mut token = user_id.to_hex();
    token.push_str(&random_b64(TOKEN_ENTROPY_BYTES));
    token
}

/// Owner id carried in a session token's prefix, if the token has one.
pub fn session_token_owner(token: &str) -> Option<ObjectId> {
    token
        .get(..OBJECT_ID_HEX_LEN)
        .and_then(|prefix| ObjectId::parse_str(prefix).ok())
}

/// Opaque code stored under a purpose key in `confirm_codes`.
pub fn generate_confirm_code() -> String {
    random_b64(TOKEN_ENTROPY_BYTES)
}

/// SHA-256 of a raw session token, hex-encoded. Session rows are keyed by
/// this digest rather than by the token itself.
pub fn token_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
