//! Token scopes, generation, and hashing.

use crate::TOKEN_SECRET_BYTES;
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Purpose classification of a token.
///
/// A token issued for one scope never authorizes an operation of another
/// scope; validation always names the scope it expects. Because this is a
/// closed enum, an invalid scope cannot be constructed at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// Account activation after registration.
    Activation,
    /// Password reset.
    PasswordReset,
    /// Bearer authentication of API requests.
    Authentication,
}

impl TokenScope {
    /// Get the string representation persisted in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password_reset",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hash a token plaintext for storage and lookup.
///
/// Plaintexts are never persisted or compared directly; both issuance and
/// validation go through this digest.
pub fn hash_plaintext(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A freshly issued token.
///
/// `plaintext` exists only in memory so the caller can transmit it once;
/// the remaining fields are what the store persists.
#[derive(Clone, Debug)]
pub struct Token {
    /// The secret shown to the caller exactly once.
    pub plaintext: String,
    /// SHA-256 digest of the plaintext, hex-encoded.
    pub hash: String,
    /// User the token belongs to.
    pub user_id: Uuid,
    /// What operation the token may authorize.
    pub scope: TokenScope,
    /// Instant after which the token no longer validates.
    pub expires_at: OffsetDateTime,
}

impl Token {
    /// Generate a new token for a user using a cryptographically secure RNG.
    ///
    /// The plaintext is 16 random bytes, base32-encoded without padding.
    pub fn generate(user_id: Uuid, ttl: Duration, scope: TokenScope) -> Self {
        let mut bytes = [0u8; TOKEN_SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let plaintext = BASE32_NOPAD.encode(&bytes);
        let hash = hash_plaintext(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            scope,
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }
}
