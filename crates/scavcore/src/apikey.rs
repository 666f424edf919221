use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A stored API key. Only the hash is ever persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// base64 of the SHA-256 digest of the plaintext token
    pub hash: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey").field("hash", &"[REDACTED]").finish()
    }
}

impl ApiKey {
    pub fn from_token(token: &str) -> Self {
        Self {
            hash: BASE64_STANDARD.encode(hash_token(token)),
        }
    }

    /// Constant-time comparison against an already hashed candidate.
    /// A stored hash that fails to decode never matches.
    pub fn matches(&self, candidate: &[u8; 32]) -> bool {
        match BASE64_STANDARD.decode(&self.hash) {
            Ok(stored) => stored.as_slice().ct_eq(candidate.as_slice()).into(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored API key hash is not valid base64");
                false
            }
        }
    }
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Checks presented tokens against a set of stored keys
pub struct ApiKeyVerifier<'a> {
    keys: &'a [ApiKey],
}

impl<'a> ApiKeyVerifier<'a> {
    pub fn new(keys: &'a [ApiKey]) -> Self {
        Self { keys }
    }

    pub fn verify(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let candidate = hash_token(token);
        // every key is checked so the work done does not depend on which one matched
        self.keys
            .iter()
            .fold(false, |found, key| key.matches(&candidate) | found)
    }
}
