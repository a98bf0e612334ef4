use sha2::{Digest, Sha256};

/// SHA-256 of a file's bytes, hex encoded. Used to spot the same photo being
/// staged twice under different names.
pub fn content_fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First 12 hex characters, enough to tell staged files apart in logs.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}
