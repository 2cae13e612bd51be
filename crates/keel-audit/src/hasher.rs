// hasher.rs - SHA-256 hashing utilities.
//
// Audit hashes are SHA-256, hex-encoded (64 lowercase characters), which
// keeps them readable in JSONL and easy to compare with `sha256sum`.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash a diff or other free text so the audit trail can reference it
/// without storing secrets that may be inside it.
pub fn fingerprint(text: &str) -> String {
    let full = hash_str(text);
    full[..16].to_string()
}
