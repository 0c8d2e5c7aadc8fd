//! SHA-256 helpers over canonical decimal text.
//!
//! Every digest in the ledger protocol is carried as a lowercase hex string,
//! and interior nodes hash the concatenation of their children's hex text
//! rather than the raw digest bytes.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the canonical decimal representation of `value`.
pub fn digest_decimal(value: u64) -> String {
    digest_text(&value.to_string())
}

/// Hex-encoded SHA-256 of arbitrary UTF-8 text.
pub fn digest_text(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Combines two hex node hashes: `SHA-256(left ++ right)` over the hex text.
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
