//! BLAKE3 hashing of definition sources.

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_source(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}
