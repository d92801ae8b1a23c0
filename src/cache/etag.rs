// ETag generation for cached read models
//
// ETags are content hashes: two identical serialized bodies always produce
// the same tag, so a client's If-None-Match hit short-circuits to 304
// without recomputing or re-serializing the body.

use sha2::{Digest, Sha256};

/// Compute a strong ETag (quoted lowercase hex SHA-256) for a serialized body.
pub fn compute(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("\"{}\"", hex)
}

/// Compare a request's If-None-Match header value against the current ETag.
pub fn matches(if_none_match: Option<&str>, current: &str) -> bool {
    match if_none_match {
        Some("*") => true,
        Some(values) => values.split(',').any(|v| v.trim() == current),
        None => false,
    }
}
