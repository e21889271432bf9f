//! Content digests
//!
//! Every blob in the registry is addressed by the SHA-256 of its bytes,
//! rendered as `sha256:<hex>`. The digest doubles as an integrity check on
//! pull.

use sha2::{Digest, Sha256};

/// Algorithm prefix for all digests produced by this crate
pub const SHA256_PREFIX: &str = "sha256:";

/// Compute the `sha256:<hex>` digest of a byte slice
pub fn sha256_digest(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    format!("{}{}", SHA256_PREFIX, hex::encode(hash))
}
