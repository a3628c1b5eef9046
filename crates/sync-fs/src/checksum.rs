//! SHA-256 checksum utilities
//!
//! Definitions are compared by checksum to decide whether a source file
//! changed since the last run. All checksums share the canonical
//! `sha256:<hex>` format.

use sha2::{Digest, Sha256};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_has_prefix() {
        let checksum = compute_checksum(b"create table");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(compute_checksum(b"test"), compute_checksum(b"test"));
    }

    #[test]
    fn different_content_different_checksum() {
        assert_ne!(compute_checksum(b"aaa"), compute_checksum(b"bbb"));
    }

    #[test]
    fn checksum_known_value() {
        assert_eq!(
            compute_checksum(b"hello world"),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
