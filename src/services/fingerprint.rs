//! Content fingerprinting for upload deduplication.

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of an uploaded document.
///
/// sha256 over the raw bytes, rendered as 64 lowercase hex characters.
/// Deterministic; used purely as a deduplication key, not a security
/// boundary.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint(b"%PDF-1.4 sample bill");
        let b = fingerprint(b"%PDF-1.4 sample bill");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_differs_for_different_bytes() {
        let a = fingerprint(b"%PDF-1.4 january bill");
        let b = fingerprint(b"%PDF-1.4 february bill");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_fixed_length_hex() {
        let f = fingerprint(b"");
        assert_eq!(f.len(), 64);
        assert!(f.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256 of the empty string is a known constant
        assert_eq!(
            f,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
