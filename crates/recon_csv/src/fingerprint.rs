//! Content fingerprints for rows and payloads.
//!
//! These are fast, non-cryptographic fingerprints used only to decide
//! content equality; they are padded to 64 hex characters so they slot
//! into fields sized for SHA-256 digests.

// dependencies
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Fingerprint arbitrary text as a fixed 64-character hex string.
pub fn fingerprint(data: &str) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:0>64x}", hasher.finish())
}

/// Fingerprint a row as the concatenation `field0|field1|...|`, matching
/// the separator used everywhere row content equality is decided.
pub fn content_hash(row: &[String]) -> String {
    let mut combined = String::new();
    for field in row {
        combined.push_str(field);
        combined.push('|');
    }
    fingerprint(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_are_stable_and_wide() {
        let a = fingerprint("subdomain.example.com");
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint("subdomain.example.com"));
        assert_ne!(a, fingerprint("subdomain.example.org"));
    }

    #[test]
    fn separator_prevents_field_boundary_collisions() {
        let left = vec!["ab".to_string(), "c".to_string()];
        let right = vec!["a".to_string(), "bc".to_string()];
        assert_ne!(content_hash(&left), content_hash(&right));
    }
}
