// content-index/src/hasher.rs
//! File fingerprints: lowercase hex SHA-256 over the whole file.

use sha2::{
    Digest,
    Sha256
};
use std::{
    fs,
    path::Path
};
use crate::error::{
    IndexError,
    Result
};


/// Length of a hex-encoded SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// Turns one file into its fingerprint. Implementations must be
/// deterministic and safe to call from several workers at once.
pub trait ContentHasher: Send + Sync {
    fn fingerprint(&self, path: &Path) -> Result<String>;
}

/// Default hasher. Reads the entire file into memory, then digests it.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn fingerprint(&self, path: &Path) -> Result<String> {
        hash_file(path)
    }
}

pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| IndexError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(data: impl AsRef<[u8]>) -> String {
    let mut h = Sha256::new();
    h.update(data.as_ref());
    hex::encode(h.finalize())
}

/// Cheap shape check: 64 lowercase hex digits.
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn known_digests() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hash_bytes(b"A"),
            "559aead08264d5795d3909718cdd05abd49572e84fe55590eef31a88a08fdffd"
        );
    }

    #[test]
    fn file_hash_matches_bytes() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("x.jpg");
        fs::write(&p, b"B").unwrap();
        assert_eq!(hash_file(&p).unwrap(), hash_bytes(b"B"));
        assert_eq!(Sha256Hasher.fingerprint(&p).unwrap(), hash_bytes(b"B"));
    }

    #[test]
    fn missing_file_is_per_file_error() {
        let tmp = TempDir::new().unwrap();
        let err = hash_file(&tmp.path().join("gone.png")).unwrap_err();
        assert!(err.is_per_file());
    }

    #[test]
    fn fingerprint_shape() {
        assert!(is_fingerprint(&hash_bytes(b"A")));
        assert!(!is_fingerprint("deadbeef"));
        assert!(!is_fingerprint(&hash_bytes(b"A").to_uppercase()));
    }
}
