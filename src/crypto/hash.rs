//! One-shot SHA-1 / SHA-256 hashing.

use std::fmt;

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Size in bytes of a SHA-256 digest.
pub const SHA256_SIZE: usize = 0x20;

/// Size in bytes of a SHA-1 digest.
pub const SHA1_SIZE: usize = 0x14;

/// A SHA-256 digest, as stored in hash-tree layers and container headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sha256Hash(pub [u8; SHA256_SIZE]);

impl Sha256Hash {
    /// Hash `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(sha256(data))
    }

    /// Returns true if `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        sha256(data) == self.0
    }

    pub fn as_bytes(&self) -> &[u8; SHA256_SIZE] {
        &self.0
    }

    /// Reinterpret a flat buffer of concatenated digests as a hash list.
    /// A trailing partial digest is ignored.
    pub fn list_from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(SHA256_SIZE)
            .map(|c| {
                let mut h = [0u8; SHA256_SIZE];
                h.copy_from_slice(c);
                Self(h)
            })
            .collect()
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; SHA256_SIZE] {
    Sha256::digest(data).into()
}

/// SHA-1 of `data`.
pub fn sha1(data: &[u8]) -> [u8; SHA1_SIZE] {
    Sha1::digest(data).into()
}
