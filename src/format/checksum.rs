//! Block content checksums
//!
//! Every block carries a 256-bit SHA-256 digest of its payload, stored in the
//! directory region and verified on read. Writes never verify (the digest is
//! computed from the submitted bytes); reads always do.

use std::fmt;

use sha2::{Digest, Sha256};

/// Size of an encoded checksum in bytes
pub const CHECKSUM_SIZE: usize = 32;

/// SHA-256 digest of a block's payload
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    /// Compute the digest of `data`
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Checksum(hasher.finalize().into())
    }

    /// Wrap raw digest bytes read from the directory region
    pub fn from_bytes(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Checksum(bytes)
    }

    /// Raw digest bytes for the directory region
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    /// Lowercase hex rendering, used in error messages and logs
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(CHECKSUM_SIZE * 2);
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
