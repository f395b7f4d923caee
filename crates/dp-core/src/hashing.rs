//! Domain-separated content hashing
//!
//! Every identifier in the setup protocol is a SHA-256 digest over a
//! canonical, length-prefixed encoding of its fields. Each kind of id gets
//! its own domain string so that ids of different kinds never collide even
//! when their field bytes coincide.

use sha2::{Digest, Sha256};

use crate::types::{Address, Hash, Tag, HASH_LEN};

/// Incremental builder for canonical content hashes
#[derive(Clone)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Start a hash in the given domain
    pub fn new(domain: &str) -> Self {
        let mut inner = Sha256::new();
        inner.update((domain.len() as u32).to_be_bytes());
        inner.update(domain.as_bytes());
        Self { inner }
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.inner.update([value]);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    /// Variable-length bytes, prefixed with their length
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.inner.update((data.len() as u64).to_be_bytes());
        self.inner.update(data);
        self
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.inner.update(address.as_bytes());
        self
    }

    pub fn hash(mut self, hash: &Hash) -> Self {
        self.inner.update(hash.as_bytes());
        self
    }

    pub fn tag(self, tag: &Tag) -> Self {
        self.u8(tag.release).u16(tag.build)
    }

    /// Presence flag followed by the hash when present
    pub fn optional_hash(self, hash: Option<&Hash>) -> Self {
        match hash {
            Some(h) => self.u8(1).hash(h),
            None => self.u8(0),
        }
    }

    pub fn finish(self) -> Hash {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&digest);
        Hash::new(bytes)
    }
}

/// Plain SHA-256 of raw bytes
pub fn hash_bytes(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut bytes = [0u8; HASH_LEN];
    bytes.copy_from_slice(&digest);
    Hash::new(bytes)
}
