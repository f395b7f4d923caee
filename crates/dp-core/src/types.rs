//! Common types used across dao-plugins

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::hashing::ContentHasher;

/// Width of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Width of a content hash in bytes
pub const HASH_LEN: usize = 32;

/// Account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The zero address. Never a valid contract.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Address whose low 8 bytes hold `value` (big-endian)
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Deterministically derive an address from a label.
    ///
    /// Two calls with the same label always yield the same address.
    pub fn derive(label: &str) -> Self {
        let digest = ContentHasher::new("dp.address")
            .bytes(label.as_bytes())
            .finish();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[HASH_LEN - ADDRESS_LEN..]);
        Self(bytes)
    }

    /// Derive an address from a content hash (last 20 bytes)
    pub fn from_hash(hash: &Hash) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[HASH_LEN - ADDRESS_LEN..]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(raw)
            .map_err(|e| Error::invalid_argument(format!("invalid address '{}': {}", s, e)))?;
        let bytes: [u8; ADDRESS_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::invalid_argument(format!(
                "invalid address '{}': expected {} bytes, got {}",
                s,
                ADDRESS_LEN,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 32-byte content hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(raw)
            .map_err(|e| Error::invalid_argument(format!("invalid hash '{}': {}", s, e)))?;
        let bytes: [u8; HASH_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::invalid_argument(format!(
                "invalid hash '{}': expected {} bytes, got {}",
                s,
                HASH_LEN,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for Hash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Version tag of a plugin build.
///
/// `release` is the major epoch (never 0 for a stored version), `build`
/// counts up within a release starting at 1. Ordering is release-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub release: u8,
    pub build: u16,
}

impl Tag {
    pub const fn new(release: u8, build: u16) -> Self {
        Self { release, build }
    }

    /// Content hash used as the lookup key for this tag
    pub fn hash(&self) -> Hash {
        ContentHasher::new("dp.tag").tag(self).finish()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.release, self.build)
    }
}

/// Which version of whose repository governs a setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginSetupRef {
    pub version_tag: Tag,
    pub repo: Address,
}

impl PluginSetupRef {
    pub const fn new(version_tag: Tag, repo: Address) -> Self {
        Self { version_tag, repo }
    }
}

impl fmt::Display for PluginSetupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.version_tag, self.repo)
    }
}
