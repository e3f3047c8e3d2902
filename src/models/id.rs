use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix of local tokens that name ordinary contacts.
pub const CONTACT_TOKEN_PREFIX: &str = "sql-";
/// Prefix of local tokens that name collections.
pub const COLLECTION_TOKEN_PREFIX: &str = "col-";
/// Collection every projected contact is placed in.
pub const DEFAULT_COLLECTION: u64 = 1;

/// Composite contact identifier: manager URI plus a locally-unique token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactId {
    pub manager_uri: String,
    pub local_id: String,
}

impl ContactId {
    pub fn new(manager_uri: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            manager_uri: manager_uri.into(),
            local_id: local_id.into(),
        }
    }

    /// Derive the id for an individual from its stable key.
    pub fn for_key(manager_uri: &str, key: &str) -> Self {
        Self::new(manager_uri, local_token(hash_key(key), false))
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.manager_uri, self.local_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId {
    pub manager_uri: String,
    pub local_id: String,
}

impl CollectionId {
    pub fn new(manager_uri: &str, number: u64) -> Self {
        Self {
            manager_uri: manager_uri.to_string(),
            local_id: local_token(number, true),
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.manager_uri, self.local_id)
    }
}

/// First eight bytes of the SHA-256 digest of `key`, big-endian.
pub fn hash_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

pub fn local_token(number: u64, is_collection: bool) -> String {
    if is_collection {
        format!("{}{}", COLLECTION_TOKEN_PREFIX, number)
    } else {
        format!("{}{}", CONTACT_TOKEN_PREFIX, number)
    }
}
