//! Identifiers used throughout revmap.

use revmap_crypto::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A map revision number.
///
/// Revision 0 is the freshly initialised, empty map. Every successful write
/// advances the counter by exactly one.
pub type Revision = i64;

/// Derive the 32-byte leaf index for an identifier (`SHA-256` of its UTF-8 bytes).
#[must_use]
pub fn leaf_index(id: &str) -> Hash256 {
    Hash256::hash(id.as_bytes())
}

/// Human-readable identifier of a channel (a logical record stream).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Index of this channel's leaf in the master map.
    #[must_use]
    pub fn leaf_index(&self) -> Hash256 {
        leaf_index(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Caller-supplied identifier of a resource within a channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Index of this resource's leaf in its channel map.
    ///
    /// Every version of the resource lives under this same index.
    #[must_use]
    pub fn leaf_index(&self) -> Hash256 {
        leaf_index(&self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Numeric identifier of a backing verifiable map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub i64);

impl MapId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MapId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(CoreError::InvalidMapId(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_index_is_sha256_of_id() {
        let channel = ChannelId::new("c1");
        assert_eq!(channel.leaf_index(), Hash256::hash(b"c1"));
        assert_eq!(channel.leaf_index(), leaf_index("c1"));
    }

    #[test]
    fn test_same_id_same_index_across_kinds() {
        assert_eq!(
            ChannelId::new("x").leaf_index(),
            ResourceId::new("x").leaf_index()
        );
        assert_ne!(
            ResourceId::new("r1").leaf_index(),
            ResourceId::new("r2").leaf_index()
        );
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ResourceId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
        let json = serde_json::to_string(&MapId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_map_id_parse() {
        assert_eq!("17".parse::<MapId>().unwrap(), MapId(17));
        assert_eq!(" 9 ".parse::<MapId>().unwrap(), MapId(9));
        assert!("0".parse::<MapId>().is_err());
        assert!("-3".parse::<MapId>().is_err());
        assert!("abc".parse::<MapId>().is_err());
    }
}
