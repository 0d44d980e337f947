//! Data exchanged with a verifiable map engine.

use chrono::{DateTime, Utc};
use revmap_core::{MapId, Revision};
use revmap_crypto::{Hash256, PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Parameters for allocating a new map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSpec {
    /// Short human-readable name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
}

impl MapSpec {
    /// Create a spec with a display name and description.
    #[must_use]
    pub fn new(display_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            description: description.into(),
        }
    }
}

/// Administrative metadata for one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDescriptor {
    /// Map identifier.
    pub map_id: MapId,
    /// Short human-readable name.
    pub display_name: String,
    /// Free-form description.
    pub description: String,
    /// Key that signs this map's roots.
    pub public_key: PublicKey,
    /// When the map was allocated.
    pub created_at: DateTime<Utc>,
    /// Whether revision 0 has been published.
    pub initialized: bool,
}

/// One key/value entry. An empty value means the key is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLeaf {
    /// 32-byte leaf index.
    pub index: Hash256,
    /// Stored bytes.
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl MapLeaf {
    /// Create a leaf.
    #[must_use]
    pub fn new(index: Hash256, value: Vec<u8>) -> Self {
        Self { index, value }
    }

    /// Create the absent-leaf placeholder for an index.
    #[must_use]
    pub fn absent(index: Hash256) -> Self {
        Self {
            index,
            value: Vec::new(),
        }
    }

    /// Whether this leaf carries no value.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.value.is_empty()
    }

    /// Digest committing to both index and value.
    #[must_use]
    pub fn leaf_hash(&self) -> Hash256 {
        Hash256::hash_multi(&[
            b"leaf:".as_slice(),
            self.index.as_bytes().as_slice(),
            self.value.as_slice(),
        ])
    }
}

/// A leaf as returned by a read, with the digest the root commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLeafInclusion {
    /// The leaf read.
    pub leaf: MapLeaf,
    /// Digest of the leaf as recorded by the engine.
    pub leaf_hash: Hash256,
}

impl MapLeafInclusion {
    /// Build an inclusion for a leaf, computing its digest.
    #[must_use]
    pub fn for_leaf(leaf: MapLeaf) -> Self {
        let leaf_hash = leaf.leaf_hash();
        Self { leaf, leaf_hash }
    }
}

/// One present leaf as a root commits to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafCommitment {
    /// Leaf index.
    pub index: Hash256,
    /// [`MapLeaf::leaf_hash`] of the stored leaf.
    pub leaf_hash: Hash256,
}

/// Every present leaf of a map at one revision, ascending by index.
///
/// Hashing the witness yields the revision's root hash, so a reader holding a
/// verified root can check any leaf value, and any claimed absence, against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootWitness {
    /// Commitments in strictly ascending index order.
    pub leaves: Vec<LeafCommitment>,
}

impl RootWitness {
    /// Root hash this witness commits to. A map with no present leaves has
    /// the zero root.
    #[must_use]
    pub fn root_hash(&self) -> Hash256 {
        if self.leaves.is_empty() {
            return Hash256::zero();
        }
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.leaves.len().saturating_mul(2));
        parts.push(b"root:".as_slice());
        for leaf in &self.leaves {
            parts.push(leaf.index.as_bytes().as_slice());
            parts.push(leaf.leaf_hash.as_bytes().as_slice());
        }
        Hash256::hash_multi(&parts)
    }

    /// Whether indexes are strictly ascending, so each index appears once.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.leaves.windows(2).all(|pair| pair[0].index < pair[1].index)
    }

    /// Committed digest of `index`, or `None` if the leaf is absent.
    #[must_use]
    pub fn digest_of(&self, index: &Hash256) -> Option<Hash256> {
        self.leaves
            .binary_search_by(|leaf| leaf.index.cmp(index))
            .ok()
            .and_then(|i| self.leaves.get(i))
            .map(|leaf| leaf.leaf_hash)
    }
}

/// The state of a map at one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRoot {
    /// Map identifier.
    pub map_id: MapId,
    /// Revision this root describes.
    pub revision: Revision,
    /// [`RootWitness::root_hash`] of the leaves present at this revision.
    pub root_hash: Hash256,
    /// Publication time in nanoseconds since the Unix epoch.
    pub timestamp_nanos: i64,
}

impl MapRoot {
    /// Canonical bytes covered by the root signature.
    #[must_use]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(b"revmap-root:v1");
        buf.extend_from_slice(&self.map_id.get().to_be_bytes());
        buf.extend_from_slice(&self.revision.to_be_bytes());
        buf.extend_from_slice(self.root_hash.as_bytes());
        buf.extend_from_slice(&self.timestamp_nanos.to_be_bytes());
        buf
    }
}

/// A root together with the engine's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMapRoot {
    /// The root.
    pub map_root: MapRoot,
    /// Ed25519 signature over [`MapRoot::signing_bytes`].
    pub signature: Signature,
}

/// Result of a leaf read: one inclusion per requested index, the signed
/// root of the revision the read was served at, and the witness tying the
/// inclusions to that root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLeaves {
    /// Inclusions in request order.
    pub inclusions: Vec<MapLeafInclusion>,
    /// Root of the revision read.
    pub signed_root: SignedMapRoot,
    /// Present leaves of that revision.
    pub witness: RootWitness,
}

/// Leaves read through a client after the root and every inclusion verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLeaves {
    /// Inclusions in request order.
    pub inclusions: Vec<MapLeafInclusion>,
    /// Verified root of the revision read.
    pub root: MapRoot,
}

impl VerifiedLeaves {
    /// Value stored at `index`, or `None` when the leaf is absent or was not requested.
    #[must_use]
    pub fn value_of(&self, index: &Hash256) -> Option<&[u8]> {
        self.inclusions
            .iter()
            .find(|inclusion| inclusion.leaf.index == *index)
            .filter(|inclusion| !inclusion.leaf.is_absent())
            .map(|inclusion| inclusion.leaf.value.as_slice())
    }
}

/// Serde helper storing byte vectors as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
