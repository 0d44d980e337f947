//! Root and inclusion verification.

use revmap_core::MapId;
use revmap_crypto::{Hash256, PublicKey};

use crate::error::{MapError, MapResult};
use crate::types::{MapDescriptor, MapLeafInclusion, MapRoot, RootWitness, SignedMapRoot};

/// Verifies data returned for one map against that map's signing key.
#[derive(Debug, Clone)]
pub struct MapVerifier {
    map_id: MapId,
    public_key: PublicKey,
}

impl MapVerifier {
    /// Create a verifier for a map.
    #[must_use]
    pub fn new(map_id: MapId, public_key: PublicKey) -> Self {
        Self { map_id, public_key }
    }

    /// Create a verifier from a map descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &MapDescriptor) -> Self {
        Self::new(descriptor.map_id, descriptor.public_key)
    }

    /// Check that a signed root belongs to this map and carries a valid signature.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Verification`] on a map id mismatch or a bad signature.
    pub fn verify_root(&self, signed: &SignedMapRoot) -> MapResult<MapRoot> {
        let root = &signed.map_root;
        if root.map_id != self.map_id {
            return Err(MapError::Verification(format!(
                "root belongs to map {}, expected map {}",
                root.map_id, self.map_id
            )));
        }

        self.public_key
            .verify(&root.signing_bytes(), &signed.signature)
            .map_err(|e| {
                MapError::Verification(format!(
                    "bad root signature for map {} at revision {}: {e}",
                    self.map_id, root.revision
                ))
            })?;

        Ok(root.clone())
    }

    /// Check a leaf read against an already verified root.
    ///
    /// Each inclusion must answer the matching requested index and carry its
    /// own digest. The witness must hash to `root.root_hash`, list every
    /// present inclusion with that digest, and list no inclusion claimed absent.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Verification`] on any mismatch.
    pub fn verify_inclusions(
        &self,
        root: &MapRoot,
        requested: &[Hash256],
        inclusions: &[MapLeafInclusion],
        witness: &RootWitness,
    ) -> MapResult<()> {
        if requested.len() != inclusions.len() {
            return Err(MapError::Verification(format!(
                "requested {} leaves from map {}, received {}",
                requested.len(),
                self.map_id,
                inclusions.len()
            )));
        }

        if !witness.is_canonical() || witness.root_hash() != root.root_hash {
            return Err(MapError::Verification(format!(
                "leaf witness does not match the root of map {} at revision {}",
                self.map_id, root.revision
            )));
        }

        for (index, inclusion) in requested.iter().zip(inclusions) {
            if inclusion.leaf.index != *index {
                return Err(MapError::Verification(format!(
                    "leaf {index} answered with leaf {}",
                    inclusion.leaf.index
                )));
            }

            let digest = inclusion.leaf.leaf_hash();
            if digest != inclusion.leaf_hash {
                return Err(MapError::Verification(format!(
                    "leaf {index} does not match its digest"
                )));
            }

            let committed = witness.digest_of(index);
            let consistent = if inclusion.leaf.is_absent() {
                committed.is_none()
            } else {
                committed == Some(digest)
            };
            if !consistent {
                return Err(MapError::Verification(format!(
                    "leaf {index} is not the one committed at revision {} of map {}",
                    root.revision, self.map_id
                )));
            }
        }

        Ok(())
    }
}
