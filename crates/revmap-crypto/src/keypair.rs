//! Root signing keys.
//!
//! A map engine holds one [`KeyPair`] and signs every root it publishes.
//! Clients only ever see the [`PublicKey`] half, carried in the map
//! descriptor, and use it to verify roots.

use std::io::Write;
use std::path::Path;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::signature::Signature;

/// Length of a serialized secret key.
const SECRET_KEY_LEN: usize = 32;

/// An engine's Ed25519 signing key. The secret half is zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a key pair from its 32 secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidLength`] for any other length.
    pub fn from_secret_key(bytes: &[u8]) -> CryptoResult<Self> {
        let secret: Zeroizing<[u8; SECRET_KEY_LEN]> =
            Zeroizing::new(encoding::to_array(bytes, "secret key")?);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// The 32 secret bytes, for writing the key to disk.
    #[must_use]
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LEN] {
        self.signing_key.to_bytes()
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from(self.signing_key.sign(message))
    }

    /// The public half, as published in map descriptors.
    #[must_use]
    pub fn export_public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Short hex id of the public key.
    #[must_use]
    pub fn key_id_hex(&self) -> String {
        self.export_public_key().key_id_hex()
    }

    /// Load the key stored at `path`, creating it on first use.
    ///
    /// New files are created exclusively with mode 0600 on Unix, and parent
    /// directories are created as needed. A symlink at `path` is refused.
    ///
    /// # Errors
    ///
    /// [`CryptoError::KeyFile`] on I/O failure or a symlinked path, or
    /// [`CryptoError::InvalidLength`] if the file does not hold 32 bytes.
    pub fn load_or_generate(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();
        let key_file_err = |reason: String| CryptoError::KeyFile {
            path: path.display().to_string(),
            reason,
        };

        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(key_file_err("path is a symlink".to_owned()));
            },
            Ok(_) => {
                let bytes = Zeroizing::new(
                    std::fs::read(path).map_err(|e| key_file_err(e.to_string()))?,
                );
                return Self::from_secret_key(&bytes);
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(key_file_err(e.to_string())),
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| key_file_err(e.to_string()))?;
        }

        let keypair = Self::generate();
        let mut file = create_private(path).map_err(|e| key_file_err(e.to_string()))?;
        file.write_all(keypair.secret_key_bytes().as_slice())
            .map_err(|e| key_file_err(e.to_string()))?;
        Ok(keypair)
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id_hex())
            .finish_non_exhaustive()
    }
}

/// An engine's public key, serialized as base64.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for logs.
    #[must_use]
    pub fn key_id_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Check that `signature` was made over `message` by this key.
    ///
    /// # Errors
    ///
    /// [`CryptoError::MalformedPublicKey`] if the bytes are not a curve
    /// point, or [`CryptoError::BadSignature`] if the signature does not match.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::MalformedPublicKey(e.to_string()))?;
        key.verify(
            message,
            &ed25519_dalek::Signature::from_bytes(signature.as_bytes()),
        )
        .map_err(|_| CryptoError::BadSignature)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.key_id_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encoding::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        encoding::decode_fixed(&s, "public key")
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}
