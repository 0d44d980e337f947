//! Revmap Crypto - hashing and signing primitives for verifiable maps.
//!
//! This crate provides:
//! - SHA-256 digests used as map leaf indexes and root hashes
//! - Ed25519 key pairs used by a map engine to sign its roots
//! - Signatures and public keys used by clients to verify those roots
//!
//! # Example
//!
//! ```
//! use revmap_crypto::{Hash256, KeyPair};
//!
//! // Derive a leaf index from an identifier
//! let index = Hash256::hash(b"channel-1");
//! assert_eq!(index.as_bytes().len(), 32);
//!
//! // Sign and verify a root
//! let keypair = KeyPair::generate();
//! let signature = keypair.sign(index.as_bytes());
//! assert!(keypair.export_public_key().verify(index.as_bytes(), &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod encoding;
mod error;
mod hash;
mod keypair;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::Hash256;
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
