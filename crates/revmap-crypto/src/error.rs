//! Errors from key handling and root signature checks.

use thiserror::Error;

/// Errors raised by this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Bytes of the wrong length for a key or signature.
    #[error("{what} must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// What was being decoded.
        what: &'static str,
        /// Required length in bytes.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// The bytes are not a valid Ed25519 public key.
    #[error("malformed public key: {0}")]
    MalformedPublicKey(String),

    /// The signature does not match the message under this key.
    #[error("bad signature")]
    BadSignature,

    /// A serialized field was not valid base64.
    #[error("{0} is not valid base64")]
    MalformedEncoding(&'static str),

    /// The signing key file could not be read or written.
    #[error("signing key file {path}: {reason}")]
    KeyFile {
        /// Key file path.
        path: String,
        /// What went wrong.
        reason: String,
    },
}

/// Result type for this crate.
pub type CryptoResult<T> = Result<T, CryptoError>;
