//! Fixed-size byte arrays as base64 strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{CryptoError, CryptoResult};

pub(crate) fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode `s` into exactly `N` bytes; `what` names the field in errors.
pub(crate) fn decode_fixed<const N: usize>(
    s: &str,
    what: &'static str,
) -> CryptoResult<[u8; N]> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|_| CryptoError::MalformedEncoding(what))?;
    to_array(&bytes, what)
}

pub(crate) fn to_array<const N: usize>(
    bytes: &[u8],
    what: &'static str,
) -> CryptoResult<[u8; N]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_checks_length() {
        let s = encode(&[7u8; 31]);
        assert!(matches!(
            decode_fixed::<32>(&s, "key"),
            Err(CryptoError::InvalidLength {
                expected: 32,
                actual: 31,
                ..
            })
        ));
        assert_eq!(decode_fixed::<31>(&s, "key").unwrap(), [7u8; 31]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_fixed::<4>("not base64!", "sig"),
            Err(CryptoError::MalformedEncoding("sig"))
        ));
    }
}
