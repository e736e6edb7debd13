//! Content hashing and MAC helpers.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use selladoc_common::{Error, Result};

/// Compute the SHA-256 digest of `data` as a lowercase hex string.
///
/// This is the document hash persisted at store time and re-checked on every
/// retrieval.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// HMAC-SHA256, used by the request signer.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <Hmac<Sha256>>::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("HMAC setup failed: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time comparison of two hex digests.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_digests_match() {
        let a = sha256_hex(b"same");
        let b = sha256_hex(b"same");
        let c = sha256_hex(b"different");
        assert!(digests_match(&a, &b));
        assert!(!digests_match(&a, &c));
        assert!(!digests_match(&a, &a[..10]));
    }

    #[test]
    fn test_hmac_sha256_deterministic() {
        let one = hmac_sha256(b"key", b"data").unwrap();
        let two = hmac_sha256(b"key", b"data").unwrap();
        let other = hmac_sha256(b"other-key", b"data").unwrap();
        assert_eq!(one, two);
        assert_ne!(one, other);
    }
}
