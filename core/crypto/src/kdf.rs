//! Key derivation using scrypt.
//!
//! The configured encryption secret is never used directly as key material;
//! a 32-byte key is derived from it once, at backend construction.

use scrypt::{scrypt, Params};

use crate::keys::{EncryptionKey, KEY_LENGTH};
use selladoc_common::{Error, Result};

/// Fixed application salt for key derivation.
///
/// The same secret must always derive the same key, otherwise previously
/// stored documents become unreadable.
const KDF_SALT: &[u8] = b"selladoc-storage-kdf-v1";

/// scrypt cost parameter (log2 N).
const SCRYPT_LOG_N: u8 = 14;
/// scrypt block size.
const SCRYPT_R: u32 = 8;
/// scrypt parallelism.
const SCRYPT_P: u32 = 1;

/// Derive the storage encryption key from the configured secret.
///
/// # Preconditions
/// - `secret` must not be empty
///
/// # Postconditions
/// - Returns a 256-bit key, deterministic for a given secret
///
/// # Errors
/// - `Configuration` if the secret is empty
/// - `Crypto` if derivation fails
pub fn derive_key(secret: &[u8]) -> Result<EncryptionKey> {
    if secret.is_empty() {
        return Err(Error::Configuration(
            "Encryption secret cannot be empty".to_string(),
        ));
    }

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LENGTH)
        .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let mut key_bytes = [0u8; KEY_LENGTH];
    scrypt(secret, KDF_SALT, &params, &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(EncryptionKey::from_bytes(key_bytes))
}
