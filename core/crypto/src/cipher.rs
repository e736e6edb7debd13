//! Symmetric encryption of documents and metadata blobs.
//!
//! Two cipher modes are supported. AES-256-GCM is authenticated: decryption
//! verifies a 16-byte tag before releasing any plaintext. AES-256-CBC carries
//! no authentication at this layer; callers rely on document-level hash
//! checking, which is an explicitly weaker guarantee.
//!
//! Every artifact is encrypted under a freshly generated random 16-byte IV.
//! IVs are never reused across artifacts.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use aes_gcm::{
    aead::{generic_array::typenum::U16, generic_array::GenericArray, rand_core::RngCore, Aead, KeyInit, OsRng},
    AesGcm,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::keys::EncryptionKey;
use selladoc_common::{Error, Result};

/// AES-256-GCM instantiated with a 16-byte nonce, matching the IV size used
/// for CBC so both modes share one IV layout.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV size for both cipher modes (16 bytes).
pub const IV_LENGTH: usize = 16;

/// GCM authentication tag size (16 bytes).
pub const TAG_LENGTH: usize = 16;

/// Cipher mode used for a stored artifact.
///
/// Write-once: the mode recorded at store time is the mode used for every
/// subsequent retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionType {
    /// Authenticated encryption; tampering is detected by the cipher itself.
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// Unauthenticated mode kept for compatibility with external systems.
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
}

impl EncryptionType {
    /// Wire name as persisted in storage records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Aes256Cbc => "aes-256-cbc",
        }
    }
}

impl Default for EncryptionType {
    fn default() -> Self {
        Self::Aes256Gcm
    }
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "aes-256-cbc" => Ok(Self::Aes256Cbc),
            other => Err(Error::InvalidInput(format!(
                "Unknown encryption type: {}",
                other
            ))),
        }
    }
}

/// Result of encrypting a single artifact.
#[derive(Debug, Clone)]
pub struct EncryptedArtifact {
    /// Ciphertext bytes (tag detached for GCM).
    pub ciphertext: Vec<u8>,
    /// Randomly generated IV for this artifact.
    pub iv: [u8; IV_LENGTH],
    /// Authentication tag (GCM only).
    pub auth_tag: Option<Vec<u8>>,
}

/// Encrypt plaintext under the given cipher mode.
///
/// # Postconditions
/// - A fresh random IV is generated for every call
/// - For GCM the detached authentication tag is returned alongside
///
/// # Errors
/// - `Crypto` if the cipher fails
pub fn encrypt(
    key: &EncryptionKey,
    plaintext: &[u8],
    encryption_type: EncryptionType,
) -> Result<EncryptedArtifact> {
    let mut iv = [0u8; IV_LENGTH];
    OsRng.fill_bytes(&mut iv);

    match encryption_type {
        EncryptionType::Aes256Gcm => {
            let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()));
            let mut combined = cipher
                .encrypt(GenericArray::from_slice(&iv), plaintext)
                .map_err(|_| Error::Crypto("AES-GCM encryption failed".to_string()))?;
            let auth_tag = combined.split_off(combined.len() - TAG_LENGTH);
            Ok(EncryptedArtifact {
                ciphertext: combined,
                iv,
                auth_tag: Some(auth_tag),
            })
        }
        EncryptionType::Aes256Cbc => {
            let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
                .map_err(|e| Error::Crypto(format!("AES-CBC setup failed: {}", e)))?;
            let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            Ok(EncryptedArtifact {
                ciphertext,
                iv,
                auth_tag: None,
            })
        }
    }
}

/// Decrypt an artifact.
///
/// # Errors
/// - `Integrity` if GCM tag is absent or verification fails; no plaintext is
///   returned in either case
/// - `Crypto` for malformed inputs (bad IV length, invalid CBC padding)
pub fn decrypt(
    key: &EncryptionKey,
    ciphertext: &[u8],
    iv: &[u8],
    encryption_type: EncryptionType,
    auth_tag: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if iv.len() != IV_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid IV length: expected {}, got {}",
            IV_LENGTH,
            iv.len()
        )));
    }

    match encryption_type {
        EncryptionType::Aes256Gcm => {
            let auth_tag = auth_tag.ok_or_else(|| {
                Error::Integrity(
                    "Authentication tag is required to decrypt AES-GCM data".to_string(),
                )
            })?;
            if auth_tag.len() != TAG_LENGTH {
                return Err(Error::Integrity(format!(
                    "Invalid authentication tag length: expected {}, got {}",
                    TAG_LENGTH,
                    auth_tag.len()
                )));
            }

            let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_bytes()));
            let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LENGTH);
            combined.extend_from_slice(ciphertext);
            combined.extend_from_slice(auth_tag);

            cipher
                .decrypt(GenericArray::from_slice(iv), combined.as_slice())
                .map_err(|_| {
                    Error::Integrity(
                        "AES-GCM authentication failed - data may have been tampered with"
                            .to_string(),
                    )
                })
        }
        EncryptionType::Aes256Cbc => {
            let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
                .map_err(|e| Error::Crypto(format!("AES-CBC setup failed: {}", e)))?;
            cipher
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| Error::Crypto("AES-CBC decryption failed: bad padding".to_string()))
        }
    }
}
