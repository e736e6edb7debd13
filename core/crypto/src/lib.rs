//! Cryptographic primitives for Selladoc.
//!
//! This module provides:
//! - Key derivation using scrypt
//! - Document encryption using AES-256-GCM (authenticated) or AES-256-CBC
//! - SHA-256 content hashing for integrity verification
//! - Secure key management with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - GCM authentication tags are verified before any plaintext is released
//! - Constant-time operations for sensitive comparisons

pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod keys;

pub use cipher::{decrypt, encrypt, EncryptedArtifact, EncryptionType, IV_LENGTH, TAG_LENGTH};
pub use digest::{digests_match, hmac_sha256, sha256_hex};
pub use kdf::derive_key;
pub use keys::{EncryptionKey, KEY_LENGTH};
