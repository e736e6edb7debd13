//! Byte-transport abstraction under the shared encrypted store.
//!
//! The two backends share all encryption, hashing and record bookkeeping;
//! only the way bytes reach durable storage differs. A transport moves
//! opaque encrypted payloads and knows nothing about keys or plaintext.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::provider::ProviderKind;
use crate::records::RecordMetadata;
use selladoc_common::{Result, StorageId};
use selladoc_crypto::EncryptionType;

/// Side-channel attributes attached to a stored object.
///
/// For S3 these become `x-amz-meta-*` object metadata; locally they are
/// written to a sibling `<storageId>_metadata.json` file.
#[derive(Debug, Clone)]
pub struct ObjectAttributes<'a> {
    /// Encrypted metadata blob and its IV/tag, base64-encoded.
    pub sidecar: &'a RecordMetadata,
    /// SHA-256 hex digest of the plaintext document.
    pub document_hash: &'a str,
    /// Cipher mode the payload was encrypted with.
    pub encryption_type: EncryptionType,
}

/// Moves encrypted bytes to and from a storage backend.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Which backend this transport writes to.
    fn kind(&self) -> ProviderKind;

    /// Derive the storage location for a new object.
    ///
    /// Locations are bucketed by creation date
    /// (`documents/YYYY/MM/DD/<storageId>.bin`) to bound directory/prefix
    /// fan-out.
    fn location_for(&self, storage_id: &StorageId, created_at: DateTime<Utc>) -> String;

    /// Write an encrypted payload and its side-channel attributes.
    async fn put(
        &self,
        location: &str,
        payload: Vec<u8>,
        attributes: ObjectAttributes<'_>,
    ) -> Result<()>;

    /// Read an encrypted payload.
    ///
    /// # Errors
    /// - `NotFound` if no object exists at the location
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;

    /// Remove the object (and any sibling metadata artifact). Removing an
    /// already-missing object is not an error.
    async fn remove(&self, location: &str) -> Result<()>;

    /// Produce a time-limited download URL for the object.
    async fn presigned_url(
        &self,
        location: &str,
        storage_id: &StorageId,
        expires_in: u64,
    ) -> Result<String>;

    /// URL reported by a successful store: a short-lived presigned URL for
    /// remote backends, a `file://` path locally.
    async fn store_url(&self, location: &str, storage_id: &StorageId) -> Result<String>;
}
