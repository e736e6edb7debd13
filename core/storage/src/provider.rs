//! Storage backend contract and shared result types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use selladoc_common::{DocumentId, Error, Result, StorageId};
use selladoc_crypto::EncryptionType;

/// Default lifetime of generated download URLs, in seconds.
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// The closed set of storage backends.
///
/// Persisted in every storage record; write-once. Retrieval and deletion
/// resolve the backend from the record, never from caller-supplied input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Amazon S3 object storage.
    #[serde(rename = "s3")]
    S3,
    /// Local filesystem storage (development and testing).
    #[serde(rename = "local")]
    Local,
}

impl ProviderKind {
    /// Wire name as persisted in storage records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(Error::InvalidInput(format!(
                "Unknown storage provider: {}",
                other
            ))),
        }
    }
}

/// Decrypted metadata blob stored alongside every document.
///
/// The means to decrypt the document (IV, tag) travel inside this encrypted
/// blob, not beside the document. Caller-supplied metadata is flattened in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMetadata {
    /// Logical document this blob represents.
    pub document_id: String,
    /// SHA-256 hex digest of the plaintext document, computed at store time.
    pub document_hash: String,
    /// Cipher mode the document was encrypted with.
    pub encryption_type: EncryptionType,
    /// Base64-encoded IV for the document ciphertext.
    pub iv: String,
    /// Base64-encoded GCM authentication tag for the document ciphertext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
    /// Caller-supplied metadata (verification results, signer details, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a store operation.
///
/// Store never raises: transport failures are folded into
/// `success: false` so bulk callers can continue processing a batch. The
/// `storage_id` of a failed store is a freshly generated placeholder and must
/// not be trusted without checking `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResult {
    pub success: bool,
    pub storage_id: StorageId,
    pub provider: ProviderKind,
    pub encryption_type: EncryptionType,
    pub document_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreResult {
    /// Build the failure-path result with a placeholder storage id.
    pub fn failure(
        provider: ProviderKind,
        encryption_type: EncryptionType,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            success: false,
            storage_id: StorageId::generate(),
            provider,
            encryption_type,
            document_hash: String::new(),
            file_url: None,
            error: Some(error.to_string()),
        }
    }
}

/// Options for document retrieval.
#[derive(Debug, Clone, Copy)]
pub struct RetrieveOptions {
    /// When false, the document bytes are returned still encrypted while the
    /// metadata blob is decrypted. Useful for integrity auditing or export
    /// without materializing plaintext.
    pub decrypt: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { decrypt: true }
    }
}

/// A retrieved document with its decrypted metadata.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    /// Document bytes; plaintext unless `decrypt: false` was requested.
    pub data: Vec<u8>,
    /// Decrypted metadata blob.
    pub metadata: SealedMetadata,
}

/// Contract implemented by every storage backend.
#[async_trait]
pub trait SecureStorageProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Encrypt and store a document together with its metadata blob.
    ///
    /// # Postconditions
    /// - On success a StorageRecord has been persisted and the returned
    ///   `file_url` grants time-limited access to the stored object
    /// - On failure no exception escapes; the result carries the error
    async fn store_document(
        &self,
        document_id: &DocumentId,
        document: &[u8],
        metadata: Map<String, Value>,
        encryption_type: EncryptionType,
    ) -> StoreResult;

    /// Fetch, decrypt and integrity-check a stored document.
    ///
    /// # Errors
    /// - `NotFound` if no storage record exists for the id
    /// - `Integrity` on tag failure or document hash mismatch
    /// - `Transport` if the underlying fetch fails
    async fn retrieve_document(
        &self,
        storage_id: &StorageId,
        options: RetrieveOptions,
    ) -> Result<RetrievedDocument>;

    /// Produce a time-limited URL for direct download of the stored object.
    ///
    /// # Errors
    /// - `NotFound` if no storage record exists for the id
    async fn presigned_url(&self, storage_id: &StorageId, expires_in: u64) -> Result<String>;

    /// Remove the stored object(s) and the storage record.
    ///
    /// # Errors
    /// - `NotFound` if no storage record exists for the id
    ///
    /// Transport or record removal failures after a successful lookup are
    /// reported as `Ok(false)` rather than raised.
    async fn delete_document(&self, storage_id: &StorageId) -> Result<bool>;
}

impl fmt::Debug for dyn SecureStorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStorageProvider")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_wire_names() {
        assert_eq!(ProviderKind::S3.to_string(), "s3");
        assert_eq!("local".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!("gcs".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_sealed_metadata_flattens_extra() {
        let mut extra = Map::new();
        extra.insert("owner".to_string(), Value::String("alice".to_string()));

        let sealed = SealedMetadata {
            document_id: "doc-1".to_string(),
            document_hash: "ab".to_string(),
            encryption_type: EncryptionType::Aes256Gcm,
            iv: "aXY=".to_string(),
            auth_tag: None,
            extra,
        };

        let json = serde_json::to_value(&sealed).unwrap();
        assert_eq!(json["owner"], "alice");
        assert_eq!(json["documentId"], "doc-1");
        assert!(json.get("authTag").is_none());

        let back: SealedMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back.extra["owner"], "alice");
    }

    #[test]
    fn test_store_result_failure_has_placeholder_id() {
        let result = StoreResult::failure(ProviderKind::Local, EncryptionType::Aes256Gcm, "boom");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.document_hash.is_empty());
    }
}
