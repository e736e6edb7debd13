//! Shared backend implementation over a byte transport.
//!
//! `EncryptedStore` carries the whole store/retrieve/delete algorithm:
//! hashing, envelope encryption of document and metadata, record
//! bookkeeping. The transport only moves encrypted bytes, so both backends
//! behave identically everywhere except the transport layer.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::provider::{
    ProviderKind, RetrieveOptions, RetrievedDocument, SealedMetadata, SecureStorageProvider,
    StoreResult,
};
use crate::records::{RecordMetadata, RecordStore, StorageRecord};
use crate::transport::{BlobTransport, ObjectAttributes};
use selladoc_common::{DocumentId, Error, Result, StorageId};
use selladoc_crypto::{
    decrypt, digests_match, encrypt, sha256_hex, EncryptedArtifact, EncryptionKey, EncryptionType,
};

fn b64_decode(value: &str, what: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| Error::Serialization(format!("Invalid base64 {}: {}", what, e)))
}

/// Storage backend generic over its byte transport.
pub struct EncryptedStore<T: BlobTransport> {
    transport: T,
    records: Arc<dyn RecordStore>,
    key: EncryptionKey,
}

impl<T: BlobTransport> EncryptedStore<T> {
    /// Create a backend from a transport, a record store and the derived
    /// encryption key.
    pub fn new(transport: T, records: Arc<dyn RecordStore>, key: EncryptionKey) -> Self {
        Self {
            transport,
            records,
            key,
        }
    }

    /// Look up a record and check it belongs to this backend.
    async fn owned_record(&self, storage_id: &StorageId) -> Result<StorageRecord> {
        let record = self
            .records
            .find(storage_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Storage record not found: {}", storage_id)))?;

        if record.provider != self.transport.kind() {
            return Err(Error::InvalidInput(format!(
                "Storage record {} is owned by backend '{}', not '{}'",
                storage_id,
                record.provider,
                self.transport.kind()
            )));
        }
        Ok(record)
    }

    async fn store_inner(
        &self,
        document_id: &DocumentId,
        document: &[u8],
        metadata: Map<String, Value>,
        encryption_type: EncryptionType,
    ) -> Result<StoreResult> {
        let storage_id = StorageId::generate();
        let created_at = Utc::now();
        let location = self.transport.location_for(&storage_id, created_at);

        let document_hash = sha256_hex(document);

        // Encrypt the document; the IV/tag needed to reverse this travel
        // inside the encrypted metadata blob, not beside the document.
        let doc_artifact = encrypt(&self.key, document, encryption_type)?;

        let sealed = SealedMetadata {
            document_id: document_id.as_str().to_string(),
            document_hash: document_hash.clone(),
            encryption_type,
            iv: BASE64.encode(doc_artifact.iv),
            auth_tag: doc_artifact.auth_tag.as_deref().map(|t| BASE64.encode(t)),
            extra: metadata,
        };
        let sealed_bytes = serde_json::to_vec(&sealed)
            .map_err(|e| Error::Serialization(format!("Cannot serialize metadata: {}", e)))?;

        let meta_artifact: EncryptedArtifact = encrypt(&self.key, &sealed_bytes, encryption_type)?;
        let sidecar = RecordMetadata {
            encrypted_metadata: BASE64.encode(&meta_artifact.ciphertext),
            metadata_iv: BASE64.encode(meta_artifact.iv),
            metadata_auth_tag: meta_artifact.auth_tag.as_deref().map(|t| BASE64.encode(t)),
        };

        self.transport
            .put(
                &location,
                doc_artifact.ciphertext,
                ObjectAttributes {
                    sidecar: &sidecar,
                    document_hash: &document_hash,
                    encryption_type,
                },
            )
            .await?;

        let record = StorageRecord {
            id: storage_id.clone(),
            document_id: document_id.clone(),
            provider: self.transport.kind(),
            encryption_type,
            storage_location: location.clone(),
            document_hash: document_hash.clone(),
            created_at,
            metadata: sidecar,
        };
        self.records.insert(&record).await?;

        let file_url = self.transport.store_url(&location, &storage_id).await?;

        info!(
            storage_id = %storage_id,
            provider = %self.transport.kind(),
            encryption = %encryption_type,
            "document stored"
        );

        Ok(StoreResult {
            success: true,
            storage_id,
            provider: self.transport.kind(),
            encryption_type,
            document_hash,
            file_url: Some(file_url),
            error: None,
        })
    }

    /// Decrypt the sidecar metadata blob carried by a record.
    fn open_sealed_metadata(&self, record: &StorageRecord) -> Result<SealedMetadata> {
        let encrypted = b64_decode(&record.metadata.encrypted_metadata, "encrypted metadata")?;
        let iv = b64_decode(&record.metadata.metadata_iv, "metadata IV")?;
        let auth_tag = record
            .metadata
            .metadata_auth_tag
            .as_deref()
            .map(|t| b64_decode(t, "metadata auth tag"))
            .transpose()?;

        let plaintext = decrypt(
            &self.key,
            &encrypted,
            &iv,
            record.encryption_type,
            auth_tag.as_deref(),
        )?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Serialization(format!("Cannot parse metadata blob: {}", e)))
    }
}

#[async_trait]
impl<T: BlobTransport> SecureStorageProvider for EncryptedStore<T> {
    fn kind(&self) -> ProviderKind {
        self.transport.kind()
    }

    async fn store_document(
        &self,
        document_id: &DocumentId,
        document: &[u8],
        metadata: Map<String, Value>,
        encryption_type: EncryptionType,
    ) -> StoreResult {
        match self
            .store_inner(document_id, document, metadata, encryption_type)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    provider = %self.transport.kind(),
                    document_id = %document_id,
                    error = %e,
                    "failed to store document"
                );
                StoreResult::failure(self.transport.kind(), encryption_type, e)
            }
        }
    }

    async fn retrieve_document(
        &self,
        storage_id: &StorageId,
        options: RetrieveOptions,
    ) -> Result<RetrievedDocument> {
        let record = self.owned_record(storage_id).await?;
        debug!(storage_id = %storage_id, location = %record.storage_location, "retrieving document");

        let encrypted = self.transport.fetch(&record.storage_location).await?;
        let metadata = self.open_sealed_metadata(&record)?;

        if !options.decrypt {
            // Still-encrypted bytes plus decrypted metadata, for auditing
            // or export without materializing plaintext.
            return Ok(RetrievedDocument {
                data: encrypted,
                metadata,
            });
        }

        // The document IV/tag come from the decrypted metadata, not from
        // the record.
        let iv = b64_decode(&metadata.iv, "document IV")?;
        let auth_tag = metadata
            .auth_tag
            .as_deref()
            .map(|t| b64_decode(t, "document auth tag"))
            .transpose()?;

        let data = decrypt(
            &self.key,
            &encrypted,
            &iv,
            record.encryption_type,
            auth_tag.as_deref(),
        )?;

        let computed = sha256_hex(&data);
        if !digests_match(&computed, &metadata.document_hash) {
            return Err(Error::Integrity(format!(
                "Document hash mismatch for {} - possible tampering",
                storage_id
            )));
        }

        Ok(RetrievedDocument { data, metadata })
    }

    async fn presigned_url(&self, storage_id: &StorageId, expires_in: u64) -> Result<String> {
        let record = self.owned_record(storage_id).await?;
        self.transport
            .presigned_url(&record.storage_location, storage_id, expires_in)
            .await
    }

    async fn delete_document(&self, storage_id: &StorageId) -> Result<bool> {
        let record = self.owned_record(storage_id).await?;

        if let Err(e) = self.transport.remove(&record.storage_location).await {
            warn!(storage_id = %storage_id, error = %e, "failed to remove stored object");
            return Ok(false);
        }

        match self.records.delete(storage_id).await {
            Ok(_) => {
                info!(storage_id = %storage_id, provider = %self.transport.kind(), "document deleted");
                Ok(true)
            }
            Err(e) => {
                warn!(storage_id = %storage_id, error = %e, "failed to delete storage record");
                Ok(false)
            }
        }
    }
}
