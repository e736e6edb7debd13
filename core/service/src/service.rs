//! Unified secure storage facade.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use selladoc_common::{DocumentId, Error, Result, StorageId};
use selladoc_crypto::{derive_key, digests_match, sha256_hex, EncryptionType};
use selladoc_storage::{
    BackendRegistry, EncryptedStore, LocalTransport, ProviderKind, RecordStore, RetrieveOptions,
    RetrievedDocument, S3Transport, SecureStorageProvider, StoreResult,
};

use crate::config::StorageSettings;

/// Per-call options for [`SecureStorageService::store_document`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Backend override; `None` selects the registry default.
    pub provider: Option<ProviderKind>,
    /// Cipher mode for the document and its metadata blob.
    pub encryption_type: EncryptionType,
}

/// Non-throwing outcome of an integrity audit.
///
/// Mirrors the shape of [`StoreResult`]: callers auditing a batch of
/// documents inspect the report instead of handling errors per document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facade over the configured storage backends.
///
/// Owns the backend registry and the record store. Store operations go to
/// the default backend unless overridden per call; retrieval, URL
/// generation, integrity checks and deletion always resolve the backend
/// pinned in the document's storage record.
pub struct SecureStorageService {
    registry: BackendRegistry,
    records: Arc<dyn RecordStore>,
}

impl SecureStorageService {
    /// Builds a service over an already-populated registry.
    ///
    /// `records` must be the same record store the registered backends
    /// write to, otherwise record lookups will not see stored documents.
    pub fn new(registry: BackendRegistry, records: Arc<dyn RecordStore>) -> Self {
        Self { registry, records }
    }

    /// Builds the standard backend set from resolved settings.
    ///
    /// The local backend is always registered. The S3 backend is
    /// registered, and becomes the default, only when the full credential
    /// set is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the encryption secret is
    /// empty or the local storage directory cannot be created.
    pub fn from_settings(
        settings: StorageSettings,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let key = derive_key(settings.encryption_secret.as_bytes())?;

        let default_kind = if settings.s3.is_some() {
            ProviderKind::S3
        } else {
            ProviderKind::Local
        };
        let mut registry = BackendRegistry::new(default_kind);

        let local = LocalTransport::new(&settings.local_dir, settings.app_url.clone())?;
        registry.register(Arc::new(EncryptedStore::new(
            local,
            Arc::clone(&records),
            key.clone(),
        )))?;

        if let Some(s3) = settings.s3 {
            let transport = S3Transport::new(s3.into_config())?;
            registry.register(Arc::new(EncryptedStore::new(
                transport,
                Arc::clone(&records),
                key,
            )))?;
        }

        info!(default = %registry.default_kind(), "secure storage initialized");
        Ok(Self { registry, records })
    }

    /// Which backend new documents go to when no override is given.
    pub fn default_provider(&self) -> ProviderKind {
        self.registry.default_kind()
    }

    /// Encrypts and stores a document.
    ///
    /// Never raises: a backend resolution failure or a storage failure is
    /// reported through `success: false` in the result.
    pub async fn store_document(
        &self,
        document_id: &DocumentId,
        document: &[u8],
        metadata: Map<String, Value>,
        options: StoreOptions,
    ) -> StoreResult {
        let kind = options.provider.unwrap_or_else(|| self.registry.default_kind());
        let provider = match self.registry.resolve(kind) {
            Ok(provider) => provider,
            Err(err) => {
                warn!(provider = %kind, error = %err, "store failed: backend unavailable");
                return StoreResult::failure(kind, options.encryption_type, err);
            }
        };
        provider
            .store_document(document_id, document, metadata, options.encryption_type)
            .await
    }

    /// Fetches and decrypts a stored document from the backend it was
    /// stored on.
    pub async fn retrieve_document(
        &self,
        storage_id: &StorageId,
        options: RetrieveOptions,
    ) -> Result<RetrievedDocument> {
        let provider = self.provider_for(storage_id).await?;
        provider.retrieve_document(storage_id, options).await
    }

    /// Generates a time-limited download URL for a stored document.
    pub async fn presigned_url(&self, storage_id: &StorageId, expires_in: u64) -> Result<String> {
        let provider = self.provider_for(storage_id).await?;
        provider.presigned_url(storage_id, expires_in).await
    }

    /// Removes a stored document, its metadata and its storage record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no record exists for the id.
    pub async fn delete_document(&self, storage_id: &StorageId) -> Result<bool> {
        let provider = self.provider_for(storage_id).await?;
        provider.delete_document(storage_id).await
    }

    /// Audits a stored document without surfacing errors.
    ///
    /// Re-fetches and decrypts the document, recomputes its digest and
    /// compares it to the digest captured at store time.
    pub async fn verify_document_integrity(&self, storage_id: &StorageId) -> IntegrityReport {
        match self.verify_inner(storage_id).await {
            Ok(document_hash) => IntegrityReport {
                is_valid: true,
                document_hash: Some(document_hash),
                error: None,
            },
            Err(Error::NotFound(_)) => IntegrityReport {
                is_valid: false,
                document_hash: None,
                error: Some("Document not found".to_string()),
            },
            Err(err) => IntegrityReport {
                is_valid: false,
                document_hash: None,
                error: Some(err.to_string()),
            },
        }
    }

    async fn verify_inner(&self, storage_id: &StorageId) -> Result<String> {
        let retrieved = self
            .retrieve_document(storage_id, RetrieveOptions { decrypt: true })
            .await?;
        let recomputed = sha256_hex(&retrieved.data);
        if !digests_match(&recomputed, &retrieved.metadata.document_hash) {
            return Err(Error::Integrity(format!(
                "Document hash mismatch for {}",
                storage_id
            )));
        }
        Ok(recomputed)
    }

    async fn provider_for(&self, storage_id: &StorageId) -> Result<Arc<dyn SecureStorageProvider>> {
        let record = self
            .records
            .find(storage_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No storage record for {}", storage_id)))?;
        self.registry.resolve(record.provider)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use selladoc_storage::{MemoryRecordStore, MemoryTransport};
    use zeroize::Zeroizing;

    use super::*;

    fn settings(s3: Option<crate::S3Settings>, dir: &TempDir) -> StorageSettings {
        StorageSettings {
            encryption_secret: Zeroizing::new("test-secret".to_string()),
            s3,
            local_dir: dir.path().to_path_buf(),
            app_url: "http://localhost:3000".to_string(),
        }
    }

    fn s3_settings() -> crate::S3Settings {
        crate::S3Settings {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            region: "us-east-1".to_string(),
            bucket: "docs".to_string(),
            endpoint: None,
        }
    }

    /// Default backend is local without credentials, S3 with them.
    #[tokio::test]
    async fn default_backend_follows_configuration() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());

        let service =
            SecureStorageService::from_settings(settings(None, &dir), Arc::clone(&records))
                .unwrap();
        assert_eq!(service.default_provider(), ProviderKind::Local);

        let service =
            SecureStorageService::from_settings(settings(Some(s3_settings()), &dir), records)
                .unwrap();
        assert_eq!(service.default_provider(), ProviderKind::S3);
    }

    #[tokio::test]
    async fn store_and_retrieve_round_trip() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let service =
            SecureStorageService::from_settings(settings(None, &dir), records).unwrap();

        let result = service
            .store_document(
                &DocumentId::new("doc-1").unwrap(),
                b"contract body",
                Map::new(),
                StoreOptions::default(),
            )
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.provider, ProviderKind::Local);

        let retrieved = service
            .retrieve_document(&result.storage_id, RetrieveOptions::default())
            .await
            .unwrap();
        assert_eq!(retrieved.data, b"contract body");
        assert_eq!(retrieved.metadata.document_hash, result.document_hash);
    }

    /// A document stays on the backend that stored it even when the
    /// default changes afterwards.
    #[tokio::test]
    async fn retrieval_uses_the_recorded_backend_not_the_default() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let key = derive_key(b"test-secret").unwrap();

        let mut registry = BackendRegistry::new(ProviderKind::S3);
        registry
            .register(Arc::new(EncryptedStore::new(
                MemoryTransport::new(ProviderKind::S3),
                Arc::clone(&records),
                key.clone(),
            )))
            .unwrap();
        registry
            .register(Arc::new(EncryptedStore::new(
                LocalTransport::new(dir.path(), "http://localhost:3000").unwrap(),
                Arc::clone(&records),
                key,
            )))
            .unwrap();
        let service = SecureStorageService::new(registry, records);

        let result = service
            .store_document(
                &DocumentId::new("doc-1").unwrap(),
                b"pinned",
                Map::new(),
                StoreOptions {
                    provider: Some(ProviderKind::Local),
                    encryption_type: EncryptionType::default(),
                },
            )
            .await;
        assert!(result.success);
        assert_eq!(result.provider, ProviderKind::Local);
        assert_eq!(service.default_provider(), ProviderKind::S3);

        let retrieved = service
            .retrieve_document(&result.storage_id, RetrieveOptions::default())
            .await
            .unwrap();
        assert_eq!(retrieved.data, b"pinned");
    }

    #[tokio::test]
    async fn store_reports_unavailable_backend_as_failure() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let service =
            SecureStorageService::from_settings(settings(None, &dir), records).unwrap();

        let result = service
            .store_document(
                &DocumentId::new("doc-1").unwrap(),
                b"payload",
                Map::new(),
                StoreOptions {
                    provider: Some(ProviderKind::S3),
                    encryption_type: EncryptionType::default(),
                },
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.provider, ProviderKind::S3);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn integrity_report_for_intact_document() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let service =
            SecureStorageService::from_settings(settings(None, &dir), records).unwrap();

        let result = service
            .store_document(
                &DocumentId::new("doc-1").unwrap(),
                b"audited content",
                Map::new(),
                StoreOptions::default(),
            )
            .await;
        assert!(result.success);

        let report = service.verify_document_integrity(&result.storage_id).await;
        assert!(report.is_valid);
        assert_eq!(report.document_hash.as_deref(), Some(result.document_hash.as_str()));
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn integrity_report_for_missing_document() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let service =
            SecureStorageService::from_settings(settings(None, &dir), records).unwrap();

        let report = service
            .verify_document_integrity(&StorageId::generate())
            .await;
        assert!(!report.is_valid);
        assert!(report.document_hash.is_none());
        assert_eq!(report.error.as_deref(), Some("Document not found"));
    }

    #[tokio::test]
    async fn delete_missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let service =
            SecureStorageService::from_settings(settings(None, &dir), records).unwrap();

        let err = service.delete_document(&StorageId::generate()).await;
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
}
