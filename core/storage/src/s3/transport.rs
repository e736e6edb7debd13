//! S3 blob transport.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use super::client::{S3Client, S3Config};
use crate::provider::{ProviderKind, DEFAULT_URL_EXPIRY_SECS};
use crate::transport::{BlobTransport, ObjectAttributes};
use selladoc_common::{Error, Result, StorageId};

/// Amazon S3 blob transport.
///
/// Encrypted payloads are uploaded as objects; the encrypted metadata blob
/// and its IV/tag ride along as `x-amz-meta-*` object metadata.
#[derive(Debug)]
pub struct S3Transport {
    client: S3Client,
}

impl S3Transport {
    /// Create a transport after validating the credential set.
    ///
    /// # Errors
    /// - `Configuration` if access key, secret key or bucket name is missing
    pub fn new(config: S3Config) -> Result<Self> {
        if config.access_key_id.is_empty()
            || config.secret_access_key.is_empty()
            || config.bucket.is_empty()
        {
            return Err(Error::Configuration(
                "Missing AWS S3 credentials (access key, secret key, bucket)".to_string(),
            ));
        }

        Ok(Self {
            client: S3Client::new(config),
        })
    }
}

#[async_trait]
impl BlobTransport for S3Transport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::S3
    }

    fn location_for(&self, storage_id: &StorageId, created_at: DateTime<Utc>) -> String {
        format!(
            "documents/{}/{:02}/{:02}/{}.bin",
            created_at.year(),
            created_at.month(),
            created_at.day(),
            storage_id
        )
    }

    async fn put(
        &self,
        location: &str,
        payload: Vec<u8>,
        attributes: ObjectAttributes<'_>,
    ) -> Result<()> {
        let mut metadata: Vec<(String, String)> = vec![
            ("x-amz-meta-encrypted".to_string(), "true".to_string()),
            (
                "x-amz-meta-encryption-type".to_string(),
                attributes.encryption_type.to_string(),
            ),
            (
                "x-amz-meta-document-hash".to_string(),
                attributes.document_hash.to_string(),
            ),
            (
                "x-amz-meta-metadata-iv".to_string(),
                attributes.sidecar.metadata_iv.clone(),
            ),
            (
                "x-amz-meta-encrypted-metadata".to_string(),
                attributes.sidecar.encrypted_metadata.clone(),
            ),
        ];
        if let Some(tag) = &attributes.sidecar.metadata_auth_tag {
            metadata.push(("x-amz-meta-metadata-auth-tag".to_string(), tag.clone()));
        }

        self.client.put_object(location, payload, &metadata).await
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        self.client.get_object(location).await
    }

    async fn remove(&self, location: &str) -> Result<()> {
        self.client.delete_object(location).await
    }

    async fn presigned_url(
        &self,
        location: &str,
        _storage_id: &StorageId,
        expires_in: u64,
    ) -> Result<String> {
        self.client.presign_get(location, expires_in)
    }

    async fn store_url(&self, location: &str, _storage_id: &StorageId) -> Result<String> {
        self.client.presign_get(location, DEFAULT_URL_EXPIRY_SECS)
    }
}
