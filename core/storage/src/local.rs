//! Local filesystem transport.
//!
//! Stores encrypted blobs under a configured root directory using the same
//! date bucketing as the remote backend, with the encrypted metadata sidecar
//! written to a sibling `<storageId>_metadata.json` file.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::provider::ProviderKind;
use crate::transport::{BlobTransport, ObjectAttributes};
use selladoc_common::{Error, Result, StorageId};

/// Local filesystem blob transport.
pub struct LocalTransport {
    root: PathBuf,
    app_url: String,
}

impl LocalTransport {
    /// Create a new local transport rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory exists
    ///
    /// # Errors
    /// - `Configuration` if the root directory cannot be created
    pub fn new(root: impl AsRef<Path>, app_url: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                Error::Configuration(format!(
                    "Cannot create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            root,
            app_url: app_url.into(),
        })
    }

    /// Path of the sidecar metadata file for a blob location.
    fn sidecar_path(location: &str) -> String {
        match location.strip_suffix(".bin") {
            Some(stem) => format!("{}_metadata.json", stem),
            None => format!("{}_metadata.json", location),
        }
    }

    /// Check whether a generated download URL has passed its expiry.
    ///
    /// Token validation proper is the download endpoint's responsibility;
    /// this only inspects the `expires` parameter the transport embedded.
    /// URLs without a parseable expiry are treated as expired.
    pub fn is_download_url_expired(url: &str, now: DateTime<Utc>) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return true;
        };
        let expires = parsed
            .query_pairs()
            .find(|(name, _)| name == "expires")
            .and_then(|(_, value)| value.parse::<i64>().ok());
        match expires {
            Some(expires_at) => now.timestamp() > expires_at,
            None => true,
        }
    }
}

#[async_trait]
impl BlobTransport for LocalTransport {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn location_for(&self, storage_id: &StorageId, created_at: DateTime<Utc>) -> String {
        self.root
            .join(format!("{:04}", created_at.year()))
            .join(format!("{:02}", created_at.month()))
            .join(format!("{:02}", created_at.day()))
            .join(format!("{}.bin", storage_id))
            .to_string_lossy()
            .into_owned()
    }

    async fn put(
        &self,
        location: &str,
        payload: Vec<u8>,
        attributes: ObjectAttributes<'_>,
    ) -> Result<()> {
        let path = Path::new(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::Transport(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }

        fs::write(path, &payload)
            .await
            .map_err(|e| Error::Transport(format!("Cannot write document {}: {}", location, e)))?;

        let sidecar = serde_json::to_vec(attributes.sidecar)
            .map_err(|e| Error::Serialization(format!("Cannot serialize sidecar: {}", e)))?;
        let sidecar_path = Self::sidecar_path(location);
        fs::write(&sidecar_path, sidecar).await.map_err(|e| {
            Error::Transport(format!("Cannot write sidecar {}: {}", sidecar_path, e))
        })?;

        Ok(())
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        match fs::read(location).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "Document file not found: {}",
                location
            ))),
            Err(e) => Err(Error::Transport(format!(
                "Cannot read document {}: {}",
                location, e
            ))),
        }
    }

    async fn remove(&self, location: &str) -> Result<()> {
        for path in [location.to_string(), Self::sidecar_path(location)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Transport(format!("Cannot remove {}: {}", path, e)));
                }
            }
        }
        Ok(())
    }

    async fn presigned_url(
        &self,
        _location: &str,
        storage_id: &StorageId,
        expires_in: u64,
    ) -> Result<String> {
        // No native presigning on disk; manufacture a token-bearing URL for
        // the download endpoint. Token/expiry enforcement happens there.
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now().timestamp() + expires_in as i64;
        Ok(format!(
            "{}/api/secure-documents/{}/download?token={}&expires={}",
            self.app_url, storage_id, token, expires_at
        ))
    }

    async fn store_url(&self, location: &str, _storage_id: &StorageId) -> Result<String> {
        Ok(format!("file://{}", location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordMetadata;
    use chrono::Duration;
    use selladoc_crypto::EncryptionType;
    use tempfile::TempDir;

    fn sidecar() -> RecordMetadata {
        RecordMetadata {
            encrypted_metadata: "ZW5j".to_string(),
            metadata_iv: "aXY=".to_string(),
            metadata_auth_tag: Some("dGFn".to_string()),
        }
    }

    #[tokio::test]
    async fn test_put_writes_blob_and_sidecar() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport::new(temp.path(), "http://localhost:5000").unwrap();
        let id = StorageId::generate();
        let location = transport.location_for(&id, Utc::now());

        let sidecar = sidecar();
        transport
            .put(
                &location,
                vec![9, 9, 9],
                ObjectAttributes {
                    sidecar: &sidecar,
                    document_hash: "hash",
                    encryption_type: EncryptionType::Aes256Gcm,
                },
            )
            .await
            .unwrap();

        assert_eq!(transport.fetch(&location).await.unwrap(), vec![9, 9, 9]);

        let sidecar_path = LocalTransport::sidecar_path(&location);
        let raw = std::fs::read(&sidecar_path).unwrap();
        let parsed: RecordMetadata = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed.metadata_iv, "aXY=");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport::new(temp.path(), "").unwrap();
        let err = transport.fetch("/nonexistent/blob.bin").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport::new(temp.path(), "").unwrap();
        let id = StorageId::generate();
        let location = transport.location_for(&id, Utc::now());

        let sidecar = sidecar();
        transport
            .put(
                &location,
                vec![1],
                ObjectAttributes {
                    sidecar: &sidecar,
                    document_hash: "hash",
                    encryption_type: EncryptionType::Aes256Cbc,
                },
            )
            .await
            .unwrap();

        transport.remove(&location).await.unwrap();
        assert!(!Path::new(&location).exists());
        assert!(!Path::new(&LocalTransport::sidecar_path(&location)).exists());

        // Second removal of the same location succeeds
        transport.remove(&location).await.unwrap();
    }

    #[tokio::test]
    async fn test_download_url_expiry() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport::new(temp.path(), "http://localhost:5000").unwrap();
        let id = StorageId::generate();

        let now = Utc::now();
        let url = transport.presigned_url("ignored", &id, 60).await.unwrap();
        assert!(url.contains(&format!("/api/secure-documents/{}/download", id)));
        assert!(url.contains("token="));

        assert!(!LocalTransport::is_download_url_expired(&url, now));
        assert!(LocalTransport::is_download_url_expired(
            &url,
            now + Duration::seconds(61)
        ));
    }

    #[test]
    fn test_garbage_url_is_expired() {
        assert!(LocalTransport::is_download_url_expired(
            "not a url",
            Utc::now()
        ));
        assert!(LocalTransport::is_download_url_expired(
            "http://host/download?token=x",
            Utc::now()
        ));
    }

    #[tokio::test]
    async fn test_store_url_is_file_scheme() {
        let temp = TempDir::new().unwrap();
        let transport = LocalTransport::new(temp.path(), "").unwrap();
        let id = StorageId::generate();
        let location = transport.location_for(&id, Utc::now());
        let url = transport.store_url(&location, &id).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".bin"));
    }
}
