//! In-memory transport for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::provider::ProviderKind;
use crate::transport::{BlobTransport, ObjectAttributes};
use selladoc_common::{Error, Result, StorageId};

/// In-memory blob transport.
///
/// All data is held in a map and lost on drop. Since records pin one of the
/// closed provider kinds, the transport impersonates whichever kind it is
/// constructed with, which lets tests stand in for a remote backend without
/// network access.
pub struct MemoryTransport {
    kind: ProviderKind,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryTransport {
    /// Create an empty transport reporting the given provider kind.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the transport holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobTransport for MemoryTransport {
    fn kind(&self) -> ProviderKind {
        self.kind
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
        _attributes: ObjectAttributes<'_>,
    ) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| Error::Transport("Memory transport lock poisoned".to_string()))?;
        blobs.insert(location.to_string(), payload);
        Ok(())
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| Error::Transport("Memory transport lock poisoned".to_string()))?;
        blobs
            .get(location)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", location)))
    }

    async fn remove(&self, location: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| Error::Transport("Memory transport lock poisoned".to_string()))?;
        blobs.remove(location);
        Ok(())
    }

    async fn presigned_url(
        &self,
        location: &str,
        _storage_id: &StorageId,
        expires_in: u64,
    ) -> Result<String> {
        let expires_at = Utc::now().timestamp() + expires_in as i64;
        Ok(format!(
            "memory://{}/{}?expires={}",
            self.kind, location, expires_at
        ))
    }

    async fn store_url(&self, location: &str, _storage_id: &StorageId) -> Result<String> {
        Ok(format!("memory://{}/{}", self.kind, location))
    }
}
