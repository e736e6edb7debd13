//! Persisted storage-record index.
//!
//! One record per stored blob, created exactly once at store time, read by
//! retrieval/presign/verify and deleted exactly once on delete. Records are
//! never mutated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use crate::provider::ProviderKind;
use selladoc_common::{DocumentId, Error, Result, StorageId};
use selladoc_crypto::EncryptionType;

/// Encrypted side-channel metadata carried by a storage record.
///
/// The metadata blob is never stored in the clear; only its ciphertext, IV
/// and (for GCM) authentication tag are persisted, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Base64-encoded encrypted metadata blob.
    pub encrypted_metadata: String,
    /// Base64-encoded IV for the metadata blob.
    pub metadata_iv: String,
    /// Base64-encoded GCM authentication tag for the metadata blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_auth_tag: Option<String>,
}

/// Persisted index row mapping a storage id to everything needed to locate
/// and decrypt a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub id: StorageId,
    pub document_id: DocumentId,
    /// Owning backend; write-once.
    pub provider: ProviderKind,
    /// Cipher mode; write-once.
    pub encryption_type: EncryptionType,
    /// Backend-specific path/key of the encrypted payload.
    pub storage_location: String,
    /// SHA-256 hex digest of the plaintext document.
    pub document_hash: String,
    pub created_at: DateTime<Utc>,
    pub metadata: RecordMetadata,
}

/// Repository of storage records.
///
/// The subsystem treats this as an injected collaborator; any store exposing
/// insert/select/delete by id works.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, record: &StorageRecord) -> Result<()>;

    /// Look up a record by storage id.
    async fn find(&self, id: &StorageId) -> Result<Option<StorageRecord>>;

    /// Delete a record. Returns whether a record existed.
    async fn delete(&self, id: &StorageId) -> Result<bool>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Create or open the records database.
    ///
    /// # Errors
    /// - Database creation or migration failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Record(format!("Failed to open records database: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS document_storage_records (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                encryption_type TEXT NOT NULL,
                storage_location TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                metadata TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_document
                ON document_storage_records(document_id);
            "#,
        )
        .map_err(|e| Error::Record(format!("Failed to initialize schema: {}", e)))?;

        debug!("records database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            id: row.get(0)?,
            document_id: row.get(1)?,
            provider: row.get(2)?,
            encryption_type: row.get(3)?,
            storage_location: row.get(4)?,
            document_hash: row.get(5)?,
            created_at: row.get(6)?,
            metadata: row.get(7)?,
        })
    }
}

/// Column values as stored, before parsing into domain types.
struct RawRecord {
    id: String,
    document_id: String,
    provider: String,
    encryption_type: String,
    storage_location: String,
    document_hash: String,
    created_at: String,
    metadata: String,
}

impl RawRecord {
    fn into_record(self) -> Result<StorageRecord> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| Error::Record(format!("Invalid created_at timestamp: {}", e)))?
            .with_timezone(&Utc);
        let metadata: RecordMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| Error::Serialization(format!("Invalid record metadata: {}", e)))?;

        Ok(StorageRecord {
            id: StorageId::new(self.id)?,
            document_id: DocumentId::new(self.document_id)?,
            provider: ProviderKind::from_str(&self.provider)?,
            encryption_type: EncryptionType::from_str(&self.encryption_type)?,
            storage_location: self.storage_location,
            document_hash: self.document_hash,
            created_at,
            metadata,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &StorageRecord) -> Result<()> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO document_storage_records
            (id, document_id, provider, encryption_type, storage_location,
             document_hash, created_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id.as_str(),
                record.document_id.as_str(),
                record.provider.as_str(),
                record.encryption_type.as_str(),
                record.storage_location,
                record.document_hash,
                record.created_at.to_rfc3339(),
                metadata,
            ],
        )
        .map_err(|e| Error::Record(format!("Failed to insert record: {}", e)))?;
        Ok(())
    }

    async fn find(&self, id: &StorageId) -> Result<Option<StorageRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, document_id, provider, encryption_type, storage_location,
                       document_hash, created_at, metadata
                FROM document_storage_records WHERE id = ?1
                "#,
            )
            .map_err(|e| Error::Record(format!("Failed to prepare query: {}", e)))?;

        let raw = stmt.query_row([id.as_str()], Self::row_to_record);
        match raw {
            Ok(raw) => Ok(Some(raw.into_record()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Record(format!("Failed to query record: {}", e))),
        }
    }

    async fn delete(&self, id: &StorageId) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "DELETE FROM document_storage_records WHERE id = ?1",
                [id.as_str()],
            )
            .map_err(|e| Error::Record(format!("Failed to delete record: {}", e)))?;
        Ok(affected > 0)
    }
}

/// In-memory record store for tests and development.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, StorageRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &StorageRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::Record("Record store lock poisoned".to_string()))?;
        records.insert(record.id.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn find(&self, id: &StorageId) -> Result<Option<StorageRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Record("Record store lock poisoned".to_string()))?;
        Ok(records.get(id.as_str()).cloned())
    }

    async fn delete(&self, id: &StorageId) -> Result<bool> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::Record("Record store lock poisoned".to_string()))?;
        Ok(records.remove(id.as_str()).is_some())
    }
}
