//! Storage backends for encrypted document storage.
//!
//! This module provides a trait-based interface for the two storage backends
//! (Amazon S3 and local filesystem), a registry for backend resolution, and
//! the persisted storage-record index.
//!
//! # Design Principles
//! - Backend isolation: transports move bytes; all encryption, hashing and
//!   record bookkeeping live in one shared store implementation
//! - Backend pinning: a stored document is always served by the backend
//!   recorded at store time, never by the current default
//! - Unified error semantics: consistent error types across backends

pub mod local;
pub mod memory;
pub mod provider;
pub mod records;
pub mod registry;
pub mod s3;
pub mod store;
pub mod transport;

pub use local::LocalTransport;
pub use memory::MemoryTransport;
pub use provider::{
    ProviderKind, RetrieveOptions, RetrievedDocument, SealedMetadata, SecureStorageProvider,
    StoreResult, DEFAULT_URL_EXPIRY_SECS,
};
pub use records::{MemoryRecordStore, RecordMetadata, RecordStore, SqliteRecordStore, StorageRecord};
pub use registry::BackendRegistry;
pub use s3::{S3Config, S3Transport};
pub use store::EncryptedStore;
pub use transport::BlobTransport;
