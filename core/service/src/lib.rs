//! High-level secure document storage facade.
//!
//! Ties together the crypto layer, the storage backends and the record
//! store behind a single service type. Callers interact with
//! [`SecureStorageService`] and never touch individual backends directly;
//! the backend that stored a document is recorded alongside it and is the
//! one used for every later operation on that document.

pub mod config;
pub mod service;

pub use config::{S3Settings, StorageSettings};
pub use service::{IntegrityReport, SecureStorageService, StoreOptions};
