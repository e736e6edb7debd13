//! Environment-driven configuration for the storage service.

use std::env;
use std::path::PathBuf;

use zeroize::Zeroizing;

use selladoc_common::{Error, Result};
use selladoc_storage::S3Config;

/// Credentials and addressing for the S3 backend.
///
/// Only constructed when the full credential triple (access key, secret
/// key, bucket) is present; a partial set is treated as "S3 not
/// configured" rather than an error.
#[derive(Clone)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
}

impl S3Settings {
    pub(crate) fn into_config(self) -> S3Config {
        S3Config {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            region: self.region,
            bucket: self.bucket,
            endpoint: self.endpoint,
        }
    }
}

/// Resolved service configuration.
///
/// The encryption secret is mandatory; the service refuses to start
/// without it rather than falling back to a built-in default. Everything
/// else has a sensible local default.
pub struct StorageSettings {
    pub encryption_secret: Zeroizing<String>,
    pub s3: Option<S3Settings>,
    pub local_dir: PathBuf,
    pub app_url: String,
}

impl StorageSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `ENCRYPTION_KEY` is unset or
    /// empty.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// The lookup receives the variable name and returns its value, if
    /// any. Tests use this to supply configuration without mutating the
    /// process environment.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("ENCRYPTION_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Configuration("ENCRYPTION_KEY must be set to a non-empty value".into())
            })?;

        let access_key_id = lookup("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty());
        let secret_access_key = lookup("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty());
        let bucket = lookup("S3_BUCKET_NAME").filter(|v| !v.is_empty());

        let s3 = match (access_key_id, secret_access_key, bucket) {
            (Some(access_key_id), Some(secret_access_key), Some(bucket)) => Some(S3Settings {
                access_key_id,
                secret_access_key,
                region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                bucket,
                endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
            }),
            _ => None,
        };

        let local_dir = lookup("LOCAL_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads/secure-documents"));

        let app_url = lookup("APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            encryption_secret: Zeroizing::new(secret),
            s3,
            local_dir,
            app_url,
        })
    }
}
