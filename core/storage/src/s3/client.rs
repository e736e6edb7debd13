//! Minimal S3 REST client.

use chrono::Utc;
use reqwest::{Client, Method, StatusCode};
use std::fmt;
use url::Url;

use super::sigv4::{self, SigningKey};
use selladoc_common::{Error, Result};
use selladoc_crypto::sha256_hex;

/// Amazon S3 configuration.
#[derive(Clone)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores; virtual-hosted AWS URLs
    /// are used when absent.
    pub endpoint: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// S3 REST API client.
#[derive(Debug)]
pub struct S3Client {
    http: Client,
    config: S3Config,
}

impl S3Client {
    /// Create a new client.
    pub fn new(config: S3Config) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn signing_key(&self) -> SigningKey<'_> {
        SigningKey {
            access_key: &self.config.access_key_id,
            secret_key: &self.config.secret_access_key,
            region: &self.config.region,
        }
    }

    /// URL of an object key.
    pub fn object_url(&self, key: &str) -> Result<Url> {
        let raw = match &self.config.endpoint {
            // Path-style addressing for custom endpoints
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, key
            ),
        };
        Url::parse(&raw).map_err(|e| Error::InvalidInput(format!("Invalid object URL: {}", e)))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        extra_headers: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let payload_hash = match &body {
            Some(bytes) => sha256_hex(bytes),
            None => sha256_hex(b""),
        };

        let headers = sigv4::sign_headers(
            self.signing_key(),
            method.as_str(),
            &url,
            extra_headers,
            &payload_hash,
            Utc::now(),
        )?;

        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("S3 request failed: {}", e)))
    }

    /// Upload an object with the given `x-amz-meta-*` metadata headers.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        metadata: &[(String, String)],
    ) -> Result<()> {
        let url = self.object_url(key)?;

        let mut headers: Vec<(String, String)> = vec![(
            "content-type".to_string(),
            "application/octet-stream".to_string(),
        )];
        headers.extend_from_slice(metadata);

        let response = self.send(Method::PUT, url, &headers, Some(body)).await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "S3 PUT failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Download an object.
    ///
    /// # Errors
    /// - `NotFound` if the key does not exist
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key)?;
        let response = self.send(Method::GET, url, &[], None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("Object not found: {}", key))),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::Transport(format!("S3 body read failed: {}", e)))?;
                Ok(bytes.to_vec())
            }
            status => Err(Error::Transport(format!(
                "S3 GET failed with status {}",
                status
            ))),
        }
    }

    /// Delete an object. Deleting a missing key is not an error.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let url = self.object_url(key)?;
        let response = self.send(Method::DELETE, url, &[], None).await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "S3 DELETE failed with status {}",
                status
            )))
        }
    }

    /// Presign a GET URL for direct time-limited download. No network I/O.
    pub fn presign_get(&self, key: &str, expires_in: u64) -> Result<String> {
        let mut url = self.object_url(key)?;
        sigv4::presign_url(self.signing_key(), "GET", &mut url, expires_in, Utc::now())?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>) -> S3Config {
        S3Config {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            region: "us-east-1".to_string(),
            bucket: "signed-docs".to_string(),
            endpoint: endpoint.map(String::from),
        }
    }

    #[test]
    fn test_virtual_hosted_object_url() {
        let client = S3Client::new(config(None));
        let url = client.object_url("documents/2026/08/30/a.bin").unwrap();
        assert_eq!(
            url.as_str(),
            "https://signed-docs.s3.us-east-1.amazonaws.com/documents/2026/08/30/a.bin"
        );
    }

    #[test]
    fn test_path_style_url_with_endpoint() {
        let client = S3Client::new(config(Some("http://localhost:9000/")));
        let url = client.object_url("documents/a.bin").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/signed-docs/documents/a.bin");
    }

    #[test]
    fn test_presign_get_is_offline() {
        let client = S3Client::new(config(None));
        let url = client.presign_get("documents/a.bin", 600).unwrap();
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=600"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let printed = format!("{:?}", config(None));
        assert!(!printed.contains("wJalrXUtnFEMI"));
        assert!(printed.contains("REDACTED"));
    }
}
