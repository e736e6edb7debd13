//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use url::Url;

use selladoc_common::{Error, Result};
use selladoc_crypto::{hmac_sha256, sha256_hex};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Content hash used by presigned GET URLs.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Everything except unreserved characters gets percent-encoded.
const SIGV4_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Credentials and region scope used for signing.
#[derive(Clone, Copy)]
pub struct SigningKey<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

fn uri_encode(value: &str) -> String {
    utf8_percent_encode(value, SIGV4_ENCODE_SET).to_string()
}

/// Encode a path, keeping `/` separators.
///
/// `Url` stores the path already percent-encoded once. Each segment is
/// decoded before re-encoding so the canonical form stays single-encoded;
/// S3 rejects signatures over a double-encoded object path.
fn canonical_path(url: &Url) -> String {
    url.path()
        .split('/')
        .map(|segment| match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => uri_encode(&decoded),
            Err(_) => uri_encode(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidInput(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn credential_scope(date: &str, region: &str) -> String {
    format!("{}/{}/{}/aws4_request", date, region, SERVICE)
}

/// HMAC key derivation chain: date, region, service, "aws4_request".
fn derive_signing_key(secret_key: &str, date: &str, region: &str) -> Result<[u8; 32]> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn sign(key: SigningKey<'_>, date: &str, string_to_sign: &str) -> Result<String> {
    let signing_key = derive_signing_key(key.secret_key, date, key.region)?;
    Ok(hex::encode(hmac_sha256(
        &signing_key,
        string_to_sign.as_bytes(),
    )?))
}

/// Sign a request with the `Authorization` header scheme.
///
/// Returns the full header set to attach: `host`, `x-amz-date`,
/// `x-amz-content-sha256`, the given extra headers and `authorization`.
pub fn sign_headers(
    key: SigningKey<'_>,
    method: &str,
    url: &Url,
    extra_headers: &[(String, String)],
    payload_hash: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let host = host_header(url)?;

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    headers.insert("host".to_string(), host);
    headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());
    headers.insert("x-amz-date".to_string(), amz_date.clone());
    for (name, value) in extra_headers {
        headers.insert(name.to_lowercase(), value.trim().to_string());
    }

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_path(url),
        canonical_query,
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let scope = credential_scope(&date, key.region);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );
    let signature = sign(key, &date, &string_to_sign)?;

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, key.access_key, scope, signed_headers, signature
    );

    let mut result: Vec<(String, String)> = headers.into_iter().collect();
    result.push(("authorization".to_string(), authorization));
    Ok(result)
}

/// Presign a URL with query-string signing.
///
/// The signature parameters are appended to the URL's query; the payload is
/// unsigned, as is standard for presigned GETs.
pub fn presign_url(
    key: SigningKey<'_>,
    method: &str,
    url: &mut Url,
    expires_in: u64,
    now: DateTime<Utc>,
) -> Result<()> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let host = host_header(url)?;
    let scope = credential_scope(&date, key.region);
    let credential = format!("{}/{}", key.access_key, scope);
    let expires = expires_in.to_string();

    // Already in canonical (sorted) order.
    let params: [(&str, &str); 5] = [
        ("X-Amz-Algorithm", ALGORITHM),
        ("X-Amz-Credential", &credential),
        ("X-Amz-Date", &amz_date),
        ("X-Amz-Expires", &expires),
        ("X-Amz-SignedHeaders", "host"),
    ];
    let canonical_query = params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
        method,
        canonical_path(url),
        canonical_query,
        host,
        UNSIGNED_PAYLOAD
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );
    let signature = sign(key, &date, &string_to_sign)?;

    url.set_query(Some(&format!(
        "{}&X-Amz-Signature={}",
        canonical_query, signature
    )));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey<'static> {
        SigningKey {
            access_key: "AKIDEXAMPLE",
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("abc-123_~."), "abc-123_~.");
        assert_eq!(uri_encode("a b"), "a%20b");
        assert_eq!(uri_encode("a/b"), "a%2Fb");
    }

    #[test]
    fn test_canonical_path_is_single_encoded() {
        // Url normalizes "a b+c.bin" to "a%20b+c.bin" on parse; the
        // canonical form must not encode those percent signs again.
        let url =
            Url::parse("https://bucket.s3.us-east-1.amazonaws.com/documents/a b+c.bin").unwrap();
        assert_eq!(url.path(), "/documents/a%20b+c.bin");
        assert_eq!(canonical_path(&url), "/documents/a%20b%2Bc.bin");
    }

    #[test]
    fn test_canonical_path_leaves_plain_keys_alone() {
        let url =
            Url::parse("https://bucket.s3.us-east-1.amazonaws.com/documents/2026/08/30/k.bin")
                .unwrap();
        assert_eq!(canonical_path(&url), "/documents/2026/08/30/k.bin");
    }

    #[test]
    fn test_sign_headers_shape() {
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/documents/a.bin").unwrap();
        let headers = sign_headers(
            test_key(),
            "PUT",
            &url,
            &[("x-amz-meta-encrypted".to_string(), "true".to_string())],
            &sha256_hex(b"payload"),
            fixed_now(),
        )
        .unwrap();

        let auth = headers
            .iter()
            .find(|(name, _)| name == "authorization")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260830/us-east-1/s3/aws4_request"));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-meta-encrypted"));
        assert!(headers.iter().any(|(name, _)| name == "x-amz-date"));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/k.bin").unwrap();
        let a = sign_headers(test_key(), "GET", &url, &[], UNSIGNED_PAYLOAD, fixed_now()).unwrap();
        let b = sign_headers(test_key(), "GET", &url, &[], UNSIGNED_PAYLOAD, fixed_now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let url = Url::parse("https://bucket.s3.us-east-1.amazonaws.com/k.bin").unwrap();
        let mut url_a = url.clone();
        let mut url_b = url;
        presign_url(test_key(), "GET", &mut url_a, 3600, fixed_now()).unwrap();
        presign_url(
            SigningKey {
                secret_key: "another-secret",
                ..test_key()
            },
            "GET",
            &mut url_b,
            3600,
            fixed_now(),
        )
        .unwrap();
        assert_ne!(url_a.query(), url_b.query());
    }

    #[test]
    fn test_presign_url_parameters() {
        let mut url =
            Url::parse("https://bucket.s3.us-east-1.amazonaws.com/documents/2026/08/30/a.bin")
                .unwrap();
        presign_url(test_key(), "GET", &mut url, 60, fixed_now()).unwrap();

        let query = url.query().unwrap();
        assert!(query.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(query.contains("X-Amz-Expires=60"));
        assert!(query.contains("X-Amz-SignedHeaders=host"));

        let signature = url
            .query_pairs()
            .find(|(name, _)| name == "X-Amz-Signature")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
