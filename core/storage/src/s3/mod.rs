//! Amazon S3 transport.
//!
//! Talks to the S3 REST API directly over HTTP with AWS Signature V4
//! signing; presigned URLs use query-string signing.

pub mod client;
pub mod sigv4;
pub mod transport;

pub use client::{S3Client, S3Config};
pub use transport::S3Transport;
