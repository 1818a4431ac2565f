//! Object store capability trait.
//!
//! A backend exposes per-bucket, per-object primitives; [`crate::Disk`] builds
//! the adapter contract on top of them without knowing which provider it talks to.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::Result;

/// Lazy stream of object bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A remote object: `(bucket, key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
}

impl<'a> ObjectRef<'a> {
    pub fn new(bucket: &'a str, key: &'a str) -> Self {
        Self { bucket, key }
    }
}

impl fmt::Display for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Payload for an upload
pub enum Content {
    /// In-memory bytes
    Bytes(Bytes),
    /// A local file, read by the backend
    File(PathBuf),
    /// A byte stream, drained by the backend.
    ///
    /// The length is unknown up front, so the stream is buffered in memory in
    /// full before the upload request is sent. Prefer `File` for large payloads.
    Stream(ByteStream),
}

impl Content {
    /// Drain the content into a single buffer
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            Content::Bytes(bytes) => Ok(bytes),
            Content::File(path) => Ok(Bytes::from(tokio::fs::read(&path).await?)),
            Content::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::File(path) => f.debug_tuple("File").field(path).finish(),
            Content::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Content::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Content {
    fn from(data: &'static [u8]) -> Self {
        Content::Bytes(Bytes::from_static(data))
    }
}

impl From<String> for Content {
    fn from(data: String) -> Self {
        Content::Bytes(Bytes::from(data))
    }
}

impl From<&Path> for Content {
    fn from(path: &Path) -> Self {
        Content::File(path.to_path_buf())
    }
}

impl From<PathBuf> for Content {
    fn from(path: PathBuf) -> Self {
        Content::File(path)
    }
}

impl From<ByteStream> for Content {
    fn from(stream: ByteStream) -> Self {
        Content::Stream(stream)
    }
}

/// Upload parameters passed down to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub public: bool,
}

/// Object descriptor as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Storage backend capability.
///
/// Every method maps onto a single provider primitive (or the provider's own
/// composition of them) and surfaces failures as [`crate::Error::Backend`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Driver name (e.g., "gcs", "memory")
    fn name(&self) -> &str;

    /// Check whether an object exists. A missing object is `Ok(false)`.
    async fn exists(&self, object: ObjectRef<'_>) -> Result<bool>;

    /// Sign a time-limited read URL
    async fn signed_url(&self, object: ObjectRef<'_>, expires_at: DateTime<Utc>) -> Result<String>;

    /// Upload content, optionally with a public-read ACL
    async fn upload(
        &self,
        object: ObjectRef<'_>,
        content: Content,
        options: &UploadOptions,
    ) -> Result<()>;

    async fn delete(&self, object: ObjectRef<'_>) -> Result<()>;

    async fn copy(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()>;

    /// Move an object; the source is gone afterwards
    async fn rename(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()>;

    /// Grant public read, keeping existing grants
    async fn make_public(&self, object: ObjectRef<'_>) -> Result<()>;

    /// Revoke public read, keeping owner grants
    async fn make_private(&self, object: ObjectRef<'_>) -> Result<()>;

    /// Open a read stream.
    ///
    /// Returns immediately without contacting the backend; request and read
    /// errors are yielded by the stream.
    fn read_stream(&self, object: ObjectRef<'_>) -> ByteStream;

    async fn metadata(&self, object: ObjectRef<'_>) -> Result<ObjectMetadata>;

    /// Write the object's bytes to `dest`
    async fn download_to(&self, object: ObjectRef<'_>, dest: &Path) -> Result<()>;
}
