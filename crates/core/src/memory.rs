//! In-memory object store for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{ByteStream, Content, ObjectMetadata, ObjectRef, ObjectStore, UploadOptions};

const CHUNK_SIZE: usize = 64 * 1024;

/// Errors raised by the in-memory backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("No such object: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("Signing expiry {0} is in the past")]
    ExpiredSignature(DateTime<Utc>),

    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    updated: DateTime<Utc>,
    public: bool,
}

type Objects = HashMap<(String, String), StoredObject>;

/// In-memory object store.
///
/// Buckets are implicit. Cloning shares the same storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<Objects>>,
}

fn not_found(object: ObjectRef<'_>) -> Error {
    Error::backend(MemoryError::NoSuchKey {
        bucket: object.bucket.to_string(),
        key: object.key.to_string(),
    })
}

fn key_of(object: ObjectRef<'_>) -> (String, String) {
    (object.bucket.to_string(), object.key.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Objects>> {
        self.objects.read().map_err(|_| Error::backend(MemoryError::Poisoned))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Objects>> {
        self.objects.write().map_err(|_| Error::backend(MemoryError::Poisoned))
    }

    fn get(&self, object: ObjectRef<'_>) -> Result<StoredObject> {
        self.read()?
            .get(&key_of(object))
            .cloned()
            .ok_or_else(|| not_found(object))
    }

    fn set_public(&self, object: ObjectRef<'_>, public: bool) -> Result<()> {
        let mut objects = self.write()?;
        let stored = objects
            .get_mut(&key_of(object))
            .ok_or_else(|| not_found(object))?;
        stored.public = public;
        Ok(())
    }

    /// Whether an object carries the public-read grant
    pub fn is_public(&self, object: ObjectRef<'_>) -> Result<bool> {
        Ok(self.get(object)?.public)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn exists(&self, object: ObjectRef<'_>) -> Result<bool> {
        Ok(self.read()?.contains_key(&key_of(object)))
    }

    async fn signed_url(&self, object: ObjectRef<'_>, expires_at: DateTime<Utc>) -> Result<String> {
        if expires_at <= Utc::now() {
            return Err(Error::backend(MemoryError::ExpiredSignature(expires_at)));
        }
        Ok(format!(
            "memory://{}/{}?expires={}&signature={}",
            object.bucket,
            object.key,
            expires_at.timestamp(),
            Uuid::new_v4().simple()
        ))
    }

    async fn upload(
        &self,
        object: ObjectRef<'_>,
        content: Content,
        options: &UploadOptions,
    ) -> Result<()> {
        let data = content.into_bytes().await?;
        let stored = StoredObject {
            data,
            content_type: options.content_type.clone(),
            etag: Uuid::new_v4().simple().to_string(),
            updated: Utc::now(),
            public: options.public,
        };
        self.write()?.insert(key_of(object), stored);
        Ok(())
    }

    async fn delete(&self, object: ObjectRef<'_>) -> Result<()> {
        self.write()?
            .remove(&key_of(object))
            .map(|_| ())
            .ok_or_else(|| not_found(object))
    }

    async fn copy(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
        let mut objects = self.write()?;
        let source = objects.get(&key_of(from)).ok_or_else(|| not_found(from))?;
        // A copy gets fresh, private ACLs like a new object would
        let copied = StoredObject {
            etag: Uuid::new_v4().simple().to_string(),
            updated: Utc::now(),
            public: false,
            ..source.clone()
        };
        objects.insert(key_of(to), copied);
        Ok(())
    }

    async fn rename(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
        let mut objects = self.write()?;
        let source = objects.remove(&key_of(from)).ok_or_else(|| not_found(from))?;
        objects.insert(
            key_of(to),
            StoredObject {
                public: false,
                ..source
            },
        );
        Ok(())
    }

    async fn make_public(&self, object: ObjectRef<'_>) -> Result<()> {
        self.set_public(object, true)
    }

    async fn make_private(&self, object: ObjectRef<'_>) -> Result<()> {
        self.set_public(object, false)
    }

    fn read_stream(&self, object: ObjectRef<'_>) -> ByteStream {
        let store = self.clone();
        let bucket = object.bucket.to_string();
        let key = object.key.to_string();

        let lookup = async move { store.get(ObjectRef::new(&bucket, &key)).map(|stored| stored.data) };

        Box::pin(stream::once(lookup).flat_map(|result| match result {
            Ok(data) => {
                let chunks: Vec<Result<Bytes>> = (0..data.len())
                    .step_by(CHUNK_SIZE)
                    .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                    .collect();
                stream::iter(chunks)
            }
            Err(err) => stream::iter(vec![Err(err)]),
        }))
    }

    async fn metadata(&self, object: ObjectRef<'_>) -> Result<ObjectMetadata> {
        let stored = self.get(object)?;
        Ok(ObjectMetadata {
            bucket: object.bucket.to_string(),
            name: object.key.to_string(),
            size: stored.data.len() as u64,
            content_type: Some(stored.content_type),
            etag: Some(stored.etag),
            updated: Some(stored.updated),
            storage_class: Some("STANDARD".to_string()),
            metadata: HashMap::new(),
        })
    }

    async fn download_to(&self, object: ObjectRef<'_>, dest: &Path) -> Result<()> {
        let stored = self.get(object)?;
        tokio::fs::write(dest, &stored.data).await?;
        Ok(())
    }
}
