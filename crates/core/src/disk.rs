//! The storage adapter.
//!
//! A [`Disk`] forwards each operation to an [`ObjectStore`] for a bucket that
//! is resolved exactly once, at the start of the call. Switching buckets for a
//! single call goes through [`Disk::bucket`], which returns a [`BucketScope`]
//! consumed by that call:
//!
//! ```no_run
//! # async fn demo(disk: &gcsdisk_core::Disk) -> gcsdisk_core::Result<()> {
//! let in_backups = disk.bucket("backups").exists("db.sql").await?;
//! let in_default = disk.exists("db.sql").await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bucket::BucketSelector;
use crate::error::Result;
use crate::store::{ByteStream, Content, ObjectMetadata, ObjectRef, ObjectStore, UploadOptions};
use crate::url::public_url;

/// Directory downloads are materialized in, relative to the working directory
pub const DEFAULT_TMP_DIR: &str = "tmp";

/// Options for put, copy and move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Grant public read on the resulting object
    pub public: bool,
}

impl WriteOptions {
    pub fn public() -> Self {
        Self { public: true }
    }
}

/// Infer an object's content type from the extension of its location
pub fn content_type_for(location: &str) -> String {
    mime_guess::from_path(location)
        .first_or_octet_stream()
        .to_string()
}

/// A storage disk: a backend plus a default bucket
pub struct Disk {
    store: Arc<dyn ObjectStore>,
    default_bucket: String,
    tmp_dir: PathBuf,
}

impl std::fmt::Debug for Disk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disk")
            .field("driver", &self.store.name())
            .field("default_bucket", &self.default_bucket)
            .field("tmp_dir", &self.tmp_dir)
            .finish()
    }
}

impl Disk {
    pub fn new(store: Arc<dyn ObjectStore>, default_bucket: impl Into<String>) -> Self {
        Self {
            store,
            default_bucket: default_bucket.into(),
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
        }
    }

    /// Materialize downloads under `dir` instead of `./tmp`
    pub fn with_tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = dir.into();
        self
    }

    pub fn driver(&self) -> &str {
        self.store.name()
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Run the next operation against `name` instead of the default bucket
    pub fn bucket(&self, name: impl Into<String>) -> BucketScope<'_> {
        let mut selector = BucketSelector::new(self.default_bucket.clone());
        selector.set_override(name);
        BucketScope { disk: self, selector }
    }

    /// Scope for an optional override; `None` means the default bucket
    pub fn scoped(&self, bucket: Option<&str>) -> BucketScope<'_> {
        match bucket {
            Some(name) => self.bucket(name),
            None => self.default_scope(),
        }
    }

    fn default_scope(&self) -> BucketScope<'_> {
        BucketScope {
            disk: self,
            selector: BucketSelector::new(self.default_bucket.clone()),
        }
    }

    pub async fn exists(&self, location: &str) -> Result<bool> {
        self.default_scope().exists(location).await
    }

    pub fn url(&self, location: &str) -> String {
        self.default_scope().url(location)
    }

    pub async fn signed_url(&self, location: &str, expires_at: DateTime<Utc>) -> Result<String> {
        self.default_scope().signed_url(location, expires_at).await
    }

    pub async fn put(
        &self,
        location: &str,
        content: impl Into<Content>,
        options: WriteOptions,
    ) -> Result<String> {
        self.default_scope().put(location, content, options).await
    }

    pub async fn delete(&self, location: &str) -> Result<bool> {
        self.default_scope().delete(location).await
    }

    pub async fn copy(
        &self,
        src: &str,
        dest: &str,
        dest_bucket: Option<&str>,
        options: WriteOptions,
    ) -> Result<String> {
        self.default_scope().copy(src, dest, dest_bucket, options).await
    }

    pub async fn move_object(
        &self,
        src: &str,
        dest: &str,
        dest_bucket: Option<&str>,
        options: WriteOptions,
    ) -> Result<String> {
        self.default_scope()
            .move_object(src, dest, dest_bucket, options)
            .await
    }

    pub async fn make_public(&self, location: &str) -> Result<bool> {
        self.default_scope().make_public(location).await
    }

    pub async fn make_private(&self, location: &str) -> Result<bool> {
        self.default_scope().make_private(location).await
    }

    pub fn stream(&self, location: &str) -> ByteStream {
        self.default_scope().stream(location)
    }

    pub async fn metadata(&self, location: &str) -> Result<ObjectMetadata> {
        self.default_scope().metadata(location).await
    }

    pub async fn download(&self, location: &str) -> Result<PathBuf> {
        self.default_scope().download(location).await
    }
}

/// A single call against a [`Disk`], with its own bucket selection.
///
/// Every operation takes `self`, so an override set through
/// [`Disk::bucket`] applies to exactly one call.
#[must_use = "a bucket scope does nothing until an operation is called on it"]
pub struct BucketScope<'a> {
    disk: &'a Disk,
    selector: BucketSelector,
}

impl BucketScope<'_> {
    /// Check whether the object exists
    pub async fn exists(mut self, location: &str) -> Result<bool> {
        let bucket = self.selector.resolve();
        debug!(%bucket, location, "exists");
        self.disk.store.exists(ObjectRef::new(&bucket, location)).await
    }

    /// Public URL of the object; nothing is checked remotely
    pub fn url(mut self, location: &str) -> String {
        public_url(&self.selector.resolve(), location)
    }

    /// Time-limited signed read URL
    pub async fn signed_url(mut self, location: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let bucket = self.selector.resolve();
        debug!(%bucket, location, %expires_at, "signing url");
        self.disk
            .store
            .signed_url(ObjectRef::new(&bucket, location), expires_at)
            .await
    }

    /// Upload content and return the object's public URL.
    ///
    /// The URL is returned whether or not the object is publicly readable.
    pub async fn put(
        mut self,
        location: &str,
        content: impl Into<Content>,
        options: WriteOptions,
    ) -> Result<String> {
        let bucket = self.selector.resolve();
        let upload = UploadOptions {
            content_type: content_type_for(location),
            public: options.public,
        };
        info!(%bucket, location, content_type = %upload.content_type, public = upload.public, "uploading");

        self.disk
            .store
            .upload(ObjectRef::new(&bucket, location), content.into(), &upload)
            .await?;

        Ok(public_url(&bucket, location))
    }

    pub async fn delete(mut self, location: &str) -> Result<bool> {
        let bucket = self.selector.resolve();
        info!(%bucket, location, "deleting");
        self.disk.store.delete(ObjectRef::new(&bucket, location)).await?;
        Ok(true)
    }

    /// Copy `src` to `dest`, in `dest_bucket` or the source bucket.
    ///
    /// With `public`, the copy is published afterwards. A failed publish is
    /// returned as-is; the copy is not undone.
    pub async fn copy(
        mut self,
        src: &str,
        dest: &str,
        dest_bucket: Option<&str>,
        options: WriteOptions,
    ) -> Result<String> {
        let src_bucket = self.selector.resolve();
        let dest_bucket = dest_bucket.unwrap_or(src_bucket.as_str());
        info!(%src_bucket, src, dest_bucket, dest, "copying");

        self.disk
            .store
            .copy(ObjectRef::new(&src_bucket, src), ObjectRef::new(dest_bucket, dest))
            .await?;

        self.disk.publish_if(dest_bucket, dest, options).await
    }

    /// Move `src` to `dest`; same composition as [`BucketScope::copy`]
    pub async fn move_object(
        mut self,
        src: &str,
        dest: &str,
        dest_bucket: Option<&str>,
        options: WriteOptions,
    ) -> Result<String> {
        let src_bucket = self.selector.resolve();
        let dest_bucket = dest_bucket.unwrap_or(src_bucket.as_str());
        info!(%src_bucket, src, dest_bucket, dest, "moving");

        self.disk
            .store
            .rename(ObjectRef::new(&src_bucket, src), ObjectRef::new(dest_bucket, dest))
            .await?;

        self.disk.publish_if(dest_bucket, dest, options).await
    }

    pub async fn make_public(mut self, location: &str) -> Result<bool> {
        let bucket = self.selector.resolve();
        info!(%bucket, location, "making public");
        self.disk.store.make_public(ObjectRef::new(&bucket, location)).await?;
        Ok(true)
    }

    pub async fn make_private(mut self, location: &str) -> Result<bool> {
        let bucket = self.selector.resolve();
        info!(%bucket, location, "making private");
        self.disk.store.make_private(ObjectRef::new(&bucket, location)).await?;
        Ok(true)
    }

    /// Open a lazy read stream; errors arrive through the stream
    pub fn stream(mut self, location: &str) -> ByteStream {
        let bucket = self.selector.resolve();
        debug!(%bucket, location, "opening stream");
        self.disk.store.read_stream(ObjectRef::new(&bucket, location))
    }

    pub async fn metadata(mut self, location: &str) -> Result<ObjectMetadata> {
        let bucket = self.selector.resolve();
        debug!(%bucket, location, "fetching metadata");
        self.disk.store.metadata(ObjectRef::new(&bucket, location)).await
    }

    /// Download into `<tmp-dir>/<epoch-millis>-<location>` and return that path.
    ///
    /// The caller owns the file. `location` is joined as-is, so a key holding
    /// `..` segments resolves outside the tmp directory.
    pub async fn download(mut self, location: &str) -> Result<PathBuf> {
        let bucket = self.selector.resolve();
        let dest = self
            .disk
            .tmp_dir
            .join(format!("{}-{}", Utc::now().timestamp_millis(), location));

        // `location` may contain '/', so create the full parent chain
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(%bucket, location, dest = %dest.display(), "downloading");
        self.disk
            .store
            .download_to(ObjectRef::new(&bucket, location), &dest)
            .await?;

        Ok(dest)
    }
}

impl Disk {
    async fn publish_if(&self, bucket: &str, location: &str, options: WriteOptions) -> Result<String> {
        if options.public {
            self.bucket(bucket).make_public(location).await?;
        }
        Ok(public_url(bucket, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use futures::TryStreamExt;

    fn memory_disk() -> (Arc<MemoryStore>, Disk) {
        let store = Arc::new(MemoryStore::new());
        let disk = Disk::new(store.clone(), "assets");
        (store, disk)
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("avatars/1.png"), "image/png");
        assert_eq!(content_type_for("docs/readme.txt"), "text/plain");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn test_url_is_constructive() {
        let (_, disk) = memory_disk();
        assert_eq!(disk.url("missing.txt"), "https://storage.googleapis.com/assets/missing.txt");
        assert_eq!(
            disk.bucket("backups").url("missing.txt"),
            "https://storage.googleapis.com/backups/missing.txt"
        );
    }

    #[tokio::test]
    async fn test_put_then_exists_then_delete() {
        let (store, disk) = memory_disk();

        let url = disk.put("notes/a.txt", b"hello".as_slice(), WriteOptions::default()).await.unwrap();
        assert_eq!(url, "https://storage.googleapis.com/assets/notes/a.txt");
        assert!(disk.exists("notes/a.txt").await.unwrap());
        assert!(!store.is_public(ObjectRef::new("assets", "notes/a.txt")).unwrap());

        let meta = disk.metadata("notes/a.txt").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.size, 5);

        assert!(disk.delete("notes/a.txt").await.unwrap());
        assert!(!disk.exists("notes/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_public() {
        let (store, disk) = memory_disk();
        disk.put("logo.svg", b"<svg/>".as_slice(), WriteOptions::public()).await.unwrap();
        assert!(store.is_public(ObjectRef::new("assets", "logo.svg")).unwrap());
    }

    #[tokio::test]
    async fn test_bucket_override_applies_to_one_call() {
        let (_, disk) = memory_disk();

        let url = disk
            .bucket("backups")
            .put("db.sql", b"dump".as_slice(), WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(url, "https://storage.googleapis.com/backups/db.sql");

        // The next call without an override is back on the default bucket
        assert!(!disk.exists("db.sql").await.unwrap());
        assert!(disk.bucket("backups").exists("db.sql").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_do_not_share_overrides() {
        let (_, disk) = memory_disk();
        disk.bucket("other")
            .put("k", b"x".as_slice(), WriteOptions::default())
            .await
            .unwrap();

        let (overridden, default) = tokio::join!(disk.bucket("other").exists("k"), disk.exists("k"));
        assert!(overridden.unwrap());
        assert!(!default.unwrap());
    }

    #[tokio::test]
    async fn test_copy_to_other_bucket_public() {
        let (store, disk) = memory_disk();
        disk.put("src.png", b"img".as_slice(), WriteOptions::default()).await.unwrap();

        let url = disk
            .copy("src.png", "dest.png", Some("cdn"), WriteOptions::public())
            .await
            .unwrap();

        assert_eq!(url, disk.bucket("cdn").url("dest.png"));
        assert!(disk.bucket("cdn").exists("dest.png").await.unwrap());
        assert!(store.is_public(ObjectRef::new("cdn", "dest.png")).unwrap());
        assert!(disk.exists("src.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_defaults_to_source_bucket() {
        let (store, disk) = memory_disk();
        disk.bucket("archive")
            .put("a.txt", b"a".as_slice(), WriteOptions::default())
            .await
            .unwrap();

        let url = disk
            .bucket("archive")
            .copy("a.txt", "b.txt", None, WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(url, "https://storage.googleapis.com/archive/b.txt");
        assert!(store.exists(ObjectRef::new("archive", "b.txt")).await.unwrap());
        assert!(!store.is_public(ObjectRef::new("archive", "b.txt")).unwrap());
    }

    #[tokio::test]
    async fn test_move_removes_source() {
        let (_, disk) = memory_disk();
        disk.put("inbox/1.json", b"{}".as_slice(), WriteOptions::default()).await.unwrap();

        let url = disk
            .move_object("inbox/1.json", "done/1.json", None, WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(url, disk.url("done/1.json"));
        assert!(!disk.exists("inbox/1.json").await.unwrap());
        assert!(disk.exists("done/1.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_onto_itself_keeps_object() {
        let (_, disk) = memory_disk();
        disk.put("inbox/1.json", b"{}".as_slice(), WriteOptions::default()).await.unwrap();

        disk.bucket("assets")
            .move_object("inbox/1.json", "inbox/1.json", Some("assets"), WriteOptions::default())
            .await
            .unwrap();

        let body: Vec<_> = disk.stream("inbox/1.json").try_collect().await.unwrap();
        assert_eq!(body.concat(), b"{}");
    }

    #[tokio::test]
    async fn test_visibility_toggle() {
        let (store, disk) = memory_disk();
        disk.put("a.txt", b"a".as_slice(), WriteOptions::default()).await.unwrap();
        let object = ObjectRef::new("assets", "a.txt");

        assert!(disk.make_public("a.txt").await.unwrap());
        assert!(store.is_public(object).unwrap());
        assert!(disk.make_private("a.txt").await.unwrap());
        assert!(!store.is_public(object).unwrap());
    }

    #[tokio::test]
    async fn test_stream_reads_content() {
        let (_, disk) = memory_disk();
        disk.put("big.bin", vec![1u8; 100_000], WriteOptions::default()).await.unwrap();

        let chunks: Vec<bytes::Bytes> = disk.stream("big.bin").try_collect().await.unwrap();
        assert_eq!(chunks.concat(), vec![1u8; 100_000]);
    }

    #[tokio::test]
    async fn test_stream_of_missing_object_fails_lazily() {
        let (_, disk) = memory_disk();
        let stream = disk.stream("ghost.bin");
        let result: Result<Vec<bytes::Bytes>> = stream.try_collect().await;
        assert!(matches!(result, Err(Error::Backend(_))));
    }

    #[tokio::test]
    async fn test_metadata_missing_is_backend_error() {
        let (_, disk) = memory_disk();
        assert!(matches!(disk.metadata("nope").await, Err(Error::Backend(_))));
    }

    #[tokio::test]
    async fn test_signed_url_uses_resolved_bucket() {
        let (_, disk) = memory_disk();
        let expires_at = Utc::now() + chrono::Duration::minutes(10);
        let url = disk.bucket("private").signed_url("a.txt", expires_at).await.unwrap();
        assert!(url.starts_with("memory://private/a.txt?"));
    }

    #[tokio::test]
    async fn test_download_path_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        let (_, disk) = memory_disk();
        let disk = disk.with_tmp_dir(&tmp);
        disk.put("reports/q3.csv", b"a,b\n".as_slice(), WriteOptions::default()).await.unwrap();

        let path = disk.download("reports/q3.csv").await.unwrap();

        let relative = path.strip_prefix(&tmp).unwrap().to_string_lossy().into_owned();
        let (millis, rest) = relative.split_once('-').unwrap();
        assert!(!millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "reports/q3.csv");
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n");
    }

    #[tokio::test]
    async fn test_download_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_, disk) = memory_disk();
        let disk = disk.with_tmp_dir(dir.path());
        assert!(matches!(disk.download("nope.txt").await, Err(Error::Backend(_))));
    }

    /// Store whose publish step always fails
    struct NoPublish(MemoryStore);

    #[derive(Debug, thiserror::Error)]
    #[error("403 publicAccessPrevention is enforced")]
    struct AccessPrevented;

    #[async_trait]
    impl ObjectStore for NoPublish {
        fn name(&self) -> &str {
            "no-publish"
        }
        async fn exists(&self, object: ObjectRef<'_>) -> Result<bool> {
            self.0.exists(object).await
        }
        async fn signed_url(&self, object: ObjectRef<'_>, expires_at: DateTime<Utc>) -> Result<String> {
            self.0.signed_url(object, expires_at).await
        }
        async fn upload(&self, object: ObjectRef<'_>, content: Content, options: &UploadOptions) -> Result<()> {
            self.0.upload(object, content, options).await
        }
        async fn delete(&self, object: ObjectRef<'_>) -> Result<()> {
            self.0.delete(object).await
        }
        async fn copy(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
            self.0.copy(from, to).await
        }
        async fn rename(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
            self.0.rename(from, to).await
        }
        async fn make_public(&self, _object: ObjectRef<'_>) -> Result<()> {
            Err(Error::backend(AccessPrevented))
        }
        async fn make_private(&self, object: ObjectRef<'_>) -> Result<()> {
            self.0.make_private(object).await
        }
        fn read_stream(&self, object: ObjectRef<'_>) -> ByteStream {
            self.0.read_stream(object)
        }
        async fn metadata(&self, object: ObjectRef<'_>) -> Result<ObjectMetadata> {
            self.0.metadata(object).await
        }
        async fn download_to(&self, object: ObjectRef<'_>, dest: &Path) -> Result<()> {
            self.0.download_to(object, dest).await
        }
    }

    #[tokio::test]
    async fn test_failed_publish_surfaces_error_and_keeps_copy() {
        let memory = MemoryStore::new();
        let disk = Disk::new(Arc::new(NoPublish(memory.clone())), "assets");
        disk.put("a.txt", b"a".as_slice(), WriteOptions::default()).await.unwrap();

        let err = disk
            .copy("a.txt", "b.txt", None, WriteOptions::public())
            .await
            .unwrap_err();
        assert!(err.as_backend().unwrap().is::<AccessPrevented>());
        assert!(memory.exists(ObjectRef::new("assets", "b.txt")).await.unwrap());

        let err = disk
            .move_object("a.txt", "c.txt", Some("cdn"), WriteOptions::public())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert!(!memory.exists(ObjectRef::new("assets", "a.txt")).await.unwrap());
        assert!(memory.exists(ObjectRef::new("cdn", "c.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_skipped_without_option() {
        let disk = Disk::new(Arc::new(NoPublish(MemoryStore::new())), "assets");
        disk.put("a.txt", b"a".as_slice(), WriteOptions::default()).await.unwrap();
        let url = disk.copy("a.txt", "b.txt", None, WriteOptions::default()).await.unwrap();
        assert_eq!(url, disk.url("b.txt"));
    }
}
