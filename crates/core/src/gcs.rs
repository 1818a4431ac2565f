//! GCS backend using the AWS S3 SDK against the XML interoperability API

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{
        retry::RetryConfig, Credentials, Region, RequestChecksumCalculation,
        ResponseChecksumValidation,
    },
    error::SdkError,
    operation::head_object::HeadObjectError,
    presigning::PresigningConfig,
    primitives::ByteStream as S3ByteStream,
    types::{AccessControlPolicy, Grant, Grantee, ObjectCannedAcl, Owner, Permission, Type},
    Client,
};
use chrono::{DateTime, Utc};
use futures::{stream, TryStreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::credentials::{load_key_file, ServiceAccountKey};
use crate::error::{Error, Result};
use crate::store::{ByteStream, Content, ObjectMetadata, ObjectRef, ObjectStore, UploadOptions};
use crate::url::GCS_ENDPOINT;

/// Grantee URI for anonymous readers
const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Everything but unreserved characters and the path separator is escaped
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Object store backed by Google Cloud Storage
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    endpoint: String,
}

impl GcsStore {
    /// Create a store talking to the public GCS endpoint
    pub fn new(key: &ServiceAccountKey) -> Result<Self> {
        Self::with_endpoint(key, GCS_ENDPOINT)
    }

    /// Create a store from a key file on disk
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let key = load_key_file(path)?;
        Self::new(&key)
    }

    /// Create a store talking to another XML-API compatible endpoint
    pub fn with_endpoint(key: &ServiceAccountKey, endpoint: &str) -> Result<Self> {
        let uri: http::Uri = endpoint
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;
        if uri.host().is_none() {
            return Err(Error::InvalidConfig(format!("Endpoint '{}' has no host", endpoint)));
        }

        let credentials = Credentials::new(&key.access_id, &key.secret, None, None, "gcsdisk");

        // GCS rejects the SDK's default flexible checksums; the adapter never retries.
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn put_grants(
        &self,
        object: ObjectRef<'_>,
        owner: Option<Owner>,
        grants: Vec<Grant>,
    ) -> Result<()> {
        let policy = AccessControlPolicy::builder()
            .set_owner(owner)
            .set_grants(Some(grants))
            .build();

        self.client
            .put_object_acl()
            .bucket(object.bucket)
            .key(object.key)
            .access_control_policy(policy)
            .send()
            .await?;

        Ok(())
    }
}

fn is_not_found(err: &SdkError<HeadObjectError>) -> bool {
    if err
        .as_service_error()
        .map(HeadObjectError::is_not_found)
        .unwrap_or(false)
    {
        return true;
    }
    // HEAD responses carry no body, so the modeled error is not always populated
    err.raw_response()
        .map(|response| response.status().as_u16() == http::StatusCode::NOT_FOUND.as_u16())
        .unwrap_or(false)
}

/// `x-amz-copy-source` value; the header is not escaped by the SDK
fn copy_source(object: ObjectRef<'_>) -> String {
    format!(
        "{}/{}",
        utf8_percent_encode(object.bucket, COPY_SOURCE),
        utf8_percent_encode(object.key, COPY_SOURCE)
    )
}

fn is_all_users(grant: &Grant) -> bool {
    grant
        .grantee()
        .and_then(|grantee| grantee.uri())
        .map(|uri| uri == ALL_USERS_URI)
        .unwrap_or(false)
}

fn is_public_read(grant: &Grant) -> bool {
    is_all_users(grant) && grant.permission() == Some(&Permission::Read)
}

fn public_read_grant() -> Result<Grant> {
    let grantee = Grantee::builder()
        .r#type(Type::Group)
        .uri(ALL_USERS_URI)
        .build()?;

    Ok(Grant::builder()
        .grantee(grantee)
        .permission(Permission::Read)
        .build())
}

fn to_chrono(time: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn body_stream(body: S3ByteStream) -> ByteStream {
    Box::pin(stream::try_unfold(body, |mut body| async move {
        let chunk = body.try_next().await?;
        Ok::<_, Error>(chunk.map(|chunk| (chunk, body)))
    }))
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn exists(&self, object: ObjectRef<'_>) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => {
                debug!(%object, "object not found");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn signed_url(&self, object: ObjectRef<'_>, expires_at: DateTime<Utc>) -> Result<String> {
        // A past expiry signs a zero-length window; GCS rejects it on use
        let expires_in = (expires_at - Utc::now()).to_std().unwrap_or_default();
        let presigning = PresigningConfig::expires_in(expires_in)?;

        let request = self
            .client
            .get_object()
            .bucket(object.bucket)
            .key(object.key)
            .presigned(presigning)
            .await?;

        Ok(request.uri().to_string())
    }

    async fn upload(
        &self,
        object: ObjectRef<'_>,
        content: Content,
        options: &UploadOptions,
    ) -> Result<()> {
        let body = match content {
            Content::Bytes(bytes) => S3ByteStream::from(bytes),
            Content::File(path) => S3ByteStream::from_path(&path).await?,
            // Unknown length: buffered before the request is sent
            content @ Content::Stream(_) => S3ByteStream::from(content.into_bytes().await?),
        };

        let mut request = self
            .client
            .put_object()
            .bucket(object.bucket)
            .key(object.key)
            .body(body)
            .content_type(&options.content_type);

        if options.public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await?;

        Ok(())
    }

    async fn delete(&self, object: ObjectRef<'_>) -> Result<()> {
        self.client
            .delete_object()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await?;

        Ok(())
    }

    async fn copy(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
        self.client
            .copy_object()
            .bucket(to.bucket)
            .key(to.key)
            .copy_source(copy_source(from))
            .send()
            .await?;

        Ok(())
    }

    async fn rename(&self, from: ObjectRef<'_>, to: ObjectRef<'_>) -> Result<()> {
        // The XML API has no native move: copy, then remove the source
        self.copy(from, to).await?;
        if from == to {
            return Ok(());
        }
        self.delete(from).await
    }

    async fn make_public(&self, object: ObjectRef<'_>) -> Result<()> {
        let acl = self
            .client
            .get_object_acl()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await?;

        let mut grants = acl.grants().to_vec();
        if !grants.iter().any(is_public_read) {
            grants.push(public_read_grant()?);
        }

        self.put_grants(object, acl.owner().cloned(), grants).await
    }

    async fn make_private(&self, object: ObjectRef<'_>) -> Result<()> {
        let acl = self
            .client
            .get_object_acl()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await?;

        let grants: Vec<Grant> = acl
            .grants()
            .iter()
            .filter(|grant| !is_all_users(grant))
            .cloned()
            .collect();

        self.put_grants(object, acl.owner().cloned(), grants).await
    }

    fn read_stream(&self, object: ObjectRef<'_>) -> ByteStream {
        let request = self
            .client
            .get_object()
            .bucket(object.bucket)
            .key(object.key);

        let body = async move {
            let output = request.send().await?;
            Ok::<_, Error>(body_stream(output.body))
        };

        Box::pin(stream::once(body).try_flatten())
    }

    async fn metadata(&self, object: ObjectRef<'_>) -> Result<ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await?;

        Ok(ObjectMetadata {
            bucket: object.bucket.to_string(),
            name: object.key.to_string(),
            size: response.content_length().unwrap_or(0).max(0) as u64,
            content_type: response.content_type().map(str::to_string),
            etag: response.e_tag().map(str::to_string),
            updated: response.last_modified().and_then(to_chrono),
            storage_class: response.storage_class().map(|class| class.as_str().to_string()),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    async fn download_to(&self, object: ObjectRef<'_>, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get_object()
            .bucket(object.bucket)
            .key(object.key)
            .send()
            .await?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
