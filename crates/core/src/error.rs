//! Error types for gcsdisk-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gcsdisk-core
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error as surfaced by a storage backend
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for gcsdisk-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// Any failure reported by the storage backend, carried as-is
    #[error("Storage backend error: {0}")]
    Backend(#[source] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not found error (drivers, disks)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Already registered
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Wrap a backend error without touching it
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BackendError>,
    {
        Error::Backend(err.into())
    }

    /// Returns the backend error, if this is one
    pub fn as_backend(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Generic SdkError conversion for all S3 operations
impl<E> From<aws_sdk_s3::error::SdkError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        Error::backend(err)
    }
}

// ByteStreamError conversion
impl From<aws_sdk_s3::primitives::ByteStreamError> for Error {
    fn from(err: aws_sdk_s3::primitives::ByteStreamError) -> Self {
        Error::backend(err)
    }
}

impl From<aws_sdk_s3::error::BuildError> for Error {
    fn from(err: aws_sdk_s3::error::BuildError) -> Self {
        Error::backend(err)
    }
}

impl From<aws_sdk_s3::presigning::PresigningConfigError> for Error {
    fn from(err: aws_sdk_s3::presigning::PresigningConfigError) -> Self {
        Error::backend(err)
    }
}
