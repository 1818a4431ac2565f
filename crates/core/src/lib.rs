//! gcsdisk-core - Google Cloud Storage disk adapter
//!
//! This library exposes a small, uniform set of object operations (existence
//! checks, URLs, upload, delete, copy, move, visibility, streaming, metadata,
//! download) on top of a pluggable object store, with a GCS backend speaking
//! the XML interoperability API and an in-memory backend for tests.

pub mod bucket;
pub mod config;
pub mod credentials;
pub mod disk;
pub mod error;
pub mod gcs;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod store;
pub mod url;

// Re-export commonly used types
pub use bucket::BucketSelector;
pub use config::{
    get_config_path, load_config, load_config_from, save_config_to, validate_config,
    validate_disk,
};
pub use config::{ConfigFile, DiskConfig, LoggingConfig};
pub use credentials::{load_key_file, ServiceAccountKey};
pub use disk::{content_type_for, BucketScope, Disk, WriteOptions};
pub use error::{Error, Result};
pub use gcs::GcsStore;
pub use manager::DiskManager;
pub use memory::MemoryStore;
pub use registry::{create_default_registry, DriverFactory, DriverRegistry};
pub use store::{ByteStream, Content, ObjectMetadata, ObjectRef, ObjectStore, UploadOptions};
pub use url::{public_url, GCS_ENDPOINT};
