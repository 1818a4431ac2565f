//! Service-account key loading.
//!
//! GCS's S3-interoperable endpoint authenticates with an HMAC key bound to a
//! service account. The key file is the JSON document GCS returns when the
//! key is created.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// HMAC key of a service account
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountKey {
    #[serde(alias = "access_id", alias = "access_key_id")]
    pub access_id: String,
    #[serde(alias = "secret_access_key")]
    pub secret: String,
    #[serde(default, alias = "service_account_email", alias = "client_email")]
    pub service_account_email: Option<String>,
    #[serde(default, alias = "project_id")]
    pub project_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("access_id", &self.access_id)
            .field("secret", &"<redacted>")
            .field("service_account_email", &self.service_account_email)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Load a key file
pub fn load_key_file(path: &Path) -> Result<ServiceAccountKey> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read key file {}: {}", path.display(), e))
    })?;

    let key: ServiceAccountKey = serde_json::from_str(&content)?;

    if key.access_id.is_empty() || key.secret.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "Key file {} has an empty accessId or secret",
            path.display()
        )));
    }

    Ok(key)
}
