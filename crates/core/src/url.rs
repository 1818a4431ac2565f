//! Public URL construction for GCS objects

/// Host serving public GCS objects
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// Build the public URL of an object.
///
/// Purely constructive: no escaping, no existence or visibility check.
/// `location` must already be URL-safe.
pub fn public_url(bucket: &str, location: &str) -> String {
    format!("{}/{}/{}", GCS_ENDPOINT, bucket, location)
}
