//! Bucket selection: a default bucket plus a one-shot override.

/// Chooses the bucket an operation runs against.
///
/// The pending override is read-then-cleared by [`BucketSelector::resolve`],
/// so it never survives past the first resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSelector {
    default_bucket: String,
    pending_override: Option<String>,
}

impl BucketSelector {
    /// Create a selector with no pending override
    pub fn new(default_bucket: impl Into<String>) -> Self {
        Self {
            default_bucket: default_bucket.into(),
            pending_override: None,
        }
    }

    /// Use `name` for the next resolution only
    pub fn set_override(&mut self, name: impl Into<String>) {
        self.pending_override = Some(name.into());
    }

    /// Take the pending override, or fall back to the default bucket
    pub fn resolve(&mut self) -> String {
        self.pending_override
            .take()
            .unwrap_or_else(|| self.default_bucket.clone())
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default() {
        let mut selector = BucketSelector::new("assets");
        assert_eq!(selector.resolve(), "assets");
        assert_eq!(selector.resolve(), "assets");
    }

    #[test]
    fn test_override_is_consumed_once() {
        let mut selector = BucketSelector::new("assets");
        selector.set_override("backups");

        assert_eq!(selector.resolve(), "backups");
        assert_eq!(selector.resolve(), "assets");
    }

    #[test]
    fn test_last_override_wins() {
        let mut selector = BucketSelector::new("assets");
        selector.set_override("one");
        selector.set_override("two");
        assert_eq!(selector.resolve(), "two");
        assert_eq!(selector.default_bucket(), "assets");
    }
}
