//! Driver registry: builds disks by driver name.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::DiskConfig;
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::gcs::GcsStore;
use crate::memory::MemoryStore;

/// Factory function type for creating disks.
pub type DriverFactory = Box<dyn Fn(&DiskConfig) -> Result<Disk> + Send + Sync>;

/// Registry for disk drivers.
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Driver '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build a disk from its configuration, using `config.driver`.
    ///
    /// # Errors
    /// - Driver not found
    /// - Configuration invalid for the driver
    pub fn resolve(&self, config: &DiskConfig) -> Result<Disk> {
        let factory = self.factories.get(&config.driver).ok_or_else(|| {
            Error::NotFound(format!("Driver '{}' is not registered", config.driver))
        })?;
        debug!(driver = %config.driver, bucket = %config.bucket, "building disk");
        factory(config)
    }

    /// Get list of registered driver names.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a driver is registered.
    pub fn has_driver(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn gcs_driver(config: &DiskConfig) -> Result<Disk> {
    let key_filename = config
        .key_filename
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("The gcs driver requires 'keyFilename'".to_string()))?;
    let store = GcsStore::from_key_file(key_filename)?;
    Ok(Disk::new(Arc::new(store), config.bucket.clone()))
}

fn memory_driver(config: &DiskConfig) -> Result<Disk> {
    Ok(Disk::new(Arc::new(MemoryStore::new()), config.bucket.clone()))
}

/// Create a registry with the built-in drivers.
pub fn create_default_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.factories.insert("gcs".to_string(), Box::new(gcs_driver));
    registry.factories.insert("memory".to_string(), Box::new(memory_driver));
    registry
}
