//! Named disks built from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{validate_config, ConfigFile};
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::registry::DriverRegistry;

/// Holds every configured disk and hands them out by name
#[derive(Debug)]
pub struct DiskManager {
    default: String,
    disks: BTreeMap<String, Arc<Disk>>,
}

impl DiskManager {
    /// Validate the configuration and build every disk through `registry`
    pub fn from_config(config: &ConfigFile, registry: &DriverRegistry) -> Result<Self> {
        validate_config(config)?;

        let disks = config
            .disks
            .iter()
            .map(|(name, disk)| Ok((name.clone(), Arc::new(registry.resolve(disk)?))))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            default: config.default.clone(),
            disks,
        })
    }

    /// Get a disk by name
    pub fn disk(&self, name: &str) -> Result<Arc<Disk>> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Disk '{}' is not configured", name)))
    }

    /// Get the named disk, or the default one
    pub fn disk_or_default(&self, name: Option<&str>) -> Result<Arc<Disk>> {
        self.disk(name.unwrap_or(self.default.as_str()))
    }

    pub fn default_disk(&self) -> Result<Arc<Disk>> {
        self.disk(&self.default)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.disks.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskConfig;
    use crate::disk::WriteOptions;
    use crate::registry::create_default_registry;

    fn config() -> ConfigFile {
        let mut disks = BTreeMap::new();
        disks.insert("local".to_string(), DiskConfig::memory("local-bucket"));
        disks.insert("scratch".to_string(), DiskConfig::memory("scratch-bucket"));
        ConfigFile {
            default: "local".to_string(),
            disks,
            logging: None,
        }
    }

    #[test]
    fn test_disk_lookup() {
        let manager = DiskManager::from_config(&config(), &create_default_registry()).unwrap();

        assert_eq!(manager.default_disk().unwrap().default_bucket(), "local-bucket");
        assert_eq!(manager.disk("scratch").unwrap().default_bucket(), "scratch-bucket");
        assert_eq!(
            manager.disk_or_default(None).unwrap().default_bucket(),
            "local-bucket"
        );
        assert!(matches!(manager.disk("media"), Err(Error::NotFound(_))));
        assert_eq!(manager.names().collect::<Vec<_>>(), vec!["local", "scratch"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.default = "missing".to_string();
        assert!(DiskManager::from_config(&config, &create_default_registry()).is_err());
    }

    #[tokio::test]
    async fn test_same_disk_is_shared() {
        let manager = DiskManager::from_config(&config(), &create_default_registry()).unwrap();

        manager
            .disk("local")
            .unwrap()
            .put("a.txt", b"a".as_slice(), WriteOptions::default())
            .await
            .unwrap();

        assert!(manager.disk("local").unwrap().exists("a.txt").await.unwrap());
        assert!(!manager.disk("scratch").unwrap().exists("a.txt").await.unwrap());
    }
}
