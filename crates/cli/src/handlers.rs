//! Command handlers for gcsdisk CLI

use anyhow::{Context, Result};
use clap::Command;
use clap_complete::{generate, Shell as ClapShell};
use futures::TryStreamExt;
use gcsdisk_core::{
    create_default_registry, load_config, load_config_from, save_config_to, validate_config,
    ConfigFile, Disk, DiskConfig, DiskManager, LoggingConfig, ObjectMetadata, WriteOptions,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::{ConfigAction, ObjectAction};

/// Install the stderr subscriber; `RUST_LOG` wins over the configured level
pub fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load configuration from `path`, or the default location
pub fn load(path: Option<&Path>) -> Result<ConfigFile> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Build the configured disks and pick one
pub fn open_disk(config: &ConfigFile, name: Option<&str>) -> Result<Arc<Disk>> {
    let manager = DiskManager::from_config(config, &create_default_registry())?;
    let disk = manager.disk_or_default(name)?;
    debug!(disk = name.unwrap_or(config.default.as_str()), driver = disk.driver(), "disk opened");
    Ok(disk)
}

/// Write a one-disk configuration to `path`
pub fn handle_init(path: &Path, name: String, disk: DiskConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }

    let mut disks = BTreeMap::new();
    disks.insert(name.clone(), disk);
    let config = ConfigFile {
        default: name,
        disks,
        logging: Some(LoggingConfig::default()),
    };

    validate_config(&config)?;
    save_config_to(&config, path)?;
    debug!(path = %path.display(), "configuration written");

    println!("✅ Configuration saved to {}", path.display());
    Ok(())
}

/// Handle config commands
pub fn handle_config(config: &ConfigFile, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            #[derive(Tabled)]
            struct DiskRow {
                name: String,
                driver: String,
                bucket: String,
                key_file: String,
            }

            let rows: Vec<DiskRow> = config
                .disks
                .iter()
                .map(|(name, disk)| DiskRow {
                    name: if *name == config.default {
                        format!("{} (default)", name)
                    } else {
                        name.clone()
                    },
                    driver: disk.driver.clone(),
                    bucket: disk.bucket.clone(),
                    key_file: disk
                        .key_filename
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();

            println!("{}", Table::new(rows));
            Ok(())
        }
        ConfigAction::Validate => {
            println!("Validating configuration...");

            validate_config(config)?;
            println!("  ✅ Valid configuration format");

            let manager = DiskManager::from_config(config, &create_default_registry())?;
            for name in manager.names() {
                let disk = manager.disk(name)?;
                println!("  ✅ Disk '{}' ready ({} → {})", name, disk.driver(), disk.default_bucket());
            }

            Ok(())
        }
    }
}

/// Handle object commands against one disk
pub async fn handle_object(disk: &Disk, bucket: Option<&str>, action: ObjectAction) -> Result<()> {
    let options = |public: bool| WriteOptions { public };

    match action {
        ObjectAction::Exists { location } => {
            let exists = disk.scoped(bucket).exists(&location).await?;
            println!("{}", exists);
        }
        ObjectAction::Url { location } => {
            println!("{}", disk.scoped(bucket).url(&location));
        }
        ObjectAction::Sign { location, expires, output } => {
            let expires_at = i64::try_from(expires)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| anyhow::anyhow!("Expiration out of range: {} seconds", expires))?;
            let url = disk.scoped(bucket).signed_url(&location, expires_at).await?;

            match output.as_str() {
                "json" => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "location": location,
                            "url": url,
                            "expires_in": expires,
                            "expires_at": expires_at,
                        })
                    );
                }
                _ => println!("{}", url),
            }
        }
        ObjectAction::Put { file, location, public } => {
            if !file.exists() {
                return Err(anyhow::anyhow!("File not found: {}", file.display()));
            }
            let url = disk
                .scoped(bucket)
                .put(&location, file.as_path(), options(public))
                .await?;
            println!("{}", url);
        }
        ObjectAction::Delete { location } => {
            disk.scoped(bucket).delete(&location).await?;
            eprintln!("  ✅ Deleted {}", location);
        }
        ObjectAction::Copy { src, dest, dest_bucket, public } => {
            let url = disk
                .scoped(bucket)
                .copy(&src, &dest, dest_bucket.as_deref(), options(public))
                .await?;
            println!("{}", url);
        }
        ObjectAction::Move { src, dest, dest_bucket, public } => {
            let url = disk
                .scoped(bucket)
                .move_object(&src, &dest, dest_bucket.as_deref(), options(public))
                .await?;
            println!("{}", url);
        }
        ObjectAction::Publish { location } => {
            disk.scoped(bucket).make_public(&location).await?;
            eprintln!("  ✅ {} is public", location);
        }
        ObjectAction::Unpublish { location } => {
            disk.scoped(bucket).make_private(&location).await?;
            eprintln!("  ✅ {} is private", location);
        }
        ObjectAction::Cat { location } => {
            let stream = disk
                .scoped(bucket)
                .stream(&location)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
            let mut reader = StreamReader::new(stream);
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout)
                .await
                .with_context(|| format!("Failed to read {}", location))?;
            stdout.flush().await?;
        }
        ObjectAction::Stat { location, output } => {
            let meta = disk.scoped(bucket).metadata(&location).await?;
            match output.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&meta)?),
                _ => print_metadata(&meta),
            }
        }
        ObjectAction::Download { location } => {
            let path = disk.scoped(bucket).download(&location).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn print_metadata(meta: &ObjectMetadata) {
    #[derive(Tabled)]
    struct FieldRow {
        field: &'static str,
        value: String,
    }

    let or_dash = |value: Option<&String>| value.cloned().unwrap_or_else(|| "-".to_string());

    let rows = vec![
        FieldRow { field: "bucket", value: meta.bucket.clone() },
        FieldRow { field: "name", value: meta.name.clone() },
        FieldRow { field: "size", value: format_bytes(meta.size) },
        FieldRow { field: "content type", value: or_dash(meta.content_type.as_ref()) },
        FieldRow { field: "etag", value: or_dash(meta.etag.as_ref()) },
        FieldRow {
            field: "updated",
            value: meta
                .updated
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        },
        FieldRow { field: "storage class", value: or_dash(meta.storage_class.as_ref()) },
    ];

    println!("{}", Table::new(rows));
}

/// Format bytes to human-readable size
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Handle shell completion generation
pub fn handle_completion(shell: &str, cmd: &mut Command) -> Result<()> {
    let clap_shell = match shell {
        "bash" => ClapShell::Bash,
        "zsh" => ClapShell::Zsh,
        "fish" => ClapShell::Fish,
        "elvish" => ClapShell::Elvish,
        "powershell" | "pwsh" => ClapShell::PowerShell,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported shell: {}\nSupported shells: bash, zsh, fish, elvish, powershell",
                shell
            ));
        }
    };

    generate(clap_shell, cmd, "gcsdisk", &mut std::io::stdout());

    Ok(())
}
