use anyhow::Result;
use clap::{CommandFactory, Parser};
use color_eyre::config::HookBuilder;
use gcsdisk_core::{get_config_path, DiskConfig};
use std::path::PathBuf;

mod handlers;

/// gcsdisk - work with objects on configured Google Cloud Storage disks
#[derive(Parser, Debug)]
#[command(name = "gcsdisk")]
#[command(version)]
#[command(about = "Work with objects on configured Google Cloud Storage disks", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/gcsdisk/config.toml)
    #[arg(long, global = true, env = "GCSDISK_CONFIG")]
    config: Option<PathBuf>,

    /// Disk to use (default: the configured default disk)
    #[arg(short, long, global = true)]
    disk: Option<String>,

    /// Bucket to use for this command only
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    /// Command to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Object(ObjectAction),

    /// Write a configuration with a single disk
    Init {
        /// Default bucket of the disk
        bucket: String,
        /// Disk name
        #[arg(long, default_value = "default")]
        name: String,
        /// Driver building the disk (gcs, memory)
        #[arg(long, default_value = "gcs")]
        driver: String,
        /// Service-account key file (required by the gcs driver)
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Shell completion
    Completion {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ObjectAction {
    /// Check whether an object exists
    Exists { location: String },
    /// Print the public URL of an object
    Url { location: String },
    /// Generate a signed URL
    Sign {
        location: String,
        /// Expiration in seconds
        #[arg(short, long, default_value = "3600")]
        expires: u64,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Upload a local file
    Put {
        /// Local file to upload
        file: PathBuf,
        /// Destination key
        location: String,
        /// Make the object publicly readable
        #[arg(long)]
        public: bool,
    },
    /// Delete an object
    Delete { location: String },
    /// Copy an object
    Copy {
        src: String,
        dest: String,
        /// Destination bucket (default: the source bucket)
        #[arg(long)]
        dest_bucket: Option<String>,
        /// Make the copy publicly readable
        #[arg(long)]
        public: bool,
    },
    /// Move an object
    Move {
        src: String,
        dest: String,
        /// Destination bucket (default: the source bucket)
        #[arg(long)]
        dest_bucket: Option<String>,
        /// Make the moved object publicly readable
        #[arg(long)]
        public: bool,
    },
    /// Grant public read on an object
    Publish { location: String },
    /// Revoke public read on an object
    Unpublish { location: String },
    /// Stream an object to stdout
    Cat { location: String },
    /// Show object metadata
    Stat {
        location: String,
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Download an object into ./tmp
    Download { location: String },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Show the configured disks
    Show,
    /// Validate the configuration and build every disk
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Completion { shell } => {
            handlers::init_tracing(None);
            handlers::handle_completion(&shell, &mut Cli::command())
        }
        Commands::Init { bucket, name, driver, key_file, force } => {
            handlers::init_tracing(None);
            let path = match cli.config {
                Some(path) => path,
                None => get_config_path()?,
            };
            let disk = DiskConfig {
                driver,
                key_filename: key_file,
                bucket,
            };
            handlers::handle_init(&path, name, disk, force)
        }
        Commands::Config { action } => {
            let config = handlers::load(cli.config.as_deref())?;
            handlers::init_tracing(config.logging.as_ref().map(|l| l.level.as_str()));
            handlers::handle_config(&config, action)
        }
        Commands::Object(action) => {
            let config = handlers::load(cli.config.as_deref())?;
            handlers::init_tracing(config.logging.as_ref().map(|l| l.level.as_str()));
            let disk = handlers::open_disk(&config, cli.disk.as_deref())?;
            handlers::handle_object(&disk, cli.bucket.as_deref(), action).await
        }
    }
}
