//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "image-import")]
#[command(about = "Derive and merge image records from container image manifests")]
#[command(version)]
pub struct Args {
    /// Settings file (ImportConfig JSON); defaults come from IMAGE_IMPORT_* variables
    #[arg(long = "settings", global = true)]
    pub settings: Option<PathBuf>,

    /// Registry URL used to resolve manifest lists
    #[arg(long = "registry", global = true, requires = "repository")]
    pub registry: Option<String>,

    /// Repository within the registry, e.g. library/busybox
    #[arg(long = "repository", global = true)]
    pub repository: Option<String>,

    /// Bearer token for the registry
    #[arg(long = "token", global = true, env = "IMAGE_IMPORT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long = "skip-tls", short = 'k', global = true)]
    pub skip_tls: bool,

    /// Enable debug logging
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive layers and metadata from a manifest and print the image record
    Inspect {
        /// Raw manifest file
        #[arg(long = "manifest", short = 'm')]
        manifest: PathBuf,

        /// Raw config blob file
        #[arg(long = "config", short = 'c')]
        config: Option<PathBuf>,

        /// Declared manifest media type
        #[arg(long = "media-type", default_value = "")]
        media_type: String,

        /// Image name; a digest-shaped name is verified against the manifest
        #[arg(long = "name", default_value = "")]
        name: String,
    },
    /// Run the create path on an image JSON document
    Create {
        #[arg(long = "image", short = 'i')]
        image: PathBuf,
    },
    /// Run the update path of a candidate image against a stored one
    Update {
        #[arg(long = "existing", short = 'e')]
        existing: PathBuf,

        #[arg(long = "image", short = 'i')]
        image: PathBuf,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }
}
