//! CLI argument definitions for Bundlever.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUNDLEVER_GIT_COMMIT"),
    ", built ",
    env!("BUNDLEVER_BUILD_TIMESTAMP"),
    ")"
);

/// Bundlever - rewrite the OS version fields of a device backup bundle.
///
/// Start with `bundlever show <bundle>` to see the versions a backup carries.
#[derive(Parser, Debug)]
#[command(name = "bundlever")]
#[command(author, version, long_version = LONG_VERSION, about = "Update Product/Build Version in backup bundle plists", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Increase log verbosity (-v info, -vv debug); BUNDLEVER_LOG overrides
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the current Product/Build versions of both plists
    Show {
        /// Path to backup bundle (e.g., *.mobiletransfer)
        bundle: PathBuf,
    },

    /// Overwrite the Product/Build versions in Info.plist and Manifest.plist
    ///
    /// Missing --version/--build values are prompted for interactively.
    Update {
        /// Path to backup bundle (e.g., *.mobiletransfer)
        bundle: PathBuf,

        /// Target Product Version (e.g., 17.0)
        #[arg(long = "version")]
        product_version: Option<String>,

        /// Target Build Version (e.g., 21A123)
        #[arg(long = "build")]
        build_version: Option<String>,

        /// Create .bak files before writing
        #[arg(long, overrides_with = "no_backup")]
        backup: bool,

        /// Do not create .bak files, even if config.kdl asks for them
        #[arg(long)]
        no_backup: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show the resolved configuration and where each value came from
    Config,
}

impl Commands {
    /// Backup override from the command line, if any.
    pub fn backup_override(&self) -> Option<bool> {
        match self {
            Commands::Update {
                backup, no_backup, ..
            } => {
                if *backup {
                    Some(true)
                } else if *no_backup {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
