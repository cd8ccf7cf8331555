// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Defines all subcommands and global flags

use crate::settings::Overrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Sync website posts with a local Markdown vault", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Website base URL
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// API secret (overrides settings/env)
    #[arg(long, global = true)]
    pub secret: Option<String>,

    /// Vault root directory
    #[arg(long, global = true)]
    pub vault: Option<PathBuf>,

    /// Path to settings.json
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Posts fetched in parallel
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Disable throttling (not recommended)
    #[arg(long, global = true)]
    pub no_throttle: bool,

    /// Throttle range in ms (min:max)
    #[arg(long, global = true, value_parser = parse_throttle_range)]
    pub throttle_ms: Option<(u64, u64)>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

fn parse_throttle_range(s: &str) -> Result<(u64, u64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err("Expected format: min:max".into());
    }

    let min = parts[0].parse().map_err(|_| "Invalid min value")?;
    let max = parts[1].parse().map_err(|_| "Invalid max value")?;

    if min > max {
        return Err("min must be <= max".into());
    }

    Ok((min, max))
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Fetch every post into the vault (default)
    FetchAll,

    /// Fetch a single post by ID
    Fetch {
        /// Post ID to fetch
        id: String,
    },

    /// Re-fetch the post a vault document belongs to
    FetchOpen {
        /// Document path, absolute or relative to the vault
        path: PathBuf,
    },

    /// Publish a vault document and its new attachments
    Push {
        /// Document path, absolute or relative to the vault
        path: PathBuf,
    },

    /// List post IDs on the website
    List,

    /// Print a vault document's unpacked form as JSON
    Unpack {
        /// Document path, absolute or relative to the vault
        path: PathBuf,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::FetchAll)
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            domain: self.domain.clone(),
            secret: self.secret.clone(),
            vault: self.vault.clone(),
            concurrency: self.concurrency,
            settings_path: self.settings.clone(),
        }
    }
}
