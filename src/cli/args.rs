//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Find camera cards and AVCHD volumes and copy their clips off
#[derive(Parser, Debug)]
#[command(name = "video-importer")]
#[command(author = "Vihaan Reddy M")]
#[command(version)]
#[command(about = "Find camera SD cards and AVCHD volumes, pick clips and copy them with byte-accurate progress", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Scan this directory as if it were a mounted volume (can be specified
    /// multiple times; replaces the system mount table)
    #[arg(long = "root", value_name = "PATH", global = true)]
    pub roots: Vec<PathBuf>,

    /// Number of clips copied at the same time (overrides config)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Minimum scan duration in milliseconds, 0 to disable (overrides config)
    #[arg(long = "min-scan-ms", value_name = "MS", global = true)]
    pub min_scan_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List mounted camera volumes
    Volumes {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the video clips on a camera volume
    Files {
        /// Volume name or mount path (prompted for when several are mounted)
        #[arg(short, long)]
        volume: Option<String>,

        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pick clips on a camera volume and copy them to a folder
    ///
    /// Clips are copied flat into the output folder. A clip with the same
    /// name already in the folder is overwritten.
    Import {
        /// Volume name or mount path (prompted for when several are mounted)
        #[arg(short, long)]
        volume: Option<String>,

        /// Copy every clip without prompting
        #[arg(short, long)]
        all: bool,

        /// Destination folder (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only consider clips whose file name matches this glob, e.g. "*.MTS"
        /// (can be specified multiple times)
        #[arg(short, long = "pattern", value_name = "GLOB")]
        patterns: Vec<String>,
    },

    /// Wait until a camera volume is mounted, then print it
    Watch {
        /// Give up after this many seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Open the configuration file in your default editor
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\video_importer\config.toml
    /// - Linux/macOS: ~/.config/video_importer/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}
