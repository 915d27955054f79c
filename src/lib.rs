//! Video Importer Library
//!
//! Finds camera SD cards and AVCHD volumes among the mounted filesystems,
//! lists the video clips on them, and copies a selection into a folder with
//! byte-accurate, monotonic progress and cancellation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`volume`] - Mount enumeration and camera volume classification
//! - [`media`] - Video file discovery on a camera volume
//! - [`core`] - Configuration, error types, and the bulk copy engine
//! - [`ui`] - Background controller, events, and volume hot-plug monitoring
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use video_importer::core::copier::BulkCopyEngine;
//! use video_importer::media::MediaLocator;
//! use video_importer::volume::{ScanOptions, VolumeScanner};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let scanner = VolumeScanner::system(ScanOptions::default());
//!     let volumes = scanner.scan_volumes();
//!
//!     if let Some(volume) = volumes.first() {
//!         let clips = MediaLocator::new().find_video_files(volume);
//!         let sources: Vec<_> = clips.into_iter().map(|c| c.path).collect();
//!
//!         let summary = BulkCopyEngine::new().copy_files(
//!             &sources,
//!             Path::new("/home/me/Videos"),
//!             |fraction| println!("{:.0}%", fraction * 100.0),
//!         )?;
//!         println!("Copied {} file(s)", summary.files_copied);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without a Camera
//!
//! [`volume::StaticMounts`] stands in for the system mount table, so any
//! directory laid out like a card can be scanned:
//!
//! ```rust,no_run
//! use video_importer::volume::{ScanOptions, StaticMounts, VolumeScanner};
//!
//! let mounts = StaticMounts::from_paths(["/tmp/fake-card"]);
//! let scanner = VolumeScanner::new(mounts, ScanOptions::immediate());
//! assert_eq!(scanner.scan_volumes().len(), 1);
//! ```

pub mod cli;
pub mod core;
pub mod media;
pub mod ui;
pub mod volume;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
