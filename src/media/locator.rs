//! Video file discovery on a camera volume
//!
//! Two sources feed the listing:
//! 1. The AVCHD stream folders `AVCHD/BDMV/STREAM` and
//!    `PRIVATE/AVCHD/BDMV/STREAM`, immediate children with extension `mts`
//! 2. A recursive walk of the whole volume collecting `mp4` and `mov` files,
//!    skipping hidden entries and package-style directories
//!
//! Extensions match case-insensitively. Entries are unique by exact path.
//! Locating never fails; unreadable folders and entries are logged and
//! skipped, and missing metadata falls back to size 0 and the current time.

use crate::volume::Volume;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Stream folders relative to the volume root
pub const STREAM_SUBPATHS: &[&str] = &["AVCHD/BDMV/STREAM", "PRIVATE/AVCHD/BDMV/STREAM"];

/// Extension of AVCHD transport stream clips
pub const STREAM_EXTENSION: &str = "mts";

/// Extensions collected by the recursive walk
pub const CONTAINER_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Directory extensions treated as opaque packages
pub const PACKAGE_EXTENSIONS: &[&str] = &[
    "app",
    "bundle",
    "framework",
    "photoslibrary",
    "fcpbundle",
    "imovielibrary",
    "pkg",
];

/// How a file was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// `.MTS` clip from an AVCHD stream folder
    TransportStream,
    /// `.mp4` / `.mov` file from the recursive walk
    Container,
}

impl MediaKind {
    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::TransportStream => "AVCHD",
            MediaKind::Container => "MP4/MOV",
        }
    }
}

/// A video file on a camera volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path on the volume
    pub path: PathBuf,
    /// File name with extension
    pub name: String,
    /// Size in bytes, 0 if unreadable
    pub size_bytes: u64,
    /// Creation time, or the time of listing if unreadable
    pub created_at: DateTime<Local>,
    /// Discovery source
    pub kind: MediaKind,
}

impl MediaFile {
    /// Build an entry, reading size and timestamp best-effort
    pub fn from_path(path: PathBuf, kind: MediaKind) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (size_bytes, created_at) = match fs::metadata(&path) {
            Ok(meta) => {
                let created = meta
                    .created()
                    .or_else(|_| meta.modified())
                    .map(DateTime::<Local>::from)
                    .unwrap_or_else(|_| Local::now());
                (meta.len(), created)
            }
            Err(e) => {
                debug!("No metadata for {}: {}", path.display(), e);
                (0, Local::now())
            }
        };

        Self {
            path,
            name,
            size_bytes,
            created_at,
            kind,
        }
    }

    /// Size in MB or GB, e.g. `10.5 MB`, `1.25 GB`
    pub fn human_size(&self) -> String {
        human_size(self.size_bytes)
    }

    /// Creation time as shown in listings, e.g. `Mar 4, 2024 at 3:07 PM`
    pub fn display_date(&self) -> String {
        self.created_at.format("%b %-d, %Y at %-I:%M %p").to_string()
    }
}

/// Decimal MB/GB size string
pub fn human_size(bytes: u64) -> String {
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.1} MB", b / MB)
    }
}

/// Finds video files on a camera volume
#[derive(Debug, Clone, Default)]
pub struct MediaLocator {
    /// Follow symbolic links during the recursive walk
    pub follow_links: bool,
}

impl MediaLocator {
    /// Create a locator with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// List the video files on `volume`
    pub fn find_video_files(&self, volume: &Volume) -> Vec<MediaFile> {
        self.find_in(&volume.path)
    }

    /// List the video files under an arbitrary root
    pub fn find_in(&self, root: &Path) -> Vec<MediaFile> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for subpath in STREAM_SUBPATHS {
            for path in list_stream_folder(&root.join(subpath)) {
                if seen.insert(path.clone()) {
                    files.push(MediaFile::from_path(path, MediaKind::TransportStream));
                }
            }
        }
        let stream_count = files.len();

        for path in self.walk_containers(root) {
            if seen.insert(path.clone()) {
                files.push(MediaFile::from_path(path, MediaKind::Container));
            }
        }

        info!(
            "Found {} video file(s) on {} ({} AVCHD, {} MP4/MOV)",
            files.len(),
            root.display(),
            stream_count,
            files.len() - stream_count
        );
        files
    }

    fn walk_containers(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !(is_hidden(entry) || is_package(entry)))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| has_extension(entry.path(), CONTAINER_EXTENSIONS))
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Immediate `.mts` children of a stream folder, sorted by name
fn list_stream_folder(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error reading stream folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| has_extension(path, &[STREAM_EXTENSION]))
        .collect();
    paths.sort();
    debug!("{} clip(s) in {}", paths.len(), dir.display());
    paths
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_package(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && has_extension(entry.path(), PACKAGE_EXTENSIONS)
}
