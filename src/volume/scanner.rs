//! Camera volume detection
//!
//! A mounted root is reported as a camera volume when it is not a system
//! volume and carries an AVCHD tree, either at `<root>/AVCHD` or at
//! `<root>/PRIVATE/AVCHD`. A scan never fails: any per-volume error demotes
//! that volume to "skip".

use super::system::SystemMounts;
use super::traits::{MountPoint, MountSource, StaticMounts};
use crate::core::config::ScanConfig;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Volume names that always belong to the internal disk
pub const SYSTEM_VOLUME_NAMES: &[&str] = &["Macintosh HD", "Data", "System", "Preboot", "Recovery"];

/// Minimum wall time of a scan
pub const DEFAULT_MIN_SCAN_DURATION: Duration = Duration::from_millis(1500);

/// A mounted camera volume
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volume {
    /// Mount root
    pub path: PathBuf,
    /// Name shown to the user
    pub display_name: String,
    /// Total capacity in bytes, 0 if unknown
    pub capacity_bytes: u64,
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.path.display())
    }
}

/// Why a mounted root was not reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The root filesystem
    RootFilesystem,
    /// Name is on the system deny-list
    SystemName(String),
    /// Filesystem metadata could not be read
    Unreadable(String),
    /// Mounted read-only
    ReadOnly,
    /// No AVCHD tree at either location
    NotACamera,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RootFilesystem => write!(f, "root filesystem"),
            SkipReason::SystemName(name) => write!(f, "system volume name '{}'", name),
            SkipReason::Unreadable(msg) => write!(f, "metadata unreadable: {}", msg),
            SkipReason::ReadOnly => write!(f, "read-only"),
            SkipReason::NotACamera => write!(f, "no AVCHD directory"),
        }
    }
}

/// Scanner options
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// A scan sleeps until at least this much time has passed
    pub min_scan_duration: Duration,
    /// Names treated as system volumes on top of [`SYSTEM_VOLUME_NAMES`]
    pub extra_system_names: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_scan_duration: DEFAULT_MIN_SCAN_DURATION,
            extra_system_names: Vec::new(),
        }
    }
}

impl ScanOptions {
    /// Options from the `[scan]` config section
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            min_scan_duration: config.min_scan_duration(),
            extra_system_names: config.extra_system_volume_names.clone(),
        }
    }

    /// Disable the floor latency
    pub fn immediate() -> Self {
        Self {
            min_scan_duration: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Finds camera volumes among the mounted filesystems
#[derive(Debug, Clone)]
pub struct VolumeScanner {
    source: Arc<dyn MountSource>,
    options: ScanOptions,
}

impl VolumeScanner {
    /// Scanner over an arbitrary mount source
    pub fn new(source: impl MountSource + 'static, options: ScanOptions) -> Self {
        Self {
            source: Arc::new(source),
            options,
        }
    }

    /// Scanner over the system mount table
    pub fn system(options: ScanOptions) -> Self {
        Self::new(SystemMounts::new(), options)
    }

    /// Scanner configured from `[scan]`, scanning `roots` instead of the
    /// system mount table when any are given
    pub fn from_config(config: &ScanConfig, roots: &[PathBuf]) -> Self {
        let options = ScanOptions::from_config(config);
        if roots.is_empty() {
            Self::system(options)
        } else {
            Self::new(StaticMounts::from_paths(roots.iter().cloned()), options)
        }
    }

    /// Options in effect
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan mounted roots and return the camera volumes, in mount order.
    ///
    /// Blocks for at least `min_scan_duration`; run it off any interactive
    /// thread.
    pub fn scan_volumes(&self) -> Vec<Volume> {
        let start = Instant::now();
        let mut seen = HashSet::new();
        let mut volumes = Vec::new();

        for mount in self.source.mounted_roots() {
            if !seen.insert(mount.path.clone()) {
                continue;
            }
            match self.classify(&mount) {
                Ok(volume) => {
                    debug!("Camera volume: {}", volume);
                    volumes.push(volume);
                }
                Err(reason) => debug!("Skipping {}: {}", mount.path.display(), reason),
            }
        }

        let elapsed = start.elapsed();
        if elapsed < self.options.min_scan_duration {
            thread::sleep(self.options.min_scan_duration - elapsed);
        }

        info!("Found {} camera volume(s)", volumes.len());
        volumes
    }

    fn classify(&self, mount: &MountPoint) -> Result<Volume, SkipReason> {
        if mount.path == Path::new("/") {
            return Err(SkipReason::RootFilesystem);
        }

        let display_name = display_name(mount);
        for name in [display_name.as_str(), mount.name.as_str()] {
            if self.is_system_name(name) {
                return Err(SkipReason::SystemName(name.to_string()));
            }
        }

        let stats = self
            .source
            .filesystem_stats(&mount.path)
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        if stats.is_read_only() {
            return Err(SkipReason::ReadOnly);
        }

        if !is_camera_root(&mount.path) {
            return Err(SkipReason::NotACamera);
        }

        Ok(Volume {
            path: mount.path.clone(),
            display_name,
            capacity_bytes: stats.total_bytes,
        })
    }

    fn is_system_name(&self, name: &str) -> bool {
        !name.is_empty()
            && (SYSTEM_VOLUME_NAMES.contains(&name)
                || self.options.extra_system_names.iter().any(|n| n == name))
    }
}

/// Whether `root` carries an AVCHD tree at either supported location
pub fn is_camera_root(root: &Path) -> bool {
    root.join("AVCHD").exists() || root.join("PRIVATE").join("AVCHD").exists()
}

/// Pick a volume by display name or mount path
pub fn find_volume<'a>(volumes: &'a [Volume], query: &str) -> Option<&'a Volume> {
    volumes
        .iter()
        .find(|v| v.path == Path::new(query))
        .or_else(|| volumes.iter().find(|v| v.display_name == query))
        .or_else(|| {
            volumes
                .iter()
                .find(|v| v.display_name.eq_ignore_ascii_case(query))
        })
}

fn display_name(mount: &MountPoint) -> String {
    mount
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .or_else(|| Some(mount.name.clone()).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| mount.path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::traits::FsStats;
    use std::fs;
    use tempfile::TempDir;

    fn card(parent: &Path, name: &str, layout: &str) -> PathBuf {
        let root = parent.join(name);
        fs::create_dir_all(root.join(layout)).unwrap();
        root
    }

    fn scanner(mounts: StaticMounts) -> VolumeScanner {
        VolumeScanner::new(mounts, ScanOptions::immediate())
    }

    #[test]
    fn test_detects_both_avchd_layouts() {
        let tmp = TempDir::new().unwrap();
        let sd = card(tmp.path(), "SD_CARD", "PRIVATE/AVCHD");
        let hdd = card(tmp.path(), "CAMERA_HDD", "AVCHD");
        let plain = card(tmp.path(), "USB_STICK", "Documents");

        let volumes = scanner(StaticMounts::from_paths([&sd, &hdd, &plain])).scan_volumes();

        let paths: Vec<_> = volumes.iter().map(|v| v.path.clone()).collect();
        assert_eq!(paths, vec![sd, hdd]);
        assert_eq!(volumes[0].display_name, "SD_CARD");
    }

    #[test]
    fn test_bare_private_does_not_qualify() {
        let tmp = TempDir::new().unwrap();
        let root = card(tmp.path(), "PHONE", "PRIVATE/M4ROOT");

        assert!(!is_camera_root(&root));
        assert!(scanner(StaticMounts::from_paths([&root])).scan_volumes().is_empty());
    }

    #[test]
    fn test_never_reports_root_or_system_names() {
        let tmp = TempDir::new().unwrap();
        let mac = card(tmp.path(), "Macintosh HD", "AVCHD");
        let data = card(tmp.path(), "Data", "PRIVATE/AVCHD");
        let renamed = card(tmp.path(), "disk2s1", "AVCHD");

        let mounts = StaticMounts::from_paths([PathBuf::from("/"), mac, data])
            .with_mount(MountPoint::new(&renamed).with_name("Recovery"));
        let volumes = scanner(mounts).scan_volumes();

        assert!(volumes.is_empty(), "unexpected volumes: {:?}", volumes);
    }

    #[test]
    fn test_extra_system_names_from_options() {
        let tmp = TempDir::new().unwrap();
        let backup = card(tmp.path(), "TimeMachine", "AVCHD");

        let options = ScanOptions {
            min_scan_duration: Duration::ZERO,
            extra_system_names: vec!["TimeMachine".to_string()],
        };
        let volumes =
            VolumeScanner::new(StaticMounts::from_paths([&backup]), options).scan_volumes();
        assert!(volumes.is_empty());
    }

    #[test]
    fn test_read_only_and_unreadable_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let locked = card(tmp.path(), "LOCKED", "AVCHD");
        let gone = tmp.path().join("EJECTED");

        let mounts = StaticMounts::from_paths([&locked, &gone]).with_read_only(&locked);
        assert!(scanner(mounts).scan_volumes().is_empty());
    }

    #[test]
    fn test_capacity_and_duplicate_mounts() {
        let tmp = TempDir::new().unwrap();
        let sd = card(tmp.path(), "CAM", "AVCHD");

        let mounts = StaticMounts::from_paths([&sd, &sd])
            .with_stats(&sd, FsStats::writable(32_000_000_000, 1_000));
        let volumes = scanner(mounts).scan_volumes();

        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].capacity_bytes, 32_000_000_000);
    }

    #[test]
    fn test_floor_latency_is_honored() {
        let options = ScanOptions {
            min_scan_duration: Duration::from_millis(120),
            extra_system_names: Vec::new(),
        };
        let scanner = VolumeScanner::new(StaticMounts::new(), options);

        let start = Instant::now();
        assert!(scanner.scan_volumes().is_empty());
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn test_find_volume_by_path_or_name() {
        let volumes = vec![
            Volume {
                path: PathBuf::from("/media/me/CANON"),
                display_name: "CANON".to_string(),
                capacity_bytes: 0,
            },
            Volume {
                path: PathBuf::from("/media/me/SONY"),
                display_name: "SONY".to_string(),
                capacity_bytes: 0,
            },
        ];

        assert_eq!(find_volume(&volumes, "/media/me/SONY").unwrap().display_name, "SONY");
        assert_eq!(find_volume(&volumes, "canon").unwrap().display_name, "CANON");
        assert!(find_volume(&volumes, "NIKON").is_none());
    }
}
