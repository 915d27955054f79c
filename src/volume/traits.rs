//! Mount table abstraction for testability
//!
//! The scanner only needs two things from the operating system: the list of
//! mounted roots and per-root filesystem statistics. Putting them behind
//! [`MountSource`] lets the real mount table ([`super::SystemMounts`]) and a
//! fixed list ([`StaticMounts`]) be used interchangeably, so camera detection
//! can be exercised against temporary directories.

use std::collections::HashSet;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One mounted filesystem root
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MountPoint {
    /// Absolute path of the mount root (e.g. `/Volumes/CANON`, `/media/me/CAM`)
    pub path: PathBuf,
    /// Name reported by the OS for the mount (may be a device path or empty)
    pub name: String,
}

impl MountPoint {
    /// Create a mount point with only a path; the name is the last component
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// Set the OS-reported name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Filesystem statistics for a mount root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsStats {
    /// Total capacity in bytes (0 if unknown)
    pub total_bytes: u64,
    /// Free bytes; `None` when the filesystem does not report free space
    /// because it is mounted read-only
    pub free_bytes: Option<u64>,
}

impl FsStats {
    /// Stats for a writable filesystem
    pub fn writable(total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            total_bytes,
            free_bytes: Some(free_bytes),
        }
    }

    /// Stats for a read-only filesystem
    pub fn read_only(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            free_bytes: None,
        }
    }

    /// Read-only filesystems carry no free-space figure
    pub fn is_read_only(&self) -> bool {
        self.free_bytes.is_none()
    }
}

/// Source of mounted roots and their filesystem statistics
pub trait MountSource: Send + Sync + Debug {
    /// Every currently mounted root, in OS order
    fn mounted_roots(&self) -> Vec<MountPoint>;

    /// Filesystem statistics for a mount root
    fn filesystem_stats(&self, root: &Path) -> io::Result<FsStats>;
}

/// A fixed mount table.
///
/// Used by tests and by the CLI `--root` override, which scans the given
/// directories instead of the system mount table.
#[derive(Debug, Clone, Default)]
pub struct StaticMounts {
    roots: Vec<MountPoint>,
    stats: Vec<(PathBuf, FsStats)>,
    read_only: HashSet<PathBuf>,
}

impl StaticMounts {
    /// Empty mount table
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount table with one entry per path
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .fold(Self::new(), |mounts, path| mounts.with_root(path))
    }

    /// Add a root named after its last path component
    pub fn with_root(self, path: impl Into<PathBuf>) -> Self {
        self.with_mount(MountPoint::new(path))
    }

    /// Add a fully specified mount
    pub fn with_mount(mut self, mount: MountPoint) -> Self {
        self.roots.push(mount);
        self
    }

    /// Report fixed statistics for a root instead of deriving them
    pub fn with_stats(mut self, path: impl Into<PathBuf>, stats: FsStats) -> Self {
        self.stats.push((path.into(), stats));
        self
    }

    /// Report a root as mounted read-only
    pub fn with_read_only(mut self, path: impl Into<PathBuf>) -> Self {
        self.read_only.insert(path.into());
        self
    }
}

impl MountSource for StaticMounts {
    fn mounted_roots(&self) -> Vec<MountPoint> {
        self.roots.clone()
    }

    fn filesystem_stats(&self, root: &Path) -> io::Result<FsStats> {
        // Unreadable roots fail like a real statfs would
        let meta = fs::metadata(root)?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }

        let stats = self
            .stats
            .iter()
            .find(|(path, _)| path == root)
            .map(|(_, stats)| *stats)
            .unwrap_or_else(|| FsStats::writable(0, 0));

        if self.read_only.contains(root) {
            Ok(FsStats::read_only(stats.total_bytes))
        } else {
            Ok(stats)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mount_point_name_defaults_to_last_component() {
        let mount = MountPoint::new("/Volumes/CANON");
        assert_eq!(mount.name, "CANON");
        assert_eq!(MountPoint::new("/").name, "");
    }

    #[test]
    fn test_static_mounts_stats() {
        let dir = TempDir::new().unwrap();
        let mounts = StaticMounts::new()
            .with_root(dir.path())
            .with_stats(dir.path(), FsStats::writable(64_000, 10_000));

        assert_eq!(mounts.mounted_roots().len(), 1);
        let stats = mounts.filesystem_stats(dir.path()).unwrap();
        assert_eq!(stats.total_bytes, 64_000);
        assert!(!stats.is_read_only());
    }

    #[test]
    fn test_static_mounts_read_only_and_missing() {
        let dir = TempDir::new().unwrap();
        let mounts = StaticMounts::from_paths([dir.path()]).with_read_only(dir.path());

        assert!(mounts.filesystem_stats(dir.path()).unwrap().is_read_only());
        assert!(mounts
            .filesystem_stats(&dir.path().join("unplugged"))
            .is_err());
    }
}
