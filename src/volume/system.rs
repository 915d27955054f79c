//! System mount table via `sysinfo`
//!
//! Disk enumeration comes from [`sysinfo::Disks`]. Read-only detection on
//! Linux uses the mount options in `/proc/self/mountinfo`; elsewhere it falls
//! back to the permissions of the mount root.

use super::traits::{FsStats, MountPoint, MountSource};
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use sysinfo::Disks;

#[derive(Debug, Clone, Copy)]
struct DiskSpace {
    total: u64,
    available: u64,
}

/// Mount table of the running system
#[derive(Debug, Default)]
pub struct SystemMounts {
    /// Capacity snapshot from the last `mounted_roots` call
    space: Mutex<HashMap<PathBuf, DiskSpace>>,
}

impl SystemMounts {
    /// Create a new system mount source
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh(&self) -> Vec<MountPoint> {
        let disks = Disks::new_with_refreshed_list();
        let mut space = HashMap::new();
        let mut roots = Vec::new();

        for disk in disks.list() {
            let path = disk.mount_point().to_path_buf();
            trace!(
                "disk {:?} at {} ({:?}, removable: {})",
                disk.name(),
                path.display(),
                disk.file_system(),
                disk.is_removable()
            );
            space.insert(
                path.clone(),
                DiskSpace {
                    total: disk.total_space(),
                    available: disk.available_space(),
                },
            );
            roots.push(MountPoint {
                name: disk.name().to_string_lossy().into_owned(),
                path,
            });
        }

        if let Ok(mut cache) = self.space.lock() {
            *cache = space;
        }
        roots
    }

    fn cached_space(&self, root: &Path) -> Option<DiskSpace> {
        self.space
            .lock()
            .ok()
            .and_then(|cache| cache.get(root).copied())
    }
}

impl MountSource for SystemMounts {
    fn mounted_roots(&self) -> Vec<MountPoint> {
        self.refresh()
    }

    fn filesystem_stats(&self, root: &Path) -> io::Result<FsStats> {
        let meta = fs::metadata(root)?;

        let space = match self.cached_space(root) {
            Some(space) => space,
            None => {
                self.refresh();
                self.cached_space(root).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("{} is not a mount point", root.display()),
                    )
                })?
            }
        };

        if is_read_only(root, &meta) {
            debug!("{} is mounted read-only", root.display());
            Ok(FsStats::read_only(space.total))
        } else {
            Ok(FsStats::writable(space.total, space.available))
        }
    }
}

#[cfg(target_os = "linux")]
fn is_read_only(root: &Path, _meta: &fs::Metadata) -> bool {
    match fs::read_to_string("/proc/self/mountinfo") {
        Ok(content) => read_only_mounts(&content).contains(root),
        Err(e) => {
            debug!("Cannot read mountinfo: {}", e);
            false
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn is_read_only(_root: &Path, meta: &fs::Metadata) -> bool {
    meta.permissions().readonly()
}

/// Mount points whose per-mount or superblock options include `ro`.
///
/// Line format:
/// `<id> <parent> <maj:min> <root> <mount point> <mount opts> [optional...] - <fstype> <source> <super opts>`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn read_only_mounts(mountinfo: &str) -> HashSet<PathBuf> {
    let has_ro = |opts: &str| opts.split(',').any(|opt| opt == "ro");

    mountinfo
        .lines()
        .filter_map(|line| {
            let (pre, post) = line.split_once(" - ")?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 6 {
                return None;
            }
            let super_opts = post.split_whitespace().nth(2).unwrap_or("");
            if has_ro(pre_fields[5]) || has_ro(super_opts) {
                Some(PathBuf::from(unescape_mount_path(pre_fields[4])))
            } else {
                None
            }
        })
        .collect()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
36 28 0:31 / / rw,relatime - ext4 /dev/sda3 rw
37 28 0:32 / /boot rw,relatime - ext4 /dev/sda2 rw
52 28 8:17 / /media/me/CANON\\040EOS ro,nosuid,nodev shared:40 - exfat /dev/sdb1 ro,fmask=0022
53 28 8:33 / /media/me/CARD rw,nosuid - vfat /dev/sdc1 ro,errors=remount-ro
54 28 8:49 / /media/me/rooted rw - vfat /dev/sdd1 rw,errors=remount-ro
";

    #[test]
    fn test_read_only_mounts_from_mount_and_super_options() {
        let ro = read_only_mounts(SAMPLE);
        assert!(ro.contains(Path::new("/media/me/CANON EOS")));
        assert!(ro.contains(Path::new("/media/me/CARD")));
        assert!(!ro.contains(Path::new("/")));
        assert!(!ro.contains(Path::new("/media/me/rooted")));
        assert_eq!(ro.len(), 2);
    }

    #[test]
    fn test_read_only_mounts_ignores_malformed_lines() {
        assert!(read_only_mounts("garbage\n\n1 2 3 - x").is_empty());
    }

    #[test]
    fn test_system_mounts_do_not_panic() {
        let mounts = SystemMounts::new();
        for mount in mounts.mounted_roots() {
            let _ = mounts.filesystem_stats(&mount.path);
        }
    }
}
