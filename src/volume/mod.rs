//! Volume discovery
//!
//! - `traits` - [`MountSource`] seam plus the fixed [`StaticMounts`] table
//! - `system` - the live mount table via `sysinfo`
//! - `scanner` - camera volume detection

pub mod scanner;
pub mod system;
pub mod traits;

pub use scanner::{find_volume, is_camera_root, ScanOptions, Volume, VolumeScanner};
pub use system::SystemMounts;
pub use traits::{FsStats, MountPoint, MountSource, StaticMounts};
