//! Error types for the video importer
//!
//! This module defines the error types used throughout the library. Scanning
//! and locating never fail as a whole, so most of the taxonomy lives in
//! [`CopyError`], which is what a bulk copy resolves to when it does not
//! succeed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the video importer
#[derive(Error, Debug)]
pub enum ImportError {
    /// A bulk copy failed
    #[error(transparent)]
    Copy(#[from] CopyError),

    /// No camera volume is mounted
    #[error("No camera volume found. Connect the camera or insert its card and try again.")]
    NoVolumesFound,

    /// The requested volume is not among the scanned ones
    #[error("Volume '{0}' not found among the mounted camera volumes")]
    VolumeNotFound(String),

    /// An operation was requested while another one is still running
    #[error("Another operation is already running: {0}")]
    Busy(String),

    /// A background worker thread panicked
    #[error("Background worker panicked: {0}")]
    WorkerPanicked(String),

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Terminal error of a bulk copy job.
///
/// Exactly one of these is reported per failed job, after every worker has
/// settled. The caller cannot tell which subset of files landed.
#[derive(Error, Debug)]
pub enum CopyError {
    /// A source file could not be stat'ed during pre-flight. Nothing was copied.
    #[error("Cannot read source '{}': {message}", path.display())]
    SourceUnreadable { path: PathBuf, message: String },

    /// Two sources share a file name and would overwrite each other in a flat copy
    #[error("'{name}' appears more than once in the selection ({} and {})", first.display(), second.display())]
    DestinationCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The flat destination path of a source is the source file itself
    #[error("'{}' is already in the destination folder; copying it would replace it with itself", path.display())]
    SameFile { path: PathBuf },

    /// The destination directory does not exist or is not a directory
    #[error("Destination '{}' is not an existing directory", .0.display())]
    DestinationMissing(PathBuf),

    /// Opening, reading, writing, or replacing a file failed mid-copy
    #[error("Copy failed for '{}': {message}", path.display())]
    Transfer { path: PathBuf, message: String },

    /// The source ended before its declared size was consumed
    #[error("'{}' shrank during copy: expected {expected} bytes, got {actual}", path.display())]
    Truncated {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// The job was cancelled before every file landed
    #[error("Copy cancelled")]
    Cancelled,

    /// A copy worker or the progress callback panicked
    #[error("Copy aborted: {0} panicked")]
    WorkerPanicked(String),
}

impl CopyError {
    pub(crate) fn transfer(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CopyError::Transfer {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ImportError>;

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_error_messages_name_the_file() {
        let err = CopyError::SourceUnreadable {
            path: PathBuf::from("/Volumes/CAM/clip.mp4"),
            message: "No such file or directory".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/Volumes/CAM/clip.mp4"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn test_copy_error_converts_into_import_error() {
        let err: ImportError = CopyError::Cancelled.into();
        assert!(matches!(err, ImportError::Copy(CopyError::Cancelled)));
        assert_eq!(err.to_string(), "Copy cancelled");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ImportError = io.into();
        assert!(matches!(err, ImportError::IoError(ref m) if m.contains("denied")));
    }
}
