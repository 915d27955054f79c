//! UI Events Module
//!
//! Thread-safe event types for communication between the background
//! scan/locate/copy workers and a frontend. Events are sent through channels
//! and can be consumed by any UI framework.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::copier::CopySummary;
use crate::media::MediaFile;
use crate::volume::Volume;

// =============================================================================
// Scan Events
// =============================================================================

/// Events emitted while looking for camera volumes
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A scan pass has started
    Started,

    /// A scan pass finished
    Completed {
        /// Camera volumes found, replacing any earlier list
        volumes: Vec<Volume>,
        /// Wall time including the floor latency
        duration: Duration,
    },
}

// =============================================================================
// Media Events
// =============================================================================

/// Events emitted while listing the clips on a volume
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// Listing has started
    Started {
        /// Volume being listed
        volume: Volume,
    },

    /// Listing finished
    Completed {
        /// Volume that was listed
        volume: Volume,
        /// Clips found, unique by path
        files: Vec<MediaFile>,
    },
}

// =============================================================================
// Copy Events
// =============================================================================

/// Events emitted during a bulk copy
#[derive(Debug, Clone)]
pub enum CopyEvent {
    /// Copy has started
    Started {
        /// Number of sources requested
        files: usize,
        /// Destination directory
        destination: PathBuf,
    },

    /// Job-wide progress; `fraction` never decreases within one job
    Progress {
        /// Completed share of all bytes, 0.0 to 1.0
        fraction: f64,
        /// Estimated time remaining
        eta: Option<Duration>,
    },

    /// Cancellation was requested
    Cancelling,

    /// Every file landed
    Completed {
        /// Final statistics
        summary: CopySummary,
    },

    /// The job was cancelled before every file landed
    Cancelled,

    /// The job failed
    Failed {
        /// Terminal error message
        error: String,
    },
}

// =============================================================================
// Volume Events
// =============================================================================

/// Volume hot-plug events from the monitor
#[derive(Debug, Clone)]
pub enum VolumeEvent {
    /// A camera volume appeared
    Added {
        /// The new volume
        volume: Volume,
    },

    /// A camera volume disappeared
    Removed {
        /// The last known state of the volume
        volume: Volume,
    },
}

// =============================================================================
// Application Events
// =============================================================================

/// General application events
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A background operation could not start
    Busy {
        /// What is already running
        operation: String,
    },

    /// Application is shutting down
    ShuttingDown,
}

// =============================================================================
// Combined Event Type
// =============================================================================

/// All possible events that can be sent to the UI
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Volume scan event
    Scan(ScanEvent),
    /// Media listing event
    Media(MediaEvent),
    /// Bulk copy event
    Copy(CopyEvent),
    /// Hot-plug event
    Volume(VolumeEvent),
    /// Application event
    App(AppEvent),
}

impl From<ScanEvent> for UiEvent {
    fn from(event: ScanEvent) -> Self {
        UiEvent::Scan(event)
    }
}

impl From<MediaEvent> for UiEvent {
    fn from(event: MediaEvent) -> Self {
        UiEvent::Media(event)
    }
}

impl From<CopyEvent> for UiEvent {
    fn from(event: CopyEvent) -> Self {
        UiEvent::Copy(event)
    }
}

impl From<VolumeEvent> for UiEvent {
    fn from(event: VolumeEvent) -> Self {
        UiEvent::Volume(event)
    }
}

impl From<AppEvent> for UiEvent {
    fn from(event: AppEvent) -> Self {
        UiEvent::App(event)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Format bytes per second as human-readable string
pub fn format_bytes_per_second(bps: u64) -> String {
    format!("{}/s", format_bytes(bps))
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format ETA as human-readable string
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) if d.as_secs() == 0 => "< 1s".to_string(),
        Some(d) => format_duration(d),
        None => "calculating...".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_format_bytes_per_second() {
        assert_eq!(format_bytes_per_second(500), "500 B/s");
        assert_eq!(format_bytes_per_second(1024 * 1024), "1.0 MB/s");
    }

    #[test]
    fn test_format_duration_and_eta() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_eta(Some(Duration::from_millis(300))), "< 1s");
        assert_eq!(format_eta(None), "calculating...");
    }

    #[test]
    fn test_ui_event_conversions() {
        let ui_event: UiEvent = ScanEvent::Started.into();
        assert!(matches!(ui_event, UiEvent::Scan(_)));

        let ui_event: UiEvent = CopyEvent::Cancelled.into();
        assert!(matches!(ui_event, UiEvent::Copy(_)));

        let ui_event: UiEvent = AppEvent::ShuttingDown.into();
        assert!(matches!(ui_event, UiEvent::App(_)));
    }
}
