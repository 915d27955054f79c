//! UI Support Module
//!
//! Framework-agnostic building blocks for an interactive frontend. Every
//! blocking operation runs on a background thread and reports through a
//! channel that the UI polls without blocking.
//!
//! - [`events`] - Event types sent from background workers to the UI
//! - [`controller`] - Scan, locate, and copy on a worker thread with cancellation
//! - [`volume_monitor`] - Camera volume hot-plug detection
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use video_importer::core::config::Config;
//! use video_importer::ui::{ImportController, ScanEvent, UiEvent};
//! use std::time::Duration;
//!
//! let controller = ImportController::from_config(&Config::default(), &[]);
//! controller.start_scan().unwrap();
//!
//! loop {
//!     match controller.recv_event_timeout(Duration::from_millis(100)) {
//!         Some(UiEvent::Scan(ScanEvent::Completed { volumes, .. })) => {
//!             println!("{} camera volume(s)", volumes.len());
//!             break;
//!         }
//!         _ => { /* redraw */ }
//!     }
//! }
//! ```

pub mod controller;
pub mod events;
pub mod volume_monitor;

pub use controller::{ControllerState, ImportController, ProgressTracker};
pub use events::{
    format_bytes, format_bytes_per_second, format_duration, format_eta, AppEvent, CopyEvent,
    MediaEvent, ScanEvent, UiEvent, VolumeEvent,
};
pub use volume_monitor::{MonitorConfig, VolumeMonitor};
