//! Import Controller Module
//!
//! Runs scan, locate, and copy operations on a background thread and reports
//! through a channel, so a frontend never blocks on the filesystem. One
//! operation runs at a time; starting another while one is active fails with
//! [`ImportError::Busy`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::core::config::Config;
use crate::core::copier::{BulkCopyEngine, CancelToken, CopyOptions};
use crate::core::error::{CopyError, ImportError, Result};
use crate::media::MediaLocator;
use crate::ui::events::{AppEvent, CopyEvent, MediaEvent, ScanEvent, UiEvent};
use crate::volume::{Volume, VolumeScanner};

// =============================================================================
// Controller State
// =============================================================================

/// Current state of the import controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    /// Ready for a new operation
    Idle = 0,
    /// Looking for camera volumes
    Scanning = 1,
    /// Listing clips on a volume
    Locating = 2,
    /// Copying clips
    Copying = 3,
    /// Copy is being cancelled
    Cancelling = 4,
    /// Last copy completed
    Completed = 5,
    /// Last copy failed
    Error = 6,
}

impl From<u8> for ControllerState {
    fn from(value: u8) -> Self {
        match value {
            0 => ControllerState::Idle,
            1 => ControllerState::Scanning,
            2 => ControllerState::Locating,
            3 => ControllerState::Copying,
            4 => ControllerState::Cancelling,
            5 => ControllerState::Completed,
            6 => ControllerState::Error,
            _ => ControllerState::Idle,
        }
    }
}

impl ControllerState {
    /// Whether a background operation is running
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ControllerState::Scanning
                | ControllerState::Locating
                | ControllerState::Copying
                | ControllerState::Cancelling
        )
    }

    /// Short label for messages
    pub fn label(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Scanning => "volume scan",
            ControllerState::Locating => "clip listing",
            ControllerState::Copying => "copy",
            ControllerState::Cancelling => "copy cancellation",
            ControllerState::Completed => "completed",
            ControllerState::Error => "error",
        }
    }
}

// =============================================================================
// Progress Tracker
// =============================================================================

/// Thread-safe copy progress with an elapsed-time based ETA
#[derive(Debug)]
pub struct ProgressTracker {
    /// Latest fraction, stored as `f64` bits
    fraction: AtomicU64,
    /// Start time of the current job
    start_time: RwLock<Option<Instant>>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new() -> Self {
        Self {
            fraction: AtomicU64::new(0f64.to_bits()),
            start_time: RwLock::new(None),
        }
    }

    /// Reset the tracker for a new job
    pub fn reset(&self) {
        self.fraction.store(0f64.to_bits(), Ordering::SeqCst);
        *self.start_time.write().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    /// Record a new fraction; lower values than the current one are ignored
    pub fn update(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let _ = self
            .fraction
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                (fraction > f64::from_bits(bits)).then(|| fraction.to_bits())
            });
    }

    /// Latest fraction
    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.fraction.load(Ordering::SeqCst))
    }

    /// Time since the job started
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Remaining time, extrapolated from the elapsed time
    pub fn eta(&self) -> Option<Duration> {
        let fraction = self.fraction();
        if fraction <= 0.0 {
            return None;
        }
        if fraction >= 1.0 {
            return Some(Duration::ZERO);
        }
        let elapsed = self.elapsed().as_secs_f64();
        Some(Duration::from_secs_f64(elapsed * (1.0 - fraction) / fraction))
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Import Controller
// =============================================================================

/// Thread-safe import controller
///
/// Owns the scanner, the locator, and the copy settings, and runs each
/// operation on a worker thread:
///
/// - `start_scan` emits [`ScanEvent`]s and refreshes [`Self::volumes`]
/// - `start_locate` emits [`MediaEvent`]s
/// - `start_copy` emits [`CopyEvent`]s and can be cancelled
pub struct ImportController {
    /// Current state
    state: Arc<AtomicU8>,
    /// Cancel flag for the running copy
    cancel: CancelToken,
    /// Copy progress
    progress: Arc<ProgressTracker>,
    /// Volume scanner
    scanner: VolumeScanner,
    /// Clip locator
    locator: MediaLocator,
    /// Copy engine settings
    copy_options: CopyOptions,
    /// Event receiver for UI
    event_rx: Mutex<Receiver<UiEvent>>,
    /// Event sender (for internal use)
    event_tx: Sender<UiEvent>,
    /// Worker thread handle
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    /// Volumes from the last completed scan
    volumes: Arc<RwLock<Vec<Volume>>>,
    /// Last error message
    last_error: Arc<RwLock<Option<String>>>,
}

impl ImportController {
    /// Create a controller from its parts
    pub fn new(scanner: VolumeScanner, locator: MediaLocator, copy_options: CopyOptions) -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            state: Arc::new(AtomicU8::new(ControllerState::Idle as u8)),
            cancel: CancelToken::new(),
            progress: Arc::new(ProgressTracker::new()),
            scanner,
            locator,
            copy_options,
            event_rx: Mutex::new(event_rx),
            event_tx,
            worker_handle: Mutex::new(None),
            volumes: Arc::new(RwLock::new(Vec::new())),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a controller from the loaded configuration; non-empty `roots`
    /// replace the system mount table
    pub fn from_config(config: &Config, roots: &[PathBuf]) -> Self {
        Self::new(
            VolumeScanner::from_config(&config.scan, roots),
            MediaLocator::new(),
            CopyOptions::from_config(&config.copy),
        )
    }

    /// Get current state
    pub fn state(&self) -> ControllerState {
        ControllerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Check if an operation is running
    pub fn is_active(&self) -> bool {
        self.state().is_busy()
    }

    /// Volumes from the last completed scan
    pub fn volumes(&self) -> Vec<Volume> {
        self.volumes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Get progress tracker reference
    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Cancel token of the copy engine
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Get last error
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv_event(&self) -> Option<UiEvent> {
        match self
            .event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .try_recv()
        {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Receive events with timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recv_timeout(timeout)
            .ok()
    }

    /// Drain all pending events
    pub fn drain_events(&self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv_event() {
            events.push(event);
        }
        events
    }

    /// Scan for camera volumes in the background
    pub fn start_scan(&self) -> Result<()> {
        self.begin(ControllerState::Scanning)?;

        let scanner = self.scanner.clone();
        let state = Arc::clone(&self.state);
        let volumes = Arc::clone(&self.volumes);
        let event_tx = self.event_tx.clone();

        let _ = event_tx.send(ScanEvent::Started.into());
        self.spawn(move || {
            let start = Instant::now();
            let found = scanner.scan_volumes();
            *volumes.write().unwrap_or_else(|e| e.into_inner()) = found.clone();
            state.store(ControllerState::Idle as u8, Ordering::SeqCst);
            let _ = event_tx.send(
                ScanEvent::Completed {
                    volumes: found,
                    duration: start.elapsed(),
                }
                .into(),
            );
        })
    }

    /// List the clips on `volume` in the background
    pub fn start_locate(&self, volume: Volume) -> Result<()> {
        self.begin(ControllerState::Locating)?;

        let locator = self.locator.clone();
        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();

        let _ = event_tx.send(
            MediaEvent::Started {
                volume: volume.clone(),
            }
            .into(),
        );
        self.spawn(move || {
            let files = locator.find_video_files(&volume);
            state.store(ControllerState::Idle as u8, Ordering::SeqCst);
            let _ = event_tx.send(MediaEvent::Completed { volume, files }.into());
        })
    }

    /// Copy `sources` into `destination` in the background
    pub fn start_copy(&self, sources: Vec<PathBuf>, destination: PathBuf) -> Result<()> {
        self.begin(ControllerState::Copying)?;

        self.cancel.reset();
        self.progress.reset();
        *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;

        let engine =
            BulkCopyEngine::with_options(self.copy_options.clone()).with_cancel_token(self.cancel.clone());
        let state = Arc::clone(&self.state);
        let progress = Arc::clone(&self.progress);
        let last_error = Arc::clone(&self.last_error);
        let event_tx = self.event_tx.clone();

        let _ = event_tx.send(
            CopyEvent::Started {
                files: sources.len(),
                destination: destination.clone(),
            }
            .into(),
        );

        self.spawn(move || {
            let progress_tx = Mutex::new(event_tx.clone());
            let result = engine.copy_files(&sources, &destination, |fraction| {
                progress.update(fraction);
                if let Ok(tx) = progress_tx.lock() {
                    let _ = tx.send(
                        CopyEvent::Progress {
                            fraction: progress.fraction(),
                            eta: progress.eta(),
                        }
                        .into(),
                    );
                }
            });

            match result {
                Ok(summary) => {
                    state.store(ControllerState::Completed as u8, Ordering::SeqCst);
                    let _ = event_tx.send(CopyEvent::Completed { summary }.into());
                }
                Err(CopyError::Cancelled) => {
                    info!("Copy cancelled");
                    state.store(ControllerState::Idle as u8, Ordering::SeqCst);
                    let _ = event_tx.send(CopyEvent::Cancelled.into());
                }
                Err(e) => {
                    warn!("Copy failed: {}", e);
                    *last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(e.to_string());
                    state.store(ControllerState::Error as u8, Ordering::SeqCst);
                    let _ = event_tx.send(
                        CopyEvent::Failed {
                            error: e.to_string(),
                        }
                        .into(),
                    );
                }
            }
        })
    }

    /// Cancel the running copy
    pub fn cancel(&self) -> Result<()> {
        let result = self.state.compare_exchange(
            ControllerState::Copying as u8,
            ControllerState::Cancelling as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if result.is_err() {
            return Err(ImportError::Busy(format!(
                "no copy to cancel ({})",
                self.state().label()
            )));
        }

        self.cancel.cancel();
        let _ = self.event_tx.send(CopyEvent::Cancelling.into());
        Ok(())
    }

    /// Wait for the current operation to finish
    pub fn wait(&self) -> Result<()> {
        let handle = self
            .worker_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ImportError::WorkerPanicked(self.state().label().to_string()))?;
        }
        Ok(())
    }

    /// Shutdown the controller
    pub fn shutdown(&self) {
        let _ = self.cancel();
        let _ = self.wait();
        let _ = self.event_tx.send(AppEvent::ShuttingDown.into());
    }

    /// Move to `next` unless an operation is already running
    fn begin(&self, next: ControllerState) -> Result<()> {
        let result = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if ControllerState::from(current).is_busy() {
                    None
                } else {
                    Some(next as u8)
                }
            });

        match result {
            Ok(_) => {
                // The previous worker has already published its final state
                let _ = self.wait();
                debug!("Controller: {}", next.label());
                Ok(())
            }
            Err(current) => {
                let running = ControllerState::from(current).label().to_string();
                let _ = self.event_tx.send(
                    AppEvent::Busy {
                        operation: running.clone(),
                    }
                    .into(),
                );
                Err(ImportError::Busy(running))
            }
        }
    }

    fn spawn<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("import-worker".to_string())
            .spawn(work)
            .map_err(|e| {
                self.state
                    .store(ControllerState::Idle as u8, Ordering::SeqCst);
                ImportError::from(e)
            })?;

        *self.worker_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }
}

impl Drop for ImportController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{ScanOptions, StaticMounts};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn controller(roots: &[&Path], min_scan: Duration) -> ImportController {
        let options = ScanOptions {
            min_scan_duration: min_scan,
            extra_system_names: Vec::new(),
        };
        ImportController::new(
            VolumeScanner::new(StaticMounts::from_paths(roots.iter().copied()), options),
            MediaLocator::new(),
            CopyOptions::default().with_chunk_size(4096).with_workers(2),
        )
    }

    fn next_matching<F>(controller: &ImportController, matches: F) -> UiEvent
    where
        F: Fn(&UiEvent) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(event) = controller.recv_event_timeout(Duration::from_millis(50)) {
                if matches(&event) {
                    return event;
                }
            }
        }
        panic!("timed out waiting for event");
    }

    #[test]
    fn test_controller_state_conversion() {
        assert_eq!(ControllerState::from(0), ControllerState::Idle);
        assert_eq!(ControllerState::from(3), ControllerState::Copying);
        assert_eq!(ControllerState::from(6), ControllerState::Error);
        assert_eq!(ControllerState::from(255), ControllerState::Idle);
        assert!(ControllerState::Cancelling.is_busy());
        assert!(!ControllerState::Completed.is_busy());
    }

    #[test]
    fn test_progress_tracker_never_goes_back() {
        let tracker = ProgressTracker::new();
        tracker.reset();
        assert!(tracker.eta().is_none());

        tracker.update(0.5);
        tracker.update(0.25);
        assert_eq!(tracker.fraction(), 0.5);
        assert!(tracker.eta().is_some());

        tracker.update(3.0);
        assert_eq!(tracker.fraction(), 1.0);
        assert_eq!(tracker.eta(), Some(Duration::ZERO));
    }

    #[test]
    fn test_scan_then_locate() {
        let tmp = TempDir::new().unwrap();
        let card = tmp.path().join("CAM");
        fs::create_dir_all(card.join("PRIVATE/AVCHD/BDMV/STREAM")).unwrap();
        fs::write(card.join("PRIVATE/AVCHD/BDMV/STREAM/00001.MTS"), b"clip").unwrap();

        let controller = controller(&[card.as_path()], Duration::ZERO);
        controller.start_scan().unwrap();

        let event = next_matching(&controller, |e| {
            matches!(e, UiEvent::Scan(ScanEvent::Completed { .. }))
        });
        let volumes = match event {
            UiEvent::Scan(ScanEvent::Completed { volumes, .. }) => volumes,
            _ => unreachable!(),
        };
        assert_eq!(volumes.len(), 1);
        assert_eq!(controller.volumes(), volumes);

        controller.wait().unwrap();
        controller.start_locate(volumes[0].clone()).unwrap();
        let event = next_matching(&controller, |e| {
            matches!(e, UiEvent::Media(MediaEvent::Completed { .. }))
        });
        match event {
            UiEvent::Media(MediaEvent::Completed { files, .. }) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "00001.MTS");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_second_operation_is_rejected_while_busy() {
        let controller = controller(&[], Duration::from_millis(400));
        controller.start_scan().unwrap();

        let err = controller.start_scan().unwrap_err();
        assert!(matches!(err, ImportError::Busy(_)));

        controller.wait().unwrap();
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_copy_reports_progress_and_completion() {
        let card = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let a = card.path().join("a.mp4");
        let b = card.path().join("b.mov");
        fs::write(&a, vec![1u8; 50_000]).unwrap();
        fs::write(&b, vec![2u8; 20_000]).unwrap();

        let controller = controller(&[], Duration::ZERO);
        controller
            .start_copy(vec![a, b], dest.path().to_path_buf())
            .unwrap();
        controller.wait().unwrap();

        let events = controller.drain_events();
        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                UiEvent::Copy(CopyEvent::Progress { fraction, .. }) => Some(*fraction),
                _ => None,
            })
            .collect();
        assert!(fractions.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(fractions.last().copied(), Some(1.0));
        assert!(events
            .iter()
            .any(|e| matches!(e, UiEvent::Copy(CopyEvent::Completed { .. }))));
        assert_eq!(controller.state(), ControllerState::Completed);
    }

    #[test]
    fn test_copy_failure_is_reported() {
        let dest = TempDir::new().unwrap();
        let controller = controller(&[], Duration::ZERO);

        controller
            .start_copy(
                vec![dest.path().join("missing.mp4")],
                dest.path().to_path_buf(),
            )
            .unwrap();
        controller.wait().unwrap();

        assert_eq!(controller.state(), ControllerState::Error);
        assert!(controller.last_error().unwrap().contains("missing.mp4"));
        assert!(controller
            .drain_events()
            .iter()
            .any(|e| matches!(e, UiEvent::Copy(CopyEvent::Failed { .. }))));
    }

    #[test]
    fn test_cancel_without_copy_fails() {
        let controller = controller(&[], Duration::ZERO);
        assert!(controller.cancel().is_err());
    }
}
