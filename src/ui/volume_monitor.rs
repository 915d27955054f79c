//! Volume Monitor Module
//!
//! Hot-plug detection for camera volumes. A background thread re-runs the
//! volume scan on an interval and emits [`VolumeEvent::Added`] /
//! [`VolumeEvent::Removed`] when the set of camera volumes changes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::core::config::ScanConfig;
use crate::ui::events::{UiEvent, VolumeEvent};
use crate::volume::{Volume, VolumeScanner};

/// Granularity at which a sleeping monitor notices `stop`
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Configuration for the volume monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pause between scan passes (in milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
        }
    }
}

impl MonitorConfig {
    /// Poll interval from the `[scan]` config section
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval().as_millis() as u64,
        }
    }

    /// Create a config with faster polling (for responsive UIs)
    pub fn fast() -> Self {
        Self {
            poll_interval_ms: 500,
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

// =============================================================================
// Volume Monitor
// =============================================================================

/// Thread-safe camera volume monitor
pub struct VolumeMonitor {
    /// Configuration
    config: MonitorConfig,
    /// Currently mounted camera volumes, by mount path
    volumes: Arc<RwLock<HashMap<PathBuf, Volume>>>,
    /// Shutdown flag
    shutdown_flag: Arc<AtomicBool>,
    /// Event sender
    event_tx: Sender<UiEvent>,
    /// Event receiver (for UI)
    event_rx: Mutex<Receiver<UiEvent>>,
    /// Monitor thread handle
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    /// Whether monitor is running
    is_running: AtomicBool,
}

impl VolumeMonitor {
    /// Create a new volume monitor with default configuration
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    /// Create a new volume monitor with custom configuration
    pub fn with_config(config: MonitorConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            config,
            volumes: Arc::new(RwLock::new(HashMap::new())),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            event_tx,
            event_rx: Mutex::new(event_rx),
            thread_handle: Mutex::new(None),
            is_running: AtomicBool::new(false),
        }
    }

    /// Start polling with the given scanner
    pub fn start(&self, scanner: VolumeScanner) -> Result<(), String> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err("Monitor is already running".to_string());
        }
        self.shutdown_flag.store(false, Ordering::SeqCst);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let volumes = Arc::clone(&self.volumes);
        let shutdown_flag = Arc::clone(&self.shutdown_flag);
        let event_tx = self.event_tx.clone();

        let handle = thread::spawn(move || {
            Self::monitor_loop(scanner, poll_interval, volumes, shutdown_flag, event_tx);
        });

        *self.thread_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!("Volume monitor started");
        Ok(())
    }

    /// Stop the monitor and wait for its thread
    pub fn stop(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.shutdown_flag.store(true, Ordering::SeqCst);
        let handle = self
            .thread_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        info!("Volume monitor stopped");
    }

    /// Check if monitor is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Camera volumes seen on the last pass, sorted by path
    pub fn mounted_volumes(&self) -> Vec<Volume> {
        let mut list: Vec<Volume> = self
            .volumes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        list.sort_by(|a, b| a.path.cmp(&b.path));
        list
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

    /// Receive event with timeout
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        self.event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recv_timeout(timeout)
            .ok()
    }

    /// The main monitor loop that runs in the background thread
    fn monitor_loop(
        scanner: VolumeScanner,
        poll_interval: Duration,
        volumes: Arc<RwLock<HashMap<PathBuf, Volume>>>,
        shutdown_flag: Arc<AtomicBool>,
        event_tx: Sender<UiEvent>,
    ) {
        while !shutdown_flag.load(Ordering::SeqCst) {
            let current = scanner.scan_volumes();
            let events = {
                let mut known = volumes.write().unwrap_or_else(|e| e.into_inner());
                diff_volumes(&mut known, current)
            };
            for event in events {
                let _ = event_tx.send(event.into());
            }

            let resume_at = Instant::now() + poll_interval;
            while Instant::now() < resume_at {
                if shutdown_flag.load(Ordering::SeqCst) {
                    debug!("Monitor shutdown requested");
                    return;
                }
                thread::sleep(SHUTDOWN_CHECK_INTERVAL.min(poll_interval));
            }
        }
    }
}

/// Replace `known` with `current` and report what changed
fn diff_volumes(known: &mut HashMap<PathBuf, Volume>, current: Vec<Volume>) -> Vec<VolumeEvent> {
    let mut events = Vec::new();
    let mut next: HashMap<PathBuf, Volume> = HashMap::with_capacity(current.len());

    for volume in current {
        if !known.contains_key(&volume.path) {
            info!("Camera volume mounted: {}", volume);
            events.push(VolumeEvent::Added {
                volume: volume.clone(),
            });
        }
        next.insert(volume.path.clone(), volume);
    }

    let mut removed: Vec<Volume> = known
        .drain()
        .filter(|(path, _)| !next.contains_key(path))
        .map(|(_, volume)| volume)
        .collect();
    removed.sort_by(|a, b| a.path.cmp(&b.path));
    for volume in removed {
        info!("Camera volume removed: {}", volume);
        events.push(VolumeEvent::Removed { volume });
    }

    *known = next;
    events
}

impl Default for VolumeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VolumeMonitor {
    fn drop(&mut self) {
        self.stop();
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
    use tempfile::TempDir;

    fn volume(path: &str) -> Volume {
        Volume {
            path: PathBuf::from(path),
            display_name: path.rsplit('/').next().unwrap_or_default().to_string(),
            capacity_bytes: 0,
        }
    }

    #[test]
    fn test_monitor_config() {
        assert_eq!(MonitorConfig::default().poll_interval_ms, 2000);
        assert_eq!(MonitorConfig::fast().poll_interval_ms, 500);
        assert_eq!(
            MonitorConfig::default().with_poll_interval(10).poll_interval_ms,
            10
        );
    }

    #[test]
    fn test_diff_reports_added_and_removed() {
        let mut known = HashMap::new();

        let events = diff_volumes(&mut known, vec![volume("/media/A"), volume("/media/B")]);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, VolumeEvent::Added { .. })));

        let events = diff_volumes(&mut known, vec![volume("/media/B")]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], VolumeEvent::Removed { volume } if volume.display_name == "A"));

        assert!(diff_volumes(&mut known, vec![volume("/media/B")]).is_empty());
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn test_monitor_emits_added_volume() {
        let tmp = TempDir::new().unwrap();
        let card = tmp.path().join("CAM");
        fs::create_dir_all(card.join("AVCHD")).unwrap();

        let scanner = VolumeScanner::new(StaticMounts::from_paths([&card]), ScanOptions::immediate());
        let monitor = VolumeMonitor::with_config(MonitorConfig::default().with_poll_interval(20));
        monitor.start(scanner.clone()).unwrap();
        assert!(monitor.start(scanner).is_err());

        let event = monitor.recv_event_timeout(Duration::from_secs(5));
        assert!(matches!(
            event,
            Some(UiEvent::Volume(VolumeEvent::Added { ref volume })) if volume.path == card
        ));
        assert_eq!(monitor.mounted_volumes().len(), 1);

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
