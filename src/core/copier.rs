//! Bulk copy engine
//!
//! Copies a selection of clips into one destination directory and reports a
//! single progress fraction for the whole job:
//! - Pre-flight: every source is stat'ed up front; any failure aborts the job
//!   before a single byte moves
//! - Copy: a fixed pool of workers pulls files from a bounded channel and
//!   copies them in fixed-size chunks
//! - Progress: workers send chunk sizes to one aggregator thread, which owns
//!   the byte counter and invokes the callback, so the fraction never goes
//!   backwards
//! - Result: resolves only after every worker has finished; the first failure
//!   is the terminal error and stops the siblings between chunks
//!
//! Files are copied flat: `destination/<file name>`, overwriting whatever is
//! already there.

use crate::core::error::CopyError;
use crossbeam_channel::{bounded, unbounded, Sender};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Read/write chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of files copied concurrently
pub const DEFAULT_WORKERS: usize = 4;

/// Shared flag used to stop a running copy between chunks.
///
/// Clones share the same flag, so the CLI can hand one clone to its Ctrl+C
/// handler and another to the engine.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing flag, e.g. the one raised by a Ctrl+C handler
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another job
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Tuning knobs for the engine
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Bytes read and written per chunk
    pub chunk_size: usize,
    /// Upper bound on files in flight
    pub workers: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl CopyOptions {
    /// Build options from the `[copy]` config section
    pub fn from_config(config: &crate::core::config::CopyConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes,
            workers: config.workers,
        }
        .normalized()
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self.normalized()
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.workers = self.workers.max(1);
        self
    }
}

/// Outcome of a successful copy job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySummary {
    /// Number of files written to the destination
    pub files_copied: usize,
    /// Bytes written across all files
    pub bytes_copied: u64,
    /// Sum of the pre-flight source sizes
    pub total_bytes: u64,
    /// Wall time of the job
    pub duration: Duration,
}

impl CopySummary {
    /// Average throughput over the whole job
    pub fn average_speed_bps(&self) -> u64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.bytes_copied as f64 / secs) as u64
        } else {
            self.bytes_copied
        }
    }
}

/// Turns chunk deltas into a clamped, monotonic progress fraction.
///
/// Owned by a single thread; there is no shared counter to race on.
#[derive(Debug)]
pub struct ProgressAggregator {
    total_bytes: u64,
    copied_bytes: u64,
}

impl ProgressAggregator {
    /// Start a job of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            copied_bytes: 0,
        }
    }

    /// Account for one landed chunk and return the new fraction
    pub fn add(&mut self, delta: u64) -> f64 {
        self.copied_bytes = self
            .copied_bytes
            .saturating_add(delta)
            .min(self.total_bytes);
        self.fraction()
    }

    /// Current fraction in [0, 1]; an empty job is complete
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.copied_bytes as f64 / self.total_bytes as f64
        }
    }

    /// Bytes accounted so far
    pub fn copied_bytes(&self) -> u64 {
        self.copied_bytes
    }
}

/// A source file resolved during pre-flight
#[derive(Debug, Clone)]
struct PlannedFile {
    source: PathBuf,
    target: PathBuf,
    size: u64,
}

/// One `copy_files` invocation after pre-flight
#[derive(Debug)]
struct CopyJob {
    files: Vec<PlannedFile>,
    destination: PathBuf,
    total_bytes: u64,
}

impl CopyJob {
    /// Dedupe, stat, and map every source to its flat destination path.
    fn prepare(sources: &[PathBuf], destination: &Path) -> Result<Self, CopyError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(sources.len());
        for source in sources {
            let absolute = std::path::absolute(source).map_err(|e| {
                CopyError::SourceUnreadable {
                    path: source.clone(),
                    message: e.to_string(),
                }
            })?;
            if seen.insert(absolute.clone()) {
                unique.push(absolute);
            } else {
                debug!("Ignoring repeated source: {}", source.display());
            }
        }

        let sizes = unique
            .par_iter()
            .map(|path| stat_source(path))
            .collect::<Result<Vec<u64>, CopyError>>()?;

        if !unique.is_empty() {
            match fs::metadata(destination) {
                Ok(meta) if meta.is_dir() => {}
                _ => return Err(CopyError::DestinationMissing(destination.to_path_buf())),
            }
        }

        let mut names: HashMap<OsString, PathBuf> = HashMap::new();
        let mut files = Vec::with_capacity(unique.len());
        for (source, size) in unique.into_iter().zip(sizes) {
            let name = source
                .file_name()
                .map(|n| n.to_os_string())
                .ok_or_else(|| CopyError::SourceUnreadable {
                    path: source.clone(),
                    message: "path has no file name".to_string(),
                })?;

            if let Some(first) = names.get(&name) {
                return Err(CopyError::DestinationCollision {
                    name: name.to_string_lossy().into_owned(),
                    first: first.clone(),
                    second: source,
                });
            }
            names.insert(name.clone(), source.clone());

            let target = destination.join(&name);
            if is_same_file(&source, &target) {
                return Err(CopyError::SameFile { path: source });
            }

            files.push(PlannedFile {
                target,
                source,
                size,
            });
        }

        let total_bytes = files.iter().map(|f| f.size).sum();
        Ok(Self {
            files,
            destination: destination.to_path_buf(),
            total_bytes,
        })
    }
}

/// Whether `target` resolves to the same file as `source`. A missing target
/// never matches.
fn is_same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn stat_source(path: &Path) -> Result<u64, CopyError> {
    let meta = fs::metadata(path).map_err(|e| CopyError::SourceUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if !meta.is_file() {
        return Err(CopyError::SourceUnreadable {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }
    Ok(meta.len())
}

/// Concurrent, progress-reporting bulk copier
#[derive(Debug, Clone, Default)]
pub struct BulkCopyEngine {
    options: CopyOptions,
    cancel: CancelToken,
}

impl BulkCopyEngine {
    /// Engine with default chunk size and worker count
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with explicit options
    pub fn with_options(options: CopyOptions) -> Self {
        Self {
            options: options.normalized(),
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancel token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token this engine checks between chunks
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Options in effect
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Copy `sources` flat into `destination`.
    ///
    /// `on_progress` receives the job-wide fraction after every chunk. Calls
    /// are serialized and never decrease. A job with nothing to copy reports
    /// `1.0` once up front.
    pub fn copy_files<F>(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        on_progress: F,
    ) -> Result<CopySummary, CopyError>
    where
        F: Fn(f64) + Send + Sync,
    {
        let start = Instant::now();
        let job = CopyJob::prepare(sources, destination)?;

        info!(
            "Copying {} file(s), {} bytes, into {}",
            job.files.len(),
            job.total_bytes,
            job.destination.display()
        );

        if job.total_bytes == 0 {
            on_progress(1.0);
        }
        if job.files.is_empty() {
            return Ok(CopySummary {
                files_copied: 0,
                bytes_copied: 0,
                total_bytes: 0,
                duration: start.elapsed(),
            });
        }

        let workers = self.options.workers.min(job.files.len());
        let chunk_size = self.options.chunk_size;
        let failed = AtomicBool::new(false);
        let first_error: Mutex<Option<CopyError>> = Mutex::new(None);
        let files_copied = AtomicUsize::new(0);
        let bytes_written = AtomicU64::new(0);

        let (work_tx, work_rx) = bounded::<&PlannedFile>(workers);
        let (delta_tx, delta_rx) = unbounded::<u64>();

        let joined = thread::scope(|scope| {
            let on_progress = &on_progress;
            let aggregator = scope.spawn(move || {
                let mut progress = ProgressAggregator::new(job.total_bytes);
                for delta in delta_rx.iter() {
                    on_progress(progress.add(delta));
                }
                progress.copied_bytes()
            });

            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let work_rx = work_rx.clone();
                let delta_tx = delta_tx.clone();
                let failed = &failed;
                let first_error = &first_error;
                let files_copied = &files_copied;
                let bytes_written = &bytes_written;
                let cancel = &self.cancel;

                handles.push(scope.spawn(move || {
                    let should_stop =
                        || failed.load(Ordering::SeqCst) || cancel.is_cancelled();

                    for file in work_rx.iter() {
                        if should_stop() {
                            continue;
                        }
                        trace!("worker {} picked {}", worker, file.source.display());
                        match copy_one(file, chunk_size, &delta_tx, &should_stop) {
                            Ok(written) => {
                                files_copied.fetch_add(1, Ordering::SeqCst);
                                bytes_written.fetch_add(written, Ordering::SeqCst);
                            }
                            Err(e) => {
                                if !matches!(e, CopyError::Cancelled) {
                                    warn!("{}", e);
                                }
                                if let Ok(mut slot) = first_error.lock() {
                                    if slot.is_none() {
                                        *slot = Some(e);
                                    }
                                }
                                failed.store(true, Ordering::SeqCst);
                            }
                        }
                    }
                }));
            }

            // Only the workers hold these now; the aggregator ends when the
            // last worker drops its delta sender.
            drop(work_rx);
            drop(delta_tx);

            for file in &job.files {
                if failed.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
                    break;
                }
                if work_tx.send(file).is_err() {
                    break;
                }
            }
            drop(work_tx);

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            let aggregated = aggregator.join();
            (panicked, aggregated)
        });

        let (worker_panicked, aggregated) = joined;
        if worker_panicked {
            return Err(CopyError::WorkerPanicked("copy worker".to_string()));
        }
        let copied_bytes = aggregated
            .map_err(|_| CopyError::WorkerPanicked("progress callback".to_string()))?;

        if let Some(err) = first_error.into_inner().ok().flatten() {
            return Err(err);
        }

        let files_copied = files_copied.load(Ordering::SeqCst);
        if files_copied < job.files.len() {
            return Err(CopyError::Cancelled);
        }

        let summary = CopySummary {
            files_copied,
            bytes_copied: bytes_written.load(Ordering::SeqCst),
            total_bytes: job.total_bytes,
            duration: start.elapsed(),
        };
        debug!(
            "Aggregated {} of {} bytes",
            copied_bytes, summary.total_bytes
        );
        info!(
            "Copied {} file(s), {} bytes in {:.1}s",
            summary.files_copied,
            summary.bytes_copied,
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }
}

/// Copy `sources` into `destination` with a default engine.
pub fn copy_files<F>(
    sources: &[PathBuf],
    destination: &Path,
    on_progress: F,
) -> Result<CopySummary, CopyError>
where
    F: Fn(f64) + Send + Sync,
{
    BulkCopyEngine::new().copy_files(sources, destination, on_progress)
}

/// Copy one planned file. Returns the bytes written.
///
/// An existing destination file is removed first. If the copy does not
/// finish, the incomplete destination file is removed again.
fn copy_one(
    file: &PlannedFile,
    chunk_size: usize,
    deltas: &Sender<u64>,
    should_stop: &dyn Fn() -> bool,
) -> Result<u64, CopyError> {
    debug!(
        "Copying {} -> {} ({} bytes)",
        file.source.display(),
        file.target.display(),
        file.size
    );

    if fs::symlink_metadata(&file.target).is_ok() {
        fs::remove_file(&file.target).map_err(|e| CopyError::transfer(&file.target, e))?;
    }

    let source = File::open(&file.source).map_err(|e| CopyError::transfer(&file.source, e))?;
    let mut dest = File::create(&file.target).map_err(|e| CopyError::transfer(&file.target, e))?;

    let result = pump(
        source,
        &mut dest,
        file,
        chunk_size,
        |n| {
            let _ = deltas.send(n);
        },
        should_stop,
    );

    if result.is_err() {
        drop(dest);
        if let Err(e) = fs::remove_file(&file.target) {
            debug!(
                "Could not remove incomplete {}: {}",
                file.target.display(),
                e
            );
        }
    }
    result
}

/// Chunked read/write loop over exactly `file.size` bytes of `reader`.
fn pump<R, W, P>(
    reader: R,
    writer: &mut W,
    file: &PlannedFile,
    chunk_size: usize,
    mut on_chunk: P,
    should_stop: &dyn Fn() -> bool,
) -> Result<u64, CopyError>
where
    R: Read,
    W: Write,
    P: FnMut(u64),
{
    let mut reader = reader.take(file.size);
    let mut buffer = vec![0u8; chunk_size.min(file.size.max(1) as usize)];
    let mut copied: u64 = 0;

    while copied < file.size {
        if should_stop() {
            return Err(CopyError::Cancelled);
        }

        let n = match reader.read(&mut buffer) {
            Ok(0) => {
                return Err(CopyError::Truncated {
                    path: file.source.clone(),
                    expected: file.size,
                    actual: copied,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::transfer(&file.source, e)),
        };

        writer
            .write_all(&buffer[..n])
            .map_err(|e| CopyError::transfer(&file.target, e))?;
        copied += n as u64;
        on_chunk(n as u64);
    }

    writer
        .flush()
        .map_err(|e| CopyError::transfer(&file.target, e))?;
    Ok(copied)
}

// ============================================================================
// Tests
// ============================================================================
