//! Progress bar utilities for CLI output
//!
//! - A spinner for the volume scan and the clip listing
//! - A byte progress bar for the copy, driven by the engine's job-wide fraction
//! - Console helpers and the dual stderr/file log writer

use crate::ui::events::{format_bytes, format_duration};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for scanning operations
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

/// Get the progress bar style for copy operations
fn byte_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "  {spinner:.green} [{bar:40.cyan/dim}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} eta {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {total_bytes} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Spinner for scan and listing
// ============================================================================

/// Spinner shown while a blocking lookup runs
pub struct ActivitySpinner {
    spinner: ProgressBar,
    start_time: Instant,
}

impl ActivitySpinner {
    /// Start spinning with `message`
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner.set_message(message.to_string());

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    /// Replace the message
    pub fn set_message(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    /// Finish with a summary line
    pub fn finish(&self, message: &str) {
        self.spinner.finish_with_message(format!(
            "✓ {} ({:.1}s)",
            message,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    /// Finish with an error line
    pub fn finish_with_error(&self, message: &str) {
        self.spinner.finish_with_message(format!("✗ {}", message));
    }
}

// ============================================================================
// Copy progress bar
// ============================================================================

/// Byte progress bar for a bulk copy.
///
/// The engine reports a fraction of the job; the bar maps it onto the
/// expected byte total so that throughput and ETA read in bytes.
pub struct CopyProgress {
    progress_bar: ProgressBar,
    total_bytes: u64,
    start_time: Instant,
}

impl CopyProgress {
    /// Create a bar for a job of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        let progress_bar = ProgressBar::new(total_bytes);
        progress_bar.set_style(byte_bar_style());
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress_bar,
            total_bytes,
            start_time: Instant::now(),
        }
    }

    /// Apply a job-wide fraction
    pub fn set_fraction(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * self.total_bytes as f64).round() as u64;
        if position > self.progress_bar.position() {
            self.progress_bar.set_position(position);
        }
    }

    /// Current bar position in bytes
    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    /// Finish the progress display
    pub fn finish(&self, bytes_copied: u64) {
        self.progress_bar.set_style(completed_style());
        self.progress_bar.set_position(self.total_bytes);
        self.progress_bar.finish_with_message(format!(
            "Copied {} in {}",
            format_bytes(bytes_copied),
            format_duration(self.start_time.elapsed())
        ));
    }

    /// Finish with an error
    pub fn finish_with_error(&self, msg: &str) {
        self.progress_bar.abandon_with_message(format!("✗ {}", msg));
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_progress_maps_fraction_to_bytes() {
        let progress = CopyProgress::new(15 * 1024 * 1024);
        progress.set_fraction(1.0 / 3.0);
        assert_eq!(progress.position(), 5 * 1024 * 1024);

        progress.set_fraction(0.1);
        assert_eq!(progress.position(), 5 * 1024 * 1024);

        progress.set_fraction(1.0);
        assert_eq!(progress.position(), 15 * 1024 * 1024);
        progress.finish(15 * 1024 * 1024);
    }

    #[test]
    fn test_dual_writer_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("importer.log");
        let mut writer = DualWriter {
            console: std::io::stderr(),
            file: std::fs::File::create(&path).unwrap(),
        };
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
