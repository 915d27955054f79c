//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    print_error, print_header, print_info, print_success, print_warning, ActivitySpinner,
    CopyProgress,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, open_config_in_editor, Config};
use crate::core::copier::{BulkCopyEngine, CancelToken, CopyOptions};
use crate::core::error::{CopyError, ImportError};
use crate::media::{MediaFile, MediaLocator};
use crate::ui::events::{format_bytes, format_bytes_per_second, format_duration, UiEvent, VolumeEvent};
use crate::ui::volume_monitor::{MonitorConfig, VolumeMonitor};
use crate::volume::{find_volume, Volume, VolumeScanner};
use anyhow::{anyhow, Context, Result};
use dialoguer::{Confirm, MultiSelect, Select};
use glob::{MatchOptions, Pattern};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Choices made on the command line for an import
#[derive(Debug, Clone, Default)]
struct ImportRequest {
    volume: Option<String>,
    all: bool,
    output: Option<PathBuf>,
    patterns: Vec<String>,
}

pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::Volumes { json }) => {
            list_volumes(config, &args.roots, *json)?;
        }
        Some(Commands::Files { volume, json }) => {
            list_files(config, &args.roots, volume.as_deref(), *json)?;
        }
        Some(Commands::Import {
            volume,
            all,
            output,
            patterns,
        }) => {
            let request = ImportRequest {
                volume: volume.clone(),
                all: *all,
                output: output.clone(),
                patterns: patterns.clone(),
            };
            import(config, &args.roots, &request, shutdown_flag)?;
        }
        Some(Commands::Watch { timeout }) => {
            watch(config, &args.roots, timeout.map(Duration::from_secs), shutdown_flag)?;
        }
        Some(Commands::Config { path, reset }) => {
            handle_config_command(*path, *reset)?;
        }
        Some(Commands::GenerateConfig { output }) => {
            generate_config_file(output.clone())?;
        }
        Some(Commands::ShowConfig) => {
            show_config(config);
        }
        None => {
            import(config, &args.roots, &ImportRequest::default(), shutdown_flag)?;
        }
    }

    Ok(())
}

// ============================================================================
// Scanning and listing
// ============================================================================

/// Run a volume scan behind a spinner
fn scan_with_spinner(scanner: &VolumeScanner) -> Vec<Volume> {
    let spinner = ActivitySpinner::new("Looking for camera volumes...");
    let volumes = scanner.scan_volumes();
    spinner.finish(&format!("Found {} camera volume(s)", volumes.len()));
    volumes
}

/// List camera volumes
pub fn list_volumes(config: &Config, roots: &[PathBuf], json: bool) -> Result<()> {
    let scanner = VolumeScanner::from_config(&config.scan, roots);

    if json {
        let volumes = scanner.scan_volumes();
        println!("{}", serde_json::to_string_pretty(&volumes)?);
        return Ok(());
    }

    let volumes = scan_with_spinner(&scanner);
    if volumes.is_empty() {
        print_no_volumes_help();
        return Ok(());
    }

    println!();
    for (i, volume) in volumes.iter().enumerate() {
        println!("  [{}] {}", i + 1, volume.display_name);
        println!("      Path: {}", volume.path.display());
        println!("      Capacity: {}", format_bytes(volume.capacity_bytes));
    }
    println!();

    Ok(())
}

/// List the clips on one volume
pub fn list_files(
    config: &Config,
    roots: &[PathBuf],
    volume: Option<&str>,
    json: bool,
) -> Result<()> {
    let scanner = VolumeScanner::from_config(&config.scan, roots);
    let volumes = if json {
        scanner.scan_volumes()
    } else {
        scan_with_spinner(&scanner)
    };
    let volume = resolve_volume(&volumes, volume, !json)?;
    let files = MediaLocator::new().find_video_files(&volume);

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        print_info(&format!("No video files on {}", volume.display_name));
        return Ok(());
    }

    println!();
    for line in files.iter().map(file_row) {
        println!("  {}", line);
    }
    let total: u64 = files.iter().map(|f| f.size_bytes).sum();
    println!();
    print_info(&format!(
        "{} clip(s), {} on {}",
        files.len(),
        format_bytes(total),
        volume.display_name
    ));

    Ok(())
}

fn print_no_volumes_help() {
    print_warning("No camera volume found.");
    println!();
    println!("  Make sure that:");
    println!("    1. The camera is connected over USB and set to card-reader mode, or");
    println!("    2. Its SD card is inserted in a card reader");
    println!("    3. The volume is mounted read-write");
    println!();
    println!("  Tip: Use 'video-importer watch' to wait for the card to appear");
}

/// Pick a volume by name/path, automatically when only one is mounted, or
/// interactively otherwise
fn resolve_volume(volumes: &[Volume], query: Option<&str>, interactive: bool) -> Result<Volume> {
    if volumes.is_empty() {
        return Err(ImportError::NoVolumesFound.into());
    }

    if let Some(query) = query {
        return find_volume(volumes, query)
            .cloned()
            .ok_or_else(|| ImportError::VolumeNotFound(query.to_string()).into());
    }

    if volumes.len() == 1 || !interactive {
        return Ok(volumes[0].clone());
    }

    let items: Vec<String> = volumes
        .iter()
        .map(|v| format!("{} ({}, {})", v.display_name, v.path.display(), format_bytes(v.capacity_bytes)))
        .collect();
    let selection = Select::new()
        .with_prompt("Select a camera volume")
        .items(&items)
        .default(0)
        .interact()
        .context("Failed to read volume selection")?;

    Ok(volumes[selection].clone())
}

fn file_row(file: &MediaFile) -> String {
    format!(
        "{:<24} {:>10}  {:<26} {}",
        file.name,
        file.human_size(),
        file.display_date(),
        file.kind.label()
    )
}

// ============================================================================
// Import
// ============================================================================

/// Keep the clips whose file name matches any of `patterns` (all clips when
/// there are no patterns). Matching ignores case.
fn filter_by_patterns(files: Vec<MediaFile>, patterns: &[String]) -> Result<Vec<MediaFile>> {
    if patterns.is_empty() {
        return Ok(files);
    }

    let compiled = patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid pattern '{}'", p)))
        .collect::<Result<Vec<_>>>()?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    Ok(files
        .into_iter()
        .filter(|f| compiled.iter().any(|p| p.matches_with(&f.name, options)))
        .collect())
}

fn select_files(files: Vec<MediaFile>, request: &ImportRequest) -> Result<Vec<MediaFile>> {
    let files = filter_by_patterns(files, &request.patterns)?;
    if request.all || files.is_empty() {
        return Ok(files);
    }

    let items: Vec<String> = files.iter().map(file_row).collect();
    let chosen = MultiSelect::new()
        .with_prompt("Select clips to import (space to toggle, enter to confirm)")
        .items(&items)
        .interact()
        .context("Failed to read clip selection")?;

    Ok(chosen.into_iter().map(|i| files[i].clone()).collect())
}

fn prepare_destination(dir: &Path, interactive: bool) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    if interactive {
        let create = Confirm::new()
            .with_prompt(format!("{} does not exist. Create it?", dir.display()))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !create {
            return Err(anyhow!("Destination {} does not exist", dir.display()));
        }
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create destination {}", dir.display()))?;
    info!("Created destination {}", dir.display());
    Ok(())
}

/// Scan, pick, and copy
fn import(
    config: &Config,
    roots: &[PathBuf],
    request: &ImportRequest,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    print_header("Video Importer");

    let interactive = !request.all;
    let scanner = VolumeScanner::from_config(&config.scan, roots);
    let volumes = scan_with_spinner(&scanner);
    if volumes.is_empty() {
        print_no_volumes_help();
        return Err(ImportError::NoVolumesFound.into());
    }
    let volume = resolve_volume(&volumes, request.volume.as_deref(), interactive)?;

    let spinner = ActivitySpinner::new(&format!("Listing clips on {}...", volume.display_name));
    let files = MediaLocator::new().find_video_files(&volume);
    spinner.finish(&format!("{} clip(s) on {}", files.len(), volume.display_name));

    let selected = select_files(files, request)?;
    if selected.is_empty() {
        print_info("Nothing selected, nothing to copy.");
        return Ok(());
    }

    let destination = request
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    prepare_destination(&destination, interactive)?;

    let sources: Vec<PathBuf> = selected.iter().map(|f| f.path.clone()).collect();
    let expected_bytes: u64 = selected.iter().map(|f| f.size_bytes).sum();
    print_info(&format!(
        "Copying {} clip(s), {} to {}",
        sources.len(),
        format_bytes(expected_bytes),
        destination.display()
    ));

    // Ctrl+C raises the same flag the engine checks between chunks
    let engine = BulkCopyEngine::with_options(CopyOptions::from_config(&config.copy))
        .with_cancel_token(CancelToken::from_flag(Arc::clone(&shutdown_flag)));
    let progress = CopyProgress::new(expected_bytes);

    match engine.copy_files(&sources, &destination, |fraction| progress.set_fraction(fraction)) {
        Ok(summary) => {
            progress.finish(summary.bytes_copied);
            print_success(&format!(
                "Imported {} clip(s), {} in {} ({})",
                summary.files_copied,
                format_bytes(summary.bytes_copied),
                format_duration(summary.duration),
                format_bytes_per_second(summary.average_speed_bps())
            ));
            Ok(())
        }
        Err(e) => {
            progress.finish_with_error(&e.to_string());
            error!("Import failed: {}", e);
            // Pre-flight errors fail before anything is written
            if matches!(
                e,
                CopyError::Transfer { .. } | CopyError::Truncated { .. } | CopyError::Cancelled
            ) {
                print_error(&format!(
                    "Clips that finished before the failure were kept in {}",
                    destination.display()
                ));
            }
            Err(ImportError::from(e).into())
        }
    }
}

// ============================================================================
// Watch
// ============================================================================

/// Block until a camera volume appears
fn watch(
    config: &Config,
    roots: &[PathBuf],
    timeout: Option<Duration>,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    let scanner = VolumeScanner::from_config(&config.scan, roots);
    let monitor = VolumeMonitor::with_config(MonitorConfig::from_config(&config.scan));
    monitor.start(scanner).map_err(|e| anyhow!(e))?;

    let spinner = ActivitySpinner::new("Waiting for a camera volume... (Ctrl+C to stop)");
    let started = Instant::now();

    loop {
        if shutdown_flag.load(Ordering::SeqCst) {
            spinner.finish_with_error("Stopped");
            return Ok(());
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                spinner.finish_with_error("No camera volume appeared");
                return Err(ImportError::NoVolumesFound.into());
            }
        }

        match monitor.recv_event_timeout(Duration::from_millis(200)) {
            Some(UiEvent::Volume(VolumeEvent::Added { volume })) => {
                spinner.finish(&format!("Camera volume mounted: {}", volume.display_name));
                print_info(&format!("Path: {}", volume.path.display()));
                print_info(&format!("Capacity: {}", format_bytes(volume.capacity_bytes)));
                return Ok(());
            }
            Some(other) => debug!("Ignoring event: {:?}", other),
            None => {}
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Open, locate, or reset the configuration file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Run 'video-importer show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize scan and copy settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("[output]");
    info!("  directory = \"{}\"", config.output.directory.display());
    info!("");
    info!("[scan]");
    info!("  min_scan_duration_ms = {}", config.scan.min_scan_duration_ms);
    info!(
        "  extra_system_volume_names = {:?}",
        config.scan.extra_system_volume_names
    );
    info!("  poll_interval_ms = {}", config.scan.poll_interval_ms);
    info!("");
    info!("[copy]");
    info!("  chunk_size_bytes = {}", config.copy.chunk_size_bytes);
    info!("  workers = {}", config.copy.workers);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use tempfile::TempDir;

    fn media(name: &str) -> MediaFile {
        MediaFile::from_path(PathBuf::from("/card").join(name), MediaKind::Container)
    }

    fn volume(name: &str) -> Volume {
        Volume {
            path: PathBuf::from("/media").join(name),
            display_name: name.to_string(),
            capacity_bytes: 0,
        }
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.scan.min_scan_duration_ms = 0;
        config
    }

    #[test]
    fn test_filter_by_patterns_ignores_case() {
        let files = vec![media("00001.MTS"), media("clip.mp4"), media("trip.MOV")];
        let patterns = vec!["*.mts".to_string(), "*.mov".to_string()];

        let kept = filter_by_patterns(files, &patterns).unwrap();
        let names: Vec<_> = kept.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["00001.MTS", "trip.MOV"]);
    }

    #[test]
    fn test_filter_without_patterns_keeps_everything() {
        let kept = filter_by_patterns(vec![media("a.mp4"), media("b.mp4")], &[]).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(filter_by_patterns(vec![media("a.mp4")], &["[".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_volume() {
        let volumes = vec![volume("CANON"), volume("SONY")];

        assert_eq!(
            resolve_volume(&volumes, Some("SONY"), false).unwrap().display_name,
            "SONY"
        );
        assert_eq!(
            resolve_volume(&volumes, None, false).unwrap().display_name,
            "CANON"
        );

        let err = resolve_volume(&volumes, Some("NIKON"), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::VolumeNotFound(_))
        ));

        let err = resolve_volume(&[], None, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::NoVolumesFound)
        ));
    }

    #[test]
    fn test_import_all_copies_selected_clips() {
        let tmp = TempDir::new().unwrap();
        let card = tmp.path().join("CAM");
        let stream = card.join("PRIVATE/AVCHD/BDMV/STREAM");
        fs::create_dir_all(&stream).unwrap();
        fs::write(stream.join("00001.MTS"), vec![1u8; 4096]).unwrap();
        fs::write(card.join("clip.mp4"), vec![2u8; 2048]).unwrap();
        fs::write(card.join("notes.txt"), b"not a clip").unwrap();
        let out = tmp.path().join("out");

        let request = ImportRequest {
            volume: None,
            all: true,
            output: Some(out.clone()),
            patterns: vec!["*.mts".to_string()],
        };
        import(
            &quiet_config(),
            &[card],
            &request,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(fs::metadata(out.join("00001.MTS")).unwrap().len(), 4096);
        assert!(!out.join("clip.mp4").exists());
        assert!(!out.join("notes.txt").exists());
    }

    #[test]
    fn test_import_into_stream_folder_keeps_clips() {
        let tmp = TempDir::new().unwrap();
        let card = tmp.path().join("CAM");
        let stream = card.join("AVCHD/BDMV/STREAM");
        fs::create_dir_all(&stream).unwrap();
        fs::write(stream.join("00001.MTS"), vec![3u8; 2048]).unwrap();

        let request = ImportRequest {
            volume: None,
            all: true,
            output: Some(stream.clone()),
            patterns: Vec::new(),
        };
        let err = import(
            &quiet_config(),
            &[card],
            &request,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::Copy(CopyError::SameFile { .. }))
        ));
        assert_eq!(fs::read(stream.join("00001.MTS")).unwrap(), vec![3u8; 2048]);
    }

    #[test]
    fn test_import_without_volumes_fails() {
        let tmp = TempDir::new().unwrap();
        let request = ImportRequest {
            all: true,
            ..ImportRequest::default()
        };

        let err = import(
            &quiet_config(),
            &[tmp.path().join("empty")],
            &request,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::NoVolumesFound)
        ));
    }

    #[test]
    fn test_generate_config_to_custom_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("importer.toml");

        generate_config_file(Some(path.clone())).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.copy.workers, 4);
    }
}
