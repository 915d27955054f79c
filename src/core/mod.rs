//! Core functionality module
//!
//! Configuration, error types, and the bulk copy engine.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `copier` - Concurrent chunked copy with aggregated progress
//! - `error` - Error types and result aliases

pub mod config;
pub mod copier;
pub mod error;
