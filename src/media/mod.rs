//! Media discovery
//!
//! Finds the video clips stored on a camera volume.

pub mod locator;

pub use locator::{human_size, MediaFile, MediaKind, MediaLocator};
