//! Configuration management for vmemo.
//!
//! Handles loading application configuration from a TOML file in the
//! user's config directory.

pub mod file;

pub use file::{config_path, AudioConfig, RecordingConfig, VmemoConfig};
