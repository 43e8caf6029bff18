//! Configuration file management for vmemo.
//!
//! Configuration is stored as TOML in the user's config directory. A missing
//! file means defaults; a malformed file is an error rather than being
//! silently replaced.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Audio device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio input device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `vmemo list-devices`
    /// - device name from `vmemo list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested recording sample rate in Hz (the device rate wins if they differ)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Recording output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory for saved memos. Defaults to the user's audio directory
    /// (or home directory) under "vmemo".
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Maximum length of a single recording in seconds
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_duration_secs() -> u64 {
    600
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmemoConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

impl VmemoConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// Returns defaults when no config file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If an existing config file cannot be read or parsed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(&config_path)?;
        let config: VmemoConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Directory where recordings are written: the configured directory, or
    /// the user's audio dir (falling back to home) under "vmemo".
    pub fn recordings_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.recording.directory {
            return Ok(dir.clone());
        }
        let base = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(base.join("vmemo"))
    }
}

/// Retrieves the path to the config file, creating the parent directory.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home.join(".config").join("vmemo");

    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join("vmemo.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmemoConfig::default();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.recording.max_duration_secs, 600);
        assert!(config.recording.directory.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: VmemoConfig = toml::from_str(
            r#"
            [recording]
            max_duration_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.recording.max_duration_secs, 30);
        // Unspecified sections fall back to defaults
        assert_eq!(config.audio.device, "default");
    }

    #[test]
    fn test_roundtrip() {
        let mut config = VmemoConfig::default();
        config.audio.device = "1".to_string();
        config.recording.directory = Some(PathBuf::from("/tmp/memos"));

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: VmemoConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.audio.device, "1");
        assert_eq!(parsed.recording.directory, Some(PathBuf::from("/tmp/memos")));
    }

    #[test]
    fn test_configured_recordings_dir_wins() {
        let mut config = VmemoConfig::default();
        config.recording.directory = Some(PathBuf::from("/tmp/elsewhere"));
        assert_eq!(
            config.recordings_dir().unwrap(),
            PathBuf::from("/tmp/elsewhere")
        );
    }
}
