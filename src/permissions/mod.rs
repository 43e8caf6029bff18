//! Permission gate for the capabilities vmemo depends on.
//!
//! Before the screen starts, the three required capabilities are probed
//! together: writing to the recordings directory, reading it back, and
//! opening the microphone. The caller receives a grant-result vector
//! parallel to the requested capability list, keyed by its request id. On
//! denial the user gets a blocking dialog with a jump to the system sound
//! settings; there is no retry logic beyond re-running the program.

use crate::devices::{self, Direction};
use anyhow::{anyhow, Result};
use cpal::traits::DeviceTrait;
use std::fs;
use std::path::Path;
use std::process::Command;

/// A capability the application needs before it can do useful work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Write recordings into the recordings directory
    WriteStorage,
    /// Read recordings back from the recordings directory
    ReadStorage,
    /// Capture audio from the microphone
    RecordAudio,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WriteStorage => write!(f, "write recordings"),
            Self::ReadStorage => write!(f, "read recordings"),
            Self::RecordAudio => write!(f, "record audio"),
        }
    }
}

/// The fixed capability set requested at startup.
pub const REQUIRED_CAPABILITIES: [Capability; 3] = [
    Capability::WriteStorage,
    Capability::ReadStorage,
    Capability::RecordAudio,
];

/// Outcome of probing one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    Denied,
}

/// Grant-result vector for one permission request, parallel to the
/// requested capability list.
#[derive(Debug)]
pub struct PermissionResponse {
    pub request_id: u32,
    pub grants: Vec<Grant>,
}

/// User's choice in the missing-permission dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionChoice {
    OpenSettings,
    Quit,
}

/// Probes every requested capability and returns the grant-result vector.
///
/// Storage capabilities are probed against the recordings directory;
/// record-audio is probed by resolving the configured input device and
/// asking it for a default config. Probe failures are logged and reported
/// as denials, never as errors.
pub fn request_permissions(
    capabilities: &[Capability],
    request_id: u32,
    recordings_dir: &Path,
    input_device: &str,
) -> PermissionResponse {
    let grants = capabilities
        .iter()
        .map(|capability| {
            let grant = probe(*capability, recordings_dir, input_device);
            tracing::info!(
                "Permission probe (request {}): {} -> {:?}",
                request_id,
                capability,
                grant
            );
            grant
        })
        .collect();

    PermissionResponse { request_id, grants }
}

/// Returns true iff every entry in the grant-result vector is granted.
/// Vacuously true for an empty vector.
pub fn all_granted(grants: &[Grant]) -> bool {
    grants.iter().all(|g| *g == Grant::Granted)
}

/// Capabilities whose parallel grant entry is a denial.
pub fn denied_capabilities(capabilities: &[Capability], grants: &[Grant]) -> Vec<Capability> {
    capabilities
        .iter()
        .zip(grants)
        .filter(|(_, g)| **g == Grant::Denied)
        .map(|(c, _)| *c)
        .collect()
}

fn probe(capability: Capability, recordings_dir: &Path, input_device: &str) -> Grant {
    let result = match capability {
        Capability::WriteStorage => probe_write(recordings_dir),
        Capability::ReadStorage => probe_read(recordings_dir),
        Capability::RecordAudio => probe_record(input_device),
    };

    match result {
        Ok(()) => Grant::Granted,
        Err(e) => {
            tracing::warn!("Capability {} unavailable: {e}", capability);
            Grant::Denied
        }
    }
}

fn probe_write(recordings_dir: &Path) -> Result<()> {
    fs::create_dir_all(recordings_dir)?;
    let probe_path = recordings_dir.join(".vmemo-write-probe");
    fs::write(&probe_path, b"probe")?;
    fs::remove_file(&probe_path)?;
    Ok(())
}

fn probe_read(recordings_dir: &Path) -> Result<()> {
    if !recordings_dir.exists() {
        // Nothing recorded yet counts as readable; the write probe creates it
        return Ok(());
    }
    fs::read_dir(recordings_dir)?;
    Ok(())
}

fn probe_record(input_device: &str) -> Result<()> {
    let device = devices::resolve_device(Direction::Input, input_device)?;
    device
        .default_input_config()
        .map_err(|e| anyhow!("Input device has no usable config: {e}"))?;
    Ok(())
}

/// Blocking dialog shown when one or more capabilities were denied.
///
/// Offers a jump to the system sound settings or quitting. Runs on the
/// plain terminal, before the alternate screen is entered.
///
/// # Errors
/// - If the interactive prompt fails (e.g. no TTY)
pub fn missing_permission_dialog(denied: &[Capability]) -> Result<PermissionChoice> {
    let names = denied
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    cliclack::log::error(format!(
        "vmemo is missing required access: {}.",
        console::style(names).bold()
    ))?;

    let choice = cliclack::select("Open the system sound settings to grant access?")
        .item(
            PermissionChoice::OpenSettings,
            "Open settings",
            "launches the system settings, then quits",
        )
        .item(PermissionChoice::Quit, "Quit", "")
        .interact()?;

    Ok(choice)
}

/// Opens the platform's sound/microphone settings page.
///
/// On macOS: the microphone privacy pane.
/// On Linux: tries the common settings frontends in order.
///
/// # Errors
/// - If no settings frontend could be launched
pub fn open_sound_settings() -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Microphone")
            .spawn()
            .map_err(|e| anyhow!("Failed to open system settings: {e}"))?;
        return Ok(());
    }

    #[cfg(not(target_os = "macos"))]
    {
        let candidates: [(&str, &[&str]); 3] = [
            ("gnome-control-center", &["sound"]),
            ("pavucontrol", &[]),
            ("xdg-open", &["settings://sound"]),
        ];

        for (program, args) in candidates {
            if Command::new(program).args(args).spawn().is_ok() {
                return Ok(());
            }
        }

        Err(anyhow!(
            "No settings frontend found. Install gnome-control-center or pavucontrol."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_granted_vacuous() {
        assert!(all_granted(&[]));
    }

    #[test]
    fn test_all_granted_mixed() {
        assert!(all_granted(&[Grant::Granted, Grant::Granted]));
        assert!(!all_granted(&[Grant::Granted, Grant::Denied]));
        assert!(!all_granted(&[Grant::Denied]));
    }

    #[test]
    fn test_storage_probes_on_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            probe(Capability::WriteStorage, dir.path(), "default"),
            Grant::Granted
        );
        assert_eq!(
            probe(Capability::ReadStorage, dir.path(), "default"),
            Grant::Granted
        );
    }

    #[test]
    fn test_read_probe_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created-yet");
        assert_eq!(
            probe(Capability::ReadStorage, &missing, "default"),
            Grant::Granted
        );
    }

    #[test]
    fn test_denied_capabilities_parallel() {
        let caps = [Capability::WriteStorage, Capability::RecordAudio];
        let grants = [Grant::Granted, Grant::Denied];
        assert_eq!(
            denied_capabilities(&caps, &grants),
            vec![Capability::RecordAudio]
        );
    }
}
