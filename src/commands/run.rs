//! The record/play screen command.
//!
//! Gates on the required capabilities, builds the two controllers and
//! hands them to the screen. CLI overrides take precedence over config.

use crate::config::VmemoConfig;
use crate::permissions::{self, PermissionChoice, REQUIRED_CAPABILITIES};
use crate::playback::PlayerController;
use crate::recording::RecorderController;
use crate::screen::{MemoScreen, ScreenOptions};
use std::path::PathBuf;
use std::time::Duration;

/// Request id for the startup permission round; echoed back in the
/// grant-result vector.
const PERMISSION_REQUEST_ID: u32 = 1;

/// Runs the interactive record/play screen.
///
/// # Errors
/// - If configuration exists but cannot be parsed
/// - If the permission dialog or the screen cannot be initialized
pub async fn handle_run(
    dir: Option<PathBuf>,
    file_name: Option<String>,
    max_duration_secs: Option<u64>,
) -> Result<(), anyhow::Error> {
    tracing::info!("=== vmemo started ===");

    let config = match VmemoConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            cliclack::log::error(format!(
                "Configuration error: {err}\n\nCheck ~/.config/vmemo/vmemo.toml (or run 'vmemo config')."
            ))?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let recordings_dir = match dir {
        Some(dir) => dir,
        None => config.recordings_dir()?,
    };
    let max_duration = Duration::from_secs(
        max_duration_secs.unwrap_or(config.recording.max_duration_secs),
    );

    tracing::info!(
        "Configuration: device={}, sample_rate={}Hz, dir={}, max_duration={:?}",
        config.audio.device,
        config.audio.sample_rate,
        recordings_dir.display(),
        max_duration
    );

    // Permission gate: all three capabilities are requested together, once
    let response = permissions::request_permissions(
        &REQUIRED_CAPABILITIES,
        PERMISSION_REQUEST_ID,
        &recordings_dir,
        &config.audio.device,
    );
    if !permissions::all_granted(&response.grants) {
        let denied = permissions::denied_capabilities(&REQUIRED_CAPABILITIES, &response.grants);
        tracing::warn!("Capabilities denied (request {}): {:?}", response.request_id, denied);

        match permissions::missing_permission_dialog(&denied)? {
            PermissionChoice::OpenSettings => {
                if let Err(e) = permissions::open_sound_settings() {
                    tracing::error!("Failed to open system settings: {e}");
                    cliclack::log::error(format!("{e}"))?;
                }
                cliclack::log::info("Re-run vmemo after granting access.")?;
            }
            PermissionChoice::Quit => {}
        }
        return Ok(());
    }

    let recorder = RecorderController::new(config.audio.device.clone(), config.audio.sample_rate);
    let player = PlayerController::new("default".to_string());

    let mut screen = MemoScreen::new(
        recorder,
        player,
        ScreenOptions {
            recordings_dir,
            file_name,
            max_duration,
        },
    )?;

    let result = screen.run();
    screen
        .cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;
    result?;

    tracing::info!("=== vmemo exited ===");
    Ok(())
}
