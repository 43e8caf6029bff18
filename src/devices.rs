//! Audio device lookup shared by the recorder, the player, the permission
//! gate and the `list-devices` command.
//!
//! Devices are addressed the same way everywhere: "default" for the system
//! default, a numeric index, or an exact device name. On Linux, device
//! enumeration is wrapped in a stderr guard because the ALSA library prints
//! warnings that are not actual errors.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Which side of the audio stack a device lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn noun(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Resolves an audio device by spec string, suppressing ALSA noise.
///
/// # Arguments
/// * `direction` - Input (capture) or Output (playback)
/// * `device_spec` - "default", a numeric index, or a device name
///
/// # Errors
/// - If no device matches the spec
/// - If device enumeration fails
pub fn resolve_device(direction: Direction, device_spec: &str) -> Result<cpal::Device> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();

        if device_spec == "default" {
            default_device(&host, direction)
                .ok_or_else(|| anyhow!("No audio {} device available", direction.noun()))
        } else {
            find_device(&host, direction, device_spec)
        }
    })
}

/// Collects all devices for one direction, skipping any that fail to
/// report a name. Used by the `list-devices` command.
pub fn usable_devices(direction: Direction) -> Result<Vec<cpal::Device>> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        Ok(devices_iter(&host, direction)?
            .filter(|d| d.name().is_ok())
            .collect())
    })
}

/// Name of the system default device for one direction, if any.
pub fn default_device_name(direction: Direction) -> Option<String> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        Ok(default_device(&host, direction).and_then(|d| d.name().ok()))
    })
    .ok()
    .flatten()
}

fn default_device(host: &cpal::Host, direction: Direction) -> Option<cpal::Device> {
    match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    }
}

fn devices_iter(
    host: &cpal::Host,
    direction: Direction,
) -> Result<Box<dyn Iterator<Item = cpal::Device>>> {
    match direction {
        Direction::Input => Ok(Box::new(
            host.input_devices()
                .map_err(|e| anyhow!("Failed to enumerate input devices: {e}"))?,
        )),
        Direction::Output => Ok(Box::new(
            host.output_devices()
                .map_err(|e| anyhow!("Failed to enumerate output devices: {e}"))?,
        )),
    }
}

/// Finds a device by name or numeric index.
fn find_device(host: &cpal::Host, direction: Direction, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = devices_iter(host, direction)?.collect();

        if index < devices.len() {
            return devices
                .into_iter()
                .nth(index)
                .ok_or_else(|| anyhow!("Device index {index} vanished during lookup"));
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            devices.len().saturating_sub(1)
        ));
    }

    // Fall back to an exact name match
    for device in devices_iter(host, direction)? {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio {} device '{device_spec}' not found. Use 'vmemo list-devices' to see available devices.",
        direction.noun()
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    // Open /dev/null for writing
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    // Save the current stderr file descriptor
    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    // Redirect stderr to /dev/null
    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    // Execute the closure
    let result = f();

    // Restore the original stderr
    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
