//! List available audio devices.
//!
//! vmemo both captures and plays back, so input and output devices are
//! listed, each with the default-device marker and its default config.

use crate::devices::{self, Direction};
use cpal::traits::DeviceTrait;

/// Lists all usable audio input and output devices on the system.
///
/// # Errors
/// - If device enumeration fails
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    print_section("Input devices (recording)", Direction::Input)?;
    print_section("Output devices (playback)", Direction::Output)?;
    Ok(())
}

fn print_section(title: &str, direction: Direction) -> Result<(), anyhow::Error> {
    let devices = devices::usable_devices(direction)?;
    let default_name = devices::default_device_name(direction);

    println!();
    println!("{title}:");

    if devices.is_empty() {
        println!("  (none found)");
        return Ok(());
    }

    for (index, device) in devices.iter().enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default_marker = if default_name.as_ref() == Some(&name) {
            " [DEFAULT]"
        } else {
            ""
        };

        let config_info = match direction {
            Direction::Input => device.default_input_config().ok().map(|c| {
                format!("{}Hz, {} channels", c.sample_rate().0, c.channels())
            }),
            Direction::Output => device.default_output_config().ok().map(|c| {
                format!("{}Hz, {} channels", c.sample_rate().0, c.channels())
            }),
        }
        .unwrap_or_else(|| "configuration unavailable".to_string());

        println!("  {index}: {name}{default_marker} ({config_info})");
    }

    Ok(())
}
