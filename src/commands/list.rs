//! Inventory of saved memos.
//!
//! Scans the recordings directory and prints one line per memo with its
//! duration, size and modification time, newest first.

use crate::config::VmemoConfig;
use crate::playback::{format_seconds, media_duration};
use chrono::{DateTime, Local};
use std::fs;

/// Lists the saved memos in the recordings directory.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the recordings directory cannot be read
pub async fn handle_list() -> Result<(), anyhow::Error> {
    let config = VmemoConfig::load()?;
    let dir = config.recordings_dir()?;

    if !dir.exists() {
        println!("No memos yet. Run 'vmemo' and press 'r' to record one.");
        return Ok(());
    }

    let mut entries: Vec<_> = fs::read_dir(&dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            let modified = metadata.modified().ok()?;
            Some((path, metadata.len(), modified))
        })
        .collect();

    if entries.is_empty() {
        println!("No memos in {}.", dir.display());
        return Ok(());
    }

    // Newest first, like the screen's own "last recording" notion
    entries.sort_by(|a, b| b.2.cmp(&a.2));

    println!();
    println!("Memos in {}:", dir.display());
    println!();

    for (index, (path, size, modified)) in entries.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let duration = media_duration(path);
        let when: DateTime<Local> = (*modified).into();

        println!(
            "  {:>3}  {}  {:>9}  {:>8} KiB  {}",
            index + 1,
            when.format("%Y-%m-%d %H:%M"),
            format_seconds(duration.as_secs()),
            size / 1024,
            console::style(name).bold(),
        );
    }
    println!();

    Ok(())
}
