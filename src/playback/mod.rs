//! Audio playback for vmemo.
//!
//! One player controller owns at most one live playback session. Also home
//! to the duration query and the time-formatting helper used across the
//! screen and the `list` command.

pub mod player;

pub use player::{format_seconds, media_duration, PlayerController};
