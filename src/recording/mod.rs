//! Audio capture for vmemo.
//!
//! One recorder controller owns at most one live microphone session and
//! reports peak level and elapsed time while it runs.

pub mod recorder;

pub use recorder::{default_file_name, PollStatus, RecorderController};
