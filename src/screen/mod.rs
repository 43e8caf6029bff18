//! The record/play screen.
//!
//! One alternate-screen terminal UI owning both controllers. Four key
//! bindings map to the four actions (start/stop record, start/stop play);
//! a sparkline shows recent level history and a single status label is
//! shared by the live recording readout and the playback countdown. The
//! 50 ms input poll is the tick that drives recorder polling, playback
//! completion and the countdown.

use crate::playback::{format_seconds, media_duration, PlayerController};
use crate::recording::{default_file_name, PollStatus, RecorderController};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::{Paragraph, Sparkline},
};
use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Full scale of the decibel readout, used to normalize the sparkline:
/// 20 * log10(i16::MAX).
const FULL_SCALE_DB: f64 = 90.3;

const HELP_LINE: &str = " r start record   s stop record   p play   x stop play   q quit";

/// User input command on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScreenCommand {
    Continue,
    StartRecord,
    StopRecord,
    StartPlay,
    StopPlay,
    Quit,
}

/// Parameters for the recorder side of the screen.
pub struct ScreenOptions {
    pub recordings_dir: PathBuf,
    /// Overrides the timestamp-derived default filename when set
    pub file_name: Option<String>,
    pub max_duration: Duration,
}

/// Playback countdown state, ticking at one-second granularity.
struct Countdown {
    started: Instant,
    total: Duration,
    last_shown: Option<u64>,
}

/// Terminal UI wiring the four actions to the two controllers.
pub struct MemoScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    recorder: RecorderController,
    player: PlayerController,
    options: ScreenOptions,
    /// The one status label, written by both display paths
    status: String,
    level_history: Vec<u64>,
    /// Path reported by the most recent completed recording
    last_recording: Option<PathBuf>,
    countdown: Option<Countdown>,
    /// Raised by SIGUSR1 to stop an active recording externally
    stop_signal: Arc<AtomicBool>,
}

impl MemoScreen {
    /// Creates the screen and enters alternate screen mode.
    ///
    /// The controllers are owned by the screen from here on; there is one
    /// of each per screen, never shared.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized or raw mode enabled
    /// - If the signal handler cannot be registered
    pub fn new(
        recorder: RecorderController,
        player: PlayerController,
        options: ScreenOptions,
    ) -> anyhow::Result<Self> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&stop_signal))
            .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(MemoScreen {
            terminal,
            recorder,
            player,
            options,
            status: String::new(),
            level_history: Vec::new(),
            last_recording: None,
            countdown: None,
            stop_signal,
        })
    }

    /// Runs the screen until the user quits.
    ///
    /// # Errors
    /// - If input handling or rendering fails
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if self.stop_signal.swap(false, Ordering::Relaxed) && self.recorder.is_recording() {
                tracing::info!("Received SIGUSR1: stopping recording via external trigger");
                self.stop_record();
            }

            match self.handle_input()? {
                ScreenCommand::Continue => {}
                ScreenCommand::StartRecord => self.start_record(),
                ScreenCommand::StopRecord => self.stop_record(),
                ScreenCommand::StartPlay => self.start_play(),
                ScreenCommand::StopPlay => self.stop_play(),
                ScreenCommand::Quit => break,
            }

            self.tick();
            self.render()?;
        }

        // Leave nothing running: finalize an active recording, drop playback
        if self.recorder.is_recording() {
            self.stop_record();
        }
        self.player.stop_play();
        Ok(())
    }

    /// Polls for one key event; the 50 ms timeout paces the whole loop.
    fn handle_input(&mut self) -> anyhow::Result<ScreenCommand> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Char('r') => ScreenCommand::StartRecord,
                    KeyCode::Char('s') => ScreenCommand::StopRecord,
                    KeyCode::Char('p') => ScreenCommand::StartPlay,
                    KeyCode::Char('x') => ScreenCommand::StopPlay,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        ScreenCommand::Quit
                    }
                    KeyCode::Char('q') | KeyCode::Esc => ScreenCommand::Quit,
                    _ => ScreenCommand::Continue,
                });
            }
        }
        Ok(ScreenCommand::Continue)
    }

    fn start_record(&mut self) {
        let file_name = self
            .options
            .file_name
            .clone()
            .unwrap_or_else(default_file_name);
        self.recorder.start_record(
            self.options.max_duration,
            &self.options.recordings_dir,
            &file_name,
        );
    }

    fn stop_record(&mut self) {
        let last_recording = &mut self.last_recording;
        self.recorder.stop_record(|path, duration| {
            tracing::info!(
                "Memo saved: {} ({})",
                path.display(),
                format_seconds(duration.as_secs())
            );
            *last_recording = Some(path.to_path_buf());
        });
    }

    fn start_play(&mut self) {
        let Some(path) = self.last_recording.clone() else {
            tracing::warn!("Nothing to play: no completed recording yet");
            return;
        };

        let total = media_duration(&path);
        if self.player.start_play(&path, false, |prepared| {
            tracing::debug!("Prepared {} ({:?})", path.display(), prepared);
        }) {
            self.countdown = Some(Countdown {
                started: Instant::now(),
                total,
                last_shown: None,
            });
        }
    }

    fn stop_play(&mut self) {
        self.player.stop_play();
        // The countdown is cancelled together with playback
        self.countdown = None;
    }

    /// One loop tick: recorder level poll, playback completion poll,
    /// countdown update. Everything runs to completion on this thread.
    fn tick(&mut self) {
        let status = &mut self.status;
        let history = &mut self.level_history;
        let poll = self.recorder.poll(|db, elapsed| {
            *status = format!("db: {:.1}, time: {}", db, format_seconds(elapsed.as_secs()));
            history.push((db / FULL_SCALE_DB * 100.0).clamp(0.0, 100.0) as u64);
        });
        if poll == PollStatus::MaxDurationReached {
            tracing::info!("Maximum recording duration reached");
            self.stop_record();
        }

        self.player.poll(|| {
            tracing::debug!("Playback completed");
        });

        let mut expired = false;
        if let Some(countdown) = &mut self.countdown {
            let elapsed = countdown.started.elapsed();
            if elapsed >= countdown.total {
                expired = true;
            } else {
                let remaining = (countdown.total - elapsed).as_secs();
                if countdown.last_shown != Some(remaining) {
                    countdown.last_shown = Some(remaining);
                    self.status = format_seconds(remaining);
                }
            }
        }
        if expired {
            self.status = format_seconds(0);
            self.countdown = None;
        }
    }

    fn render(&mut self) -> anyhow::Result<()> {
        let width = self.terminal.size()?.width as usize;
        if self.level_history.len() > width {
            let excess = self.level_history.len() - width;
            self.level_history.drain(..excess);
        }

        let indicator = if self.recorder.is_recording() {
            Span::styled("● ", Style::default().fg(Color::Red))
        } else if self.player.is_playing() {
            Span::styled("▶ ", Style::default().fg(Color::Green))
        } else {
            Span::styled("· ", Style::default().fg(Color::DarkGray))
        };
        let status_line = Line::from(vec![indicator, Span::raw(self.status.clone())]);

        let history = &self.level_history;
        self.terminal.draw(|frame| {
            let area = frame.area();
            let footer_height = 2;

            let content_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(footer_height),
            };

            let sparkline = Sparkline::default()
                .data(history)
                .max(100)
                .style(Style::default().fg(Color::Rgb(206, 224, 220)));
            frame.render_widget(sparkline, content_area);

            let status_area = Rect {
                x: area.x,
                y: area.y + content_area.height,
                width: area.width,
                height: 1,
            };
            frame.render_widget(Paragraph::new(status_line), status_area);

            let help_area = Rect {
                x: area.x,
                y: status_area.y + 1,
                width: area.width,
                height: 1,
            };
            frame.render_widget(
                Paragraph::new(HELP_LINE).style(Style::default().fg(Color::DarkGray)),
                help_area,
            );
        })?;

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for MemoScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
