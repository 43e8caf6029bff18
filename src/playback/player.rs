//! WAV playback through the default output device.
//!
//! Preparing a file is a synchronous read: the whole WAV is decoded to
//! mono f32 before the output stream starts. The output callback drains a
//! shared cursor; when the samples run out it either wraps (loop mode) or
//! raises a finished flag that the controller's poll picks up on the
//! caller's thread.

use crate::devices::{self, Direction};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// State shared with the output callback.
struct PlaybackShared {
    /// Decoded mono samples
    samples: Vec<f32>,
    looping: bool,
    /// Next sample to play
    cursor: Mutex<usize>,
    /// Set by the callback when the samples are exhausted (never in loop mode)
    finished: AtomicBool,
}

/// One live playback session. Dropping the stream stops output.
struct PlaybackSession {
    stream: Option<cpal::Stream>,
    path: PathBuf,
    shared: Arc<PlaybackShared>,
}

/// Plays WAV files on the configured output device.
///
/// States: Idle -> Playing -> Idle. Starting while playing replaces the
/// session; the previous stream is released first.
pub struct PlayerController {
    device_name: String,
    session: Option<PlaybackSession>,
}

impl PlayerController {
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            session: None,
        }
    }

    /// Whether a playback session is currently live.
    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Prepares `path` synchronously and starts playback.
    ///
    /// `on_prepared` runs once the file has been decoded, with the decoded
    /// duration, before any audio is audible. Returns true on success;
    /// on any prepare or stream failure returns false with everything
    /// released and the playing state unchanged from Idle.
    pub fn start_play<F: FnOnce(Duration)>(
        &mut self,
        path: &Path,
        looping: bool,
        on_prepared: F,
    ) -> bool {
        // A new start replaces whatever was playing
        self.stop_play();

        match self.try_start(path, looping, on_prepared) {
            Ok(session) => {
                tracing::info!("Playback started: {}", session.path.display());
                self.session = Some(session);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start playback of {}: {e}", path.display());
                false
            }
        }
    }

    fn try_start<F: FnOnce(Duration)>(
        &self,
        path: &Path,
        looping: bool,
        on_prepared: F,
    ) -> Result<PlaybackSession> {
        let (samples, sample_rate) = decode_wav(path)?;
        let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
        on_prepared(duration);

        let shared = Arc::new(PlaybackShared {
            samples,
            looping,
            cursor: Mutex::new(0),
            finished: AtomicBool::new(false),
        });

        let device = devices::resolve_device(Direction::Output, &self.device_name)?;
        let out_channels = device.default_output_config()?.channels() as usize;

        let stream_config = cpal::StreamConfig {
            channels: out_channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared_arc = Arc::clone(&shared);
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                fill_output(&shared_arc, data, out_channels);
            },
            |err| {
                tracing::error!("Playback stream error: {err}");
            },
            None,
        )?;

        stream.play()?;

        Ok(PlaybackSession {
            stream: Some(stream),
            path: path.to_path_buf(),
            shared,
        })
    }

    /// Delivers the completion callback on the caller's thread.
    ///
    /// When the output callback has exhausted the samples, releases the
    /// stream, leaves the controller Idle, and invokes `on_completion`
    /// once. Does nothing while playback is still running or when idle.
    pub fn poll<F: FnOnce()>(&mut self, on_completion: F) {
        let finished = self
            .session
            .as_ref()
            .is_some_and(|s| s.shared.finished.load(Ordering::Relaxed));

        if finished {
            if let Some(mut session) = self.session.take() {
                drop(session.stream.take());
                tracing::info!("Playback finished: {}", session.path.display());
            }
            on_completion();
        }
    }

    /// Stops and releases the current session. Safe no-op when idle.
    pub fn stop_play(&mut self) {
        if let Some(mut session) = self.session.take() {
            drop(session.stream.take());
            tracing::info!("Playback stopped: {}", session.path.display());
        }
    }
}

/// Fills one output buffer from the shared cursor, duplicating the mono
/// source across all output channels.
fn fill_output(shared: &PlaybackShared, data: &mut [f32], channels: usize) {
    let mut cursor = shared.cursor.lock().unwrap();

    for frame in data.chunks_mut(channels) {
        if *cursor >= shared.samples.len() {
            if shared.looping && !shared.samples.is_empty() {
                *cursor = 0;
            } else {
                shared.finished.store(true, Ordering::Relaxed);
                frame.fill(0.0);
                continue;
            }
        }
        let sample = shared.samples[*cursor];
        *cursor += 1;
        frame.fill(sample);
    }
}

/// Reads a WAV file into mono f32 samples.
///
/// Integer formats are scaled to [-1, 1]; multi-channel files are
/// downmixed by averaging.
fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
    };

    let channels = spec.channels as usize;
    let samples = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Total duration of an audio file, via a throwaway reader.
///
/// Returns zero if the file does not exist or cannot be read as a WAV.
pub fn media_duration(path: &Path) -> Duration {
    match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            let frames = reader.duration();
            Duration::from_secs_f64(frames as f64 / spec.sample_rate as f64)
        }
        Err(e) => {
            tracing::debug!("media_duration({}): {e}", path.display());
            Duration::ZERO
        }
    }
}

/// Formats a second count as `MM'SS"`, or `HH.MM'SS"` from one hour up.
pub fn format_seconds(total_seconds: u64) -> String {
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    if hours > 0 {
        format!("{hours:02}.{minutes:02}'{seconds:02}\"")
    } else {
        format!("{minutes:02}'{seconds:02}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, sample_count: usize, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..sample_count {
            writer.write_sample(((i % 64) as i16 - 32) * 256).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "00'00\"");
        assert_eq!(format_seconds(65), "01'05\"");
        assert_eq!(format_seconds(3661), "01.01'01\"");
        assert_eq!(format_seconds(59), "00'59\"");
        assert_eq!(format_seconds(3600), "01.00'00\"");
    }

    #[test]
    fn test_media_duration_missing_file() {
        assert_eq!(
            media_duration(Path::new("/nonexistent/never.wav")),
            Duration::ZERO
        );
    }

    #[test]
    fn test_media_duration_matches_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one-second.wav");
        write_test_wav(&path, 16000, 16000);
        assert_eq!(media_duration(&path), Duration::from_secs(1));
    }

    #[test]
    fn test_start_play_missing_file_returns_false() {
        let mut player = PlayerController::new("default".to_string());
        let mut prepared = false;
        let ok = player.start_play(Path::new("/nonexistent/never.wav"), false, |_| {
            prepared = true
        });
        assert!(!ok);
        assert!(!prepared, "prepare must not fire when the open fails");
        assert!(!player.is_playing());
    }

    #[test]
    fn test_stop_play_when_idle_is_noop() {
        let mut player = PlayerController::new("default".to_string());
        player.stop_play();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_poll_when_idle_does_not_complete() {
        let mut player = PlayerController::new("default".to_string());
        let mut completed = false;
        player.poll(|| completed = true);
        assert!(!completed);
    }

    #[test]
    fn test_decode_wav_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(-16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, sample_rate) = decode_wav(&path).unwrap();
        assert_eq!(sample_rate, 8000);
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_fill_output_loops_and_finishes() {
        let shared = PlaybackShared {
            samples: vec![0.5; 4],
            looping: false,
            cursor: Mutex::new(0),
            finished: AtomicBool::new(false),
        };
        let mut buffer = [0.0f32; 12];
        fill_output(&shared, &mut buffer, 2);
        // 4 source samples fill 4 stereo frames, the rest is silence
        assert_eq!(&buffer[..8], &[0.5; 8]);
        assert_eq!(&buffer[8..], &[0.0; 4]);
        assert!(shared.finished.load(Ordering::Relaxed));

        let looping = PlaybackShared {
            samples: vec![0.25; 2],
            looping: true,
            cursor: Mutex::new(0),
            finished: AtomicBool::new(false),
        };
        let mut buffer = [0.0f32; 8];
        fill_output(&looping, &mut buffer, 1);
        assert_eq!(buffer, [0.25; 8]);
        assert!(!looping.finished.load(Ordering::Relaxed));
    }
}
