//! Microphone capture with live peak metering.
//!
//! The controller owns at most one capture session. Audio arrives on the
//! cpal callback thread, is downmixed to mono and appended to a shared
//! buffer; the callback also tracks the peak amplitude seen since the last
//! poll. Everything else (polling, stopping, writing the WAV) happens on
//! the caller's thread.

use crate::devices::{self, Direction};
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use hound::WavWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Interval between amplitude reports.
const AMPLITUDE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reference amplitude for the decibel conversion. Peak readings at or
/// below this produce no update.
const REFERENCE_AMPLITUDE: f64 = 1.0;

/// Default filename for a new memo: local timestamp plus the fixed
/// container extension.
pub fn default_file_name() -> String {
    format!("{}.wav", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

/// Result of one controller poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No capture session is live
    Idle,
    /// Capture is running
    Recording,
    /// The configured maximum duration has elapsed; the caller should stop
    MaxDurationReached,
}

/// One live capture session. Dropping the stream ends capture and thereby
/// cancels the poll.
struct CaptureSession {
    /// Active input stream; absent only in tests
    stream: Option<cpal::Stream>,
    path: PathBuf,
    started_at: Instant,
    max_duration: Duration,
    last_update: Instant,
    sample_rate: u32,
    /// Mono i16 samples captured so far
    samples: Arc<Mutex<Vec<i16>>>,
    /// Peak absolute amplitude since the last poll; reset on read
    peak: Arc<AtomicI32>,
}

/// Records audio from the configured input device into a WAV file.
///
/// States: Idle -> Recording -> Idle. Setup failures are logged and leave
/// the controller Idle with nothing retained; no error value propagates.
pub struct RecorderController {
    device_name: String,
    requested_sample_rate: u32,
    session: Option<CaptureSession>,
}

impl RecorderController {
    pub fn new(device_name: String, requested_sample_rate: u32) -> Self {
        Self {
            device_name,
            requested_sample_rate,
            session: None,
        }
    }

    /// Whether a capture session is currently live.
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Starts capturing into `directory/file_name`, cutting off after
    /// `max_duration`.
    ///
    /// A second start while recording is rejected; the live session wins.
    /// Any setup failure is logged and discarded, including the target
    /// path: the controller behaves as if no recording was ever requested.
    pub fn start_record(&mut self, max_duration: Duration, directory: &Path, file_name: &str) {
        if self.session.is_some() {
            tracing::warn!("start_record ignored: a recording is already in progress");
            return;
        }

        match self.try_start(max_duration, directory, file_name) {
            Ok(session) => {
                tracing::info!(
                    "Recording started: {} (max {:?})",
                    session.path.display(),
                    max_duration
                );
                self.session = Some(session);
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {e}");
            }
        }
    }

    fn try_start(
        &self,
        max_duration: Duration,
        directory: &Path,
        file_name: &str,
    ) -> Result<CaptureSession> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(file_name);

        let device = devices::resolve_device(Direction::Input, &self.device_name)?;
        let device_label = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {device_label}");

        let device_config = device.default_input_config()?;
        let sample_rate = device_config.sample_rate().0;
        let num_channels = device_config.channels() as usize;

        if sample_rate != self.requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.requested_sample_rate,
                sample_rate
            );
        }

        let samples = Arc::new(Mutex::new(Vec::new()));
        let peak = Arc::new(AtomicI32::new(0));

        // Capture is capped at the configured maximum; anything past the
        // cutoff is dropped even if the caller is slow to stop.
        let max_samples = max_duration.as_secs() as usize * sample_rate as usize;

        let samples_arc = Arc::clone(&samples);
        let peak_arc = Arc::clone(&peak);

        let stream = device.build_input_stream(
            &device_config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                handle_audio_callback(data, &samples_arc, &peak_arc, num_channels, max_samples);
            },
            |err| {
                tracing::error!("Audio stream error: {err}");
            },
            None,
        )?;

        stream.play()?;

        let now = Instant::now();
        Ok(CaptureSession {
            stream: Some(stream),
            path,
            started_at: now,
            max_duration,
            last_update: now,
            sample_rate,
            samples,
            peak,
        })
    }

    /// Reports the live level and elapsed time, at most once per poll
    /// interval.
    ///
    /// Reads and resets the peak amplitude cell, converts it to decibels
    /// relative to the reference amplitude, and invokes
    /// `on_update(db, elapsed)`. Readings at or below the reference are
    /// skipped. Returns `MaxDurationReached` once the session has run for
    /// its configured maximum so the caller can stop it.
    pub fn poll<F: FnOnce(f64, Duration)>(&mut self, on_update: F) -> PollStatus {
        let Some(session) = &mut self.session else {
            return PollStatus::Idle;
        };

        let elapsed = session.started_at.elapsed();
        if elapsed >= session.max_duration {
            return PollStatus::MaxDurationReached;
        }

        if session.last_update.elapsed() >= AMPLITUDE_POLL_INTERVAL {
            session.last_update = Instant::now();
            let amplitude = session.peak.swap(0, Ordering::Relaxed) as f64;
            let ratio = amplitude / REFERENCE_AMPLITUDE;
            if ratio > 1.0 {
                let db = 20.0 * ratio.log10();
                on_update(db, elapsed);
            }
        }

        PollStatus::Recording
    }

    /// Stops the session, writes the WAV file and fires `on_stop(path,
    /// duration)` exactly once.
    ///
    /// Dropping the stream cancels the poll and releases the microphone
    /// before the file is written. If finalizing the file fails the handle
    /// is already gone, the error is logged, and the callback is not
    /// invoked. Stopping while idle is a logged no-op.
    pub fn stop_record<F: FnOnce(&Path, Duration)>(&mut self, on_stop: F) {
        let Some(mut session) = self.session.take() else {
            tracing::warn!("stop_record ignored: no recording in progress");
            return;
        };

        drop(session.stream.take());
        let duration = session.started_at.elapsed();

        let samples = {
            let mut guard = session.samples.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        tracing::info!(
            "Recording stopped: {:.2}s ({} samples at {}Hz)",
            duration.as_secs_f32(),
            samples.len(),
            session.sample_rate
        );

        match write_wav(&session.path, &samples, session.sample_rate) {
            Ok(()) => {
                on_stop(&session.path, duration);
            }
            Err(e) => {
                tracing::error!(
                    "Failed to save recording {}: {e}",
                    session.path.display()
                );
            }
        }
    }

    /// Creates a live-looking session without touching any audio device.
    /// Returns the shared buffers so tests can feed samples and peaks.
    #[cfg(test)]
    fn start_for_test(
        &mut self,
        path: PathBuf,
        max_duration: Duration,
        sample_rate: u32,
    ) -> (Arc<Mutex<Vec<i16>>>, Arc<AtomicI32>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let peak = Arc::new(AtomicI32::new(0));
        let now = Instant::now();
        self.session = Some(CaptureSession {
            stream: None,
            path,
            started_at: now,
            max_duration,
            last_update: now,
            sample_rate,
            samples: Arc::clone(&samples),
            peak: Arc::clone(&peak),
        });
        (samples, peak)
    }
}

/// Handles incoming audio data from the capture callback.
///
/// Converts multi-channel audio to mono by averaging channels, tracks the
/// peak absolute amplitude, and stops appending once the maximum sample
/// count is reached.
fn handle_audio_callback(
    data: &[i16],
    samples_arc: &Arc<Mutex<Vec<i16>>>,
    peak_arc: &Arc<AtomicI32>,
    num_channels: usize,
    max_samples: usize,
) {
    let mut samples = samples_arc.lock().unwrap();
    let mut peak = 0i32;

    match num_channels {
        1 => {
            for &sample in data {
                peak = peak.max(sample.unsigned_abs() as i32);
                if samples.len() < max_samples {
                    samples.push(sample);
                }
            }
        }
        _ => {
            for chunk in data.chunks_exact(num_channels) {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                let mono = (sum / num_channels as i32) as i16;
                peak = peak.max(mono.unsigned_abs() as i32);
                if samples.len() < max_samples {
                    samples.push(mono);
                }
            }
        }
    }

    peak_arc.fetch_max(peak, Ordering::Relaxed);
}

/// Writes mono i16 samples as a PCM WAV file.
fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, wav_spec).map_err(|e| anyhow!("WAV create failed: {e}"))?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    tracing::debug!("WAV written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RecorderController {
        RecorderController::new("default".to_string(), 16000)
    }

    #[test]
    fn test_record_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.wav");

        let mut recorder = controller();
        let (samples, peak) = recorder.start_for_test(path.clone(), Duration::from_secs(600), 16000);
        assert!(recorder.is_recording());

        // Simulate the capture callback delivering audio
        samples.lock().unwrap().extend(vec![120i16; 3200]);
        peak.store(12000, Ordering::Relaxed);

        // Wait two poll intervals so the level report fires and the
        // measured duration is clearly above zero
        std::thread::sleep(AMPLITUDE_POLL_INTERVAL * 2);

        let mut updates = Vec::new();
        let status = recorder.poll(|db, elapsed| updates.push((db, elapsed)));
        assert_eq!(status, PollStatus::Recording);
        assert_eq!(updates.len(), 1);
        let (db, elapsed) = updates[0];
        assert!(db > 0.0);
        assert!(elapsed >= AMPLITUDE_POLL_INTERVAL * 2);

        let mut stops = Vec::new();
        recorder.stop_record(|path, duration| stops.push((path.to_path_buf(), duration)));
        assert_eq!(stops.len(), 1);
        let (stopped_path, duration) = &stops[0];
        assert_eq!(stopped_path, &path);
        assert!(path.exists());
        assert!(*duration >= AMPLITUDE_POLL_INTERVAL * 2);
        assert!(*duration < Duration::from_secs(5));
        assert!(!recorder.is_recording());

        // A second stop must not re-invoke the callback
        recorder.stop_record(|_, _| stops.push((PathBuf::new(), Duration::ZERO)));
        assert_eq!(stops.len(), 1);
    }

    #[test]
    fn test_poll_skips_at_or_below_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = controller();
        let (_samples, peak) =
            recorder.start_for_test(dir.path().join("m.wav"), Duration::from_secs(600), 16000);

        peak.store(1, Ordering::Relaxed);
        std::thread::sleep(AMPLITUDE_POLL_INTERVAL);

        let mut called = false;
        recorder.poll(|_, _| called = true);
        assert!(!called, "ratio of 1 must not produce an update");
    }

    #[test]
    fn test_poll_reports_max_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = controller();
        recorder.start_for_test(dir.path().join("m.wav"), Duration::from_millis(30), 16000);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(recorder.poll(|_, _| {}), PollStatus::MaxDurationReached);
    }

    #[test]
    fn test_double_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = controller();
        recorder.start_for_test(dir.path().join("m.wav"), Duration::from_secs(600), 16000);

        // The live session wins; the second start is dropped before any
        // device work happens
        recorder.start_record(Duration::from_secs(1), dir.path(), "other.wav");
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_poll_idle() {
        let mut recorder = controller();
        assert_eq!(recorder.poll(|_, _| {}), PollStatus::Idle);
    }

    #[test]
    fn test_full_scale_db() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = controller();
        let (_samples, peak) =
            recorder.start_for_test(dir.path().join("m.wav"), Duration::from_secs(600), 16000);

        peak.store(32767, Ordering::Relaxed);
        std::thread::sleep(AMPLITUDE_POLL_INTERVAL);

        let mut reported = None;
        recorder.poll(|db, _| reported = Some(db));
        let db = reported.expect("full-scale peak must report");
        assert!((db - 90.3).abs() < 0.1);
    }

    #[test]
    fn test_default_file_name_extension() {
        assert!(default_file_name().ends_with(".wav"));
    }
}
