//! Synthesised siren alert.
//!
//! Eight square-wave tones alternate between 1000 Hz and 700 Hz. Each tone is
//! 150 ms long, decays exponentially from the requested volume to 0.01, runs
//! through a hard-knee compressor and is followed by 30 ms of silence. The
//! clip is rendered to 16-bit mono PCM at 44.1 kHz and handed to an
//! [`AudioSink`] as a WAV file.

use std::f32::consts::TAU;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const SAMPLE_RATE: u32 = 44_100;
pub const TONE_COUNT: usize = 8;
pub const TONE_LENGTH: Duration = Duration::from_millis(150);
pub const GAP_LENGTH: Duration = Duration::from_millis(30);
pub const HIGH_HZ: f32 = 1000.0;
pub const LOW_HZ: f32 = 700.0;
pub const ENVELOPE_FLOOR: f32 = 0.01;
pub const COMPRESSOR_THRESHOLD_DB: f32 = -10.0;
pub const COMPRESSOR_RATIO: f32 = 12.0;
pub const DEFAULT_VOLUME: f32 = 0.8;

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("audio device unavailable: {message}")]
    Device { message: String },
    #[error("player exited with {status}")]
    Player { status: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait AudioSink: Send + Sync + 'static {
    fn is_suspended(&self) -> bool {
        false
    }

    fn resume(&self) -> impl Future<Output = Result<(), SoundError>> + Send {
        async { Ok(()) }
    }

    fn play(&self, wav: Vec<u8>) -> impl Future<Output = Result<(), SoundError>> + Send;
}

/// Pipes the WAV into an external player such as `aplay -q` or `paplay`.
///
/// A failed playback marks the sink suspended (device busy or unplugged);
/// the engine resumes it before the next alert.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    suspended: Arc<AtomicBool>,
}

impl CommandSink {
    /// Splits `command` on whitespace; `None` when it is blank.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            suspended: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn run_player(&self, wav: &[u8]) -> Result<(), SoundError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| SoundError::Device {
                message: format!("{}: {err}", self.program),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(wav).await?;
        }
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SoundError::Player {
                status: status.to_string(),
            })
        }
    }
}

impl AudioSink for CommandSink {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<(), SoundError> {
        tracing::debug!(program = %self.program, "resuming audio output");
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self, wav: Vec<u8>) -> Result<(), SoundError> {
        let result = self.run_player(&wav).await;
        if result.is_err() {
            self.suspended.store(true, Ordering::SeqCst);
        }
        result
    }
}

/// For hosts without a player. The alert shows up in the logs only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    async fn play(&self, wav: Vec<u8>) -> Result<(), SoundError> {
        tracing::info!(bytes = wav.len(), "alert sound (silent sink)");
        Ok(())
    }
}

/// The sink an agent picks from its configuration.
#[derive(Debug, Clone)]
pub enum DeviceSink {
    Command(CommandSink),
    Silent(SilentSink),
}

impl DeviceSink {
    pub fn from_command(command: Option<&str>) -> Self {
        command
            .and_then(CommandSink::parse)
            .map_or(Self::Silent(SilentSink), Self::Command)
    }
}

impl AudioSink for DeviceSink {
    fn is_suspended(&self) -> bool {
        match self {
            Self::Command(sink) => sink.is_suspended(),
            Self::Silent(sink) => sink.is_suspended(),
        }
    }

    async fn resume(&self) -> Result<(), SoundError> {
        match self {
            Self::Command(sink) => sink.resume().await,
            Self::Silent(sink) => sink.resume().await,
        }
    }

    async fn play(&self, wav: Vec<u8>) -> Result<(), SoundError> {
        match self {
            Self::Command(sink) => sink.play(wav).await,
            Self::Silent(sink) => sink.play(wav).await,
        }
    }
}

pub struct SoundEngine<A: AudioSink> {
    sink: A,
}

impl<A: AudioSink> SoundEngine<A> {
    pub fn new(sink: A) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &A {
        &self.sink
    }

    /// Plays the siren. Never fails; problems are logged.
    pub async fn play_alert(&self, volume: f32, duration: Duration) {
        if self.sink.is_suspended() {
            if let Err(err) = self.sink.resume().await {
                tracing::warn!(error = %err, "could not resume audio output");
            }
        }
        let samples = render_siren(volume, duration);
        let wav = encode_wav(&samples, SAMPLE_RATE);
        if let Err(err) = self.sink.play(wav).await {
            tracing::warn!(error = %err, "alert playback failed");
        }
    }
}

/// Total length of the uncut siren.
pub fn siren_length() -> Duration {
    (TONE_LENGTH + GAP_LENGTH) * u32::try_from(TONE_COUNT).unwrap_or(u32::MAX)
}

fn samples_for(duration: Duration) -> usize {
    let samples = duration.as_secs_f64() * f64::from(SAMPLE_RATE);
    // Whole samples only; never negative.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = samples.round() as usize;
    count
}

/// Renders the siren as normalised samples in `[-1, 1]`, cut at `max`.
pub fn render_siren(volume: f32, max: Duration) -> Vec<f32> {
    let volume = volume.clamp(0.0, 1.0);
    let tone_samples = samples_for(TONE_LENGTH);
    let gap_samples = samples_for(GAP_LENGTH);
    let limit = samples_for(max.min(siren_length()));

    let mut out = Vec::with_capacity(limit);
    for index in 0..TONE_COUNT {
        let frequency = if index % 2 == 0 { HIGH_HZ } else { LOW_HZ };
        out.extend(render_tone(frequency, volume, tone_samples));
        out.extend(std::iter::repeat_n(0.0, gap_samples));
        if out.len() >= limit {
            break;
        }
    }
    out.truncate(limit);
    out
}

#[allow(clippy::cast_precision_loss)]
fn render_tone(frequency: f32, volume: f32, length: usize) -> impl Iterator<Item = f32> {
    let rate = SAMPLE_RATE as f32;
    let span = length.max(1) as f32;
    (0..length).map(move |n| {
        let t = n as f32 / rate;
        let phase = (frequency * t).fract();
        let square = if phase < 0.5 { 1.0 } else { -1.0 };
        compress(square * envelope(volume, n as f32 / span))
    })
}

/// Exponential decay from `volume` at `progress = 0` to the floor at 1.
fn envelope(volume: f32, progress: f32) -> f32 {
    if volume <= ENVELOPE_FLOOR {
        return volume;
    }
    volume * (ENVELOPE_FLOOR / volume).powf(progress)
}

fn compress(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude == 0.0 {
        return 0.0;
    }
    let level_db = 20.0 * magnitude.log10();
    if level_db <= COMPRESSOR_THRESHOLD_DB {
        return sample;
    }
    let out_db = COMPRESSOR_THRESHOLD_DB + (level_db - COMPRESSOR_THRESHOLD_DB) / COMPRESSOR_RATIO;
    sample.signum() * 10f32.powf(out_db / 20.0)
}

/// 16-bit PCM mono WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = u32::try_from(samples.len() * 2).unwrap_or(u32::MAX);
    let mut wav = Vec::with_capacity(44 + samples.len() * 2);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        wav.extend_from_slice(&pcm.to_le_bytes());
    }
    wav
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        suspended: AtomicBool,
        resumed: AtomicBool,
        fail: bool,
        played: Mutex<Vec<usize>>,
    }

    impl AudioSink for RecordingSink {
        fn is_suspended(&self) -> bool {
            self.suspended.load(Ordering::SeqCst)
        }

        async fn resume(&self) -> Result<(), SoundError> {
            self.resumed.store(true, Ordering::SeqCst);
            self.suspended.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn play(&self, wav: Vec<u8>) -> Result<(), SoundError> {
            self.played.lock().unwrap().push(wav.len());
            if self.fail {
                return Err(SoundError::Device {
                    message: "busy".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn full_siren_has_eight_tones_and_gaps() {
        let samples = render_siren(1.0, Duration::from_secs(5));
        let expected = (samples_for(TONE_LENGTH) + samples_for(GAP_LENGTH)) * TONE_COUNT;
        assert_eq!(samples.len(), expected);
        assert_eq!(siren_length(), Duration::from_millis(1440));

        let tone = samples_for(TONE_LENGTH);
        let gap = &samples[tone..tone + samples_for(GAP_LENGTH)];
        assert!(gap.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn duration_caps_clip_length() {
        let samples = render_siren(0.5, Duration::from_millis(200));
        assert_eq!(samples.len(), samples_for(Duration::from_millis(200)));
    }

    #[test]
    fn envelope_decays_to_floor() {
        assert!((envelope(0.8, 0.0) - 0.8).abs() < 1e-6);
        assert!((envelope(0.8, 1.0) - ENVELOPE_FLOOR).abs() < 1e-6);
        assert!(envelope(0.8, 0.5) < 0.8);
        assert!((envelope(0.005, 0.7) - 0.005).abs() < f32::EPSILON);
    }

    #[test]
    fn compressor_limits_loud_samples_only() {
        let quiet = 0.1;
        assert!((compress(quiet) - quiet).abs() < f32::EPSILON);
        let loud = compress(1.0);
        // 0 dB in, -10 dB threshold, 12:1 ratio => about -9.17 dB out.
        let expected = 10f32.powf((-10.0 + 10.0 / 12.0) / 20.0);
        assert!((loud - expected).abs() < 1e-4);
        assert!((compress(-1.0) + expected).abs() < 1e-4);
    }

    #[test]
    fn volume_is_clamped() {
        let over = render_siren(3.0, Duration::from_millis(10));
        let full = render_siren(1.0, Duration::from_millis(10));
        assert_eq!(over, full);
        let muted = render_siren(-1.0, Duration::from_millis(10));
        assert!(muted.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn wav_header_describes_pcm_mono() {
        let wav = encode_wav(&[0.0, 0.5, -0.5], SAMPLE_RATE);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), SAMPLE_RATE);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
        assert_eq!(wav.len(), 50);
    }

    #[test]
    fn command_sink_parses_arguments() {
        let sink = CommandSink::parse("aplay -q -").unwrap();
        assert_eq!(sink.program, "aplay");
        assert_eq!(sink.args, vec!["-q", "-"]);
        assert!(CommandSink::parse("   ").is_none());
        assert!(matches!(DeviceSink::from_command(Some("")), DeviceSink::Silent(_)));
        assert!(matches!(DeviceSink::from_command(None), DeviceSink::Silent(_)));
        assert!(matches!(
            DeviceSink::from_command(Some("paplay")),
            DeviceSink::Command(_)
        ));
    }

    #[tokio::test]
    async fn device_sink_forwards_suspension() {
        let sink = CommandSink::parse("aplay -q").unwrap();
        let device = DeviceSink::Command(sink.clone());
        assert!(!device.is_suspended());

        sink.suspended.store(true, Ordering::SeqCst);
        assert!(device.is_suspended());
        device.resume().await.unwrap();
        assert!(!device.is_suspended());
        assert!(!sink.is_suspended());

        assert!(!DeviceSink::Silent(SilentSink).is_suspended());
    }

    #[tokio::test]
    async fn failed_player_suspends_the_sink() {
        let sink = CommandSink::parse("vp-no-such-player-on-this-host").unwrap();
        assert!(sink.play(vec![0; 8]).await.is_err());
        assert!(sink.is_suspended());
    }

    #[tokio::test]
    async fn suspended_sink_is_resumed_before_playing() {
        let engine = SoundEngine::new(RecordingSink::default());
        engine.sink().suspended.store(true, Ordering::SeqCst);
        engine.play_alert(0.5, Duration::from_secs(2)).await;
        assert!(engine.sink().resumed.load(Ordering::SeqCst));
        assert_eq!(engine.sink().played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn playback_failure_is_swallowed() {
        let engine = SoundEngine::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        engine.play_alert(1.0, Duration::from_secs(2)).await;
        assert_eq!(engine.sink().played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_player_is_swallowed() {
        let engine = SoundEngine::new(CommandSink::parse("vp-no-such-player-binary").unwrap());
        engine.play_alert(1.0, Duration::from_millis(50)).await;
    }
}
