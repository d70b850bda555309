//! Microphone input for the dictation engine.
//!
//! [`open_microphone`] streams raw [`AudioChunk`]s from the default cpal
//! input device.  [`downmix`] and [`resample_to_16k`] turn them into the
//! 16 kHz mono `f32` PCM Whisper expects, and [`EndpointDetector`] decides
//! when the speaker has finished.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

/// Sample rate Whisper is trained on.
pub const TARGET_RATE: u32 = 16_000;

/// 30 ms at 16 kHz.
const FRAME_SAMPLES: usize = 480;

// ---------------------------------------------------------------------------
// Device capture
// ---------------------------------------------------------------------------

/// One buffer of interleaved `f32` samples as delivered by cpal.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Error)]
pub enum MicError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Keeps the cpal stream alive; dropping it stops recording.
///
/// `cpal::Stream` is not `Send` on every platform, so the handle stays on
/// the thread that opened it.
pub struct MicStream {
    _stream: cpal::Stream,
}

/// Start recording from the default input device, sending every hardware
/// buffer to `tx`.
pub fn open_microphone(tx: mpsc::Sender<AudioChunk>) -> Result<MicStream, MicError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(MicError::NoDevice)?;

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // The receiver is gone once the capture finished.
            let _ = tx.send(AudioChunk {
                samples: data.to_vec(),
                sample_rate,
                channels,
            });
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    log::debug!("mic: recording at {sample_rate} Hz, {channels} channel(s)");
    Ok(MicStream { _stream: stream })
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Average interleaved channels down to mono.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resample from `source_rate` to [`TARGET_RATE`].
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == TARGET_RATE || source_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = TARGET_RATE as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                (Some(a), None) => *a,
                _ => 0.0,
            }
        })
        .collect()
}

/// RMS amplitude of one frame.
fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

// ---------------------------------------------------------------------------
// EndpointDetector
// ---------------------------------------------------------------------------

/// Verdict after feeding audio to an [`EndpointDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Keep recording.
    Listening,
    /// Speech was followed by enough trailing silence.
    SpeechEnded,
    /// The capture hit its length limit.
    LimitReached,
}

/// Energy-based end-of-utterance detector over 16 kHz mono audio.
///
/// Audio is judged in 30 ms frames; a frame is speech when its RMS exceeds
/// the threshold.  The utterance ends after the first speech frame once
/// `end_silence` of consecutive silent frames has been seen.
#[derive(Debug)]
pub struct EndpointDetector {
    threshold: f32,
    end_silence_frames: usize,
    max_samples: usize,
    audio: Vec<f32>,
    scanned: usize,
    first_voice: Option<usize>,
    last_voice_end: usize,
    silent_run: usize,
}

impl EndpointDetector {
    pub fn new(threshold: f32, end_silence: Duration, max_capture: Duration) -> Self {
        let frame_ms = (FRAME_SAMPLES as u128 * 1_000) / TARGET_RATE as u128;
        let end_silence_frames = (end_silence.as_millis().div_ceil(frame_ms)).max(1) as usize;
        let max_samples = (max_capture.as_secs_f32() * TARGET_RATE as f32) as usize;
        Self {
            threshold,
            end_silence_frames,
            max_samples: max_samples.max(FRAME_SAMPLES),
            audio: Vec::new(),
            scanned: 0,
            first_voice: None,
            last_voice_end: 0,
            silent_run: 0,
        }
    }

    /// Append 16 kHz mono samples and report whether recording should stop.
    pub fn push(&mut self, samples: &[f32]) -> Detection {
        self.audio.extend_from_slice(samples);

        while self.audio.len() - self.scanned >= FRAME_SAMPLES {
            let start = self.scanned;
            let end = start + FRAME_SAMPLES;
            self.scanned = end;

            if rms(&self.audio[start..end]) > self.threshold {
                self.first_voice.get_or_insert(start);
                self.last_voice_end = end;
                self.silent_run = 0;
            } else if self.first_voice.is_some() {
                self.silent_run += 1;
                if self.silent_run >= self.end_silence_frames {
                    return Detection::SpeechEnded;
                }
            }
        }

        if self.audio.len() >= self.max_samples {
            Detection::LimitReached
        } else {
            Detection::Listening
        }
    }

    pub fn heard_speech(&self) -> bool {
        self.first_voice.is_some()
    }

    /// Captured audio with leading and trailing silence trimmed.  Empty when
    /// no speech was heard.
    pub fn speech(&self) -> &[f32] {
        match self.first_voice {
            Some(start) => &self.audio[start..self.last_voice_end],
            None => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(frames: usize) -> Vec<f32> {
        vec![0.0; frames * FRAME_SAMPLES]
    }

    fn voice(frames: usize) -> Vec<f32> {
        vec![0.5; frames * FRAME_SAMPLES]
    }

    fn detector() -> EndpointDetector {
        // 90 ms of trailing silence = 3 frames.
        EndpointDetector::new(0.01, Duration::from_millis(90), Duration::from_secs(2))
    }

    #[test]
    fn downmix_averages_channels() {
        let out = downmix(&[1.0, -1.0, 0.5, 0.5], 2);
        assert_eq!(out, [0.0, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), [0.1, 0.2]);
        assert!(downmix(&[1.0], 0).is_empty());
    }

    #[test]
    fn resample_48k_to_16k_length_and_level() {
        let out = resample_to_16k(&[0.5; 480], 48_000);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-5));
    }

    #[test]
    fn resample_16k_is_passthrough() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample_to_16k(&input, TARGET_RATE), input);
    }

    #[test]
    fn resample_upsamples_8k() {
        assert_eq!(resample_to_16k(&[0.0; 80], 8_000).len(), 160);
    }

    #[test]
    fn leading_silence_never_ends_capture() {
        let mut d = detector();
        assert_eq!(d.push(&silence(20)), Detection::Listening);
        assert!(!d.heard_speech());
        assert!(d.speech().is_empty());
    }

    #[test]
    fn trailing_silence_after_speech_ends_capture() {
        let mut d = detector();
        assert_eq!(d.push(&silence(2)), Detection::Listening);
        assert_eq!(d.push(&voice(4)), Detection::Listening);
        assert_eq!(d.push(&silence(2)), Detection::Listening);
        assert_eq!(d.push(&silence(1)), Detection::SpeechEnded);

        assert!(d.heard_speech());
        assert_eq!(d.speech().len(), 4 * FRAME_SAMPLES);
    }

    #[test]
    fn short_pause_inside_speech_is_kept() {
        let mut d = detector();
        d.push(&voice(2));
        d.push(&silence(2));
        assert_eq!(d.push(&voice(2)), Detection::Listening);
        assert_eq!(d.push(&silence(3)), Detection::SpeechEnded);
        assert_eq!(d.speech().len(), 6 * FRAME_SAMPLES);
    }

    #[test]
    fn partial_frames_are_buffered() {
        let mut d = detector();
        let loud = voice(1);
        d.push(&loud[..200]);
        assert!(!d.heard_speech());
        d.push(&loud[200..]);
        assert!(d.heard_speech());
    }

    #[test]
    fn length_limit_stops_capture() {
        let mut d = EndpointDetector::new(0.01, Duration::from_secs(1), Duration::from_millis(300));
        assert_eq!(d.push(&voice(5)), Detection::Listening);
        assert_eq!(d.push(&voice(5)), Detection::LimitReached);
    }
}
