//! Offline transcription with whisper.cpp.
//!
//! [`Transcriber`] is the seam the microphone recognizer calls once an
//! utterance has been captured; [`WhisperTranscriber`] is the production
//! implementation wrapping a `whisper_rs::WhisperContext`.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Audio too long: maximum 60 s (960 000 samples at 16 kHz)")]
    AudioTooLong,
}

/// Turns 16 kHz mono `f32` PCM into text.
pub trait Transcriber: Send + Sync {
    /// `language` is a BCP-47 tag such as `"ja-JP"`; only the primary
    /// subtag is used.
    fn transcribe(&self, audio: &[f32], language: &str) -> Result<String, SttError>;
}

/// whisper.cpp pads anything shorter than one second anyway.
const MIN_AUDIO_SAMPLES: usize = 16_000;
const MAX_AUDIO_SAMPLES: usize = 960_000;

/// Primary language subtag as Whisper expects it (`"ja-JP"` → `"ja"`).
pub fn whisper_language(tag: &str) -> Option<&str> {
    let primary = tag.split(['-', '_']).next().unwrap_or_default().trim();
    match primary {
        "" | "auto" => None,
        lang => Some(lang),
    }
}

fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

/// Whisper model loaded once; a fresh `WhisperState` per call.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// SAFETY: whisper-rs declares WhisperContext Send + Sync; the weights are
// read-only after loading and every call creates its own state.
unsafe impl Send for WhisperTranscriber {}
unsafe impl Sync for WhisperTranscriber {}

impl WhisperTranscriber {
    /// Load a GGML model file.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;
        log::info!("stt: loaded {}", path.display());

        Ok(Self {
            ctx,
            n_threads: optimal_threads(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[f32], language: &str) -> Result<String, SttError> {
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(SttError::AudioTooLong);
        }
        let mut padded;
        let audio = if audio.len() < MIN_AUDIO_SAMPLES {
            padded = audio.to_vec();
            padded.resize(MIN_AUDIO_SAMPLES, 0.0);
            &padded[..]
        } else {
            audio
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(whisper_language(language));
        params.set_n_threads(self.n_threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(params, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        log::debug!(
            "stt: {} samples transcribed in {} ms",
            audio.len(),
            started.elapsed().as_millis()
        );
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperTranscriber::load("/nonexistent/ggml-base.bin");
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    #[test]
    fn language_tag_is_reduced_to_primary_subtag() {
        assert_eq!(whisper_language("ja-JP"), Some("ja"));
        assert_eq!(whisper_language("en_US"), Some("en"));
        assert_eq!(whisper_language("ja"), Some("ja"));
        assert_eq!(whisper_language("auto"), None);
        assert_eq!(whisper_language(""), None);
    }

    #[test]
    fn error_display_names_the_path() {
        let e = SttError::ModelNotFound("/models/ggml-base.bin".into());
        assert!(e.to_string().contains("/models/ggml-base.bin"));
    }
}
