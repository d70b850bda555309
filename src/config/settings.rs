//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section uses `#[serde(default)]` so an older `settings.toml` that
//! lacks newer keys still loads.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// HTTP contract of the assistant backend.
///
/// Paths are appended to the endpoint the user enters at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Reachability probe path (`GET`).
    pub health_path: String,
    /// Primary chat path (`POST {message, stream}`).
    pub chat_path: String,
    /// Secondary chat path (`POST {text}`), tried when the primary is missing.
    pub converse_path: String,
    /// Deadline for the reachability probe in milliseconds.
    pub probe_timeout_ms: u64,
    /// Deadline for each chat request in milliseconds.
    pub exchange_timeout_ms: u64,
    /// Reply-bearing keys of the primary response, in preference order.
    pub reply_fields: Vec<String>,
    /// Reply-bearing keys of the secondary response, in preference order.
    pub fallback_reply_fields: Vec<String>,
    /// Address pre-filled in the connect box.  Never connected to
    /// automatically.
    pub default_endpoint: Option<String>,
}

impl BackendConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            health_path: "/api/health".into(),
            chat_path: "/api/chat".into(),
            converse_path: "/api/converse".into(),
            probe_timeout_ms: 5_000,
            exchange_timeout_ms: 30_000,
            reply_fields: vec!["response".into(), "message".into(), "content".into()],
            fallback_reply_fields: vec!["response".into(), "text".into()],
            default_endpoint: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// A voice offered by the host synthesizer program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Name passed to the program (e.g. `"ja"` for espeak-ng, `"Kyoko"` for
    /// macOS `say`).
    pub name: String,
    /// BCP-47 language tag of the voice (e.g. `"ja-JP"`).
    pub lang: String,
}

/// Command line used to speak a reply through a host TTS program.
///
/// Placeholders: `{text}`, `{lang}`, `{voice}`, `{rate_wpm}`, `{pitch}`.
/// `voice_args` are prepended only when a voice was selected.  The default
/// puts `{text}` after `--` so a reply opening with `-` is not an option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthCommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub voice_args: Vec<String>,
    pub voices: Vec<VoiceConfig>,
}

impl Default for SynthCommandConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".into(),
            args: vec![
                "-s".into(),
                "{rate_wpm}".into(),
                "-p".into(),
                "{pitch}".into(),
                "--".into(),
                "{text}".into(),
            ],
            voice_args: vec!["-v".into(), "{voice}".into()],
            voices: vec![VoiceConfig {
                name: "ja".into(),
                lang: "ja-JP".into(),
            }],
        }
    }
}

/// Spoken reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak assistant replies aloud.
    pub enabled: bool,
    /// Language tag attached to every spoken utterance.
    pub language: String,
    /// A voice is preferred when its language tag contains this string.
    pub voice_lang: String,
    /// Speaking rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Host synthesizer.  `None` disables spoken output.
    pub command: Option<SynthCommandConfig>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "ja-JP".into(),
            voice_lang: "ja".into(),
            rate: 1.0,
            pitch: 1.0,
            command: Some(SynthCommandConfig::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper dictation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem, resolved inside [`AppPaths::models_dir`].
    pub model: String,
    /// Recognition language tag handed to the capture engine.
    pub language: String,
    /// RMS level above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Trailing silence that finalizes an utterance, in milliseconds.
    pub end_silence_ms: u64,
    /// Hard limit on a single capture, in seconds.
    pub max_capture_secs: f32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base".into(),
            language: "ja-JP".into(),
            vad_threshold: 0.01,
            end_silence_ms: 800,
            max_capture_secs: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Chat window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial inner size of the window in points.
    pub window_size: (f32, f32),
    /// Font file with CJK glyphs, appended to egui's default families.
    pub cjk_font_path: Option<std::path::PathBuf>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (420.0, 640.0),
            cjk_font_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use kani_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub speech: SpeechConfig,
    pub stt: SttConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_values_match_backend_contract() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.backend.health_path, "/api/health");
        assert_eq!(cfg.backend.chat_path, "/api/chat");
        assert_eq!(cfg.backend.converse_path, "/api/converse");
        assert_eq!(cfg.backend.probe_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.backend.exchange_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.backend.reply_fields, ["response", "message", "content"]);
        assert_eq!(cfg.backend.fallback_reply_fields, ["response", "text"]);
        assert!(cfg.backend.default_endpoint.is_none());
        assert_eq!(cfg.speech.language, "ja-JP");
        assert_eq!(cfg.speech.voice_lang, "ja");
        assert_eq!(cfg.stt.language, "ja-JP");
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.backend.chat_path, "/api/chat");
        assert_eq!(config.stt.model, "ggml-base");
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.backend.default_endpoint = Some("http://localhost:18789".into());
        cfg.backend.exchange_timeout_ms = 12_000;
        cfg.backend.reply_fields = vec!["answer".into()];
        cfg.speech.command = None;
        cfg.speech.rate = 1.25;
        cfg.stt.end_silence_ms = 1_200;
        cfg.ui.window_size = (500.0, 700.0);

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(
            loaded.backend.default_endpoint.as_deref(),
            Some("http://localhost:18789")
        );
        assert_eq!(loaded.backend.exchange_timeout_ms, 12_000);
        assert_eq!(loaded.backend.reply_fields, ["answer"]);
        assert!(loaded.speech.command.is_none());
        assert_eq!(loaded.speech.rate, 1.25);
        assert_eq!(loaded.stt.end_silence_ms, 1_200);
        assert_eq!(loaded.ui.window_size, (500.0, 700.0));
    }

    #[test]
    fn partial_file_fills_missing_keys_from_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[backend]\nprobe_timeout_ms = 750\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.backend.probe_timeout_ms, 750);
        assert_eq!(loaded.backend.chat_path, "/api/chat");
        assert_eq!(loaded.speech.language, "ja-JP");
    }
}
