//! Speech input and output.
//!
//! # Architecture
//!
//! ```text
//!   mic button ──Start/Stop/GestureLost──┐
//!                                        ▼
//!                              ┌───────────────────┐  StartEngine / StopEngine
//!                              │ CaptureController │ ─────────────────────────▶ RecognitionEngine
//!                              │  (transition fn)  │ ◀───── RecognitionEvent ── (MicRecognizer)
//!                              └─────────┬─────────┘
//!                                        │ final utterance
//!                                        ▼
//!                                  session turn ──reply──▶ SpeechOutput ──▶ Synthesizer
//!                                                                          (CommandSynthesizer)
//! ```

pub mod audio;
pub mod capture;
pub mod command;
pub mod output;
pub mod recognizer;
pub mod whisper;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use capture::{
    transition, CaptureController, CaptureEffect, CaptureEngineError, CaptureInput, CaptureState,
    RecognitionEngine, RecognitionEvent, SessionId, UnavailableRecognizer,
};
pub use command::CommandSynthesizer;
pub use output::{SpeechOutput, SynthesisError, Synthesizer, UtteranceRequest, Voice};
pub use recognizer::MicRecognizer;
pub use whisper::{SttError, Transcriber, WhisperTranscriber};
