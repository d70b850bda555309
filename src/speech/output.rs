//! Spoken replies.
//!
//! [`SpeechOutput`] owns the single speech channel.  Every [`speak`] cancels
//! whatever is playing or queued before enqueuing the new text, so at most
//! one utterance is audible and the newest reply wins.
//!
//! [`speak`]: SpeechOutput::speak

use thiserror::Error;

use crate::config::SpeechConfig;

use super::command::CommandSynthesizer;

/// A voice offered by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `"ja-JP"`.
    pub lang: String,
}

/// Everything a synthesizer needs to speak one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub text: String,
    pub lang: String,
    /// `None` means the engine default voice.
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("failed to start synthesizer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("synthesizer rejected the utterance: {0}")]
    Rejected(String),
}

/// Host speech output engine.
pub trait Synthesizer: Send {
    /// Voices the engine can speak with.
    fn voices(&self) -> Vec<Voice>;

    /// Silence the current utterance and drop anything queued.  Idempotent.
    fn cancel(&mut self);

    /// Queue `request` for playback.
    fn enqueue(&mut self, request: UtteranceRequest) -> Result<(), SynthesisError>;
}

/// Speech output controller.
pub struct SpeechOutput {
    synth: Option<Box<dyn Synthesizer>>,
    config: SpeechConfig,
}

impl SpeechOutput {
    pub fn new(synth: Option<Box<dyn Synthesizer>>, config: SpeechConfig) -> Self {
        Self { synth, config }
    }

    /// Build the host command synthesizer described by `config`, or a silent
    /// controller when output is disabled or no command is configured.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let synth = config
            .command
            .clone()
            .filter(|_| config.enabled)
            .map(|command| Box::new(CommandSynthesizer::new(command)) as Box<dyn Synthesizer>);
        if synth.is_none() {
            log::info!("speech: spoken replies disabled");
        }
        Self::new(synth, config.clone())
    }

    pub fn is_available(&self) -> bool {
        self.config.enabled && self.synth.is_some()
    }

    /// Speak `text`, replacing anything still being read aloud.
    ///
    /// A silent no-op without a synthesizer; engine failures are logged.
    pub fn speak(&mut self, text: &str) {
        if !self.config.enabled {
            return;
        }
        let Some(synth) = self.synth.as_mut() else {
            return;
        };

        synth.cancel();

        let voice = select_voice(&synth.voices(), &self.config.voice_lang);
        let request = UtteranceRequest {
            text: text.to_string(),
            lang: self.config.language.clone(),
            voice,
            rate: self.config.rate,
            pitch: self.config.pitch,
        };
        log::debug!(
            "speech: speaking {} chars with voice {:?}",
            request.text.chars().count(),
            request.voice.as_ref().map(|v| v.name.as_str())
        );

        if let Err(e) = synth.enqueue(request) {
            log::warn!("speech: {e}");
        }
    }
}

/// First voice whose language tag contains `lang`.
fn select_voice(voices: &[Voice], lang: &str) -> Option<Voice> {
    voices.iter().find(|v| v.lang.contains(lang)).cloned()
}
