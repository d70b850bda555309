//! Text-to-speech through a host program (`espeak-ng`, `say`, ...).
//!
//! One child process per utterance.  The program cannot queue, so enqueuing
//! while a child is still talking replaces it, and [`cancel`] kills it.
//!
//! [`cancel`]: Synthesizer::cancel

use std::process::{Child, Command, Stdio};

use crate::config::SynthCommandConfig;

use super::output::{SynthesisError, Synthesizer, UtteranceRequest, Voice};

/// Words per minute at rate 1.0 (espeak-ng and `say` default).
const BASE_WPM: f32 = 175.0;

pub struct CommandSynthesizer {
    config: SynthCommandConfig,
    child: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(config: SynthCommandConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }

    /// Command-line arguments for `request`, placeholders expanded.
    fn args_for(&self, request: &UtteranceRequest) -> Vec<String> {
        let voice = request.voice.as_ref().map(|v| v.name.as_str());
        let rate_wpm = (BASE_WPM * request.rate).round().max(1.0) as u32;
        let pitch = (50.0 * request.pitch).round().clamp(0.0, 99.0) as u32;

        let expand = |template: &String| {
            template
                .replace("{lang}", &request.lang)
                .replace("{voice}", voice.unwrap_or_default())
                .replace("{rate_wpm}", &rate_wpm.to_string())
                .replace("{pitch}", &pitch.to_string())
                .replace("{text}", &request.text)
        };

        let voice_args = voice.map(|_| self.config.voice_args.iter()).into_iter().flatten();
        voice_args.chain(self.config.args.iter()).map(expand).collect()
    }
}

impl Synthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.config
            .voices
            .iter()
            .map(|v| Voice {
                name: v.name.clone(),
                lang: v.lang.clone(),
            })
            .collect()
    }

    fn cancel(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(None) => {
                log::debug!("speech: stopping {} (pid {})", self.config.program, child.id());
                if let Err(e) = child.kill() {
                    log::warn!("speech: failed to stop {}: {e}", self.config.program);
                }
            }
            Ok(Some(status)) if !status.success() => {
                log::warn!("speech: {} exited with {status}", self.config.program);
            }
            Ok(Some(_)) | Err(_) => {}
        }
        // Reap so the killed child does not linger as a zombie.
        let _ = child.wait();
    }

    fn enqueue(&mut self, request: UtteranceRequest) -> Result<(), SynthesisError> {
        self.cancel();

        let child = Command::new(&self.config.program)
            .args(self.args_for(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SynthesisError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}
