//! Push-to-talk recognition engine backed by the microphone and Whisper.
//!
//! Each [`start`] spawns a capture thread that owns the cpal stream, listens
//! until the speaker pauses (or the length limit), transcribes the captured
//! audio and reports `Final` followed by `Ended`.  [`stop`] discards the
//! audio.  The engine produces no interim hypotheses.
//!
//! [`start`]: RecognitionEngine::start
//! [`stop`]: RecognitionEngine::stop

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::SttConfig;

use super::audio::{self, AudioChunk, Detection, EndpointDetector, MicError};
use super::capture::{CaptureEngineError, RecognitionEngine, RecognitionEvent, SessionId};
use super::whisper::Transcriber;

/// How often the capture loop re-checks the stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest `start` waits for the audio device before giving up.
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens the audio source on the capture thread.  The returned guard keeps
/// it running until dropped.
type OpenInput = fn(mpsc::Sender<AudioChunk>) -> Result<Box<dyn Any>, MicError>;

fn open_microphone(tx: mpsc::Sender<AudioChunk>) -> Result<Box<dyn Any>, MicError> {
    let stream = audio::open_microphone(tx)?;
    Ok(Box::new(stream))
}

pub struct MicRecognizer {
    transcriber: Arc<dyn Transcriber>,
    events: UnboundedSender<RecognitionEvent>,
    config: SttConfig,
    active: Option<Arc<AtomicBool>>,
    open_input: OpenInput,
    open_timeout: Duration,
}

impl MicRecognizer {
    /// Recognition events are delivered on `events`.
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        events: UnboundedSender<RecognitionEvent>,
        config: SttConfig,
    ) -> Self {
        Self {
            transcriber,
            events,
            config,
            active: None,
            open_input: open_microphone,
            open_timeout: OPEN_TIMEOUT,
        }
    }

    fn detector(&self) -> EndpointDetector {
        EndpointDetector::new(
            self.config.vad_threshold,
            Duration::from_millis(self.config.end_silence_ms),
            Duration::from_secs_f32(self.config.max_capture_secs.max(0.5)),
        )
    }
}

impl RecognitionEngine for MicRecognizer {
    fn start(&mut self, session: SessionId, language: &str) -> Result<(), CaptureEngineError> {
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let worker = CaptureWorker {
            session,
            language: language.to_string(),
            transcriber: Arc::clone(&self.transcriber),
            events: self.events.clone(),
            stop: Arc::clone(&stop),
            detector: self.detector(),
        };

        let open_input = self.open_input;
        let (ready_tx, ready_rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("kani-capture-{session}"))
            .spawn(move || {
                let (tx, rx) = mpsc::channel();
                let stream = match open_input(tx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                worker.run(rx, stream);
            })
            .map_err(|e| CaptureEngineError::Device(e.to_string()))?;

        match ready_rx.recv_timeout(self.open_timeout) {
            Ok(Ok(())) => {
                log::debug!("recognizer: session {session} listening");
                self.active = Some(stop);
                Ok(())
            }
            Ok(Err(e)) => Err(CaptureEngineError::Device(e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // A device that opens late finds the flag set and only
                // reports `Ended` for a session nobody waits on.
                stop.store(true, Ordering::SeqCst);
                log::warn!(
                    "recognizer: microphone did not open within {:?}",
                    self.open_timeout
                );
                Err(CaptureEngineError::Device(format!(
                    "microphone did not open within {:?}",
                    self.open_timeout
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(CaptureEngineError::Device("capture thread exited".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stop) = self.active.take() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for MicRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// CaptureWorker
// ---------------------------------------------------------------------------

/// Everything one capture thread needs.  Independent of cpal so the
/// listening loop can be fed synthetic chunks.
struct CaptureWorker {
    session: SessionId,
    language: String,
    transcriber: Arc<dyn Transcriber>,
    events: UnboundedSender<RecognitionEvent>,
    stop: Arc<AtomicBool>,
    detector: EndpointDetector,
}

impl CaptureWorker {
    /// Listen, transcribe and report.  `input` keeps the audio source alive
    /// until listening is over.
    fn run<S>(mut self, chunks: mpsc::Receiver<AudioChunk>, input: S) {
        let outcome = self.listen(&chunks);
        drop(input);

        let session = self.session;
        match outcome {
            Err(message) => self.emit(RecognitionEvent::Error { session, message }),
            Ok(()) if self.stopped() => {}
            Ok(()) if !self.detector.heard_speech() => self.emit(RecognitionEvent::Error {
                session,
                message: "no-speech".into(),
            }),
            Ok(()) => match self.transcriber.transcribe(self.detector.speech(), &self.language) {
                // Stopped while transcribing: the result is discarded.
                _ if self.stopped() => {}
                Ok(text) => self.emit(RecognitionEvent::Final { session, text }),
                Err(e) => self.emit(RecognitionEvent::Error {
                    session,
                    message: e.to_string(),
                }),
            },
        }
        self.emit(RecognitionEvent::Ended { session });
    }

    /// Feed chunks to the detector until it reports an endpoint or the
    /// capture is stopped.
    fn listen(&mut self, chunks: &mpsc::Receiver<AudioChunk>) -> Result<(), String> {
        loop {
            if self.stopped() {
                return Ok(());
            }
            match chunks.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => {
                    let mono = audio::downmix(&chunk.samples, chunk.channels);
                    let pcm = audio::resample_to_16k(&mono, chunk.sample_rate);
                    match self.detector.push(&pcm) {
                        Detection::Listening => {}
                        Detection::SpeechEnded | Detection::LimitReached => return Ok(()),
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err("audio-capture".into());
                }
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn emit(&self, event: RecognitionEvent) {
        // The receiver only disappears when the application is closing.
        let _ = self.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
