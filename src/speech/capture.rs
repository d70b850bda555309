//! Speech capture state machine.
//!
//! ```text
//! Idle ──Start (connected)──────────────────────▶ Capturing
//! Capturing ──Interim──────────────────────────▶ Capturing (preview only)
//! Capturing ──Final────────────────────────────▶ Idle, emits the utterance
//! Capturing ──Stop / GestureLost / Error / Ended─▶ Idle, emits nothing
//! ```
//!
//! Every other combination is a no-op: starting while disconnected or
//! already capturing, stopping while idle, and engine events that belong to
//! an earlier recognition session.  The table lives in the pure
//! [`transition`] function; [`CaptureController`] runs its effects against a
//! [`RecognitionEngine`].

use thiserror::Error;

/// Identifies one start→end recognition session.
pub type SessionId = u64;

// ---------------------------------------------------------------------------
// Engine interface
// ---------------------------------------------------------------------------

/// Callbacks of a recognition engine, delivered as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Current non-final hypothesis for the whole session.
    Interim { session: SessionId, text: String },
    /// The engine committed to a result.
    Final { session: SessionId, text: String },
    /// The engine gave up.
    Error { session: SessionId, message: String },
    /// The engine stopped listening without a final result.
    Ended { session: SessionId },
}

impl RecognitionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            RecognitionEvent::Interim { session, .. }
            | RecognitionEvent::Final { session, .. }
            | RecognitionEvent::Error { session, .. }
            | RecognitionEvent::Ended { session } => *session,
        }
    }
}

/// Errors raised synchronously by [`RecognitionEngine::start`].
#[derive(Debug, Error)]
pub enum CaptureEngineError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("capture device error: {0}")]
    Device(String),

    #[error("recognition already running")]
    Busy,
}

/// Host speech recognizer.
///
/// `start` begins listening for `session` in `language`; results arrive
/// later as [`RecognitionEvent`]s tagged with the same session.  `stop` must
/// be idempotent.
pub trait RecognitionEngine: Send {
    fn start(&mut self, session: SessionId, language: &str) -> Result<(), CaptureEngineError>;
    fn stop(&mut self);
}

/// Engine for hosts without speech recognition.  Every start fails.
#[derive(Debug, Default)]
pub struct UnavailableRecognizer {
    pub reason: String,
}

impl RecognitionEngine for UnavailableRecognizer {
    fn start(&mut self, _session: SessionId, _language: &str) -> Result<(), CaptureEngineError> {
        Err(CaptureEngineError::Unavailable(self.reason.clone()))
    }

    fn stop(&mut self) {}
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Capture phase.  `preview` holds the latest interim hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing { session: SessionId, preview: String },
}

/// Inputs of the capture state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureInput {
    /// The holding gesture began (mic button pressed).
    Start,
    /// The holding gesture ended normally or the user cancelled.
    Stop,
    /// The pointer left the mic button while held.
    GestureLost,
    Engine(RecognitionEvent),
}

/// Side effects requested by [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEffect {
    StartEngine(SessionId),
    StopEngine,
    /// A finalized utterance for the session orchestrator.
    Emit(String),
}

/// Pure transition function of the capture state machine.
///
/// `next_session` is the id a new capture would receive.
pub fn transition(
    state: &CaptureState,
    input: CaptureInput,
    connected: bool,
    next_session: SessionId,
) -> (CaptureState, Vec<CaptureEffect>) {
    use CaptureEffect::*;

    let CaptureState::Capturing { session, .. } = state else {
        return match input {
            CaptureInput::Start if connected => (
                CaptureState::Capturing {
                    session: next_session,
                    preview: String::new(),
                },
                vec![StartEngine(next_session)],
            ),
            _ => (CaptureState::Idle, Vec::new()),
        };
    };
    let current = *session;

    match input {
        CaptureInput::Start => (state.clone(), Vec::new()),
        CaptureInput::Stop | CaptureInput::GestureLost => (CaptureState::Idle, vec![StopEngine]),
        CaptureInput::Engine(event) if event.session() != current => (state.clone(), Vec::new()),
        CaptureInput::Engine(RecognitionEvent::Interim { text, .. }) => (
            CaptureState::Capturing {
                session: current,
                preview: text,
            },
            Vec::new(),
        ),
        CaptureInput::Engine(RecognitionEvent::Final { text, .. }) => {
            let mut effects = vec![StopEngine];
            if !text.trim().is_empty() {
                effects.push(Emit(text));
            }
            (CaptureState::Idle, effects)
        }
        CaptureInput::Engine(RecognitionEvent::Error { .. } | RecognitionEvent::Ended { .. }) => {
            (CaptureState::Idle, vec![StopEngine])
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureController
// ---------------------------------------------------------------------------

/// Drives a [`RecognitionEngine`] through the capture state machine.
pub struct CaptureController {
    engine: Box<dyn RecognitionEngine>,
    language: String,
    state: CaptureState,
    next_session: SessionId,
}

impl CaptureController {
    /// `language` is the fixed recognition language tag (e.g. `"ja-JP"`).
    pub fn new(engine: Box<dyn RecognitionEngine>, language: impl Into<String>) -> Self {
        Self {
            engine,
            language: language.into(),
            state: CaptureState::Idle,
            next_session: 1,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Drives the recording indicator.
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Capturing { .. })
    }

    /// Live interim text of the running capture, if any.
    pub fn preview(&self) -> Option<&str> {
        match &self.state {
            CaptureState::Capturing { preview, .. } if !preview.is_empty() => Some(preview.as_str()),
            _ => None,
        }
    }

    /// Feed one input.  Returns the finalized utterance, at most once per
    /// capture session.
    ///
    /// Engine failures, including a failed start, only reset the state.
    pub fn handle(&mut self, input: CaptureInput, connected: bool) -> Option<String> {
        let (next, effects) = transition(&self.state, input, connected, self.next_session);
        if next != self.state {
            log::debug!("capture: {:?} → {:?}", self.state, next);
        }
        self.state = next;

        let mut emitted = None;
        for effect in effects {
            match effect {
                CaptureEffect::StartEngine(session) => {
                    self.next_session = session + 1;
                    if let Err(e) = self.engine.start(session, &self.language) {
                        log::warn!("capture: engine failed to start: {e}");
                        self.state = CaptureState::Idle;
                    }
                }
                CaptureEffect::StopEngine => self.engine.stop(),
                CaptureEffect::Emit(text) => emitted = Some(text),
            }
        }
        emitted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum EngineCall {
        Start(SessionId, String),
        Stop,
    }

    /// Records calls; optionally refuses to start.
    #[derive(Clone, Default)]
    struct FakeEngine {
        calls: Arc<Mutex<Vec<EngineCall>>>,
        refuse: bool,
    }

    impl RecognitionEngine for FakeEngine {
        fn start(&mut self, session: SessionId, language: &str) -> Result<(), CaptureEngineError> {
            if self.refuse {
                return Err(CaptureEngineError::Device("no microphone".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(EngineCall::Start(session, language.to_string()));
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push(EngineCall::Stop);
        }
    }

    fn controller() -> (CaptureController, Arc<Mutex<Vec<EngineCall>>>) {
        let engine = FakeEngine::default();
        let calls = Arc::clone(&engine.calls);
        (CaptureController::new(Box::new(engine), "ja-JP"), calls)
    }

    fn interim(session: SessionId, text: &str) -> CaptureInput {
        CaptureInput::Engine(RecognitionEvent::Interim {
            session,
            text: text.into(),
        })
    }

    fn final_result(session: SessionId, text: &str) -> CaptureInput {
        CaptureInput::Engine(RecognitionEvent::Final {
            session,
            text: text.into(),
        })
    }

    // ---- transition table ---

    #[test]
    fn start_while_disconnected_is_noop() {
        let (state, effects) = transition(&CaptureState::Idle, CaptureInput::Start, false, 1);
        assert_eq!(state, CaptureState::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn start_while_connected_begins_capture() {
        let (state, effects) = transition(&CaptureState::Idle, CaptureInput::Start, true, 7);
        assert_eq!(
            state,
            CaptureState::Capturing {
                session: 7,
                preview: String::new()
            }
        );
        assert_eq!(effects, vec![CaptureEffect::StartEngine(7)]);
    }

    #[test]
    fn stop_while_idle_is_noop() {
        for input in [CaptureInput::Stop, CaptureInput::GestureLost] {
            let (state, effects) = transition(&CaptureState::Idle, input, true, 1);
            assert_eq!(state, CaptureState::Idle);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn final_for_other_session_is_ignored() {
        let capturing = CaptureState::Capturing {
            session: 2,
            preview: String::new(),
        };
        let (state, effects) = transition(&capturing, final_result(1, "stale"), true, 3);
        assert_eq!(state, capturing);
        assert!(effects.is_empty());
    }

    #[test]
    fn blank_final_emits_nothing() {
        let capturing = CaptureState::Capturing {
            session: 1,
            preview: String::new(),
        };
        let (state, effects) = transition(&capturing, final_result(1, "  "), true, 2);
        assert_eq!(state, CaptureState::Idle);
        assert_eq!(effects, vec![CaptureEffect::StopEngine]);
    }

    // ---- controller ---

    #[test]
    fn final_result_is_emitted_once() {
        let (mut c, calls) = controller();

        assert_eq!(c.handle(CaptureInput::Start, true), None);
        assert!(c.is_capturing());
        assert_eq!(c.handle(final_result(1, "こんにちは"), true).as_deref(), Some("こんにちは"));
        assert!(!c.is_capturing());

        // A duplicate final after the session closed changes nothing.
        assert_eq!(c.handle(final_result(1, "こんにちは"), true), None);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![EngineCall::Start(1, "ja-JP".into()), EngineCall::Stop]
        );
    }

    #[test]
    fn interim_updates_preview_without_emitting() {
        let (mut c, _calls) = controller();
        c.handle(CaptureInput::Start, true);

        assert_eq!(c.handle(interim(1, "こん"), true), None);
        assert_eq!(c.preview(), Some("こん"));
        assert_eq!(c.handle(interim(1, "こんにち"), true), None);
        assert_eq!(c.preview(), Some("こんにち"));
        assert!(c.is_capturing());
    }

    #[test]
    fn stop_before_final_emits_nothing() {
        let (mut c, calls) = controller();
        c.handle(CaptureInput::Start, true);
        c.handle(interim(1, "途中"), true);

        assert_eq!(c.handle(CaptureInput::Stop, true), None);
        assert!(!c.is_capturing());
        assert_eq!(c.preview(), None);

        // The engine's late final for the abandoned session is dropped.
        assert_eq!(c.handle(final_result(1, "途中まで"), true), None);
        assert_eq!(calls.lock().unwrap().last(), Some(&EngineCall::Stop));
    }

    #[test]
    fn gesture_loss_ends_capture() {
        let (mut c, _calls) = controller();
        c.handle(CaptureInput::Start, true);
        assert_eq!(c.handle(CaptureInput::GestureLost, true), None);
        assert!(!c.is_capturing());
    }

    #[test]
    fn engine_error_resets_silently() {
        let (mut c, _calls) = controller();
        c.handle(CaptureInput::Start, true);

        let err = CaptureInput::Engine(RecognitionEvent::Error {
            session: 1,
            message: "no-speech".into(),
        });
        assert_eq!(c.handle(err, true), None);
        assert_eq!(c.state(), &CaptureState::Idle);
    }

    #[test]
    fn engine_end_without_final_emits_nothing() {
        let (mut c, _calls) = controller();
        c.handle(CaptureInput::Start, true);
        let ended = CaptureInput::Engine(RecognitionEvent::Ended { session: 1 });
        assert_eq!(c.handle(ended, true), None);
        assert!(!c.is_capturing());
    }

    #[test]
    fn start_while_disconnected_never_reaches_engine() {
        let (mut c, calls) = controller();
        assert_eq!(c.handle(CaptureInput::Start, false), None);
        assert!(!c.is_capturing());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn second_start_while_capturing_is_ignored() {
        let (mut c, calls) = controller();
        c.handle(CaptureInput::Start, true);
        c.handle(CaptureInput::Start, true);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn each_capture_gets_a_new_session() {
        let (mut c, calls) = controller();
        c.handle(CaptureInput::Start, true);
        c.handle(CaptureInput::Stop, true);
        c.handle(CaptureInput::Start, true);

        // Session 1's result arrives late and must not finalize session 2.
        assert_eq!(c.handle(final_result(1, "old"), true), None);
        assert!(c.is_capturing());
        assert_eq!(c.handle(final_result(2, "new"), true).as_deref(), Some("new"));
        assert_eq!(
            calls.lock().unwrap()[2],
            EngineCall::Start(2, "ja-JP".into())
        );
    }

    #[test]
    fn failed_engine_start_returns_to_idle() {
        let engine = FakeEngine {
            refuse: true,
            ..FakeEngine::default()
        };
        let mut c = CaptureController::new(Box::new(engine), "ja-JP");

        assert_eq!(c.handle(CaptureInput::Start, true), None);
        assert!(!c.is_capturing());
    }

    #[test]
    fn unavailable_recognizer_never_starts() {
        let mut c = CaptureController::new(
            Box::new(UnavailableRecognizer {
                reason: "no model".into(),
            }),
            "ja-JP",
        );
        c.handle(CaptureInput::Start, true);
        assert!(!c.is_capturing());
    }
}
