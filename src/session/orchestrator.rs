//! The session: connection gate, capture controller and speech output wired
//! to the transcript.
//!
//! [`Session`] is the only component that writes to the [`Presenter`].  It is
//! shared as `Arc<Session>` between the UI thread and turn tasks; every
//! method takes `&self`.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::config::BackendConfig;
use crate::connection::{ConnectionError, ConnectionManager, ConnectionState, Endpoint};
use crate::exchange::{ExchangeClient, HttpExchangeClient};
use crate::speech::{CaptureController, CaptureInput, SpeechOutput};
use crate::transcript::{Presenter, Role};

use super::input::Utterance;
use super::turn::{run_turn, TurnOutcome};

/// Prefix of the transcript entry written when a probe fails.
pub const CONNECT_FAILED_PREFIX: &str = "接続に失敗しました: ";

/// Transcript entry announcing a successful connection.
pub fn connected_notice(endpoint: &Endpoint) -> String {
    format!("アシスタント ({endpoint})に接続しました！")
}

pub struct Session {
    presenter: Arc<dyn Presenter>,
    client: reqwest::Client,
    backend: BackendConfig,
    connection: ConnectionManager,
    exchange: OnceLock<Arc<dyn ExchangeClient>>,
    capture: Mutex<CaptureController>,
    speech: Mutex<SpeechOutput>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Session {
    pub fn new(
        backend: BackendConfig,
        presenter: Arc<dyn Presenter>,
        capture: CaptureController,
        speech: SpeechOutput,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            presenter,
            connection: ConnectionManager::new(client.clone(), backend.clone()),
            client,
            backend,
            exchange: OnceLock::new(),
            capture: Mutex::new(capture),
            speech: Mutex::new(speech),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.connection.endpoint()
    }

    /// `true` once connected; typed and voice input are ignored before.
    pub fn accepts_input(&self) -> bool {
        self.connection.state().accepts_input()
    }

    pub fn is_capturing(&self) -> bool {
        lock(&self.capture).is_capturing()
    }

    /// Interim text of the running capture.
    pub fn capture_preview(&self) -> Option<String> {
        lock(&self.capture).preview().map(str::to_string)
    }

    /// Probe `address` and connect to it.
    ///
    /// Every attempt the user can act on ends with a transcript entry: the
    /// address prompt, the connected notice or the failure reason.  Repeated
    /// requests while connecting or connected are only logged.
    pub async fn connect(&self, address: &str) -> Result<Endpoint, ConnectionError> {
        match self.connection.connect(address).await {
            Ok(endpoint) => {
                let client =
                    HttpExchangeClient::new(self.client.clone(), endpoint.clone(), &self.backend);
                let _ = self.exchange.set(Arc::new(client));
                self.presenter
                    .append_message(Role::Assistant, &connected_notice(&endpoint));
                Ok(endpoint)
            }
            Err(e @ ConnectionError::EmptyAddress) => {
                self.presenter.append_message(Role::Assistant, &e.to_string());
                Err(e)
            }
            Err(e @ (ConnectionError::AlreadyConnected(_) | ConnectionError::InProgress)) => {
                log::debug!("session: connect ignored: {e}");
                Err(e)
            }
            Err(e) => {
                self.presenter
                    .append_message(Role::Assistant, &format!("{CONNECT_FAILED_PREFIX}{e}"));
                Err(e)
            }
        }
    }

    /// Run one turn for `utterance`.  `None` when not connected, in which
    /// case nothing is written to the transcript.
    pub async fn submit(&self, utterance: Utterance) -> Option<TurnOutcome> {
        let Some(exchange) = self.exchange.get().cloned() else {
            log::debug!("session: input ignored while {:?}", self.connection_state());
            return None;
        };
        Some(run_turn(exchange.as_ref(), self.presenter.as_ref(), &self.speech, &utterance).await)
    }

    /// Feed the capture controller.  Returns the voice utterance to submit
    /// when a capture finalizes.
    pub fn handle_capture(&self, input: CaptureInput) -> Option<Utterance> {
        let connected = self.accepts_input();
        let text = lock(&self.capture).handle(input, connected)?;
        Utterance::voice(&text)
    }
}
