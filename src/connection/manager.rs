//! Reachability probe and connect/retry handling.

use std::sync::{Mutex, OnceLock};

use thiserror::Error;

use crate::config::BackendConfig;

use super::endpoint::Endpoint;
use super::state::{ConnectionEvent, ConnectionState};

// ---------------------------------------------------------------------------
// ConnectionError
// ---------------------------------------------------------------------------

/// Why a connect attempt did not produce a connected session.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The address box was empty; no request was made.
    #[error("URLを入力してください")]
    EmptyAddress,

    /// The endpoint is fixed for the rest of the session.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    /// Another probe is still running.
    #[error("connection attempt already in progress")]
    InProgress,

    /// The probe got an answer other than 2xx or 404.
    #[error("Connection failed (HTTP {0})")]
    UnexpectedStatus(u16),

    /// The probe did not complete within the probe timeout.
    #[error("probe timed out")]
    Timeout,

    /// DNS, TCP, TLS or URL failure.
    #[error("{0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for ConnectionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ConnectionError::Timeout
        } else {
            ConnectionError::Unreachable(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owns the connection state and the endpoint once it is known.
///
/// All methods take `&self` so the manager can sit inside an `Arc`-shared
/// session; the state lock is never held across the probe's `.await`.
pub struct ConnectionManager {
    client: reqwest::Client,
    config: BackendConfig,
    state: Mutex<ConnectionState>,
    endpoint: OnceLock<Endpoint>,
}

impl ConnectionManager {
    pub fn new(client: reqwest::Client, config: BackendConfig) -> Self {
        Self {
            client,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            endpoint: OnceLock::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The endpoint, once connected.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.get()
    }

    /// Probe `address` and, if the backend answers, connect to it.
    ///
    /// A blank address fails with [`ConnectionError::EmptyAddress`] before
    /// any network activity.  A failed probe leaves the manager
    /// `Disconnected` so the user can retry.
    pub async fn connect(&self, address: &str) -> Result<Endpoint, ConnectionError> {
        let endpoint = Endpoint::parse(address).ok_or(ConnectionError::EmptyAddress)?;

        self.begin()?;
        log::debug!("connection: probing {endpoint}");

        match self.probe(&endpoint).await {
            Ok(()) => {
                // Publish the endpoint before the state so any reader that
                // observes `Connected` also finds it.
                let _ = self.endpoint.set(endpoint.clone());
                self.apply(ConnectionEvent::ProbeSucceeded);
                log::info!("connection: connected to {endpoint}");
                Ok(endpoint)
            }
            Err(e) => {
                self.apply(ConnectionEvent::ProbeFailed);
                log::warn!("connection: probe of {endpoint} failed: {e}");
                Err(e)
            }
        }
    }

    /// `GET {endpoint}/api/health`; 2xx and 404 both mean "reachable".
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ConnectionError> {
        let response = self
            .client
            .get(endpoint.health_url(&self.config))
            .timeout(self.config.probe_timeout())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ConnectionError::UnexpectedStatus(status.as_u16()))
        }
    }

    fn begin(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ConnectionState::Disconnected => {
                *state = state.next(ConnectionEvent::ConnectRequested);
                Ok(())
            }
            ConnectionState::Connecting => Err(ConnectionError::InProgress),
            ConnectionState::Connected => Err(ConnectionError::AlreadyConnected(
                self.endpoint
                    .get()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            )),
        }
    }

    fn apply(&self, event: ConnectionEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = state.next(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
