//! Connection lifecycle state machine.
//!
//! ```text
//! Disconnected ──ConnectRequested──▶ Connecting
//! Connecting   ──ProbeSucceeded───▶ Connected      (terminal for the session)
//! Connecting   ──ProbeFailed──────▶ Disconnected   (user may retry)
//! ```
//!
//! Any other (state, event) pair leaves the state unchanged.

/// Connectivity of the session to the assistant backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Inputs of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectRequested,
    ProbeSucceeded,
    ProbeFailed,
}

impl ConnectionState {
    /// Pure transition function.
    pub fn next(self, event: ConnectionEvent) -> ConnectionState {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Connecting,
            (Connecting, ProbeSucceeded) => Connected,
            (Connecting, ProbeFailed) => Disconnected,
            (state, _) => state,
        }
    }

    /// Input components (capture, exchange) are usable only when connected.
    pub fn accepts_input(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Status text shown next to the connection indicator.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "未接続",
            ConnectionState::Connecting => "接続中...",
            ConnectionState::Connected => "接続済み",
        }
    }
}
