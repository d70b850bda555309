//! Test doubles shared by the connection, exchange and session tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;

use crate::config::BackendConfig;
use crate::transcript::{Presenter, Role};

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub(crate) async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub backend");
    let addr = listener.local_addr().expect("stub backend address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on.
pub(crate) fn unreachable_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{addr}")
}

/// Backend settings with deadlines short enough for tests.
pub(crate) fn fast_backend_config() -> BackendConfig {
    BackendConfig {
        probe_timeout_ms: 300,
        exchange_timeout_ms: 300,
        ..BackendConfig::default()
    }
}

/// Request counter captured by stub handlers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub(crate) fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// One call received by [`RecordingPresenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PresenterCall {
    Append(Role, String),
    ShowTyping,
    RemoveTyping,
}

/// Presenter that records every call and the peak number of visible
/// placeholders.
#[derive(Debug, Default)]
pub(crate) struct RecordingPresenter {
    calls: Mutex<Vec<PresenterCall>>,
    visible: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingPresenter {
    pub(crate) fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of all appended entries, in order.
    pub(crate) fn messages(&self) -> Vec<(Role, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PresenterCall::Append(role, text) => Some((role, text)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, wanted: &PresenterCall) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    pub(crate) fn peak_placeholders(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Presenter for RecordingPresenter {
    fn append_message(&self, role: Role, text: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(PresenterCall::Append(role, text.to_string()));
    }

    fn show_typing_placeholder(&self) {
        let now = self.visible.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(PresenterCall::ShowTyping);
    }

    fn remove_typing_placeholder(&self) {
        self.visible.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(PresenterCall::RemoveTyping);
    }
}
