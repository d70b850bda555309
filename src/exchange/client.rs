//! `ExchangeClient` trait and the HTTP implementation with fallback.
//!
//! ```text
//! POST /api/chat {message, stream: false}
//!   ├─ 2xx + JSON       → normalize(reply_fields)           → Ok
//!   ├─ timeout          → Err(Timeout)                       (no fallback)
//!   ├─ 4xx/5xx ≠ 404    → Err(Status{body | "HTTP <code>"})  (no fallback)
//!   └─ 404 / transport / malformed body
//!        └─ POST /api/converse {text}
//!             ├─ 2xx + JSON → normalize(fallback_reply_fields) → Ok
//!             └─ anything else                                 → Ok(FALLBACK_REPLY)
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::BackendConfig;
use crate::connection::Endpoint;

use super::normalize::ReplyNormalizer;

/// Reply used when neither chat path produced an answer.  Returned as a
/// normal reply so the turn still ends with a transcript entry.
pub const FALLBACK_REPLY: &str = "アシスタントに接続しましたが、応答の取得に失敗しました。\
バックエンドが起動しているか確認してください。";

// ---------------------------------------------------------------------------
// ExchangeError
// ---------------------------------------------------------------------------

/// Failures surfaced to the caller of [`ExchangeClient::send`].
///
/// Transport failures and malformed replies never appear here: they are
/// absorbed by the fallback path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The primary path answered with an error status other than 404.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The primary path did not answer within the exchange timeout.
    #[error("タイムアウト")]
    Timeout,
}

impl ExchangeError {
    /// Build a status error, preferring the response body as the message.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body
        };
        ExchangeError::Status { status, message }
    }
}

/// Outcome of a single POST, before the fallback decision is made.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("not found")]
    NotFound,

    #[error("HTTP {status}")]
    Status { status: u16, body: String },

    #[error("timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AttemptError::Timeout
        } else {
            AttemptError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ExchangeClient trait
// ---------------------------------------------------------------------------

/// Sends one utterance to the assistant and returns its display text.
///
/// Implementors must be `Send + Sync`; the session shares one client between
/// concurrently running turns.  Calls are neither queued nor deduplicated.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn send(&self, text: &str) -> Result<String, ExchangeError>;
}

// ---------------------------------------------------------------------------
// HttpExchangeClient
// ---------------------------------------------------------------------------

/// Talks to a connected backend over its JSON chat paths.
pub struct HttpExchangeClient {
    client: reqwest::Client,
    endpoint: Endpoint,
    config: BackendConfig,
    primary: ReplyNormalizer,
    secondary: ReplyNormalizer,
}

impl HttpExchangeClient {
    /// `client` is shared with the connection manager; deadlines are applied
    /// per request from `config`.
    pub fn new(client: reqwest::Client, endpoint: Endpoint, config: &BackendConfig) -> Self {
        Self {
            client,
            endpoint,
            primary: ReplyNormalizer::new(config.reply_fields.clone()),
            secondary: ReplyNormalizer::new(config.fallback_reply_fields.clone()),
            config: config.clone(),
        }
    }

    async fn post_json(&self, url: String, body: &Value) -> Result<Value, AttemptError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.config.exchange_timeout())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AttemptError::NotFound);
        }
        if !status.is_success() {
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| AttemptError::Malformed(e.to_string()))
    }

    /// Secondary path.  Never fails.
    async fn converse(&self, text: &str) -> String {
        let url = self.endpoint.converse_url(&self.config);
        match self.post_json(url, &json!({ "text": text })).await {
            Ok(payload) => self.secondary.normalize(&payload),
            Err(e) => {
                log::warn!("exchange: fallback path failed ({e}), using canned reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[async_trait]
impl ExchangeClient for HttpExchangeClient {
    async fn send(&self, text: &str) -> Result<String, ExchangeError> {
        let url = self.endpoint.chat_url(&self.config);
        let body = json!({ "message": text, "stream": false });

        match self.post_json(url, &body).await {
            Ok(payload) => Ok(self.primary.normalize(&payload)),
            Err(AttemptError::Timeout) => Err(ExchangeError::Timeout),
            Err(AttemptError::Status { status, body }) => Err(ExchangeError::status(status, body)),
            Err(reason) => {
                log::warn!("exchange: primary path unusable ({reason}), trying fallback");
                Ok(self.converse(text).await)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_backend_config, spawn_backend, unreachable_endpoint, Hits};
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Canned stub behaviour for one path.
    #[derive(Clone)]
    enum Reply {
        Json(StatusCode, Value),
        Text(StatusCode, &'static str),
        Slow,
    }

    impl Reply {
        async fn respond(self) -> Response {
            match self {
                Reply::Json(status, value) => (status, Json(value)).into_response(),
                Reply::Text(status, text) => (status, text).into_response(),
                Reply::Slow => {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Json(json!({ "response": "late" })).into_response()
                }
            }
        }
    }

    /// Hits and request bodies seen by one stub path.
    #[derive(Clone, Default)]
    struct Seen {
        hits: Hits,
        bodies: Arc<Mutex<Vec<Value>>>,
    }

    fn route(reply: Reply, seen: Seen) -> axum::routing::MethodRouter {
        post(move |Json(body): Json<Value>| {
            let reply = reply.clone();
            let seen = seen.clone();
            async move {
                seen.hits.hit();
                seen.bodies.lock().unwrap().push(body);
                reply.respond().await
            }
        })
    }

    async fn backend(chat: Reply, converse: Reply) -> (HttpExchangeClient, Seen, Seen) {
        let chat_seen = Seen::default();
        let converse_seen = Seen::default();
        let router = Router::new()
            .route("/api/chat", route(chat, chat_seen.clone()))
            .route("/api/converse", route(converse, converse_seen.clone()));
        let url = spawn_backend(router).await;
        (client_for(&url, &fast_backend_config()), chat_seen, converse_seen)
    }

    fn client_for(url: &str, config: &BackendConfig) -> HttpExchangeClient {
        let endpoint = Endpoint::parse(url).expect("endpoint");
        HttpExchangeClient::new(reqwest::Client::new(), endpoint, config)
    }

    fn unused() -> Reply {
        Reply::Json(StatusCode::OK, json!({ "response": "should not be used" }))
    }

    #[tokio::test]
    async fn primary_reply_is_normalized() {
        let (client, chat, converse) =
            backend(Reply::Json(StatusCode::OK, json!({ "message": "hi" })), unused()).await;

        assert_eq!(client.send("こんにちは").await.unwrap(), "hi");
        assert_eq!(chat.hits.count(), 1);
        assert_eq!(converse.hits.count(), 0);
        assert_eq!(
            chat.bodies.lock().unwrap()[0],
            json!({ "message": "こんにちは", "stream": false })
        );
    }

    #[tokio::test]
    async fn not_found_falls_back_exactly_once() {
        let (client, _chat, converse) = backend(
            Reply::Text(StatusCode::NOT_FOUND, "no such route"),
            Reply::Json(StatusCode::OK, json!({ "text": "fallback hi" })),
        )
        .await;

        assert_eq!(client.send("hello").await.unwrap(), "fallback hi");
        assert_eq!(converse.hits.count(), 1);
        assert_eq!(converse.bodies.lock().unwrap()[0], json!({ "text": "hello" }));
    }

    #[tokio::test]
    async fn server_error_is_surfaced_without_fallback() {
        let (client, _chat, converse) = backend(
            Reply::Text(StatusCode::INTERNAL_SERVER_ERROR, "server error"),
            unused(),
        )
        .await;

        let err = client.send("hello").await.unwrap_err();
        assert_eq!(err, ExchangeError::status(500, "server error"));
        assert!(err.to_string().contains("server error"));
        assert_eq!(converse.hits.count(), 0);
    }

    #[tokio::test]
    async fn empty_error_body_reports_status_code() {
        let (client, _chat, _converse) =
            backend(Reply::Text(StatusCode::SERVICE_UNAVAILABLE, ""), unused()).await;

        let err = client.send("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 503");
    }

    #[tokio::test]
    async fn malformed_primary_body_falls_back() {
        let (client, _chat, converse) = backend(
            Reply::Text(StatusCode::OK, "<html>not json</html>"),
            Reply::Json(StatusCode::OK, json!({ "response": "from converse" })),
        )
        .await;

        assert_eq!(client.send("hello").await.unwrap(), "from converse");
        assert_eq!(converse.hits.count(), 1);
    }

    #[tokio::test]
    async fn both_paths_failing_yields_canned_reply() {
        let (client, _chat, converse) = backend(
            Reply::Text(StatusCode::NOT_FOUND, ""),
            Reply::Text(StatusCode::BAD_GATEWAY, "down"),
        )
        .await;

        assert_eq!(client.send("hello").await.unwrap(), FALLBACK_REPLY);
        assert_eq!(converse.hits.count(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_yields_canned_reply() {
        let client = client_for(&unreachable_endpoint(), &fast_backend_config());
        assert_eq!(client.send("hello").await.unwrap(), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn primary_timeout_is_reported_without_fallback() {
        let (client, _chat, converse) = backend(Reply::Slow, unused()).await;

        assert_eq!(client.send("hello").await.unwrap_err(), ExchangeError::Timeout);
        assert_eq!(converse.hits.count(), 0);
    }

    #[tokio::test]
    async fn secondary_timeout_degrades_to_canned_reply() {
        let (client, _chat, converse) =
            backend(Reply::Text(StatusCode::NOT_FOUND, ""), Reply::Slow).await;

        assert_eq!(client.send("hello").await.unwrap(), FALLBACK_REPLY);
        assert_eq!(converse.hits.count(), 1);
    }

    #[tokio::test]
    async fn configured_reply_fields_are_honoured() {
        let chat_seen = Seen::default();
        let router = Router::new().route(
            "/api/chat",
            route(
                Reply::Json(StatusCode::OK, json!({ "answer": "x", "response": "y" })),
                chat_seen,
            ),
        );
        let url = spawn_backend(router).await;
        let mut config = fast_backend_config();
        config.reply_fields = vec!["answer".into()];

        let client = client_for(&url, &config);
        assert_eq!(client.send("hello").await.unwrap(), "x");
    }

    #[test]
    fn client_is_object_safe() {
        let endpoint = Endpoint::parse("http://localhost:1").unwrap();
        let client: Box<dyn ExchangeClient> = Box::new(HttpExchangeClient::new(
            reqwest::Client::new(),
            endpoint,
            &BackendConfig::default(),
        ));
        drop(client);
    }
}
