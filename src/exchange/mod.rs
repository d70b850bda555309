//! Message exchange with the assistant backend.
//!
//! This module provides:
//! * [`ExchangeClient`]: async trait the session sends utterances through.
//! * [`HttpExchangeClient`]: primary `/api/chat` with `/api/converse`
//!   fallback, timeouts and failure classification.
//! * [`ReplyNormalizer`]: picks the reply text out of heterogeneous JSON.
//! * [`ExchangeError`]: failures that reach the transcript.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use kani_assistant::config::BackendConfig;
//! use kani_assistant::connection::Endpoint;
//! use kani_assistant::exchange::{ExchangeClient, HttpExchangeClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BackendConfig::default();
//!     let endpoint = Endpoint::parse("http://localhost:18789").unwrap();
//!     let client = HttpExchangeClient::new(reqwest::Client::new(), endpoint, &config);
//!
//!     match client.send("今日の天気は？").await {
//!         Ok(reply) => println!("{reply}"),
//!         Err(e) => eprintln!("エラー: {e}"),
//!     }
//! }
//! ```

pub mod client;
pub mod normalize;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ExchangeClient, ExchangeError, HttpExchangeClient, FALLBACK_REPLY};
pub use normalize::ReplyNormalizer;
