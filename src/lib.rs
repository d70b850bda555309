//! Kani Assistant: voice and text chat front-end for a remote assistant
//! backend.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`connection`] | reachability probe, connection state machine, endpoint |
//! | [`exchange`] | primary/fallback chat protocol and reply normalization |
//! | [`speech`] | push-to-talk capture state machine, Whisper engine, spoken replies |
//! | [`session`] | turn orchestration over the transcript |
//! | [`transcript`] | presentation trait and the shared transcript model |
//! | [`config`] | `settings.toml` persistence |
//! | [`app`] | egui chat window |

pub mod app;
pub mod config;
pub mod connection;
pub mod exchange;
pub mod session;
pub mod speech;
pub mod transcript;

#[cfg(test)]
mod test_support;
