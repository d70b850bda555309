//! Connection to the assistant backend.
//!
//! [`ConnectionManager::connect`] probes the backend's health path and, when
//! it answers, fixes the [`Endpoint`] for the rest of the session.  The
//! lifecycle itself is the pure [`ConnectionState::next`] transition
//! function.

pub mod endpoint;
pub mod manager;
pub mod state;

pub use endpoint::Endpoint;
pub use manager::{ConnectionError, ConnectionManager};
pub use state::{ConnectionEvent, ConnectionState};
