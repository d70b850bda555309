//! Backend base address and the request targets derived from it.

use std::fmt;

use crate::config::BackendConfig;

/// Base address of the assistant backend, e.g. `http://localhost:18789`.
///
/// Constructed once by a successful connect and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Endpoint {
    /// Parse a user-entered address.
    ///
    /// Surrounding whitespace and trailing slashes are dropped so that
    /// `http://host/` and `http://host` derive the same targets.  Returns
    /// `None` when nothing is left.
    ///
    /// ```
    /// use kani_assistant::connection::Endpoint;
    ///
    /// let ep = Endpoint::parse("  http://localhost:18789/ ").unwrap();
    /// assert_eq!(ep.as_str(), "http://localhost:18789");
    /// assert!(Endpoint::parse("   ").is_none());
    /// ```
    pub fn parse(address: &str) -> Option<Self> {
        let base = address.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        Some(Self {
            base: base.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// `base` joined with a configured `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn health_url(&self, config: &BackendConfig) -> String {
        self.url(&config.health_path)
    }

    pub fn chat_url(&self, config: &BackendConfig) -> String {
        self.url(&config.chat_path)
    }

    pub fn converse_url(&self, config: &BackendConfig) -> String {
        self.url(&config.converse_path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
