//! Per-request execution context.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use uuid::Uuid;

/// Context handed to a runtime's permission check and to callback-enabled
/// methods.
///
/// This is the request-side data a host can expose without leaking its HTTP
/// framework types into runtimes.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request, used to correlate logs.
    pub request_id: Uuid,
    /// Remote peer address, if the host knows it.
    pub peer: Option<SocketAddr>,
    /// Request headers, lower-cased names.
    pub headers: BTreeMap<String, String>,
}

impl RequestContext {
    /// Create an empty context with a fresh request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            peer: None,
            headers: BTreeMap::new(),
        }
    }

    /// Set the remote peer address.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Add a header. The name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
