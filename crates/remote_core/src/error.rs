//! Bridge error taxonomy.
//!
//! Most variants never reach a client: unknown runtimes, vetoed permissions
//! and failed lookups drop the single command or subscription that caused
//! them. Only [`RemoteError::MalformedRequest`], [`RemoteError::Json`] and
//! [`RemoteError::SessionLimit`] are answered with an error status by the
//! host.

/// Errors that can occur while dispatching commands or aggregating events.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No runtime is registered under the engine name.
    #[error("unknown runtime '{0}'")]
    UnknownRuntime(String),

    /// The runtime's permission check vetoed the request.
    #[error("permission denied by runtime '{0}'")]
    PermissionDenied(String),

    /// A path segment does not exist in the runtime's object graph.
    #[error("no such object '{segment}' in '{path}'")]
    Lookup {
        /// The full dotted path that was being resolved.
        path: String,
        /// The first segment that could not be found.
        segment: String,
    },

    /// The final path segment of a `call` is not a method.
    #[error("'{0}' is not invocable")]
    NotInvocable(String),

    /// The final path segment of a `set` is not a property.
    #[error("'{0}' is not assignable")]
    NotAssignable(String),

    /// The request could not be understood.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A JSON payload failed to encode or decode.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The runtime's event store failed to answer a pull.
    #[error("event store error: {0}")]
    EventStore(String),

    /// Too many long-poll sessions are open at once.
    #[error("session limit of {max} reached")]
    SessionLimit {
        /// The configured maximum.
        max: usize,
    },
}

impl RemoteError {
    /// Returns `true` for errors that drop a single item silently instead of
    /// failing the whole request.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::UnknownRuntime(_)
                | Self::PermissionDenied(_)
                | Self::Lookup { .. }
                | Self::NotInvocable(_)
                | Self::NotAssignable(_)
                | Self::EventStore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_message_names_segment() {
        let err = RemoteError::Lookup {
            path: "player.stats.hp".to_string(),
            segment: "stats".to_string(),
        };
        assert_eq!(err.to_string(), "no such object 'stats' in 'player.stats.hp'");
    }

    #[test]
    fn test_silent_classification() {
        assert!(RemoteError::UnknownRuntime("x".into()).is_silent());
        assert!(RemoteError::PermissionDenied("x".into()).is_silent());
        assert!(!RemoteError::MalformedRequest("bad".into()).is_silent());
        assert!(!RemoteError::SessionLimit { max: 1 }.is_silent());
    }
}
