//! Protocol violations detected while decoding server responses.

/// A response was well-formed JSON but broke the session protocol.
///
/// These are never retried: a server that sends a malformed event will
/// send it again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The event `type` field named a variant this client does not know.
    #[error("unknown event type `{0}`")]
    UnknownEventType(String),

    /// The event body required by the event type was absent.
    #[error("{event_type} event is missing its `{field}` body")]
    MissingBody {
        /// The event type that was received.
        event_type: &'static str,
        /// The wire field that should have carried the body.
        field: &'static str,
    },

    /// Registration succeeded but the server assigned no session id.
    #[error("server returned an empty session id")]
    EmptySessionId,
}
