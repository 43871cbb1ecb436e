//! Error types for the simulator client.
//!
//! Uses `thiserror` for typed errors at each layer:
//!
//! - [`ConfigError`] -- raised at construction, before any network call
//! - [`TransportError`] -- one outbound HTTP exchange, classified as
//!   transient (retried by the transport) or not
//! - [`SessionError`] -- the session registrar and advance loop
//! - [`BrainError`] -- the exported-brain prediction loop

use simbridge_types::{ProblemDetails, ProtocolError, SequenceId};

/// Configuration is invalid or missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No workspace was supplied.
    #[error(
        "workspace has not been set: set SIM_WORKSPACE, pass --workspace, or set it on the config"
    )]
    MissingWorkspace,

    /// No access key was supplied.
    #[error(
        "access key has not been set: set SIM_ACCESS_KEY, pass --accesskey, or set it on the config"
    )]
    MissingAccessKey,

    /// The server URL is blank.
    #[error("server URL has not been set")]
    MissingServer,

    /// The exported-brain mode was selected without a prediction URL.
    #[error("no URL configured for the exported brain")]
    MissingExportedBrainUrl,

    /// Client-credentials authentication was requested with a blank field.
    #[error("client credentials are incomplete: {0} is empty")]
    IncompleteCredentials(&'static str),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid {name}: {message}")]
    InvalidValue {
        /// Variable or option name.
        name: &'static str,
        /// Parser message.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// A single outbound exchange failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established or broke mid-exchange.
    #[error("connection to {url} failed: {message}")]
    Connect {
        /// Request URL.
        url: String,
        /// Underlying client message.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {detail}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Problem details, if the body carried them.
        problem: Option<ProblemDetails>,
        /// Human-readable summary of the body.
        detail: String,
    },

    /// The request URL could not be parsed.
    #[error("invalid request URL {url}: {message}")]
    InvalidUrl {
        /// Request URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The request body could not be encoded.
    #[error("failed to encode request for {url}: {message}")]
    Encode {
        /// Request URL.
        url: String,
        /// Serializer message.
        message: String,
    },

    /// The response body could not be decoded into the expected type.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Deserializer message.
        message: String,
    },
}

/// Longest body excerpt kept in a [`TransportError::Status`] detail.
const MAX_DETAIL_LEN: usize = 512;

impl TransportError {
    /// Build a status error from a response body, decoding problem details
    /// when present.
    pub fn from_status(url: &str, status: u16, body: &str) -> Self {
        let problem = ProblemDetails::from_body(body);
        let detail = problem.as_ref().map_or_else(
            || {
                if body.trim().is_empty() {
                    "empty body".to_owned()
                } else {
                    truncate(body.trim(), MAX_DETAIL_LEN)
                }
            },
            ProblemDetails::summary,
        );
        Self::Status {
            url: url.to_owned(),
            status,
            problem,
            detail,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures, timeouts, 408, 429 and 5xx (other than 501 and
    /// 505) are transient. Everything else, including undecodable bodies, is
    /// final.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                matches!(*status, 408 | 429) || (*status >= 500 && *status != 501 && *status != 505)
            }
            Self::InvalidUrl { .. } | Self::Encode { .. } | Self::Decode { .. } => false,
        }
    }

    /// HTTP status, when the server answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced by the session registrar and advance loop.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration was rejected before any network call.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Registration failed after the transport exhausted its retries.
    #[error("session registration failed: {0}")]
    Registration(#[source] TransportError),

    /// An advance exchange failed after the transport exhausted its retries.
    #[error("advance failed at sequence {sequence_id}: {source}")]
    Advance {
        /// Sequence id that was being sent.
        sequence_id: SequenceId,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The server broke the session protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// A model hook returned an error.
    #[error("model hook `{hook}` failed: {source}")]
    Model {
        /// Which hook failed (`state`, `start`, `step`).
        hook: &'static str,
        /// Error returned by the model.
        #[source]
        source: anyhow::Error,
    },

    /// `advance` was called before `register`.
    #[error("session is not registered")]
    NotRegistered,

    /// The loop already reached its terminal state.
    #[error("session already terminated")]
    AlreadyTerminated,
}

/// Errors surfaced by the exported-brain prediction loop.
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    /// Configuration was rejected before any network call.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The client-credentials token exchange failed.
    #[error("token exchange failed: {0}")]
    Token(#[source] TransportError),

    /// The caller's token hook returned an error.
    #[error("token hook failed: {0}")]
    TokenHook(#[source] anyhow::Error),

    /// A prediction request failed.
    #[error("prediction {iteration} failed: {source}")]
    Predict {
        /// Zero-based iteration number.
        iteration: u64,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// A model hook returned an error.
    #[error("model hook `{hook}` failed: {source}")]
    Model {
        /// Which hook failed (`state`, `step`).
        hook: &'static str,
        /// Error returned by the model.
        #[source]
        source: anyhow::Error,
    },
}

/// Render an error with its full source chain on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // thiserror variants often inline their source in the message.
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

/// Truncate a string to at most `max_len` bytes on a valid UTF-8 boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_owned();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    let mut truncated = s.get(..end).unwrap_or_default().to_owned();
    truncated.push_str("...");
    truncated
}
