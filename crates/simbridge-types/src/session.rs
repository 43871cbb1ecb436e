//! Registration descriptor, registration response and advance request body.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SequenceId, SessionId};
use crate::payload::Payload;

/// Display name used when the simulator does not provide one.
pub const DEFAULT_SIMULATOR_NAME: &str = "Rust-Simulator";

/// Default session timeout hint, in seconds.
pub const DEFAULT_SIMULATOR_TIMEOUT_SECS: f64 = 60.0;

/// Descriptor sent when registering a simulator.
///
/// `simulator_context` is an opaque correlation payload that the service
/// uses to route the session; it usually carries a client-generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorInterface {
    /// Display name of the simulator.
    pub name: String,
    /// Seconds the service waits for an advance before dropping the session.
    pub timeout: f64,
    /// Optional capability flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Payload>,
    /// Optional state/action/config schema description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Payload>,
    /// Opaque correlation payload.
    #[serde(default)]
    pub simulator_context: String,
}

impl SimulatorInterface {
    /// Create a descriptor with the given display name and default timeout.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: DEFAULT_SIMULATOR_TIMEOUT_SECS,
            capabilities: None,
            description: None,
            simulator_context: String::new(),
        }
    }

    /// Set the timeout hint.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_secs_f64();
        self
    }

    /// Set the capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Payload) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Set the interface description.
    #[must_use]
    pub fn with_description(mut self, description: Payload) -> Self {
        self.description = Some(description);
        self
    }

    /// Set the simulator context correlation payload.
    #[must_use]
    pub fn with_simulator_context(mut self, context: impl Into<String>) -> Self {
        self.simulator_context = context.into();
        self
    }
}

impl Default for SimulatorInterface {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATOR_NAME)
    }
}

/// Body returned by a successful registration.
///
/// Only `session_id` matters to the session loop; the rest is kept for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorSessionResponse {
    /// Server-assigned session identifier.
    pub session_id: SessionId,
    /// Interface echoed back by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<serde_json::Value>,
    /// Context echoed back by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator_context: Option<serde_json::Value>,
    /// When the session was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_time: Option<DateTime<Utc>>,
    /// When the service last heard from this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_time: Option<DateTime<Utc>>,
    /// Iterations per second observed by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_rate: Option<f64>,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Server-side session status (e.g. `Attachable`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_status: Option<String>,
}

impl SimulatorSessionResponse {
    /// A minimal response carrying only a session id.
    pub const fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            interface: None,
            simulator_context: None,
            registration_time: None,
            last_seen_time: None,
            iteration_rate: None,
            details: None,
            session_status: None,
        }
    }
}

/// Body of an advance request, built fresh from the live model each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorState {
    /// Sequence id echoed from the previous response.
    pub sequence_id: SequenceId,
    /// Current model state.
    pub state: Payload,
    /// Whether the model reached a terminal condition.
    pub halted: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interface_serializes_camel_case() {
        let interface = SimulatorInterface::new("adder")
            .with_timeout(Duration::from_secs(30))
            .with_simulator_context(r#"{"simulatorClientId":"abc"}"#);
        let json = serde_json::to_value(&interface).unwrap();
        assert_eq!(json["name"], "adder");
        assert_eq!(json["timeout"], 30.0);
        assert_eq!(json["simulatorContext"], r#"{"simulatorClientId":"abc"}"#);
        assert!(json.get("capabilities").is_none());
    }

    #[test]
    fn registration_response_tolerates_extra_fields() {
        let body = serde_json::json!({
            "sessionId": "0123",
            "interface": {},
            "simulatorContext": {},
            "registrationTime": "2020-01-01T17:24:34.186309100Z",
            "lastSeenTime": "2020-04-20T17:24:34.186309100Z",
            "iterationRate": 0,
            "details": "",
            "sessionStatus": "Attachable",
            "sessionProgress": {}
        });
        let response: SimulatorSessionResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.session_id.as_str(), "0123");
        assert_eq!(response.session_status.as_deref(), Some("Attachable"));
        assert!(response.registration_time.is_some());
    }

    #[test]
    fn state_body_shape() {
        let state = SimulatorState {
            sequence_id: SequenceId::INITIAL,
            state: Payload::from(serde_json::json!({"x": 1})),
            halted: false,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sequenceId": 1, "state": {"x": 1}, "halted": false})
        );
    }
}
