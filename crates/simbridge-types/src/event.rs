//! Events returned by the advance call.
//!
//! On the wire an event is a flat object with a `type` discriminator and
//! one populated body field per type:
//!
//! ```text
//! { "type": "EpisodeStep", "sessionId": "...", "sequenceId": 3,
//!   "episodeStep": { "action": { ... } } }
//! ```
//!
//! [`Event`] decodes that shape into a tagged [`EventKind`] so that exactly
//! one variant is ever populated. Missing bodies fall back to their
//! defaults, except `episodeStep` whose action is mandatory.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::ids::{SequenceId, SessionId};
use crate::payload::Payload;

/// Why the service ended an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodeFinishReason {
    /// No reason given.
    #[default]
    Unspecified,
    /// The curriculum moved to a new lesson.
    LessonChanged,
    /// A terminal condition was reached.
    Terminal,
    /// The episode was interrupted by the service.
    Interrupted,
    /// The simulator sent an invalid state.
    Invalid,
    /// A reason this client does not know.
    #[serde(other)]
    Unknown,
}

/// Why the service unregistered a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnregisterReason {
    /// No reason given.
    #[default]
    Unspecified,
    /// Training or assessment finished.
    Finished,
    /// The service hit an error.
    Error,
    /// The session was not found.
    NotFound,
    /// A reason this client does not know.
    #[serde(other)]
    Unknown,
}

/// The variant-specific part of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A new episode begins with the given configuration.
    EpisodeStart {
        /// Episode configuration for the model.
        config: Payload,
    },
    /// Apply an action to the model.
    EpisodeStep {
        /// Action for the model.
        action: Payload,
    },
    /// The current episode ended.
    EpisodeFinish {
        /// Why the episode ended.
        reason: EpisodeFinishReason,
    },
    /// Wait before advancing again.
    Idle {
        /// Minimum delay before the next advance.
        callback_time: Duration,
    },
    /// The service is dropping the session.
    Unregister {
        /// Why the session is being dropped.
        reason: UnregisterReason,
        /// Free-form explanation.
        details: Option<String>,
    },
}

impl EventKind {
    /// Wire name of the event type.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EpisodeStart { .. } => "EpisodeStart",
            Self::EpisodeStep { .. } => "EpisodeStep",
            Self::EpisodeFinish { .. } => "EpisodeFinish",
            Self::Idle { .. } => "Idle",
            Self::Unregister { .. } => "Unregister",
        }
    }
}

/// An event returned by the advance call, with the sequence id to echo next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    /// Session the event belongs to, if the server echoed it.
    pub session_id: Option<SessionId>,
    /// Sequence id to send on the next advance.
    pub sequence_id: SequenceId,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// Build an event without a session id.
    pub const fn new(sequence_id: SequenceId, kind: EventKind) -> Self {
        Self {
            session_id: None,
            sequence_id,
            kind,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
    sequence_id: SequenceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    episode_start: Option<EpisodeStartBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    episode_step: Option<EpisodeStepBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    episode_finish: Option<EpisodeFinishBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idle: Option<IdleBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unregister: Option<UnregisterBody>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EpisodeStartBody {
    #[serde(default)]
    config: Payload,
}

#[derive(Debug, Serialize, Deserialize)]
struct EpisodeStepBody {
    action: Payload,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EpisodeFinishBody {
    #[serde(default)]
    reason: EpisodeFinishReason,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdleBody {
    /// Seconds; fractional values are allowed.
    #[serde(default)]
    callback_time: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UnregisterBody {
    #[serde(default)]
    reason: UnregisterReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl TryFrom<WireEvent> for Event {
    type Error = ProtocolError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let kind = match wire.event_type.as_str() {
            "EpisodeStart" => EventKind::EpisodeStart {
                config: wire.episode_start.unwrap_or_default().config,
            },
            "EpisodeStep" => EventKind::EpisodeStep {
                action: wire
                    .episode_step
                    .ok_or(ProtocolError::MissingBody {
                        event_type: "EpisodeStep",
                        field: "episodeStep",
                    })?
                    .action,
            },
            "EpisodeFinish" => EventKind::EpisodeFinish {
                reason: wire.episode_finish.unwrap_or_default().reason,
            },
            "Idle" => EventKind::Idle {
                callback_time: callback_duration(wire.idle.unwrap_or_default().callback_time),
            },
            "Unregister" => {
                let body = wire.unregister.unwrap_or_default();
                EventKind::Unregister {
                    reason: body.reason,
                    details: body.details,
                }
            }
            other => return Err(ProtocolError::UnknownEventType(other.to_owned())),
        };

        Ok(Self {
            session_id: wire.session_id,
            sequence_id: wire.sequence_id,
            kind,
        })
    }
}

/// Convert an idle callback time in seconds into a wait.
///
/// Negative and NaN values mean no wait. Values too large for a `Duration`,
/// infinity included, saturate to `Duration::MAX`.
fn callback_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let mut wire = Self {
            event_type: event.kind.name().to_owned(),
            session_id: event.session_id,
            sequence_id: event.sequence_id,
            ..Self::default()
        };
        match event.kind {
            EventKind::EpisodeStart { config } => {
                wire.episode_start = Some(EpisodeStartBody { config });
            }
            EventKind::EpisodeStep { action } => {
                wire.episode_step = Some(EpisodeStepBody { action });
            }
            EventKind::EpisodeFinish { reason } => {
                wire.episode_finish = Some(EpisodeFinishBody { reason });
            }
            EventKind::Idle { callback_time } => {
                wire.idle = Some(IdleBody {
                    callback_time: callback_time.as_secs_f64(),
                });
            }
            EventKind::Unregister { reason, details } => {
                wire.unregister = Some(UnregisterBody { reason, details });
            }
        }
        wire
    }
}
