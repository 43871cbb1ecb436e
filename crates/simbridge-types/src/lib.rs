//! Wire types for the remote simulator session protocol.
//!
//! This crate is the single source of truth for every payload exchanged
//! between a simulator and the training service. It performs no I/O; the
//! `simbridge-client` crate moves these types over HTTP.
//!
//! # Modules
//!
//! - [`ids`] -- Session identifiers and protocol sequence ids
//! - [`payload`] -- Opaque JSON payload carried for model state, configs and actions
//! - [`session`] -- Registration descriptor, registration response, advance body
//! - [`event`] -- Events returned by the advance call, with their reasons
//! - [`problem`] -- RFC 7807 problem details returned on failed requests
//! - [`error`] -- Protocol violations detected while decoding events

pub mod error;
pub mod event;
pub mod ids;
pub mod payload;
pub mod problem;
pub mod session;

// Re-export all public types at crate root for convenience.
pub use error::ProtocolError;
pub use event::{EpisodeFinishReason, Event, EventKind, UnregisterReason};
pub use ids::{SequenceId, SessionId};
pub use payload::Payload;
pub use problem::ProblemDetails;
pub use session::{SimulatorInterface, SimulatorSessionResponse, SimulatorState};
