//! Client for the remote simulator session service.
//!
//! Keeps a local simulation [`Model`] synchronized with a remote training
//! session, or drives it directly against an exported brain.
//!
//! # Modules
//!
//! - [`config`] -- `ClientConfig` and `ExportedBrainConfig`, layered from explicit values, env and CLI
//! - [`retry`] -- Exponential-backoff retry of transient failures
//! - [`transport`] -- Authenticated HTTP transport with optional traffic logging
//! - [`api`] -- The `SimulatorApi` seam and its HTTP implementation
//! - [`registrar`] -- Session registration
//! - [`dispatch`] -- Event routing to the model and the `SessionObserver`
//! - [`session`] -- The advance loop state machine
//! - [`brain`] -- The exported-brain prediction loop
//! - [`stop`] -- Cooperative stop signal shared with other tasks
//! - [`model`] -- The simulation contract implemented by the embedding application
//! - [`error`] -- Error types for each layer

pub mod api;
pub mod brain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod registrar;
pub mod retry;
pub mod session;
pub mod stop;
pub mod transport;

pub use api::{HttpSimulatorApi, SimulatorApi};
pub use brain::{
    AccessToken, PredictionEndReason, PredictionLoop, PredictionOutcome, TokenHook,
    fetch_client_credentials_token, log_prediction_end,
};
pub use config::{ClientConfig, ClientCredentials, ConfigOverrides, ExportedBrainConfig};
pub use dispatch::{Dispatch, Handlers, NoopObserver, SessionObserver, dispatch};
pub use error::{BrainError, ConfigError, SessionError, TransportError, error_chain};
pub use model::Model;
pub use registrar::register;
pub use retry::RetryPolicy;
pub use session::{
    SessionEndReason, SessionOutcome, SessionStatus, SimulatorSession, log_session_end,
};
pub use stop::StopHandle;
pub use transport::{Authorization, HttpTransport};
