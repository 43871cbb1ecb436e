//! The simulator session service, as seen by the session loop.
//!
//! [`SimulatorApi`] is the seam between the state machine and the network.
//! [`HttpSimulatorApi`] speaks the v2 REST routes:
//!
//! - `POST   {server}/v2/workspaces/{ws}/simulatorSessions`
//! - `POST   {server}/v2/workspaces/{ws}/simulatorSessions/{sid}/advance`
//! - `DELETE {server}/v2/workspaces/{ws}/simulatorSessions/{sid}`
//!
//! Tests substitute a scripted implementation.

use std::future::Future;

use simbridge_types::{
    Event, SessionId, SimulatorInterface, SimulatorSessionResponse, SimulatorState,
};

use crate::config::ClientConfig;
use crate::error::{ConfigError, TransportError};
use crate::transport::{Authorization, HttpTransport};

/// Operations the session loop needs from the service.
///
/// Implementations are expected to retry transient failures themselves;
/// an error returned here is final for that call.
pub trait SimulatorApi {
    /// Register a simulator and return the server's session record.
    fn create_session(
        &self,
        workspace: &str,
        interface: &SimulatorInterface,
    ) -> impl Future<Output = Result<SimulatorSessionResponse, TransportError>> + Send;

    /// Send the current state and receive the next event.
    fn advance(
        &self,
        workspace: &str,
        session_id: &SessionId,
        state: &SimulatorState,
    ) -> impl Future<Output = Result<Event, TransportError>> + Send;

    /// Drop a session.
    fn delete_session(
        &self,
        workspace: &str,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// [`SimulatorApi`] over HTTP, authenticated with the workspace access key.
#[derive(Debug, Clone)]
pub struct HttpSimulatorApi {
    transport: HttpTransport,
}

impl HttpSimulatorApi {
    /// Build a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is incomplete or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(
            &config.server,
            config.request_timeout,
            config.enable_logging,
            config.retry,
        )?
        .with_authorization(Authorization::AccessKey(config.access_key.clone()));
        Ok(Self { transport })
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    fn sessions_url(&self, workspace: &str) -> String {
        self.transport
            .endpoint(&format!("v2/workspaces/{workspace}/simulatorSessions"))
    }

    fn session_url(&self, workspace: &str, session_id: &SessionId) -> String {
        format!("{}/{session_id}", self.sessions_url(workspace))
    }
}

impl SimulatorApi for HttpSimulatorApi {
    async fn create_session(
        &self,
        workspace: &str,
        interface: &SimulatorInterface,
    ) -> Result<SimulatorSessionResponse, TransportError> {
        let url = self.sessions_url(workspace);
        self.transport.post_json(&url, interface).await
    }

    async fn advance(
        &self,
        workspace: &str,
        session_id: &SessionId,
        state: &SimulatorState,
    ) -> Result<Event, TransportError> {
        let url = format!("{}/advance", self.session_url(workspace, session_id));
        self.transport.post_json(&url, state).await
    }

    async fn delete_session(
        &self,
        workspace: &str,
        session_id: &SessionId,
    ) -> Result<(), TransportError> {
        let url = self.session_url(workspace, session_id);
        self.transport.delete(&url).await
    }
}
