//! Session registration.

use simbridge_types::{ProtocolError, SessionId, SimulatorInterface};
use tracing::info;

use crate::api::SimulatorApi;
use crate::error::{ConfigError, SessionError};

/// Register a simulator in `workspace` and return the new session id.
///
/// # Errors
///
/// - [`SessionError::Config`] if `workspace` is blank; no request is sent.
/// - [`SessionError::Registration`] if the service rejects the request or
///   the transport exhausts its retries.
/// - [`SessionError::Protocol`] if the service returns an empty session id.
pub async fn register<A>(
    api: &A,
    workspace: &str,
    interface: &SimulatorInterface,
) -> Result<SessionId, SessionError>
where
    A: SimulatorApi + ?Sized,
{
    if workspace.trim().is_empty() {
        return Err(ConfigError::MissingWorkspace.into());
    }

    let response = api
        .create_session(workspace, interface)
        .await
        .map_err(SessionError::Registration)?;

    if response.session_id.is_empty() {
        return Err(ProtocolError::EmptySessionId.into());
    }

    info!(
        workspace,
        session_id = %response.session_id,
        simulator = %interface.name,
        session_status = response.session_status.as_deref(),
        "simulator registered"
    );
    Ok(response.session_id)
}
