//! The advance loop.
//!
//! A [`SimulatorSession`] owns one model, one observer and one server-side
//! session. It moves through three states:
//!
//! ```text
//! Unregistered --register--> Registered --advance--> Registered
//!                                 |
//!                                 +--Unregister event / stop--> Terminated
//!                                 +--fatal error--------------> Terminated
//! ```
//!
//! Advance calls are strictly sequential: the next request is built only
//! after the previous response has been dispatched and any idle wait has
//! elapsed, so every server-issued sequence id is echoed exactly once.

use chrono::Utc;
use simbridge_types::{
    EventKind, SequenceId, SessionId, SimulatorInterface, SimulatorState, UnregisterReason,
};
use tracing::{debug, error, info, warn};

use crate::api::SimulatorApi;
use crate::config::ClientConfig;
use crate::dispatch::{Dispatch, NoopObserver, SessionObserver, dispatch};
use crate::error::{ConfigError, SessionError, error_chain};
use crate::model::Model;
use crate::registrar::register;
use crate::stop::StopHandle;

// ---------------------------------------------------------------------------
// State and outcome types
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session exists on the server yet.
    Unregistered,
    /// A session is live.
    Registered {
        /// Server-assigned session id.
        session_id: SessionId,
        /// Sequence id to send on the next advance.
        sequence_id: SequenceId,
    },
    /// The loop has ended; no further calls are made.
    Terminated,
}

/// Why a session loop ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The service sent an `Unregister` event.
    Unregistered {
        /// Reason given by the service.
        reason: UnregisterReason,
        /// Free-form explanation.
        details: Option<String>,
    },
    /// A stop was requested through the [`StopHandle`].
    StopRequested,
}

/// Summary of a finished session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Session that was driven, if registration happened.
    pub session_id: Option<SessionId>,
    /// Why the loop ended.
    pub end_reason: SessionEndReason,
    /// Successful advance exchanges.
    pub advances: u64,
    /// `EpisodeStart` events applied.
    pub episodes_started: u64,
    /// `EpisodeStep` events applied.
    pub episode_steps: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Drives one simulator session against the service.
pub struct SimulatorSession<A, M, O = NoopObserver> {
    api: A,
    model: M,
    observer: O,
    workspace: String,
    interface: SimulatorInterface,
    status: SessionStatus,
    stop: StopHandle,
    advances: u64,
    episodes_started: u64,
    episode_steps: u64,
}

impl<A, M> SimulatorSession<A, M, NoopObserver>
where
    A: SimulatorApi,
    M: Model,
{
    /// Create a session for `config.workspace`.
    ///
    /// The configuration is validated here, so a missing workspace or access
    /// key fails before any request is made. The descriptor defaults to
    /// [`SimulatorInterface::default`] carrying `config.simulator_context`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is incomplete.
    pub fn new(config: &ClientConfig, api: A, model: M) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api,
            model,
            observer: NoopObserver,
            workspace: config.workspace.clone(),
            interface: SimulatorInterface::default()
                .with_simulator_context(config.simulator_context.clone()),
            status: SessionStatus::Unregistered,
            stop: StopHandle::new(),
            advances: 0,
            episodes_started: 0,
            episode_steps: 0,
        })
    }
}

impl<A, M, O> SimulatorSession<A, M, O>
where
    A: SimulatorApi,
    M: Model,
    O: SessionObserver,
{
    /// Replace the observer.
    pub fn with_observer<P: SessionObserver>(self, observer: P) -> SimulatorSession<A, M, P> {
        SimulatorSession {
            api: self.api,
            model: self.model,
            observer,
            workspace: self.workspace,
            interface: self.interface,
            status: self.status,
            stop: self.stop,
            advances: self.advances,
            episodes_started: self.episodes_started,
            episode_steps: self.episode_steps,
        }
    }

    /// Replace the registration descriptor.
    ///
    /// A blank simulator context on `interface` keeps the configured one.
    #[must_use]
    pub fn with_interface(mut self, mut interface: SimulatorInterface) -> Self {
        if interface.simulator_context.is_empty() {
            interface.simulator_context = core::mem::take(&mut self.interface.simulator_context);
        }
        self.interface = interface;
        self
    }

    /// Share an existing stop handle instead of the session's own.
    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops this session from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current lifecycle state.
    pub const fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The registration descriptor.
    pub const fn interface(&self) -> &SimulatorInterface {
        &self.interface
    }

    /// The model being driven.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// The observer.
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Consume the session and return the model and observer.
    pub fn into_parts(self) -> (M, O) {
        (self.model, self.observer)
    }

    /// Register with the service.
    ///
    /// Calling this on an already registered session returns the existing
    /// id without a request.
    ///
    /// # Errors
    ///
    /// See [`register`]; [`SessionError::AlreadyTerminated`] once the loop
    /// has ended.
    pub async fn register(&mut self) -> Result<SessionId, SessionError> {
        match &self.status {
            SessionStatus::Registered { session_id, .. } => return Ok(session_id.clone()),
            SessionStatus::Terminated => return Err(SessionError::AlreadyTerminated),
            SessionStatus::Unregistered => {}
        }

        let session_id = register(&self.api, &self.workspace, &self.interface).await?;
        self.status = SessionStatus::Registered {
            session_id: session_id.clone(),
            sequence_id: SequenceId::INITIAL,
        };
        Ok(session_id)
    }

    /// Run one advance cycle: send the current state, dispatch the event
    /// that comes back, and wait out any idle period.
    ///
    /// Returns `Some` when the service unregistered the session; the
    /// teardown call has then already been made.
    ///
    /// # Errors
    ///
    /// Any transport, protocol or model failure is fatal: the session moves
    /// to [`SessionStatus::Terminated`] and the error is returned.
    pub async fn advance(&mut self) -> Result<Option<SessionEndReason>, SessionError> {
        let (session_id, sequence_id) = match &self.status {
            SessionStatus::Registered {
                session_id,
                sequence_id,
            } => (session_id.clone(), *sequence_id),
            SessionStatus::Unregistered => return Err(SessionError::NotRegistered),
            SessionStatus::Terminated => return Err(SessionError::AlreadyTerminated),
        };

        let result = self.exchange(&session_id, sequence_id).await;
        if result.is_err() {
            self.status = SessionStatus::Terminated;
        }
        let next = result?;

        match next {
            Dispatch::Continue => Ok(None),
            Dispatch::Sleep(callback_time) => {
                debug!(
                    session_id = %session_id,
                    callback_ms = u64::try_from(callback_time.as_millis()).unwrap_or(u64::MAX),
                    "idle"
                );
                if !self.stop.sleep_unless_stopped(callback_time).await {
                    debug!(session_id = %session_id, "idle wait interrupted by stop request");
                }
                Ok(None)
            }
            Dispatch::Unregister { reason, details } => {
                info!(
                    session_id = %session_id,
                    reason = ?reason,
                    details = details.as_deref(),
                    "service unregistered the session"
                );
                self.teardown(&session_id).await;
                Ok(Some(SessionEndReason::Unregistered { reason, details }))
            }
        }
    }

    /// Register if needed, then advance until the service unregisters the
    /// session, a stop is requested, or a fatal error occurs.
    ///
    /// Fatal errors are logged with a timestamp and their full cause chain
    /// before being returned; the session is not re-registered.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`SessionError`].
    pub async fn run(&mut self) -> Result<SessionOutcome, SessionError> {
        let result = self.run_until_end().await;
        if let Err(err) = &result {
            self.status = SessionStatus::Terminated;
            error!(
                timestamp = %Utc::now().to_rfc3339(),
                workspace = %self.workspace,
                error = %error_chain(err),
                "fatal session error"
            );
        }
        result
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn run_until_end(&mut self) -> Result<SessionOutcome, SessionError> {
        if self.stop.is_stop_requested() && self.status == SessionStatus::Unregistered {
            info!("stop requested before registration");
            self.status = SessionStatus::Terminated;
            return Ok(self.outcome(None, SessionEndReason::StopRequested));
        }

        let session_id = self.register().await?;
        info!(
            session_id = %session_id,
            workspace = %self.workspace,
            "session loop starting"
        );

        loop {
            if self.stop.is_stop_requested() {
                info!(session_id = %session_id, "stop requested");
                self.teardown(&session_id).await;
                return Ok(self.outcome(Some(session_id), SessionEndReason::StopRequested));
            }

            if let Some(reason) = self.advance().await? {
                return Ok(self.outcome(Some(session_id), reason));
            }
        }
    }

    /// One request/response pair plus dispatch. Updates the sequence id and
    /// counters on success.
    async fn exchange(
        &mut self,
        session_id: &SessionId,
        sequence_id: SequenceId,
    ) -> Result<Dispatch, SessionError> {
        let state = SimulatorState {
            sequence_id,
            state: self.model.state().map_err(|source| SessionError::Model {
                hook: "state",
                source,
            })?,
            halted: self.model.halted().unwrap_or(false),
        };

        let event = self
            .api
            .advance(&self.workspace, session_id, &state)
            .await
            .map_err(|source| SessionError::Advance {
                sequence_id,
                source,
            })?;
        self.advances = self.advances.saturating_add(1);

        debug!(
            session_id = %session_id,
            sent_sequence_id = %sequence_id,
            sequence_id = %event.sequence_id,
            event = event.kind.name(),
            halted = state.halted,
            "advance"
        );

        self.status = SessionStatus::Registered {
            session_id: session_id.clone(),
            sequence_id: event.sequence_id,
        };

        let next = dispatch(&event.kind, &mut self.model, &mut self.observer)?;
        match event.kind {
            EventKind::EpisodeStart { .. } => {
                self.episodes_started = self.episodes_started.saturating_add(1);
            }
            EventKind::EpisodeStep { .. } => {
                self.episode_steps = self.episode_steps.saturating_add(1);
            }
            EventKind::EpisodeFinish { reason } => {
                info!(session_id = %session_id, reason = ?reason, "episode finished");
            }
            EventKind::Idle { .. } | EventKind::Unregister { .. } => {}
        }
        Ok(next)
    }

    /// Best-effort delete of the server-side session. Always terminates.
    async fn teardown(&mut self, session_id: &SessionId) {
        match self.api.delete_session(&self.workspace, session_id).await {
            Ok(()) => info!(session_id = %session_id, "session deleted"),
            Err(err) => warn!(
                session_id = %session_id,
                error = %err,
                "failed to delete session, continuing shutdown"
            ),
        }
        self.status = SessionStatus::Terminated;
    }

    const fn outcome(
        &self,
        session_id: Option<SessionId>,
        end_reason: SessionEndReason,
    ) -> SessionOutcome {
        SessionOutcome {
            session_id,
            end_reason,
            advances: self.advances,
            episodes_started: self.episodes_started,
            episode_steps: self.episode_steps,
        }
    }
}

impl<A, M, O> core::fmt::Debug for SimulatorSession<A, M, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatorSession")
            .field("workspace", &self.workspace)
            .field("interface", &self.interface)
            .field("status", &self.status)
            .field("advances", &self.advances)
            .finish_non_exhaustive()
    }
}

/// Log the end of a session loop.
pub fn log_session_end(outcome: &SessionOutcome) {
    info!(
        session_id = outcome.session_id.as_ref().map(SessionId::as_str),
        reason = ?outcome.end_reason,
        advances = outcome.advances,
        episodes_started = outcome.episodes_started,
        episode_steps = outcome.episode_steps,
        "Session ended"
    );
    if outcome.advances == 0 {
        warn!("Session ended with no advances");
    }
}
