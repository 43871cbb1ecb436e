//! Event dispatch: route each advance response to the model and observer.
//!
//! [`dispatch`] is the only place that interprets an [`EventKind`]. It
//! mutates the model for episode events, notifies the observer, and tells
//! the session loop what to do next via [`Dispatch`].

use std::time::Duration;

use simbridge_types::{EpisodeFinishReason, EventKind, Payload, UnregisterReason};
use tracing::debug;

use crate::error::SessionError;
use crate::model::Model;

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Notified after each event has been applied to the model.
///
/// Every method defaults to a no-op so implementations only override what
/// they care about.
pub trait SessionObserver: Send {
    /// A new episode started.
    fn on_episode_start(&mut self, _config: &Payload) {}

    /// An action was applied.
    fn on_episode_step(&mut self, _action: &Payload) {}

    /// The current episode ended.
    fn on_episode_finish(&mut self, _reason: EpisodeFinishReason) {}

    /// The service asked the simulator to wait.
    fn on_idle(&mut self, _callback_time: Duration) {}

    /// The service is dropping the session.
    fn on_unregister(&mut self, _reason: UnregisterReason, _details: Option<&str>) {}
}

/// An observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

type Slot<T> = Option<Box<dyn FnMut(T) + Send>>;

/// Closure-based observer with one slot per event type.
///
/// Setting a slot twice replaces the earlier closure.
#[derive(Default)]
pub struct Handlers {
    on_start: Option<Box<dyn FnMut(&Payload) + Send>>,
    on_step: Option<Box<dyn FnMut(&Payload) + Send>>,
    on_finish: Slot<EpisodeFinishReason>,
    on_idle: Slot<Duration>,
    on_unregister: Option<Box<dyn FnMut(UnregisterReason, Option<&str>) + Send>>,
}

impl Handlers {
    /// An empty set of handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` when an episode starts.
    #[must_use]
    pub fn with_episode_start(mut self, handler: impl FnMut(&Payload) + Send + 'static) -> Self {
        self.on_start = Some(Box::new(handler));
        self
    }

    /// Run `handler` after each step.
    #[must_use]
    pub fn with_episode_step(mut self, handler: impl FnMut(&Payload) + Send + 'static) -> Self {
        self.on_step = Some(Box::new(handler));
        self
    }

    /// Run `handler` when an episode finishes.
    #[must_use]
    pub fn with_episode_finish(
        mut self,
        handler: impl FnMut(EpisodeFinishReason) + Send + 'static,
    ) -> Self {
        self.on_finish = Some(Box::new(handler));
        self
    }

    /// Run `handler` on idle events.
    #[must_use]
    pub fn with_idle(mut self, handler: impl FnMut(Duration) + Send + 'static) -> Self {
        self.on_idle = Some(Box::new(handler));
        self
    }

    /// Run `handler` when the service unregisters the session.
    #[must_use]
    pub fn with_unregister(
        mut self,
        handler: impl FnMut(UnregisterReason, Option<&str>) + Send + 'static,
    ) -> Self {
        self.on_unregister = Some(Box::new(handler));
        self
    }
}

impl core::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handlers")
            .field("on_episode_start", &self.on_start.is_some())
            .field("on_episode_step", &self.on_step.is_some())
            .field("on_episode_finish", &self.on_finish.is_some())
            .field("on_idle", &self.on_idle.is_some())
            .field("on_unregister", &self.on_unregister.is_some())
            .finish()
    }
}

impl SessionObserver for Handlers {
    fn on_episode_start(&mut self, config: &Payload) {
        if let Some(handler) = self.on_start.as_mut() {
            handler(config);
        }
    }

    fn on_episode_step(&mut self, action: &Payload) {
        if let Some(handler) = self.on_step.as_mut() {
            handler(action);
        }
    }

    fn on_episode_finish(&mut self, reason: EpisodeFinishReason) {
        if let Some(handler) = self.on_finish.as_mut() {
            handler(reason);
        }
    }

    fn on_idle(&mut self, callback_time: Duration) {
        if let Some(handler) = self.on_idle.as_mut() {
            handler(callback_time);
        }
    }

    fn on_unregister(&mut self, reason: UnregisterReason, details: Option<&str>) {
        if let Some(handler) = self.on_unregister.as_mut() {
            handler(reason, details);
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// What the session loop should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Advance again immediately.
    Continue,
    /// Wait this long, then advance again.
    Sleep(Duration),
    /// Tear the session down and stop.
    Unregister {
        /// Why the service dropped the session.
        reason: UnregisterReason,
        /// Free-form explanation.
        details: Option<String>,
    },
}

/// Apply `kind` to the model, notify the observer, and decide the next step.
///
/// # Errors
///
/// Returns [`SessionError::Model`] if `start` or `step` fails; the observer
/// is not notified in that case.
pub fn dispatch<M, O>(
    kind: &EventKind,
    model: &mut M,
    observer: &mut O,
) -> Result<Dispatch, SessionError>
where
    M: Model + ?Sized,
    O: SessionObserver + ?Sized,
{
    debug!(event = kind.name(), "dispatching event");
    match kind {
        EventKind::EpisodeStart { config } => {
            model.start(config).map_err(|source| SessionError::Model {
                hook: "start",
                source,
            })?;
            observer.on_episode_start(config);
            Ok(Dispatch::Continue)
        }
        EventKind::EpisodeStep { action } => {
            model.step(action).map_err(|source| SessionError::Model {
                hook: "step",
                source,
            })?;
            observer.on_episode_step(action);
            Ok(Dispatch::Continue)
        }
        EventKind::EpisodeFinish { reason } => {
            observer.on_episode_finish(*reason);
            Ok(Dispatch::Continue)
        }
        EventKind::Idle { callback_time } => {
            observer.on_idle(*callback_time);
            Ok(Dispatch::Sleep(*callback_time))
        }
        EventKind::Unregister { reason, details } => {
            observer.on_unregister(*reason, details.as_deref());
            Ok(Dispatch::Unregister {
                reason: *reason,
                details: details.clone(),
            })
        }
    }
}
