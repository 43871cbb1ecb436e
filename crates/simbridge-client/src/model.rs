//! The simulation model driven by the session loop.

use simbridge_types::Payload;

/// A user-supplied simulation.
///
/// The session loop reads [`Model::state`] and [`Model::halted`] fresh
/// before every advance and calls [`Model::start`] or [`Model::step`] when
/// the service asks for it. Errors from any hook are fatal to the loop.
pub trait Model: Send {
    /// Current state, sent verbatim to the service.
    fn state(&self) -> anyhow::Result<Payload>;

    /// Whether the simulation reached a terminal condition.
    ///
    /// `None` is sent as `false`.
    fn halted(&self) -> Option<bool> {
        None
    }

    /// Begin a new episode with the given configuration.
    fn start(&mut self, config: &Payload) -> anyhow::Result<()>;

    /// Apply one action.
    fn step(&mut self, action: &Payload) -> anyhow::Result<()>;
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn state(&self) -> anyhow::Result<Payload> {
        (**self).state()
    }

    fn halted(&self) -> Option<bool> {
        (**self).halted()
    }

    fn start(&mut self, config: &Payload) -> anyhow::Result<()> {
        (**self).start(config)
    }

    fn step(&mut self, action: &Payload) -> anyhow::Result<()> {
        (**self).step(action)
    }
}
