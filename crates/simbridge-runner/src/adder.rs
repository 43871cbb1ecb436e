//! Sample model: a running sum.
//!
//! State is `{"sum": n}`. An episode config `{"start": n}` resets the sum;
//! each action `{"addend": n}` adds to it. The model reports itself halted
//! once it has taken `episode_length` steps in the current episode.

use serde::{Deserialize, Serialize};
use simbridge_client::Model;
use simbridge_types::Payload;

/// Observable state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdderState {
    /// Running total.
    pub sum: i64,
}

/// Episode configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AdderConfig {
    /// Initial value of the sum.
    #[serde(default)]
    pub start: i64,
}

/// One action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AdderAction {
    /// Amount to add.
    pub addend: i64,
}

/// Running-sum model.
#[derive(Debug, Clone)]
pub struct AdderModel {
    state: AdderState,
    steps: u64,
    episode_length: u64,
}

impl AdderModel {
    /// Create a model that halts after `episode_length` steps; zero never
    /// halts.
    pub const fn new(episode_length: u64) -> Self {
        Self {
            state: AdderState { sum: 0 },
            steps: 0,
            episode_length,
        }
    }

    /// Current state.
    pub const fn current(&self) -> AdderState {
        self.state
    }

    /// JSON description of the model's state, action and config shapes.
    pub fn description() -> Payload {
        Payload::from(serde_json::json!({
            "state": {"sum": "number"},
            "action": {"addend": "number"},
            "config": {"start": "number"}
        }))
    }
}

impl Model for AdderModel {
    fn state(&self) -> anyhow::Result<Payload> {
        Ok(Payload::encode(&self.state)?)
    }

    fn halted(&self) -> Option<bool> {
        Some(self.episode_length > 0 && self.steps >= self.episode_length)
    }

    fn start(&mut self, config: &Payload) -> anyhow::Result<()> {
        let config: AdderConfig = if config.is_null() {
            AdderConfig::default()
        } else {
            config.decode()?
        };
        self.state = AdderState { sum: config.start };
        self.steps = 0;
        Ok(())
    }

    fn step(&mut self, action: &Payload) -> anyhow::Result<()> {
        let action: AdderAction = action.decode()?;
        self.state.sum = self
            .state
            .sum
            .checked_add(action.addend)
            .ok_or_else(|| anyhow::anyhow!("sum overflowed adding {}", action.addend))?;
        self.steps = self.steps.saturating_add(1);
        Ok(())
    }
}
