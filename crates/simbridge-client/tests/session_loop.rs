//! Advance loop behaviour against a scripted service double.
//!
//! The double records every call so tests can assert exactly what reached
//! the "network", including calls that must never happen.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use simbridge_client::{
    ClientConfig, ConfigError, Handlers, Model, SessionEndReason, SessionError, SessionStatus,
    SimulatorApi, SimulatorSession, TransportError, register,
};
use simbridge_types::{
    EpisodeFinishReason, Event, EventKind, Payload, SequenceId, SessionId, SimulatorInterface,
    SimulatorSessionResponse, SimulatorState, UnregisterReason,
};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Scripted service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Register {
        workspace: String,
    },
    Advance {
        workspace: String,
        session_id: String,
        sequence_id: i64,
        state: serde_json::Value,
        halted: bool,
        at: Instant,
    },
    Delete {
        workspace: String,
        session_id: String,
    },
}

struct ScriptedApi {
    session_id: &'static str,
    events: Mutex<VecDeque<Result<Event, TransportError>>>,
    delete_result: Result<(), TransportError>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedApi {
    fn new(events: Vec<Result<Event, TransportError>>) -> Self {
        Self {
            session_id: "abc",
            events: Mutex::new(events.into()),
            delete_result: Ok(()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_delete(mut self) -> Self {
        self.delete_result = Err(TransportError::from_status(
            "http://sim/v2/workspaces/ws1/simulatorSessions/abc",
            500,
            "",
        ));
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn advances(&self) -> Vec<(i64, serde_json::Value, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Advance {
                    sequence_id,
                    state,
                    halted,
                    ..
                } => Some((sequence_id, state, halted)),
                _ => None,
            })
            .collect()
    }

    fn deletes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Delete { .. }))
            .collect()
    }
}

impl SimulatorApi for &ScriptedApi {
    async fn create_session(
        &self,
        workspace: &str,
        _interface: &SimulatorInterface,
    ) -> Result<SimulatorSessionResponse, TransportError> {
        self.calls.lock().unwrap().push(Call::Register {
            workspace: workspace.to_owned(),
        });
        Ok(SimulatorSessionResponse::new(SessionId::new(self.session_id)))
    }

    async fn advance(
        &self,
        workspace: &str,
        session_id: &SessionId,
        state: &SimulatorState,
    ) -> Result<Event, TransportError> {
        self.calls.lock().unwrap().push(Call::Advance {
            workspace: workspace.to_owned(),
            session_id: session_id.as_str().to_owned(),
            sequence_id: state.sequence_id.get(),
            state: state.state.as_value().clone(),
            halted: state.halted,
            at: Instant::now(),
        });
        self.events
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected advance at sequence {}", state.sequence_id))
    }

    async fn delete_session(
        &self,
        workspace: &str,
        session_id: &SessionId,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Delete {
            workspace: workspace.to_owned(),
            session_id: session_id.as_str().to_owned(),
        });
        self.delete_result.clone()
    }
}

// ---------------------------------------------------------------------------
// Probe model
// ---------------------------------------------------------------------------

/// Reports `{x: 1}`, halts after its first step, and logs every hook.
#[derive(Default)]
struct Probe {
    hooks: Vec<String>,
    halted: bool,
}

impl Model for Probe {
    fn state(&self) -> anyhow::Result<Payload> {
        Ok(Payload::from(json!({"x": 1})))
    }

    fn halted(&self) -> Option<bool> {
        Some(self.halted)
    }

    fn start(&mut self, config: &Payload) -> anyhow::Result<()> {
        self.hooks.push(format!("start {config}"));
        self.halted = false;
        Ok(())
    }

    fn step(&mut self, action: &Payload) -> anyhow::Result<()> {
        self.hooks.push(format!("step {action}"));
        self.halted = true;
        Ok(())
    }
}

fn event(seq: i64, kind: EventKind) -> Result<Event, TransportError> {
    Ok(Event::new(SequenceId::new(seq), kind))
}

fn unregister(seq: i64) -> Result<Event, TransportError> {
    event(
        seq,
        EventKind::Unregister {
            reason: UnregisterReason::Finished,
            details: None,
        },
    )
}

fn config() -> ClientConfig {
    ClientConfig::new("ws1", "key1")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_episode_ends_with_exactly_one_delete() {
    let api = ScriptedApi::new(vec![
        event(2, EventKind::EpisodeStart { config: Payload::null() }),
        event(
            3,
            EventKind::EpisodeStep {
                action: Payload::from(json!({"cmd": 5})),
            },
        ),
        event(
            4,
            EventKind::EpisodeFinish {
                reason: EpisodeFinishReason::Unspecified,
            },
        ),
        unregister(5),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let outcome = session.run().await.unwrap();

    assert_eq!(outcome.session_id, Some(SessionId::new("abc")));
    assert_eq!(
        outcome.end_reason,
        SessionEndReason::Unregistered {
            reason: UnregisterReason::Finished,
            details: None,
        }
    );
    assert_eq!(*session.status(), SessionStatus::Terminated);

    assert_eq!(
        api.advances(),
        vec![
            (1, json!({"x": 1}), false),
            (2, json!({"x": 1}), false),
            (3, json!({"x": 1}), true),
            (4, json!({"x": 1}), true),
        ]
    );
    assert_eq!(
        api.deletes(),
        vec![Call::Delete {
            workspace: "ws1".to_owned(),
            session_id: "abc".to_owned(),
        }]
    );
    assert!(matches!(api.calls().first(), Some(Call::Register { workspace }) if workspace == "ws1"));
    assert!(matches!(api.calls().last(), Some(Call::Delete { .. })));
    assert!(api.calls().iter().all(|call| match call {
        Call::Advance {
            workspace,
            session_id,
            ..
        } => workspace == "ws1" && session_id == "abc",
        _ => true,
    }));
}

#[tokio::test]
async fn every_request_echoes_the_previous_sequence_id() {
    let api = ScriptedApi::new(vec![
        event(17, EventKind::EpisodeStart { config: Payload::null() }),
        event(4, EventKind::EpisodeStep { action: Payload::null() }),
        event(4, EventKind::EpisodeStep { action: Payload::null() }),
        event(900, EventKind::EpisodeStep { action: Payload::null() }),
        unregister(901),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    session.run().await.unwrap();

    let sent: Vec<i64> = api.advances().into_iter().map(|(seq, _, _)| seq).collect();
    assert_eq!(sent, vec![1, 17, 4, 4, 900]);
}

#[tokio::test(start_paused = true)]
async fn idle_waits_at_least_the_callback_time() {
    let api = ScriptedApi::new(vec![
        event(
            2,
            EventKind::Idle {
                callback_time: Duration::from_millis(2500),
            },
        ),
        event(
            3,
            EventKind::Idle {
                callback_time: Duration::from_secs(4),
            },
        ),
        unregister(4),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    session.run().await.unwrap();

    let times: Vec<Instant> = api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Advance { at, .. } => Some(at),
            _ => None,
        })
        .collect();
    assert_eq!(times.len(), 3);
    assert!(times[1].duration_since(times[0]) >= Duration::from_millis(2500));
    assert!(times[2].duration_since(times[1]) >= Duration::from_secs(4));
}

#[tokio::test]
async fn failed_teardown_still_terminates() {
    let api = ScriptedApi::new(vec![unregister(2)]).failing_delete();

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let outcome = session.run().await.unwrap();

    assert!(matches!(
        outcome.end_reason,
        SessionEndReason::Unregistered { .. }
    ));
    assert_eq!(api.deletes().len(), 1);
    assert_eq!(*session.status(), SessionStatus::Terminated);
}

#[tokio::test]
async fn exhausted_advance_is_fatal_and_final() {
    let api = ScriptedApi::new(vec![
        event(2, EventKind::EpisodeStart { config: Payload::null() }),
        Err(TransportError::from_status(
            "http://sim/v2/workspaces/ws1/simulatorSessions/abc/advance",
            503,
            r#"{"title":"Service Unavailable"}"#,
        )),
        unregister(3),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let err = session.run().await.unwrap_err();

    match err {
        SessionError::Advance {
            sequence_id,
            source,
        } => {
            assert_eq!(sequence_id, SequenceId::new(2));
            assert_eq!(source.status(), Some(503));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.advances().len(), 2);
    assert!(api.deletes().is_empty());
    assert_eq!(*session.status(), SessionStatus::Terminated);
    assert!(matches!(
        session.advance().await.unwrap_err(),
        SessionError::AlreadyTerminated
    ));
    assert_eq!(api.advances().len(), 2);
}

#[tokio::test]
async fn malformed_response_is_fatal() {
    let api = ScriptedApi::new(vec![Err(TransportError::Decode {
        url: "http://sim/advance".to_owned(),
        message: "unknown event type `Reticulate`".to_owned(),
    })]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let err = session.run().await.unwrap_err();

    assert!(matches!(err, SessionError::Advance { .. }));
    assert_eq!(api.advances().len(), 1);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_call() {
    let api = ScriptedApi::new(Vec::new());

    let err = SimulatorSession::new(&ClientConfig::new("", "key1"), &api, Probe::default())
        .unwrap_err();
    assert_eq!(err, ConfigError::MissingWorkspace);

    let err = SimulatorSession::new(&ClientConfig::new("ws1", ""), &api, Probe::default())
        .unwrap_err();
    assert_eq!(err, ConfigError::MissingAccessKey);

    let err = register(&&api, "  ", &SimulatorInterface::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Config(ConfigError::MissingWorkspace)
    ));

    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn start_hook_runs_before_step_hook() {
    let api = ScriptedApi::new(vec![
        event(
            2,
            EventKind::EpisodeStart {
                config: Payload::from(json!({"level": 1})),
            },
        ),
        event(
            3,
            EventKind::EpisodeStep {
                action: Payload::from(json!({"cmd": 5})),
            },
        ),
        event(
            4,
            EventKind::EpisodeStart {
                config: Payload::from(json!({"level": 2})),
            },
        ),
        event(
            5,
            EventKind::EpisodeStep {
                action: Payload::from(json!({"cmd": 6})),
            },
        ),
        unregister(6),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let outcome = session.run().await.unwrap();

    assert_eq!(outcome.episodes_started, 2);
    assert_eq!(outcome.episode_steps, 2);
    assert_eq!(
        session.model().hooks,
        vec![
            r#"start {"level":1}"#,
            r#"step {"cmd":5}"#,
            r#"start {"level":2}"#,
            r#"step {"cmd":6}"#,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn stop_request_interrupts_idle_and_tears_down() {
    let api = ScriptedApi::new(vec![
        event(
            2,
            EventKind::Idle {
                callback_time: Duration::from_secs(600),
            },
        ),
        unregister(3),
    ]);

    let mut session = SimulatorSession::new(&config(), &api, Probe::default()).unwrap();
    let stop = session.stop_handle();
    let started = Instant::now();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.request_stop();
    });

    let outcome = session.run().await.unwrap();

    assert_eq!(outcome.end_reason, SessionEndReason::StopRequested);
    assert!(started.elapsed() < Duration::from_secs(600));
    assert_eq!(api.advances().len(), 1);
    assert_eq!(api.deletes().len(), 1);
}

#[tokio::test]
async fn handlers_observe_every_event_kind() {
    let api = ScriptedApi::new(vec![
        event(2, EventKind::EpisodeStart { config: Payload::null() }),
        event(3, EventKind::EpisodeStep { action: Payload::null() }),
        event(
            4,
            EventKind::EpisodeFinish {
                reason: EpisodeFinishReason::Terminal,
            },
        ),
        event(
            5,
            EventKind::Idle {
                callback_time: Duration::ZERO,
            },
        ),
        event(
            6,
            EventKind::Unregister {
                reason: UnregisterReason::Error,
                details: Some("lost".to_owned()),
            },
        ),
    ]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c, d, e) = (
        Arc::clone(&seen),
        Arc::clone(&seen),
        Arc::clone(&seen),
        Arc::clone(&seen),
        Arc::clone(&seen),
    );
    let handlers = Handlers::new()
        .with_episode_start(move |_| a.lock().unwrap().push("start".to_owned()))
        .with_episode_step(move |_| b.lock().unwrap().push("step".to_owned()))
        .with_episode_finish(move |reason| c.lock().unwrap().push(format!("finish {reason:?}")))
        .with_idle(move |_| d.lock().unwrap().push("idle".to_owned()))
        .with_unregister(move |reason, details| {
            e.lock()
                .unwrap()
                .push(format!("unregister {reason:?} {}", details.unwrap_or_default()));
        });

    let mut session = SimulatorSession::new(&config(), &api, Probe::default())
        .unwrap()
        .with_observer(handlers);
    session.run().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "start",
            "step",
            "finish Terminal",
            "idle",
            "unregister Error lost"
        ]
    );
}
