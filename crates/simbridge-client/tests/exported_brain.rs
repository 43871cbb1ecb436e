//! Exported-brain prediction loop against a mock prediction endpoint.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use simbridge_client::{
    BrainError, ClientCredentials, ExportedBrainConfig, Model, PredictionEndReason,
    PredictionLoop, RetryPolicy,
};
use simbridge_types::Payload;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default, Serialize)]
struct Accumulator {
    sum: i64,
}

#[derive(Deserialize)]
struct Action {
    addend: i64,
}

impl Model for Accumulator {
    fn state(&self) -> anyhow::Result<Payload> {
        Ok(Payload::encode(self)?)
    }

    fn start(&mut self, _config: &Payload) -> anyhow::Result<()> {
        self.sum = 0;
        Ok(())
    }

    fn step(&mut self, action: &Payload) -> anyhow::Result<()> {
        let action: Action = action.decode()?;
        self.sum = self.sum.saturating_add(action.addend);
        Ok(())
    }
}

fn brain_config(server: &MockServer) -> ExportedBrainConfig {
    ExportedBrainConfig::new(format!("{}/v1/prediction", server.uri())).with_retry(RetryPolicy::new(
        1,
        Duration::from_millis(1),
        Duration::from_millis(2),
    ))
}

#[tokio::test]
async fn predictions_drive_the_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 2})))
        .expect(3)
        .mount(&server)
        .await;

    let mut brain = PredictionLoop::new(brain_config(&server), Accumulator::default())
        .unwrap()
        .with_max_iterations(3);
    let outcome = brain.run().await.unwrap();

    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.end_reason, PredictionEndReason::MaxIterationsReached);
    assert_eq!(brain.model().sum, 6);
}

#[tokio::test]
async fn each_request_carries_the_current_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .and(body_partial_json(json!({"sum": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 5})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .and(body_partial_json(json!({"sum": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": -1})))
        .expect(1)
        .mount(&server)
        .await;

    let mut brain = PredictionLoop::new(brain_config(&server), Accumulator::default())
        .unwrap()
        .with_max_iterations(2);
    brain.run().await.unwrap();
    assert_eq!(brain.model().sum, 4);
}

#[tokio::test]
async fn client_credentials_token_is_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-1"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains("resource=api%3A%2F%2Fapp-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
            "expires_in": "3599"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let config = brain_config(&server).with_client_credentials(ClientCredentials {
        token_url: format!("{}/oauth2/token", server.uri()),
        application_id: "app-1".to_owned(),
        client_secret: "s3cret".to_owned(),
    });
    let mut brain = PredictionLoop::new(config, Accumulator::default())
        .unwrap()
        .with_max_iterations(2);
    brain.run().await.unwrap();
    assert_eq!(brain.model().sum, 2);
}

#[tokio::test]
async fn token_hook_runs_before_every_prediction() {
    let server = MockServer::start().await;

    for n in 1..=3 {
        Mock::given(method("POST"))
            .and(path("/v1/prediction"))
            .and(header("Authorization", format!("Bearer tok-{n}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 1})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut brain = PredictionLoop::new(brain_config(&server), Accumulator::default())
        .unwrap()
        .with_token("tok-0")
        .with_token_hook(move |token| {
            let n = counter.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            *token = Some(format!("tok-{n}"));
            Ok(())
        })
        .with_max_iterations(3);
    brain.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failing_token_hook_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let mut brain = PredictionLoop::new(brain_config(&server), Accumulator::default())
        .unwrap()
        .with_token_hook(|_| anyhow::bail!("identity provider unavailable"))
        .with_max_iterations(1);
    let err = brain.run().await.unwrap_err();
    assert!(matches!(err, BrainError::TokenHook(_)));
}

#[tokio::test]
async fn non_success_status_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad state"))
        .expect(1)
        .mount(&server)
        .await;

    let mut brain = PredictionLoop::new(brain_config(&server), Accumulator::default())
        .unwrap()
        .with_max_iterations(5);
    let err = brain.run().await.unwrap_err();

    match err {
        BrainError::Predict { iteration, source } => {
            assert_eq!(iteration, 0);
            assert_eq!(source.status(), Some(400));
        }
        other => unexpected(&other),
    }
    assert_eq!(brain.model().sum, 0);
}

#[tokio::test]
async fn failed_token_exchange_prevents_predictions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "title": "Unauthorized",
            "detail": "invalid client secret"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/prediction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"addend": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let config = brain_config(&server).with_client_credentials(ClientCredentials {
        token_url: format!("{}/oauth2/token", server.uri()),
        application_id: "app-1".to_owned(),
        client_secret: "wrong".to_owned(),
    });
    let mut brain = PredictionLoop::new(config, Accumulator::default())
        .unwrap()
        .with_max_iterations(1);
    let err = brain.run().await.unwrap_err();
    assert!(matches!(err, BrainError::Token(_)));
    assert!(err.to_string().contains("invalid client secret"));
}

#[allow(clippy::panic)]
fn unexpected(err: &BrainError) -> ! {
    panic!("unexpected brain error: {err}")
}
