//! Exported-brain prediction loop.
//!
//! An exported brain is a trained policy served behind one HTTP endpoint.
//! There is no registration, session or sequence id: the loop posts the
//! model state, applies the returned action, and repeats with no delay.
//!
//! When client credentials are configured, a bearer token is fetched once
//! before the first prediction. A token hook, if set, runs before every
//! prediction and may replace the token. Token expiry is not tracked; the
//! hook is the only refresh mechanism.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use simbridge_types::Payload;
use tracing::{debug, error, info};

use crate::config::{ClientCredentials, ExportedBrainConfig};
use crate::error::{BrainError, ConfigError, TransportError, error_chain};
use crate::model::Model;
use crate::stop::StopHandle;
use crate::transport::{Authorization, HttpTransport};

// ---------------------------------------------------------------------------
// Client-credentials token exchange
// ---------------------------------------------------------------------------

/// Token returned by an OAuth2 client-credentials grant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Bearer token value.
    pub access_token: String,
    /// Token type, usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds, if reported. Informational only.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    /// Refresh token, if issued.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl core::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Token endpoints disagree on whether `expires_in` is a number or a string.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Exchange client credentials for a bearer token.
///
/// Posts `grant_type=client_credentials`, `client_id`, `client_secret` and
/// `resource=api://{application_id}` as a form to the token endpoint.
/// `transport` should carry no authorization of its own.
pub async fn fetch_client_credentials_token(
    transport: &HttpTransport,
    credentials: &ClientCredentials,
) -> Result<AccessToken, TransportError> {
    let resource = format!("api://{}", credentials.application_id);
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", credentials.application_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("resource", resource.as_str()),
    ];
    transport.post_form(&credentials.token_url, &form).await
}

// ---------------------------------------------------------------------------
// Prediction loop
// ---------------------------------------------------------------------------

/// Hook run before every prediction; may set, replace or clear the token.
pub type TokenHook = Box<dyn FnMut(&mut Option<String>) -> anyhow::Result<()> + Send>;

/// Why a prediction loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionEndReason {
    /// A stop was requested through the [`StopHandle`].
    StopRequested,
    /// The configured iteration limit was reached.
    MaxIterationsReached,
}

/// Summary of a finished prediction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionOutcome {
    /// Why the loop ended.
    pub end_reason: PredictionEndReason,
    /// Predictions completed.
    pub iterations: u64,
}

/// Drives a model against an exported-brain endpoint.
pub struct PredictionLoop<M> {
    transport: HttpTransport,
    config: ExportedBrainConfig,
    model: M,
    token: Option<String>,
    token_hook: Option<TokenHook>,
    stop: StopHandle,
    max_iterations: Option<u64>,
}

impl<M: Model> PredictionLoop<M> {
    /// Create a loop for `config.url`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the URL is blank, credentials are
    /// incomplete, or the HTTP client cannot be built.
    pub fn new(config: ExportedBrainConfig, model: M) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(
            &config.url,
            config.client_timeout,
            config.enable_logging,
            config.retry,
        )?;
        Ok(Self {
            transport,
            config,
            model,
            token: None,
            token_hook: None,
            stop: StopHandle::new(),
            max_iterations: None,
        })
    }

    /// Run `hook` before every prediction.
    #[must_use]
    pub fn with_token_hook(
        mut self,
        hook: impl FnMut(&mut Option<String>) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.token_hook = Some(Box::new(hook));
        self
    }

    /// Start with a pre-issued bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Stop after `max_iterations` predictions.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Share an existing stop handle instead of the loop's own.
    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops this loop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The model being driven.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Consume the loop and return the model.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Fetch a token with the configured client credentials, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BrainError::Token`] if the exchange fails.
    pub async fn authenticate(&mut self) -> Result<(), BrainError> {
        let Some(credentials) = &self.config.credentials else {
            return Ok(());
        };
        let anonymous = self.transport.clone().with_authorization(Authorization::None);
        let token = fetch_client_credentials_token(&anonymous, credentials)
            .await
            .map_err(BrainError::Token)?;
        info!(
            token_url = %credentials.token_url,
            token_type = token.token_type.as_deref(),
            expires_in = token.expires_in,
            "obtained exported brain access token"
        );
        self.token = Some(token.access_token);
        Ok(())
    }

    /// Run the token hook, post the current state, and apply the returned
    /// action to the model.
    ///
    /// # Errors
    ///
    /// Hook, transport and model failures are returned as [`BrainError`].
    pub async fn predict_once(&mut self, iteration: u64) -> Result<Payload, BrainError> {
        if let Some(hook) = self.token_hook.as_mut() {
            hook(&mut self.token).map_err(BrainError::TokenHook)?;
        }
        let auth = self
            .token
            .as_ref()
            .map_or(Authorization::None, |token| Authorization::Bearer(token.clone()));
        self.transport.set_authorization(auth);

        let state = self.model.state().map_err(|source| BrainError::Model {
            hook: "state",
            source,
        })?;
        let action: Payload = self
            .transport
            .post_json(&self.config.url, &state)
            .await
            .map_err(|source| BrainError::Predict { iteration, source })?;
        debug!(iteration, action = %action, "prediction received");

        self.model.step(&action).map_err(|source| BrainError::Model {
            hook: "step",
            source,
        })?;
        Ok(action)
    }

    /// Authenticate, then predict until stopped or the iteration limit is
    /// reached.
    ///
    /// Fatal errors are logged with a timestamp and their full cause chain
    /// before being returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`BrainError`].
    pub async fn run(&mut self) -> Result<PredictionOutcome, BrainError> {
        let result = self.run_until_end().await;
        if let Err(err) = &result {
            error!(
                timestamp = %Utc::now().to_rfc3339(),
                url = %self.config.url,
                error = %error_chain(err),
                "fatal prediction error"
            );
        }
        result
    }

    async fn run_until_end(&mut self) -> Result<PredictionOutcome, BrainError> {
        self.authenticate().await?;
        info!(
            url = %self.config.url,
            max_iterations = self.max_iterations,
            "prediction loop starting"
        );

        let mut iterations: u64 = 0;
        loop {
            if self.stop.is_stop_requested() {
                info!(iterations, "stop requested");
                return Ok(PredictionOutcome {
                    end_reason: PredictionEndReason::StopRequested,
                    iterations,
                });
            }
            if self.max_iterations.is_some_and(|max| iterations >= max) {
                info!(iterations, "iteration limit reached");
                return Ok(PredictionOutcome {
                    end_reason: PredictionEndReason::MaxIterationsReached,
                    iterations,
                });
            }

            self.predict_once(iterations).await?;
            iterations = iterations.saturating_add(1);
        }
    }
}

impl<M> core::fmt::Debug for PredictionLoop<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PredictionLoop")
            .field("url", &self.config.url)
            .field("has_token", &self.token.is_some())
            .field("has_token_hook", &self.token_hook.is_some())
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

/// Log the end of a prediction loop.
pub fn log_prediction_end(outcome: &PredictionOutcome) {
    info!(
        reason = ?outcome.end_reason,
        iterations = outcome.iterations,
        "Prediction loop ended"
    );
}
