//! Configuration types for the simulator client.
//!
//! Configuration is explicit: a [`ClientConfig`] or [`ExportedBrainConfig`]
//! is built by the caller and handed to the transport at construction.
//! Values are layered, lowest to highest precedence:
//!
//! 1. explicit values passed to the constructor
//! 2. environment variables (`SIM_*`)
//! 3. command-line overrides via [`ClientConfig::apply_overrides`]
//!
//! Environment lookup goes through a caller-supplied function so that tests
//! never touch the process environment.

use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Default simulator service URL.
pub const DEFAULT_SERVER: &str = "https://api.bons.ai";

/// Default per-request timeout for the simulator service.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-request timeout for exported-brain predictions.
pub const DEFAULT_EXPORTED_BRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable names.
pub mod env {
    /// Simulator service URL.
    pub const API_HOST: &str = "SIM_API_HOST";
    /// Workspace id.
    pub const WORKSPACE: &str = "SIM_WORKSPACE";
    /// Workspace access key.
    pub const ACCESS_KEY: &str = "SIM_ACCESS_KEY";
    /// Opaque simulator context.
    pub const CONTEXT: &str = "SIM_CONTEXT";
    /// Per-request timeout in seconds.
    pub const REQUEST_TIMEOUT_SECS: &str = "SIM_REQUEST_TIMEOUT_SECS";
    /// Maximum transient-failure retries per request.
    pub const MAX_RETRIES: &str = "SIM_MAX_RETRIES";
    /// Exported-brain prediction URL.
    pub const EXPORTED_BRAIN_URL: &str = "SIM_EXPORTED_BRAIN_URL";
    /// Exported-brain per-request timeout in seconds.
    pub const EXPORTED_BRAIN_TIMEOUT_SECS: &str = "SIM_EXPORTED_BRAIN_TIMEOUT_SECS";
    /// OAuth token endpoint for client credentials.
    pub const TOKEN_URL: &str = "SIM_TOKEN_URL";
    /// OAuth application (client) id.
    pub const APPLICATION_ID: &str = "SIM_APPLICATION_ID";
    /// OAuth client secret.
    pub const CLIENT_SECRET: &str = "SIM_CLIENT_SECRET";
}

/// Connection settings for the simulator session service.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service base URL.
    pub server: String,
    /// Workspace id.
    pub workspace: String,
    /// Workspace access key, sent verbatim as the `Authorization` header.
    pub access_key: String,
    /// Opaque correlation payload sent at registration.
    pub simulator_context: String,
    /// Log every request and response.
    pub enable_logging: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Transient-failure retry policy.
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Create a configuration from explicit values.
    ///
    /// A fresh simulator context carrying a random client id is generated;
    /// environment variables are not consulted until [`Self::with_env`].
    pub fn new(workspace: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            workspace: workspace.into(),
            access_key: access_key.into(),
            simulator_context: generate_simulator_context(),
            enable_logging: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Load configuration from the process environment only.
    ///
    /// Variables:
    /// - `SIM_API_HOST` -- service URL (default `https://api.bons.ai`)
    /// - `SIM_WORKSPACE` -- workspace id
    /// - `SIM_ACCESS_KEY` -- access key
    /// - `SIM_CONTEXT` -- simulator context (default: generated client id)
    /// - `SIM_REQUEST_TIMEOUT_SECS` -- per-request timeout (default 60)
    /// - `SIM_MAX_RETRIES` -- transient retries per request (default 4)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new("", "").with_env()
    }

    /// Layer the process environment over the explicit values.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_source(|name| std::env::var(name).ok())
    }

    /// Layer variables from `lookup` over the explicit values.
    ///
    /// Empty variables are treated as unset.
    pub fn with_env_source<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(server) = lookup(env::API_HOST) {
            self.server = server;
        }
        if let Some(workspace) = lookup(env::WORKSPACE) {
            self.workspace = workspace;
        }
        if let Some(access_key) = lookup(env::ACCESS_KEY) {
            self.access_key = access_key;
        }
        if let Some(context) = lookup(env::CONTEXT) {
            self.simulator_context = context;
        }
        if let Some(raw) = lookup(env::REQUEST_TIMEOUT_SECS) {
            self.request_timeout = parse_secs(env::REQUEST_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(env::MAX_RETRIES) {
            self.retry.max_retries = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                name: env::MAX_RETRIES,
                message: format!("{e}"),
            })?;
        }
        Ok(self)
    }

    /// Apply command-line overrides; these win over everything else.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }
        if let Some(access_key) = overrides.access_key {
            self.access_key = access_key;
        }
        if let Some(context) = overrides.simulator_context {
            self.simulator_context = context;
        }
    }

    /// Enable or disable request/response logging.
    #[must_use]
    pub const fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the server URL.
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Replace the simulator context.
    #[must_use]
    pub fn with_simulator_context(mut self, context: impl Into<String>) -> Self {
        self.simulator_context = context.into();
        self
    }

    /// Check that everything the session protocol needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::MissingServer);
        }
        if self.workspace.trim().is_empty() {
            return Err(ConfigError::MissingWorkspace);
        }
        if self.access_key.trim().is_empty() {
            return Err(ConfigError::MissingAccessKey);
        }
        Ok(())
    }
}

impl core::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("workspace", &self.workspace)
            .field("access_key", &redact(&self.access_key))
            .field("simulator_context", &self.simulator_context)
            .field("enable_logging", &self.enable_logging)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Command-line values that override the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--api-host`
    pub server: Option<String>,
    /// `--workspace`
    pub workspace: Option<String>,
    /// `--accesskey`
    pub access_key: Option<String>,
    /// `--sim-context`
    pub simulator_context: Option<String>,
}

/// OAuth2 client-credentials settings for a protected exported brain.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Token-granting endpoint.
    pub token_url: String,
    /// Application (client) id; also forms the `api://{id}` resource.
    pub application_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl ClientCredentials {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_url.trim().is_empty() {
            return Err(ConfigError::IncompleteCredentials("token_url"));
        }
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::IncompleteCredentials("application_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::IncompleteCredentials("client_secret"));
        }
        Ok(())
    }
}

impl core::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("application_id", &self.application_id)
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

/// Settings for the exported-brain prediction loop.
#[derive(Debug, Clone)]
pub struct ExportedBrainConfig {
    /// Prediction endpoint; states are POSTed here verbatim.
    pub url: String,
    /// Per-request timeout.
    pub client_timeout: Duration,
    /// Optional OAuth2 client credentials.
    pub credentials: Option<ClientCredentials>,
    /// Log every request and response.
    pub enable_logging: bool,
    /// Transient-failure retry policy.
    pub retry: RetryPolicy,
}

impl ExportedBrainConfig {
    /// Create a configuration for an unauthenticated exported brain.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_timeout: DEFAULT_EXPORTED_BRAIN_TIMEOUT,
            credentials: None,
            enable_logging: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Protect requests with a client-credentials bearer token.
    #[must_use]
    pub fn with_client_credentials(mut self, credentials: ClientCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable request/response logging.
    #[must_use]
    pub const fn with_logging(mut self, enable_logging: bool) -> Self {
        self.enable_logging = enable_logging;
        self
    }

    /// Layer variables from `lookup` over the explicit values.
    ///
    /// Credentials are picked up only when all three of `SIM_TOKEN_URL`,
    /// `SIM_APPLICATION_ID` and `SIM_CLIENT_SECRET` are set.
    pub fn with_env_source<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(env::EXPORTED_BRAIN_URL) {
            self.url = url;
        }
        if let Some(raw) = lookup(env::EXPORTED_BRAIN_TIMEOUT_SECS) {
            self.client_timeout = parse_secs(env::EXPORTED_BRAIN_TIMEOUT_SECS, &raw)?;
        }
        if let (Some(token_url), Some(application_id), Some(client_secret)) = (
            lookup(env::TOKEN_URL),
            lookup(env::APPLICATION_ID),
            lookup(env::CLIENT_SECRET),
        ) {
            self.credentials = Some(ClientCredentials {
                token_url,
                application_id,
                client_secret,
            });
        }
        Ok(self)
    }

    /// Layer the process environment over the explicit values.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_source(|name| std::env::var(name).ok())
    }

    /// Check that a prediction URL is present and credentials are complete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingExportedBrainUrl);
        }
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }
        Ok(())
    }
}

/// Generate a simulator context carrying a random client id.
///
/// The service uses the id to correlate a simulator across restarts.
pub fn generate_simulator_context() -> String {
    let client_id = uuid::Uuid::new_v4().simple().to_string();
    serde_json::json!({ "simulatorClientId": client_id }).to_string()
}

/// Parse a whole or fractional number of seconds.
fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name,
        message: format!("{e}"),
    })?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
        name,
        message: format!("{e}"),
    })
}

/// Mask a secret for debug output.
const fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}
