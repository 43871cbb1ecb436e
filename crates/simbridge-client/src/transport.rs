//! HTTP transport shared by the session loop and the exported brain.
//!
//! [`HttpTransport`] owns one `reqwest` client, the authorization header and
//! the retry policy. Every request passes through [`with_retry`]. When
//! traffic logging is enabled each attempt writes one `debug!` line for the
//! request and one for the response, before any retry decision is made.

use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ConfigError, TransportError};
use crate::retry::{RetryPolicy, with_retry};

/// Credential attached to each request.
#[derive(Clone, Default)]
pub enum Authorization {
    /// No `Authorization` header.
    #[default]
    None,
    /// The workspace access key, sent verbatim.
    AccessKey(String),
    /// An OAuth bearer token.
    Bearer(String),
}

impl Authorization {
    /// Value for the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::AccessKey(key) => Some(key.clone()),
            Self::Bearer(token) => Some(format!("Bearer {token}")),
        }
    }
}

impl core::fmt::Debug for Authorization {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::AccessKey(_) => f.write_str("AccessKey(<redacted>)"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Request body variants.
enum Body<'a> {
    Empty,
    Json(Vec<u8>),
    Form(&'a [(&'a str, &'a str)]),
}

/// Authenticated HTTP client with retry and optional traffic logging.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth: Authorization,
    log_traffic: bool,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Build a transport against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the underlying client cannot
    /// be constructed.
    pub fn new(
        base_url: &str,
        timeout: std::time::Duration,
        log_traffic: bool,
        retry: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(format!("{e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth: Authorization::None,
            log_traffic,
            retry,
        })
    }

    /// Replace the credential sent on subsequent requests.
    pub fn set_authorization(&mut self, auth: Authorization) {
        self.auth = auth;
    }

    /// Builder form of [`Self::set_authorization`].
    #[must_use]
    pub fn with_authorization(mut self, auth: Authorization) -> Self {
        self.auth = auth;
        self
    }

    /// Current credential.
    pub const fn authorization(&self) -> &Authorization {
        &self.auth
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST `body` as JSON and decode the JSON response.
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| TransportError::Encode {
            url: url.to_owned(),
            message: format!("{e}"),
        })?;
        let text = self
            .execute(reqwest::Method::POST, url, &Body::Json(bytes))
            .await?;
        decode(url, &text)
    }

    /// POST a URL-encoded form and decode the JSON response.
    pub async fn post_form<R>(&self, url: &str, form: &[(&str, &str)]) -> Result<R, TransportError>
    where
        R: DeserializeOwned,
    {
        let text = self
            .execute(reqwest::Method::POST, url, &Body::Form(form))
            .await?;
        decode(url, &text)
    }

    /// Send a DELETE; the response body is ignored.
    pub async fn delete(&self, url: &str) -> Result<(), TransportError> {
        self.execute(reqwest::Method::DELETE, url, &Body::Empty)
            .await
            .map(drop)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &Body<'_>,
    ) -> Result<String, TransportError> {
        let label = format!("{method} {url}");
        with_retry(&self.retry, &label, || self.attempt(method.clone(), url, body)).await
    }

    async fn attempt(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &Body<'_>,
    ) -> Result<String, TransportError> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(value) = self.auth.header_value() {
            request = request.header(reqwest::header::AUTHORIZATION, value);
        }
        request = match body {
            Body::Empty => request,
            Body::Json(bytes) => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes.clone()),
            Body::Form(fields) => request.form(fields),
        };

        if self.log_traffic {
            match body {
                Body::Json(bytes) => debug!(
                    method = %method,
                    url,
                    body = %String::from_utf8_lossy(bytes),
                    "sending request"
                ),
                Body::Form(_) | Body::Empty => debug!(method = %method, url, "sending request"),
            }
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| classify(url, &e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| classify(url, &e))?;

        if self.log_traffic {
            debug!(
                method = %method,
                url,
                status = status.as_u16(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                body = %text,
                "received response"
            );
        }

        if status.is_success() {
            Ok(text)
        } else {
            Err(TransportError::from_status(url, status.as_u16(), &text))
        }
    }
}

/// Map a client error onto the transport taxonomy.
fn classify(url: &str, error: &reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_owned(),
            message: format!("{error}"),
        }
    } else if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_owned(),
        }
    } else {
        TransportError::Connect {
            url: url.to_owned(),
            message: format!("{error}"),
        }
    }
}

fn decode<R: DeserializeOwned>(url: &str, text: &str) -> Result<R, TransportError> {
    serde_json::from_str(text).map_err(|e| TransportError::Decode {
        url: url.to_owned(),
        message: format!("{e}"),
    })
}
