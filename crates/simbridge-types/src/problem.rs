//! RFC 7807 problem details returned by the service on failed requests.

use serde::{Deserialize, Serialize};

/// Machine-readable error body attached to non-success responses.
///
/// Every field is optional; servers fill in whatever they have.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// HTTP status code echoed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Human-readable explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI reference identifying this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Parse a response body as problem details.
    ///
    /// Returns `None` when the body is not JSON or carries neither a title
    /// nor a detail.
    pub fn from_body(body: &str) -> Option<Self> {
        let problem: Self = serde_json::from_str(body).ok()?;
        (problem.title.is_some() || problem.detail.is_some()).then_some(problem)
    }

    /// One-line summary for logs and error messages.
    pub fn summary(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{title}: {detail}"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => "no details".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_problem_body() {
        let body = r#"{"type":"about:blank","title":"Not Found","status":404,"detail":"workspace ws1 not found"}"#;
        let problem = ProblemDetails::from_body(body);
        assert!(problem.is_some());
        let problem = problem.unwrap_or_default();
        assert_eq!(problem.status, Some(404));
        assert_eq!(problem.summary(), "Not Found: workspace ws1 not found");
    }

    #[test]
    fn ignores_non_problem_bodies() {
        assert!(ProblemDetails::from_body("<html>bad gateway</html>").is_none());
        assert!(ProblemDetails::from_body("{}").is_none());
    }
}
