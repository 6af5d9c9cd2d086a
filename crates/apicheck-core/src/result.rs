//! Per-case execution results

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::case::TestCase;
use crate::request::PreparedRequest;

/// Maximum number of characters of a response body kept in a result.
pub const MAX_BODY_CHARS: usize = 1000;

/// Judgment for one executed case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Outcome {
    /// Observed status is in the expected set
    Passed,
    /// Observed status is not in the expected set, or the body does not
    /// carry the expected fields
    Failed,
    /// No usable response (transport failure, unreadable body, panic)
    Errored,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => f.write_str("PASS"),
            Self::Failed => f.write_str("FAIL"),
            Self::Errored => f.write_str("ERROR"),
        }
    }
}

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionResult {
    /// Position of the case in the derivation sequence
    pub index: usize,
    pub case: Arc<TestCase>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<PreparedRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
    /// Response body prefix, at most [`MAX_BODY_CHARS`] characters
    #[serde(default)]
    pub response_body: String,
    #[serde(default)]
    pub response_body_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schemars(with = "String")]
    pub started_at: OffsetDateTime,
    pub duration_seconds: f64,
}

impl ExecutionResult {
    /// Result for a response that arrived; judged against the case's expectation.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn judged(
        index: usize,
        case: Arc<TestCase>,
        request: PreparedRequest,
        status: u16,
        response_headers: BTreeMap<String, String>,
        body: &str,
        started_at: OffsetDateTime,
        duration_seconds: f64,
    ) -> Self {
        let mismatch = if case.expected_status.accepts(status) && status != 204 {
            case.expected_response
                .as_ref()
                .and_then(|expected| body_mismatch(body, expected))
        } else {
            None
        };
        let outcome = if case.expected_status.accepts(status) && mismatch.is_none() {
            Outcome::Passed
        } else {
            Outcome::Failed
        };
        let (response_body, response_body_truncated) = truncate_body(body);
        Self {
            index,
            case,
            outcome,
            request: Some(request),
            http_status: Some(status),
            response_headers,
            response_body,
            response_body_truncated,
            error_message: mismatch,
            started_at,
            duration_seconds,
        }
    }

    /// Result for a case that produced no usable response.
    #[must_use]
    pub fn errored(
        index: usize,
        case: Arc<TestCase>,
        request: Option<PreparedRequest>,
        message: impl Into<String>,
        started_at: OffsetDateTime,
        duration_seconds: f64,
    ) -> Self {
        Self {
            index,
            case,
            outcome: Outcome::Errored,
            request,
            http_status: None,
            response_headers: BTreeMap::new(),
            response_body: String::new(),
            response_body_truncated: false,
            error_message: Some(message.into()),
            started_at,
            duration_seconds,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// One-line explanation of a non-passing result.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self.outcome {
            Outcome::Passed => None,
            Outcome::Failed => Some(self.error_message.clone().unwrap_or_else(|| {
                format!(
                    "expected {}, got {}",
                    self.case.expected_status,
                    self.http_status.map_or_else(|| "-".to_string(), |s| s.to_string())
                )
            })),
            Outcome::Errored => Some(
                self.error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
        }
    }
}

/// Expected-response value that matches anything.
pub const ANY_VALUE: &str = "*";

/// Compare a response body with the expected fields.
///
/// An object expectation is partial: every listed key must be present at the
/// top level and equal, unless its value is [`ANY_VALUE`]. Any other JSON
/// value must match the whole body. Returns the first mismatch.
fn body_mismatch(body: &str, expected: &serde_json::Value) -> Option<String> {
    let actual: serde_json::Value = match serde_json::from_str(body) {
        Ok(actual) => actual,
        Err(e) => return Some(format!("response body is not JSON: {e}")),
    };
    let serde_json::Value::Object(fields) = expected else {
        return (actual != *expected).then(|| format!("expected body {expected}, got {actual}"));
    };
    let Some(actual) = actual.as_object() else {
        return Some(format!("expected a JSON object, got {actual}"));
    };
    for (key, want) in fields {
        match actual.get(key) {
            None => return Some(format!("response body has no `{key}`")),
            Some(_) if want.as_str() == Some(ANY_VALUE) => {}
            Some(got) if got != want => {
                return Some(format!("`{key}`: expected {want}, got {got}"));
            }
            Some(_) => {}
        }
    }
    None
}

/// Keep at most [`MAX_BODY_CHARS`] characters. Returns the prefix and
/// whether anything was cut.
#[must_use]
pub fn truncate_body(body: &str) -> (String, bool) {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((cut, _)) => (body[..cut].to_string(), true),
        None => (body.to_string(), false),
    }
}
