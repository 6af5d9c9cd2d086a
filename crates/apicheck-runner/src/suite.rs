//! Simplified declarative suites
//!
//! A suite lists endpoints and hand-written cases instead of an OpenAPI
//! document:
//!
//! ```yaml
//! base_url: http://localhost:8000
//! apis:
//!   - endpoint: /users/{id}
//!     method: PUT
//!     auth: bearer_token
//!     test_cases:
//!       - name: rename
//!         body: {id: 7, name: bob}
//!         expected_status: 200
//!         expected_response: {id: 7, updated_at: "*"}
//! ```
//!
//! The same cases may be written as flat rows under `cases:`, one row per
//! case with `endpoint`, `method`, `test_case`, `description`,
//! `request_body`, `expected_status` and `expected_response` columns. Cells
//! holding JSON text are parsed.
//!
//! Every listed case becomes one nominal [`TestCase`] with concrete values.
//! No variants are synthesized. `{name}` segments of an endpoint are filled
//! from the same-named body field, which is then dropped from the body.

use std::collections::BTreeMap;

use apicheck_core::{
    AuthRequirement, ContractError, ExpectedStatus, HttpMethod, KeyLocation, OperationKey,
    RequestSpec, TestCase, VariantKind,
};
use serde::Deserialize;
use serde_json::Value;

/// Header carrying the key for `auth: api_key` endpoints.
pub const SUITE_API_KEY_HEADER: &str = "X-API-Key";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Parsed suite document.
#[derive(Debug, Clone, Deserialize)]
pub struct Suite {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub apis: Vec<SuiteEndpoint>,
    /// Tabular rows, expanded after `apis`
    #[serde(default)]
    pub cases: Vec<SuiteRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteEndpoint {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// `api_key` or `bearer_token`; anything else means no auth
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<SuiteCase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteAuth {
    ApiKey,
    BearerToken,
}

impl SuiteAuth {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api_key" => Some(Self::ApiKey),
            "bearer_token" => Some(Self::BearerToken),
            _ => None,
        }
    }

    fn requirement(self) -> AuthRequirement {
        match self {
            Self::ApiKey => AuthRequirement::ApiKey {
                name: SUITE_API_KEY_HEADER.to_string(),
                location: KeyLocation::Header,
            },
            Self::BearerToken => AuthRequirement::Bearer,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuiteCase {
    /// Defaults to `"METHOD endpoint"`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub query_params: BTreeMap<String, Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub expected_status: Option<StatusSpec>,
    /// Fields the JSON response must carry; `"*"` accepts any value
    #[serde(default)]
    pub expected_response: Option<Value>,
}

/// One row of the tabular form.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteRow {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub test_case: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub expected_status: Option<StatusSpec>,
    #[serde(default)]
    pub expected_response: Option<Value>,
}

impl SuiteRow {
    fn to_case(&self) -> SuiteCase {
        SuiteCase {
            name: self.test_case.clone().filter(|n| !n.trim().is_empty()),
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            body: self.request_body.clone().and_then(json_cell),
            expected_status: self.expected_status.clone(),
            expected_response: self.expected_response.clone().and_then(json_cell),
            ..SuiteCase::default()
        }
    }
}

/// `expected_status` as written: `200`, `"200"` or `[200, 404]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusSpec {
    Many(Vec<Value>),
    One(Value),
}

impl StatusSpec {
    fn to_expected(&self) -> Option<ExpectedStatus> {
        match self {
            Self::Many(codes) => ExpectedStatus::from_codes(codes.iter().map(scalar_string)),
            Self::One(code) => ExpectedStatus::from_codes([scalar_string(code)]),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

/// Interpret a parsed document as a suite.
///
/// # Errors
///
/// Returns error if both `apis` and `cases` are missing, or any entry is
/// malformed.
pub fn suite_from_value(doc: Value) -> Result<Suite, ContractError> {
    if doc.get("apis").is_none() && doc.get("cases").is_none() {
        return Err(ContractError::MissingKey("apis"));
    }
    for key in ["apis", "cases"] {
        if doc.get(key).is_some_and(|v| !v.is_array()) {
            return Err(ContractError::Invalid {
                key: key.into(),
                reason: "expected a sequence".into(),
            });
        }
    }
    serde_json::from_value(doc).map_err(|e| ContractError::Invalid {
        key: "apis".into(),
        reason: e.to_string(),
    })
}

impl Suite {
    /// Expand into test cases. `base_url` replaces the suite's own base URL.
    #[must_use]
    pub fn to_cases(&self, base_url: Option<&str>) -> Vec<TestCase> {
        let base = base_url.unwrap_or(self.base_url.as_str()).trim_end_matches('/');
        let mut cases = Vec::new();

        for api in &self.apis {
            let Some(method) = supported_method(&api.method, &api.endpoint) else {
                continue;
            };
            let auth = api.auth.as_deref().and_then(|name| {
                let auth = SuiteAuth::parse(name);
                if auth.is_none() {
                    tracing::debug!(
                        endpoint = %api.endpoint,
                        auth = %name,
                        "unknown auth kind; no credentials injected"
                    );
                }
                auth.map(SuiteAuth::requirement)
            });

            for case in &api.test_cases {
                let ordinal = cases.len();
                cases.push(build_case(ordinal, base, method, &api.endpoint, auth.clone(), case));
            }
        }

        for row in &self.cases {
            let Some(method) = supported_method(&row.method, &row.endpoint) else {
                continue;
            };
            let ordinal = cases.len();
            cases.push(build_case(ordinal, base, method, &row.endpoint, None, &row.to_case()));
        }

        tracing::debug!(
            endpoints = self.apis.len(),
            rows = self.cases.len(),
            cases = cases.len(),
            "suite expanded"
        );
        cases
    }
}

fn supported_method(method: &str, endpoint: &str) -> Option<HttpMethod> {
    let parsed = HttpMethod::parse(method);
    if parsed.is_none() {
        tracing::warn!(%endpoint, %method, "unsupported method; skipped");
    }
    parsed
}

fn build_case(
    ordinal: usize,
    base: &str,
    method: HttpMethod,
    endpoint: &str,
    auth: Option<AuthRequirement>,
    case: &SuiteCase,
) -> TestCase {
    let (path, body) = fill_path(endpoint, case.body.as_ref());
    TestCase {
        id: format!("{ordinal:04}-{}", VariantKind::Nominal),
        name: case
            .name
            .clone()
            .unwrap_or_else(|| format!("{method} {endpoint}")),
        description: case.description.clone(),
        operation: OperationKey {
            method,
            path: endpoint.to_string(),
        },
        request: RequestSpec {
            url: format!("{base}{path}"),
            method,
            headers: concrete(&case.headers),
            query_params: concrete(&case.query_params),
            body,
            auth,
            auth_value: None,
        },
        expected_status: case
            .expected_status
            .as_ref()
            .and_then(StatusSpec::to_expected)
            .unwrap_or_else(|| ExpectedStatus::single("200")),
        variant: VariantKind::Nominal,
        required_params: Vec::new(),
        expected_response: case.expected_response.clone().filter(|v| !v.is_null()),
    }
}

/// Fill `{name}` segments from same-named fields of an object body. Used
/// fields are removed from the body; unmatched segments stay as written.
fn fill_path(endpoint: &str, body: Option<&Value>) -> (String, Option<Value>) {
    let mut path = endpoint.to_string();
    let mut body = body.cloned();
    if let Some(Value::Object(fields)) = body.as_mut() {
        for name in placeholders(endpoint) {
            if let Some(value) = fields.remove(name) {
                path = path.replace(&format!("{{{name}}}"), &scalar_string(&value));
            }
        }
    }
    (path, body)
}

/// Names between `{` and the next `}`, in order.
fn placeholders(endpoint: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = endpoint;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    names
}

/// A tabular cell: blank means unset, JSON text is parsed, other values pass.
fn json_cell(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(serde_json::from_str(&s).unwrap_or(Value::String(s))),
        other => Some(other),
    }
}

/// Null values stay unset; everything else is rendered as text.
fn concrete(values: &BTreeMap<String, Value>) -> BTreeMap<String, Option<String>> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), (!v.is_null()).then(|| scalar_string(v))))
        .collect()
}

fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
