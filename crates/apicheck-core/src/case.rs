//! Test case types produced by derivation

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contract::{HttpMethod, KeyLocation};

/// Credential value injected into invalid-auth variants.
pub const INVALID_AUTH_SENTINEL: &str = "invalid_auth_value";

/// Which derivation produced a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// Happy-path case for the operation
    Nominal,
    /// Query parameters cleared, expects 400
    MissingRequiredParams,
    /// Sentinel credential, expects 401
    InvalidAuth,
}

impl VariantKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::MissingRequiredParams => "missing-required-params",
            Self::InvalidAuth => "invalid-auth",
        }
    }

    /// Suffix appended to the nominal case name.
    #[must_use]
    pub const fn name_suffix(self) -> &'static str {
        match self {
            Self::Nominal => "",
            Self::MissingRequiredParams => " - Missing Required Parameters",
            Self::InvalidAuth => " - Invalid Authentication",
        }
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the contract operation a case was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct OperationKey {
    pub method: HttpMethod,
    /// Path template as declared, placeholders unresolved
    pub path: String,
}

impl OperationKey {
    /// `"METHOD path"`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Non-empty set of acceptable status codes, kept as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExpectedStatus(BTreeSet<String>);

impl ExpectedStatus {
    #[must_use]
    pub fn single(code: impl Into<String>) -> Self {
        Self(BTreeSet::from([code.into()]))
    }

    /// Build from any codes; `None` when no code is given.
    pub fn from_codes<I, S>(codes: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = codes
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if set.is_empty() { None } else { Some(Self(set)) }
    }

    /// Whether an observed status satisfies the expectation.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        self.0.contains(&status.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let codes: Vec<&str> = self.iter().collect();
        f.write_str(&codes.join("|"))
    }
}

/// Authentication a request must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthRequirement {
    ApiKey { name: String, location: KeyLocation },
    Bearer,
}

/// Request description recorded on a test case.
///
/// `None` values are declared-but-unset parameters; they are never filled
/// with placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub query_params: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRequirement>,
    /// Credential override; takes precedence over supplied credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_value: Option<String>,
}

/// A single executable test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub operation: OperationKey,
    pub request: RequestSpec,
    pub expected_status: ExpectedStatus,
    pub variant: VariantKind,
    /// Names of required parameters of the source operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_params: Vec<String>,
    /// Fields the JSON response body must contain; `"*"` matches any value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<serde_json::Value>,
}

impl TestCase {
    /// `"METHOD path"` of the source operation.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.operation.label()
    }
}
