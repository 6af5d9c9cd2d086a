//! Normalized API contract model
//!
//! A [`ContractModel`] is the strongly typed view of an OpenAPI-style document.
//! It is produced by a loader (see `apicheck-runner`) and never mutated
//! afterwards; derivation only reads it.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTP methods a contract operation can be tested with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Parse a method name case-insensitively. Anything outside the five
    /// supported verbs (HEAD, OPTIONS, TRACE, path-item keys) is `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Whether a recorded body is sent with this method.
    #[must_use]
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Query,
    Header,
    Path,
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
}

/// Declared request body: first content type and its (opaque) schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestBody {
    pub content_type: String,
    #[serde(default)]
    pub schema: serde_json::Value,
}

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum KeyLocation {
    Header,
    Query,
}

impl std::fmt::Display for KeyLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// A declared security scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityScheme {
    /// API key in a header or query parameter
    ApiKey { name: String, location: KeyLocation },
    /// HTTP bearer token
    Bearer,
    /// Declared but not injectable (oauth2, basic, cookie keys, ...)
    Unsupported { kind: String },
}

/// Security requirement of a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", content = "scheme", rename_all = "snake_case")]
pub enum SecurityRequirement {
    /// No `security` key on the operation: use the contract default
    #[default]
    Inherit,
    /// `security: []` or `[{}]` on the operation
    Disabled,
    /// First scheme named by the operation's first requirement object
    Scheme(String),
}

/// One (path, method) pair of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
    /// Declared response codes in declaration order (first = primary)
    #[serde(default)]
    pub responses: Vec<String>,
    #[serde(default)]
    pub security: SecurityRequirement,
}

impl Operation {
    /// `"METHOD path"`, the grouping key used throughout reports.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Declared parameters at a given location, in declaration order.
    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    #[must_use]
    pub fn has_required_parameters(&self) -> bool {
        self.parameters.iter().any(|p| p.required)
    }
}

/// Normalized contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContractModel {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Server base URLs in declaration order
    #[serde(default)]
    pub servers: Vec<String>,
    /// Supported operations in document order
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub security_schemes: HashMap<String, SecurityScheme>,
    /// Scheme named by the top-level `security` requirement
    #[serde(default)]
    pub default_security: Option<String>,
}

impl ContractModel {
    /// First declared server URL, or `""` when none is declared.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.servers.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes.get(name)
    }

    /// Resolve the scheme that applies to `op`, falling back to the
    /// contract default when the operation does not say.
    #[must_use]
    pub fn resolve_security(&self, op: &Operation) -> Option<&SecurityScheme> {
        let name = match &op.security {
            SecurityRequirement::Inherit => self.default_security.as_deref()?,
            SecurityRequirement::Disabled => return None,
            SecurityRequirement::Scheme(name) => name.as_str(),
        };
        self.scheme(name)
    }
}

/// The supplied document cannot be interpreted as a contract.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Cannot read {0}: {1}")]
    Io(std::path::PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("Invalid `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}
