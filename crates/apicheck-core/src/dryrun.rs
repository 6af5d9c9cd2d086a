//! Dry run plan types and config validation
//!
//! Describes the cases a run *would* execute without sending any requests.
//! Used for pre-flight validation and CI previews.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Config;
use crate::case::{AuthRequirement, TestCase, VariantKind};

// ── Plan types ──

/// Complete dry run plan: derived cases and config warnings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DryRunPlan {
    /// Distinct endpoints covered
    pub endpoints: usize,
    /// Cases per variant kind
    pub variants: VariantCounts,
    /// Every case in execution order
    pub cases: Vec<CasePlan>,
    /// Config/contract validation results
    pub validations: Vec<Validation>,
}

/// One planned case.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CasePlan {
    pub id: String,
    pub name: String,
    /// `"METHOD path"`
    pub endpoint: String,
    pub url: String,
    pub variant: VariantKind,
    pub expected_status: Vec<String>,
    /// `"api_key"` / `"bearer"` when the case carries credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VariantCounts {
    pub nominal: u32,
    pub missing_required_params: u32,
    pub invalid_auth: u32,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl DryRunPlan {
    /// Summarize derived cases.
    #[must_use]
    pub fn from_cases(cases: &[TestCase], validations: Vec<Validation>) -> Self {
        let mut variants = VariantCounts::default();
        let mut endpoints = BTreeSet::new();

        let cases = cases
            .iter()
            .map(|c| {
                match c.variant {
                    VariantKind::Nominal => variants.nominal += 1,
                    VariantKind::MissingRequiredParams => variants.missing_required_params += 1,
                    VariantKind::InvalidAuth => variants.invalid_auth += 1,
                }
                endpoints.insert(c.endpoint());
                CasePlan {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    endpoint: c.endpoint(),
                    url: c.request.url.clone(),
                    variant: c.variant,
                    expected_status: c.expected_status.iter().map(str::to_string).collect(),
                    auth: c.request.auth.as_ref().map(|a| match a {
                        AuthRequirement::ApiKey { .. } => "api_key".to_string(),
                        AuthRequirement::Bearer => "bearer".to_string(),
                    }),
                }
            })
            .collect();

        Self {
            endpoints: endpoints.len(),
            variants,
            cases,
            validations,
        }
    }
}

// ── Config validation ──

/// Patterns that suggest a placeholder value rather than a real credential.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-token",
    "your_token",
    "YOUR_TOKEN",
    "your-api-key",
    "YOUR_API_KEY",
    "CHANGEME",
    "changeme",
    "placeholder",
    "xxx",
    "XXX",
    "replace-me",
    "REPLACE_ME",
];

fn placeholder_issue(value: &str) -> Option<String> {
    if value.contains('<') && value.contains('>') {
        return Some("contains '<...>' placeholder".to_string());
    }
    PLACEHOLDER_PATTERNS
        .iter()
        .find(|p| value.contains(*p))
        .map(|p| format!("contains '{p}', may be placeholder"))
}

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    // Contract file exists
    if config.contract.exists() {
        checks.push(Validation {
            check: "contract".into(),
            status: ValidationStatus::Ok,
            message: format!("contract: {} (exists)", config.contract.display()),
        });
    } else {
        checks.push(Validation {
            check: "contract".into(),
            status: ValidationStatus::Error,
            message: format!("contract: {} (not found)", config.contract.display()),
        });
    }

    // Base URL override
    if let Some(base_url) = &config.base_url {
        let status = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Warning
        };
        let message = if status == ValidationStatus::Ok {
            format!("base_url: {base_url}")
        } else {
            format!("base_url: {base_url} (missing http:// or https:// prefix)")
        };
        checks.push(Validation {
            check: "base_url".into(),
            status,
            message,
        });
    }

    if let Err(e) = config.timeout() {
        checks.push(Validation {
            check: "timeout".into(),
            status: ValidationStatus::Error,
            message: e.to_string(),
        });
    }

    if config.concurrency == 0 {
        checks.push(Validation {
            check: "concurrency".into(),
            status: ValidationStatus::Warning,
            message: "concurrency: 0 (treated as 1)".into(),
        });
    }

    // Credentials and headers: check for placeholders
    let mut secrets: Vec<(String, &str)> = Vec::new();
    if let Some(v) = &config.credentials.api_key {
        secrets.push(("credentials.api_key".into(), v.as_str()));
    }
    if let Some(v) = &config.credentials.bearer {
        secrets.push(("credentials.bearer".into(), v.as_str()));
    }
    for (key, value) in &config.headers {
        secrets.push((format!("headers.{key}"), value.as_str()));
    }
    secrets.sort_by(|a, b| a.0.cmp(&b.0));

    let issues: Vec<String> = secrets
        .iter()
        .filter_map(|(key, value)| placeholder_issue(value).map(|i| format!("{key}: {i}")))
        .collect();

    if issues.is_empty() {
        checks.push(Validation {
            check: "credentials".into(),
            status: ValidationStatus::Ok,
            message: format!("credentials: {} value(s) configured", secrets.len()),
        });
    } else {
        for issue in issues {
            checks.push(Validation {
                check: "credentials".into(),
                status: ValidationStatus::Warning,
                message: issue,
            });
        }
    }

    checks
}

// ── Display helpers ──

impl DryRunPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} endpoints, {} cases planned ({} nominal, {} missing-params, {} invalid-auth)\n",
            self.endpoints,
            self.cases.len(),
            self.variants.nominal,
            self.variants.missing_required_params,
            self.variants.invalid_auth,
        ));

        for case in &self.cases {
            let auth = case
                .auth
                .as_deref()
                .map(|a| format!(" [auth: {a}]"))
                .unwrap_or_default();
            lines.push(format!(
                "  {} {} ({}) expects {}{auth}",
                case.id,
                case.endpoint,
                case.variant,
                case.expected_status.join("|"),
            ));
        }
        lines.push(String::new());

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        ContractModel, HttpMethod, KeyLocation, Operation, ParamLocation, Parameter,
        SecurityRequirement, SecurityScheme,
    };
    use crate::derive_cases;
    use crate::request::Credentials;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_with(credentials: Credentials, headers: HashMap<String, String>) -> Config {
        Config {
            contract: PathBuf::from("nonexistent.yaml"),
            credentials,
            headers,
            ..Config::default()
        }
    }

    #[test]
    fn validate_placeholder_angle_brackets() {
        let creds = Credentials {
            bearer: Some("<your token>".into()),
            ..Credentials::default()
        };
        let checks = validate_config(&config_with(creds, HashMap::new()));
        assert!(
            checks
                .iter()
                .any(|c| c.check == "credentials" && c.status == ValidationStatus::Warning),
            "Should warn about angle-bracket placeholder"
        );
    }

    #[test]
    fn validate_placeholder_header() {
        let mut h = HashMap::new();
        h.insert("X-API-Key".into(), "YOUR_API_KEY".into());
        let checks = validate_config(&config_with(Credentials::default(), h));
        let warning = checks
            .iter()
            .find(|c| c.status == ValidationStatus::Warning)
            .unwrap();
        assert!(warning.message.starts_with("headers.X-API-Key"));
    }

    #[test]
    fn validate_real_token_no_warning() {
        let creds = Credentials {
            api_key: Some("k_live_93hf82".into()),
            bearer: Some("eyJhbGciOiJIUzI1NiJ9.abc.def".into()),
        };
        let checks = validate_config(&config_with(creds, HashMap::new()));
        let cred: Vec<_> = checks.iter().filter(|c| c.check == "credentials").collect();
        assert_eq!(cred.len(), 1);
        assert_eq!(cred[0].status, ValidationStatus::Ok);
        assert_eq!(cred[0].message, "credentials: 2 value(s) configured");
    }

    #[test]
    fn validate_bad_base_url() {
        let cfg = Config {
            base_url: Some("localhost:8080".into()),
            ..config_with(Credentials::default(), HashMap::new())
        };
        let checks = validate_config(&cfg);
        let url_check = checks.iter().find(|c| c.check == "base_url").unwrap();
        assert_eq!(url_check.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_oversized_timeout() {
        let config = Config {
            timeout_secs: Some(1e20),
            ..config_with(Credentials::default(), HashMap::new())
        };
        let checks = validate_config(&config);
        let timeout = checks.iter().find(|c| c.check == "timeout").unwrap();
        assert_eq!(timeout.status, ValidationStatus::Error);
        assert!(timeout.message.contains("timeout_secs"));
    }

    #[test]
    fn validate_contract_not_found() {
        let checks = validate_config(&config_with(Credentials::default(), HashMap::new()));
        let check = checks.iter().find(|c| c.check == "contract").unwrap();
        assert_eq!(check.status, ValidationStatus::Error);
    }

    #[test]
    fn plan_counts_variants() {
        let mut schemes = HashMap::new();
        schemes.insert(
            "key".to_string(),
            SecurityScheme::ApiKey {
                name: "X-API-Key".into(),
                location: KeyLocation::Header,
            },
        );
        let contract = ContractModel {
            servers: vec!["http://localhost:8000".into()],
            operations: vec![Operation {
                path: "/orders".into(),
                method: HttpMethod::Post,
                summary: None,
                description: None,
                parameters: vec![Parameter {
                    name: "page".into(),
                    location: ParamLocation::Query,
                    required: true,
                }],
                request_body: None,
                responses: vec!["201".into()],
                security: SecurityRequirement::Scheme("key".into()),
            }],
            security_schemes: schemes,
            ..ContractModel::default()
        };

        let plan = DryRunPlan::from_cases(&derive_cases(&contract), vec![]);
        assert_eq!(plan.endpoints, 1);
        assert_eq!(
            plan.variants,
            VariantCounts {
                nominal: 1,
                missing_required_params: 1,
                invalid_auth: 1,
            }
        );
        assert_eq!(plan.cases[2].auth.as_deref(), Some("api_key"));

        let text = plan.to_terminal();
        assert!(text.contains("1 endpoints, 3 cases planned"));
        assert!(text.contains("0000-nominal POST /orders (nominal) expects 201 [auth: api_key]"));
        assert!(text.contains("expects 401"));
    }

    #[test]
    fn plan_has_errors() {
        let plan = DryRunPlan::from_cases(
            &[],
            vec![Validation {
                check: "contract".into(),
                status: ValidationStatus::Error,
                message: "not found".into(),
            }],
        );
        assert!(plan.has_errors());
        assert!(!plan.has_warnings());
    }
}
