//! Contract → test case derivation
//!
//! Every supported operation yields one nominal case, immediately followed by
//! its negative variants:
//!
//! 1. nominal: declared parameters keyed but unset, expects the first
//!    declared response code (`200` when none is declared)
//! 2. missing-required-params: only when a parameter is required; query
//!    cleared, expects `400`
//! 3. invalid-auth: only when the operation resolves to a supported
//!    security scheme; sentinel credential, expects `401`
//!
//! Output order follows the contract's declaration order.

use std::collections::BTreeMap;

use crate::case::{
    AuthRequirement, ExpectedStatus, INVALID_AUTH_SENTINEL, OperationKey, RequestSpec, TestCase,
    VariantKind,
};
use crate::contract::{ContractModel, Operation, ParamLocation, SecurityScheme};

/// Walks a [`ContractModel`] and produces the ordered case sequence.
pub struct CaseDeriver<'a> {
    contract: &'a ContractModel,
    base_url: Option<String>,
}

impl<'a> CaseDeriver<'a> {
    #[must_use]
    pub fn new(contract: &'a ContractModel) -> Self {
        Self {
            contract,
            base_url: None,
        }
    }

    /// Use `base_url` instead of the contract's first server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.contract.base_url())
            .trim_end_matches('/')
    }

    /// Derive all cases. Never fails: unsupported inputs are skipped.
    #[must_use]
    pub fn derive(&self) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for op in &self.contract.operations {
            let nominal = self.nominal_case(op, cases.len());

            let missing = (!nominal.required_params.is_empty())
                .then(|| missing_params_variant(&nominal, cases.len() + 1));
            let invalid_auth = nominal.request.auth.is_some().then(|| {
                let ordinal = cases.len() + 1 + usize::from(missing.is_some());
                invalid_auth_variant(&nominal, ordinal)
            });

            cases.push(nominal);
            cases.extend(missing);
            cases.extend(invalid_auth);
        }

        tracing::debug!(
            operations = self.contract.operations.len(),
            cases = cases.len(),
            "derived test cases"
        );
        cases
    }

    fn nominal_case(&self, op: &Operation, ordinal: usize) -> TestCase {
        let headers: BTreeMap<String, Option<String>> = op
            .parameters_in(ParamLocation::Header)
            .map(|p| (p.name.clone(), None))
            .collect();
        let query_params: BTreeMap<String, Option<String>> = op
            .parameters_in(ParamLocation::Query)
            .map(|p| (p.name.clone(), None))
            .collect();

        let mut request = RequestSpec {
            url: format!("{}{}", self.base_url(), op.path),
            method: op.method,
            headers,
            query_params,
            body: None,
            auth: self.auth_requirement(op),
            auth_value: None,
        };

        if let Some(body) = &op.request_body {
            request
                .headers
                .insert("Content-Type".to_string(), Some(body.content_type.clone()));
            request.body = Some(serde_json::Value::Object(serde_json::Map::new()));
        }

        let expected_status = op
            .responses
            .first()
            .and_then(|code| ExpectedStatus::from_codes([code.as_str()]))
            .unwrap_or_else(|| ExpectedStatus::single("200"));

        TestCase {
            id: case_id(ordinal, VariantKind::Nominal),
            name: op.summary.clone().unwrap_or_else(|| op.label()),
            description: op.description.clone(),
            operation: OperationKey {
                method: op.method,
                path: op.path.clone(),
            },
            request,
            expected_status,
            variant: VariantKind::Nominal,
            required_params: op
                .parameters
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.clone())
                .collect(),
            expected_response: None,
        }
    }

    fn auth_requirement(&self, op: &Operation) -> Option<AuthRequirement> {
        match self.contract.resolve_security(op)? {
            SecurityScheme::ApiKey { name, location } => Some(AuthRequirement::ApiKey {
                name: name.clone(),
                location: *location,
            }),
            SecurityScheme::Bearer => Some(AuthRequirement::Bearer),
            SecurityScheme::Unsupported { kind } => {
                tracing::debug!(
                    operation = %op.label(),
                    kind = %kind,
                    "security scheme not injectable"
                );
                None
            }
        }
    }
}

/// Derive with the contract's own base URL.
#[must_use]
pub fn derive_cases(contract: &ContractModel) -> Vec<TestCase> {
    CaseDeriver::new(contract).derive()
}

fn case_id(ordinal: usize, variant: VariantKind) -> String {
    format!("{ordinal:04}-{variant}")
}

fn variant_of(nominal: &TestCase, ordinal: usize, variant: VariantKind) -> TestCase {
    let mut case = nominal.clone();
    case.id = case_id(ordinal, variant);
    case.name = format!("{}{}", nominal.name, variant.name_suffix());
    case.variant = variant;
    case
}

fn missing_params_variant(nominal: &TestCase, ordinal: usize) -> TestCase {
    let mut case = variant_of(nominal, ordinal, VariantKind::MissingRequiredParams);
    case.request.query_params.clear();
    case.expected_status = ExpectedStatus::single("400");
    case
}

fn invalid_auth_variant(nominal: &TestCase, ordinal: usize) -> TestCase {
    let mut case = variant_of(nominal, ordinal, VariantKind::InvalidAuth);
    case.request.auth_value = Some(INVALID_AUTH_SENTINEL.to_string());
    case.expected_status = ExpectedStatus::single("401");
    case
}
