//! Test case + credentials → concrete request

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::case::{AuthRequirement, TestCase};
use crate::contract::{HttpMethod, KeyLocation};

/// Externally supplied credentials. Absent values inject as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn bearer(&self) -> &str {
        self.bearer.as_deref().unwrap_or("")
    }
}

/// Fully resolved request, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl PreparedRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Resolve a test case against credentials.
///
/// Unset header and query values are omitted, never defaulted. An explicit
/// `auth_value` on the case wins over the supplied credentials.
#[must_use]
pub fn build_request(case: &TestCase, credentials: &Credentials) -> PreparedRequest {
    let spec = &case.request;

    let mut headers: Vec<(String, String)> = spec
        .headers
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect();
    let mut query: Vec<(String, String)> = spec
        .query_params
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect();

    match &spec.auth {
        Some(AuthRequirement::ApiKey { name, location }) => {
            let value = spec
                .auth_value
                .clone()
                .unwrap_or_else(|| credentials.api_key().to_string());
            let target = match location {
                KeyLocation::Header => &mut headers,
                KeyLocation::Query => &mut query,
            };
            upsert(target, name, value);
        }
        Some(AuthRequirement::Bearer) => {
            let token = spec.auth_value.as_deref().unwrap_or(credentials.bearer());
            upsert(&mut headers, "Authorization", format!("Bearer {token}"));
        }
        None => {}
    }

    let body = if spec.method.carries_body() {
        spec.body.clone()
    } else {
        None
    };

    PreparedRequest {
        method: spec.method,
        url: spec.url.clone(),
        headers,
        query,
        body,
    }
}

fn upsert(pairs: &mut Vec<(String, String)>, name: &str, value: String) {
    match pairs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value,
        None => pairs.push((name.to_string(), value)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::case::{
        ExpectedStatus, INVALID_AUTH_SENTINEL, OperationKey, RequestSpec, VariantKind,
    };

    fn case(method: HttpMethod, auth: Option<AuthRequirement>) -> TestCase {
        TestCase {
            id: "0000-nominal".into(),
            name: "case".into(),
            description: None,
            operation: OperationKey {
                method,
                path: "/items".into(),
            },
            request: RequestSpec {
                url: "http://api.test/items".into(),
                method,
                headers: BTreeMap::from([("X-Trace".to_string(), None)]),
                query_params: BTreeMap::from([
                    ("page".to_string(), None),
                    ("size".to_string(), Some("10".to_string())),
                ]),
                body: Some(serde_json::json!({})),
                auth,
                auth_value: None,
            },
            expected_status: ExpectedStatus::single("200"),
            variant: VariantKind::Nominal,
            required_params: vec![],
            expected_response: None,
        }
    }

    fn creds() -> Credentials {
        Credentials {
            api_key: Some("secret-key".into()),
            bearer: Some("tok".into()),
        }
    }

    #[test]
    fn unset_values_are_omitted() {
        let req = build_request(&case(HttpMethod::Get, None), &creds());
        assert!(req.header("X-Trace").is_none());
        assert!(req.query_value("page").is_none());
        assert_eq!(req.query_value("size"), Some("10"));
    }

    #[test]
    fn api_key_header_injected() {
        let auth = AuthRequirement::ApiKey {
            name: "X-API-Key".into(),
            location: KeyLocation::Header,
        };
        let req = build_request(&case(HttpMethod::Get, Some(auth)), &creds());
        assert_eq!(req.header("x-api-key"), Some("secret-key"));
    }

    #[test]
    fn api_key_query_injected_empty_when_missing() {
        let auth = AuthRequirement::ApiKey {
            name: "api_key".into(),
            location: KeyLocation::Query,
        };
        let req = build_request(
            &case(HttpMethod::Get, Some(auth)),
            &Credentials::default(),
        );
        assert_eq!(req.query_value("api_key"), Some(""));
    }

    #[test]
    fn bearer_uses_credential() {
        let req = build_request(
            &case(HttpMethod::Get, Some(AuthRequirement::Bearer)),
            &creds(),
        );
        assert_eq!(req.header("Authorization"), Some("Bearer tok"));
    }

    #[test]
    fn sentinel_overrides_credentials() {
        let mut c = case(HttpMethod::Get, Some(AuthRequirement::Bearer));
        c.request.auth_value = Some(INVALID_AUTH_SENTINEL.into());
        let req = build_request(&c, &creds());
        assert_eq!(req.header("Authorization"), Some("Bearer invalid_auth_value"));
    }

    #[test]
    fn body_only_for_body_methods() {
        let get = build_request(&case(HttpMethod::Get, None), &creds());
        assert!(get.body.is_none());
        let delete = build_request(&case(HttpMethod::Delete, None), &creds());
        assert!(delete.body.is_none());
        let post = build_request(&case(HttpMethod::Post, None), &creds());
        assert_eq!(post.body, Some(serde_json::json!({})));
    }

    #[test]
    fn credentials_accept_camel_case_key() {
        let c: Credentials = serde_json::from_str(r#"{"apiKey": "k", "bearer": "b"}"#).unwrap();
        assert_eq!(c.api_key(), "k");
        assert_eq!(c.bearer(), "b");
        assert_eq!(Credentials::default().bearer(), "");
    }
}
