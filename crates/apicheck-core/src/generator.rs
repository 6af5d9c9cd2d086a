//! HTTP file generator - converts non-passing results to .http format

use crate::request::PreparedRequest;
use crate::result::ExecutionResult;

/// Generate .http file content for every non-passing result.
pub fn to_http_file(results: &[ExecutionResult], base_url_var: &str) -> String {
    let failing: Vec<&ExecutionResult> = results.iter().filter(|r| !r.passed()).collect();
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} failures)",
        failing.len()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for result in failing {
        let case = &result.case;
        let status = result
            .http_status
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        lines.push(format!(
            "### [{}] {} - {} ({})",
            case.id, result.outcome, case.name, case.variant
        ));
        lines.push(format!("# Expected: {}, got: {status}", case.expected_status));
        if let Some(err) = &result.error_message {
            lines.push(format!("# Error: {err}"));
        }

        let Some(request) = &result.request else {
            lines.push(format!(
                "# (request not built) {} {}",
                case.operation.method, case.request.url
            ));
            lines.push(String::new());
            lines.push("###".to_string());
            lines.push(String::new());
            continue;
        };

        // Request line
        let url = request_url(request);
        let url = if url.starts_with("http") {
            url
        } else {
            format!("{{{{{base_url_var}}}}}{url}")
        };
        lines.push(format!("{} {url}", request.method));

        // Headers
        for (key, value) in &request.headers {
            if !matches!(key.to_lowercase().as_str(), "host" | "content-length") {
                lines.push(format!("{key}: {value}"));
            }
        }

        // Body
        if let Some(body) = &request.body {
            if request.header("Content-Type").is_none() {
                lines.push("Content-Type: application/json".to_string());
            }
            lines.push(String::new());
            lines.push(body.to_string());
        }

        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// URL with the query string appended.
fn request_url(request: &PreparedRequest) -> String {
    if request.query.is_empty() {
        return request.url.clone();
    }
    let query: Vec<String> = request
        .query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    let sep = if request.url.contains('?') { '&' } else { '?' };
    format!("{}{sep}{}", request.url, query.join("&"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;
    use crate::case::{ExpectedStatus, OperationKey, RequestSpec, TestCase, VariantKind};
    use crate::contract::HttpMethod;

    fn sample_request() -> PreparedRequest {
        PreparedRequest {
            method: HttpMethod::Post,
            url: "http://localhost:8000/api/users".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer token".to_string())],
            query: vec![("page".to_string(), "1".to_string())],
            body: Some(serde_json::json!({"name": "test"})),
        }
    }

    fn sample_result(status: u16) -> ExecutionResult {
        let case = Arc::new(TestCase {
            id: "0002-invalid-auth".into(),
            name: "Create user - Invalid Authentication".into(),
            description: None,
            operation: OperationKey {
                method: HttpMethod::Post,
                path: "/api/users".into(),
            },
            request: RequestSpec {
                url: "http://localhost:8000/api/users".into(),
                method: HttpMethod::Post,
                headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body: None,
                auth: None,
                auth_value: None,
            },
            expected_status: ExpectedStatus::single("401"),
            variant: VariantKind::InvalidAuth,
            required_params: vec![],
            expected_response: None,
        });
        ExecutionResult::judged(
            2,
            case,
            sample_request(),
            status,
            BTreeMap::new(),
            "",
            OffsetDateTime::UNIX_EPOCH,
            0.02,
        )
    }

    #[test]
    fn generates_http_file_header() {
        let output = to_http_file(&[sample_result(200)], "base_url");
        assert!(output.contains("# Auto-generated reproduction cases (1 failures)"));
        assert!(output.contains("{{base_url}}"));
    }

    #[test]
    fn skips_passed_results() {
        let output = to_http_file(&[sample_result(401)], "base_url");
        assert!(output.contains("(0 failures)"));
        assert!(!output.contains("POST "));
    }

    #[test]
    fn generates_request_with_method_url_and_query() {
        let output = to_http_file(&[sample_result(200)], "base_url");
        assert!(output.contains("POST http://localhost:8000/api/users?page=1"));
        assert!(output.contains("# Expected: 401, got: 200"));
        assert!(output.contains("### [0002-invalid-auth] FAIL"));
    }

    #[test]
    fn includes_headers_and_body() {
        let output = to_http_file(&[sample_result(200)], "base_url");
        assert!(output.contains("Authorization: Bearer token"));
        assert!(output.contains("Content-Type: application/json"));
        assert!(output.contains(r#"{"name":"test"}"#));
    }

    #[test]
    fn relative_url_uses_variable() {
        let mut result = sample_result(500);
        if let Some(req) = result.request.as_mut() {
            req.url = "/api/users".into();
            req.query.clear();
        }
        let output = to_http_file(&[result], "host");
        assert!(output.contains("POST {{host}}/api/users"));
    }

    #[test]
    fn http_file_snapshot() {
        let output = to_http_file(&[sample_result(200)], "base_url");
        insta::assert_snapshot!(output.trim_end(), @r#"
        # Auto-generated reproduction cases (1 failures)
        # Base URL variable: {{base_url}}

        ### [0002-invalid-auth] FAIL - Create user - Invalid Authentication (invalid-auth)
        # Expected: 401, got: 200
        POST http://localhost:8000/api/users?page=1
        Authorization: Bearer token
        Content-Type: application/json

        {"name":"test"}

        ###
        "#);
    }
}
