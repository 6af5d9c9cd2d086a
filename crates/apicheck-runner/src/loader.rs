//! Contract source detection: OpenAPI document or simplified suite

use std::path::Path;

use apicheck_core::{CaseDeriver, ContractError, ContractModel, TestCase};

use crate::openapi::{contract_from_value, parse_document};
use crate::suite::{Suite, suite_from_value};

/// A loaded contract file.
#[derive(Debug, Clone)]
pub enum ContractSource {
    /// OpenAPI document; cases are derived
    Contract(ContractModel),
    /// Simplified suite; cases are listed
    Suite(Suite),
}

/// Read a contract file and decide what it is.
///
/// A document with an `apis` or `cases` key and no `paths` key is a suite;
/// anything else is treated as OpenAPI.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid contract.
pub fn load_source(path: &Path) -> Result<ContractSource, ContractError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ContractError::Io(path.to_path_buf(), e.to_string()))?;
    let doc = parse_document(path, &content)?;

    let is_suite = doc.get("apis").is_some() || doc.get("cases").is_some();
    let source = if is_suite && doc.get("paths").is_none() {
        ContractSource::Suite(suite_from_value(doc)?)
    } else {
        ContractSource::Contract(contract_from_value(&doc)?)
    };
    tracing::info!(path = %path.display(), kind = source.kind(), "contract loaded");
    Ok(source)
}

impl ContractSource {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Contract(_) => "openapi",
            Self::Suite(_) => "suite",
        }
    }

    /// Base URL declared by the source itself.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Self::Contract(contract) => contract.base_url(),
            Self::Suite(suite) => &suite.base_url,
        }
    }

    /// Ordered test cases, optionally against another base URL.
    #[must_use]
    pub fn cases(&self, base_url: Option<&str>) -> Vec<TestCase> {
        match self {
            Self::Contract(contract) => CaseDeriver::new(contract)
                .with_base_url(base_url.map(str::to_string))
                .derive(),
            Self::Suite(suite) => suite.to_cases(base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use apicheck_core::VariantKind;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn openapi_yaml_is_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "openapi.yaml",
            "servers:\n  - url: http://localhost:9000\npaths:\n  /items:\n    get:\n      responses:\n        '200': {}\n",
        );
        let source = load_source(&path).unwrap();
        assert_eq!(source.kind(), "openapi");
        assert_eq!(source.base_url(), "http://localhost:9000");

        let cases = source.cases(None);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].request.url, "http://localhost:9000/items");
        assert_eq!(cases[0].variant, VariantKind::Nominal);
    }

    #[test]
    fn apis_document_is_suite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "suite.yml",
            "apis:\n  - endpoint: /health\n    test_cases:\n      - name: up\n",
        );
        let source = load_source(&path).unwrap();
        assert_eq!(source.kind(), "suite");
        assert_eq!(source.base_url(), "http://localhost:8000");

        let cases = source.cases(Some("http://127.0.0.1:1"));
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].request.url, "http://127.0.0.1:1/health");
    }

    #[test]
    fn tabular_document_is_suite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "cases.yaml",
            "cases:\n  - endpoint: /users/{id}\n    method: DELETE\n    test_case: remove\n    request_body: '{\"id\": 4}'\n    expected_status: 204\n",
        );
        let source = load_source(&path).unwrap();
        assert_eq!(source.kind(), "suite");

        let cases = source.cases(None);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].request.url, "http://localhost:8000/users/4");
        assert_eq!(cases[0].name, "remove");
    }

    #[test]
    fn base_url_override_applies_to_contracts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "openapi.json",
            r#"{"servers": [{"url": "http://a"}], "paths": {"/x": {"get": {}}}}"#,
        );
        let cases = load_source(&path).unwrap().cases(Some("http://b/"));
        assert_eq!(cases[0].request.url, "http://b/x");
    }

    #[test]
    fn neither_paths_nor_apis_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.json", r#"{"openapi": "3.0.0"}"#);
        let err = load_source(&path).unwrap_err();
        assert!(matches!(err, ContractError::MissingKey("paths")));
    }
}
