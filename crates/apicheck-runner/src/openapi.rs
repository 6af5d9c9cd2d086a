//! OpenAPI parsing: JSON/YAML document → [`ContractModel`]

use std::collections::HashMap;
use std::path::Path;

use apicheck_core::{
    ContractError, ContractModel, HttpMethod, KeyLocation, Operation, ParamLocation, Parameter,
    RequestBody, SecurityRequirement, SecurityScheme,
};
use serde_json::Value;

/// Parse a contract document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing (leading `{` → JSON, otherwise YAML).
///
/// # Errors
///
/// Returns [`ContractError::Parse`] when the content is not valid JSON/YAML.
pub fn parse_document(path: &Path, content: &str) -> Result<Value, ContractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let as_json = match ext.as_str() {
        "json" => true,
        "yaml" | "yml" => false,
        _ => content.trim_start().starts_with('{'),
    };

    if as_json {
        serde_json::from_str(content).map_err(|e| ContractError::Parse(format!("Invalid JSON: {e}")))
    } else {
        serde_yml::from_str(content).map_err(|e| ContractError::Parse(format!("Invalid YAML: {e}")))
    }
}

/// Read and parse an OpenAPI document into a contract.
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or has no `paths` mapping.
pub fn load_contract(path: &Path) -> Result<ContractModel, ContractError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ContractError::Io(path.to_path_buf(), e.to_string()))?;
    let doc = parse_document(path, &content)?;
    contract_from_value(&doc)
}

/// Build a [`ContractModel`] from an already parsed OpenAPI document.
///
/// Operations come out in document order: paths as declared, then methods in
/// the order they appear inside each path item. Methods other than
/// GET/POST/PUT/DELETE/PATCH are skipped.
///
/// # Errors
///
/// Returns error if `paths` is missing or is not a mapping.
pub fn contract_from_value(doc: &Value) -> Result<ContractModel, ContractError> {
    let paths = doc.get("paths").ok_or(ContractError::MissingKey("paths"))?;
    let paths = paths.as_object().ok_or_else(|| ContractError::Invalid {
        key: "paths".into(),
        reason: format!("expected a mapping, found {}", type_name(paths)),
    })?;

    let servers = doc
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(|s| s.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let security_schemes: HashMap<String, SecurityScheme> = doc
        .pointer("/components/securitySchemes")
        .and_then(Value::as_object)
        .map(|schemes| {
            schemes
                .iter()
                .map(|(name, s)| (name.clone(), parse_scheme(s)))
                .collect()
        })
        .unwrap_or_default();

    let default_security = doc.get("security").and_then(first_requirement);

    let mut operations = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            tracing::warn!(path = %path, "path item is not a mapping; skipped");
            continue;
        };
        let shared = item
            .get("parameters")
            .map(|params| parse_parameters(params, doc))
            .unwrap_or_default();

        for (key, operation) in item {
            let Some(method) = HttpMethod::parse(key) else {
                if !matches!(key.as_str(), "parameters" | "summary" | "description" | "servers")
                    && !key.starts_with("x-")
                {
                    tracing::debug!(path = %path, method = %key, "unsupported method skipped");
                }
                continue;
            };
            operations.push(parse_operation(path, method, operation, &shared, doc));
        }
    }

    tracing::debug!(
        operations = operations.len(),
        schemes = security_schemes.len(),
        "contract parsed"
    );

    Ok(ContractModel {
        title: doc.pointer("/info/title").map(scalar_string),
        version: doc.pointer("/info/version").map(scalar_string),
        servers,
        operations,
        security_schemes,
        default_security,
    })
}

fn parse_operation(
    path: &str,
    method: HttpMethod,
    op: &Value,
    shared: &[Parameter],
    doc: &Value,
) -> Operation {
    let mut parameters = shared.to_vec();
    let own = op
        .get("parameters")
        .map(|params| parse_parameters(params, doc))
        .unwrap_or_default();
    for param in own {
        match parameters
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            Some(existing) => *existing = param,
            None => parameters.push(param),
        }
    }

    let request_body = op
        .get("requestBody")
        .and_then(|body| resolve_ref(body, doc))
        .and_then(|body| body.get("content"))
        .and_then(Value::as_object)
        .and_then(|content| content.iter().next())
        .map(|(content_type, media)| RequestBody {
            content_type: content_type.clone(),
            schema: media.get("schema").cloned().unwrap_or(Value::Null),
        });

    let responses = op
        .get("responses")
        .and_then(Value::as_object)
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default();

    let security = match op.get("security") {
        None => SecurityRequirement::Inherit,
        Some(requirements) => first_requirement(requirements)
            .map_or(SecurityRequirement::Disabled, SecurityRequirement::Scheme),
    };

    Operation {
        path: path.to_string(),
        method,
        summary: op.get("summary").and_then(Value::as_str).map(str::to_string),
        description: op
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        parameters,
        request_body,
        responses,
        security,
    }
}

fn parse_parameters(params: &Value, doc: &Value) -> Vec<Parameter> {
    params
        .as_array()
        .map(|params| {
            params
                .iter()
                .filter_map(|p| resolve_ref(p, doc))
                .filter_map(parse_parameter)
                .collect()
        })
        .unwrap_or_default()
}

const MAX_REF_DEPTH: usize = 20;

/// Follow local `#/components/...` references to the value they name.
/// Dangling, external or cyclic references resolve to `None`.
fn resolve_ref<'a>(value: &'a Value, doc: &'a Value) -> Option<&'a Value> {
    let mut current = value;
    for _ in 0..MAX_REF_DEPTH {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return Some(current);
        };
        let target = reference
            .strip_prefix('#')
            .filter(|pointer| pointer.starts_with("/components/"))
            .and_then(|pointer| doc.pointer(pointer));
        match target {
            Some(target) => current = target,
            None => {
                tracing::debug!(%reference, "unresolvable reference skipped");
                return None;
            }
        }
    }
    tracing::debug!("reference chain too deep; skipped");
    None
}

fn parse_parameter(param: &Value) -> Option<Parameter> {
    let name = param.get("name")?.as_str()?.to_string();
    let location = match param.get("in")?.as_str()? {
        "path" => ParamLocation::Path,
        "query" => ParamLocation::Query,
        "header" => ParamLocation::Header,
        // cookie parameters are not sent
        _ => return None,
    };
    let required = param
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(Parameter {
        name,
        location,
        required,
    })
}

fn parse_scheme(scheme: &Value) -> SecurityScheme {
    let kind = scheme.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "apiKey" => {
            let name = scheme.get("name").and_then(Value::as_str);
            let location = match scheme.get("in").and_then(Value::as_str) {
                Some("header") => Some(KeyLocation::Header),
                Some("query") => Some(KeyLocation::Query),
                _ => None,
            };
            match (name, location) {
                (Some(name), Some(location)) => SecurityScheme::ApiKey {
                    name: name.to_string(),
                    location,
                },
                _ => SecurityScheme::Unsupported {
                    kind: format!(
                        "apiKey in {}",
                        scheme.get("in").and_then(Value::as_str).unwrap_or("?")
                    ),
                },
            }
        }
        "http" => {
            let http = scheme.get("scheme").and_then(Value::as_str).unwrap_or("");
            if http.eq_ignore_ascii_case("bearer") {
                SecurityScheme::Bearer
            } else {
                SecurityScheme::Unsupported {
                    kind: format!("http {http}"),
                }
            }
        }
        other => SecurityScheme::Unsupported {
            kind: other.to_string(),
        },
    }
}

/// First key of the first requirement object. `[]`, `[{}]` and non-arrays
/// name no scheme.
fn first_requirement(requirements: &Value) -> Option<String> {
    requirements
        .as_array()?
        .first()?
        .as_object()?
        .keys()
        .next()
        .cloned()
}

fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
