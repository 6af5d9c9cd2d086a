//! JSON Schema of the persisted report format
//!
//! `report.json` written by `apicheck run` is a serialized [`Report`]; this
//! schema lets downstream tooling validate it.

use crate::report::Report;

/// Generate JSON Schema for the report format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Report);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
