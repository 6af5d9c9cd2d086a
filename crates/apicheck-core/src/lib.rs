//! apicheck-core: contract model, case derivation and report aggregation
//!
//! This crate holds the pure parts of contract testing: the normalized
//! contract model, derivation of nominal and negative test cases, request
//! resolution against credentials, and aggregation of execution results into
//! a report. It performs no network I/O.

pub mod case;
pub mod config;
pub mod contract;
pub mod derivation;
pub mod dryrun;
pub mod generator;
pub mod report;
pub mod request;
pub mod result;
pub mod schema;

pub use case::{
    AuthRequirement, ExpectedStatus, INVALID_AUTH_SENTINEL, OperationKey, RequestSpec, TestCase,
    VariantKind,
};
pub use config::{Config, ConfigError};
pub use contract::{
    ContractError, ContractModel, HttpMethod, KeyLocation, Operation, ParamLocation, Parameter,
    RequestBody, SecurityRequirement, SecurityScheme,
};
pub use derivation::{CaseDeriver, derive_cases};
pub use dryrun::DryRunPlan;
pub use generator::to_http_file;
pub use report::{EndpointGroup, Report, Summary, aggregate};
pub use request::{Credentials, PreparedRequest, build_request};
pub use result::{ANY_VALUE, ExecutionResult, MAX_BODY_CHARS, Outcome};
