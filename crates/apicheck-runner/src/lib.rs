//! apicheck-runner: contract loading and concurrent execution
//!
//! Turns contract files into test cases (OpenAPI documents through
//! derivation, simplified suites directly) and executes them against a live
//! API with a bounded worker pool.

pub mod engine;
pub mod loader;
pub mod openapi;
pub mod suite;

pub use engine::{EngineError, ExecutionEngine};
pub use loader::{ContractSource, load_source};
pub use openapi::{contract_from_value, load_contract, parse_document};
pub use suite::{Suite, suite_from_value};
