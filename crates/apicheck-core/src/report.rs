//! Result aggregation into a hierarchical report
//!
//! Results are grouped by the `"METHOD path"` of the source operation, so
//! negative variants land in the same group as their nominal case.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::result::{ExecutionResult, Outcome};

// ── Data types ──

/// Run-wide statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub total: u64,
    pub passed: u64,
    /// Non-passing results, errored ones included
    pub failed: u64,
    /// Subset of `failed` that never got a response
    pub errored: u64,
    pub total_duration_seconds: f64,
    /// `passed / total * 100`, two decimals, 0 when empty
    pub success_rate_percent: f64,
}

/// Results of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EndpointGroup {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub results: Vec<ExecutionResult>,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub summary: Summary,
    /// `"METHOD path"` → group
    pub by_endpoint: BTreeMap<String, EndpointGroup>,
    /// All results in derivation order
    pub results: Vec<ExecutionResult>,
}

// ── Computation ──

/// Build a report from results already in derivation order.
#[must_use]
pub fn aggregate(results: Vec<ExecutionResult>) -> Report {
    let mut by_endpoint: BTreeMap<String, EndpointGroup> = BTreeMap::new();
    for result in &results {
        let group = by_endpoint
            .entry(result.case.endpoint())
            .or_insert_with(|| EndpointGroup {
                total: 0,
                passed: 0,
                failed: 0,
                results: Vec::new(),
            });
        group.total += 1;
        if result.passed() {
            group.passed += 1;
        } else {
            group.failed += 1;
        }
        group.results.push(result.clone());
    }

    let total = results.len() as u64;
    let passed = results.iter().filter(|r| r.passed()).count() as u64;
    let errored = results
        .iter()
        .filter(|r| r.outcome == Outcome::Errored)
        .count() as u64;
    let total_duration_seconds = results.iter().map(|r| r.duration_seconds).sum();

    let summary = Summary {
        total,
        passed,
        failed: total - passed,
        errored,
        total_duration_seconds,
        success_rate_percent: success_rate(passed, total),
    };

    tracing::debug!(
        total,
        passed,
        endpoints = by_endpoint.len(),
        "aggregated report"
    );

    Report {
        summary,
        by_endpoint,
        results,
    }
}

/// Percentage rounded to two decimals; 0 for an empty run.
#[must_use]
pub fn success_rate(passed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = passed as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

// ── Display helpers ──

impl Report {
    /// Non-passing results in derivation order.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();
        let s = &self.summary;

        let verdict = if self.all_passed() { "PASS" } else { "FAIL" };
        lines.push(format!(
            "{verdict}: {}/{} passed ({}%), {} failed ({} errored) in {:.2}s",
            s.passed,
            s.total,
            format_pct(s.success_rate_percent),
            s.failed,
            s.errored,
            s.total_duration_seconds,
        ));

        if !self.by_endpoint.is_empty() {
            lines.push(String::new());
            lines.push("Results by endpoint:".into());
        }
        for (endpoint, group) in &self.by_endpoint {
            lines.push(format!(
                "  {endpoint}: {}/{} passed",
                group.passed, group.total
            ));
            for r in &group.results {
                let status = r
                    .http_status
                    .map_or_else(|| "---".to_string(), |s| s.to_string());
                lines.push(format!(
                    "    [{}] {} ({}) -> {status} in {:.3}s",
                    r.outcome, r.case.name, r.case.variant, r.duration_seconds
                ));
                if let Some(reason) = r.failure_reason() {
                    lines.push(format!("           {reason}"));
                }
            }
        }

        lines.join("\n")
    }
}

fn format_pct(pct: f64) -> String {
    if pct == 0.0 || pct == 100.0 {
        format!("{pct:.0}")
    } else {
        format!("{pct:.2}")
    }
}
