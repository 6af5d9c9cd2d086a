//! Concurrent execution of test cases
//!
//! A fixed pool of worker threads pulls case indices from a shared counter,
//! sends each request with a blocking `reqwest` client and reports
//! `(index, result)` pairs over a channel. Results are put back in derivation
//! order before returning, whatever order the responses arrived in.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use apicheck_core::config::DEFAULT_CONCURRENCY;
use apicheck_core::{
    Config, ConfigError, Credentials, ExecutionResult, HttpMethod, TestCase, build_request,
};
use time::OffsetDateTime;

/// Bounded-parallel HTTP dispatcher.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    concurrency: usize,
    timeout: Option<Duration>,
    default_headers: HashMap<String, String>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    /// Engine with the default pool size, no timeout and no extra headers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
            default_headers: HashMap::new(),
        }
    }

    /// Engine configured from a project config.
    ///
    /// # Errors
    ///
    /// Returns error if the configured timeout is not a usable duration.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Ok(Self {
            concurrency: config.concurrency,
            timeout: config.timeout()?,
            default_headers: config.headers.clone(),
        })
    }

    /// Maximum requests in flight. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Headers sent with every request.
    #[must_use]
    pub fn with_default_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    fn build_client(&self) -> Result<reqwest::blocking::Client, EngineError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &self.default_headers {
            let parsed = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "invalid default header skipped"),
            }
        }

        reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::Client(e.to_string()))
    }

    /// Execute every case and return one result per case, in input order.
    ///
    /// Individual failures never abort the run: transport errors, unreadable
    /// bodies and worker panics become `Errored` results.
    ///
    /// # Errors
    ///
    /// Returns error only if the HTTP client cannot be built.
    pub fn execute(
        &self,
        cases: Vec<TestCase>,
        credentials: &Credentials,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        if cases.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.build_client()?;
        let cases: Vec<Arc<TestCase>> = cases.into_iter().map(Arc::new).collect();
        let workers = worker_count(self.concurrency, cases.len());
        tracing::info!(
            cases = cases.len(),
            workers,
            timeout_secs = self.timeout.map(|t| t.as_secs_f64()),
            "executing test cases"
        );

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, ExecutionResult)>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (next, cases, client) = (&next, &cases, &client);
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(case) = cases.get(index) else {
                            break;
                        };
                        let result = run_guarded(client, index, case, credentials);
                        if tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<ExecutionResult>> = (0..cases.len()).map(|_| None).collect();
        for (index, result) in rx {
            slots[index] = Some(result);
        }

        let results: Vec<ExecutionResult> = slots
            .into_iter()
            .zip(cases)
            .enumerate()
            .map(|(index, (slot, case))| {
                slot.unwrap_or_else(|| {
                    ExecutionResult::errored(
                        index,
                        case,
                        None,
                        "worker terminated before reporting a result",
                        OffsetDateTime::now_utc(),
                        0.0,
                    )
                })
            })
            .collect();

        tracing::info!(
            passed = results.iter().filter(|r| r.passed()).count(),
            total = results.len(),
            "execution finished"
        );
        Ok(results)
    }
}

/// Pool size: the configured concurrency, at least one, at most one per case.
fn worker_count(concurrency: usize, cases: usize) -> usize {
    concurrency.clamp(1, cases.max(1))
}

fn run_guarded(
    client: &reqwest::blocking::Client,
    index: usize,
    case: &Arc<TestCase>,
    credentials: &Credentials,
) -> ExecutionResult {
    let started_at = OffsetDateTime::now_utc();
    let start = Instant::now();
    panic::catch_unwind(AssertUnwindSafe(|| {
        execute_one(client, index, case, credentials)
    }))
    .unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!(case = %case.id, %message, "worker panicked");
        ExecutionResult::errored(
            index,
            Arc::clone(case),
            None,
            format!("worker panicked: {message}"),
            started_at,
            start.elapsed().as_secs_f64(),
        )
    })
}

fn execute_one(
    client: &reqwest::blocking::Client,
    index: usize,
    case: &Arc<TestCase>,
    credentials: &Credentials,
) -> ExecutionResult {
    let request = build_request(case, credentials);

    let mut req = client.request(to_reqwest_method(request.method), &request.url);
    for (name, value) in &request.headers {
        req = req.header(name, value);
    }
    if !request.query.is_empty() {
        req = req.query(&request.query);
    }
    if let Some(body) = &request.body {
        req = req.json(body);
    }

    let started_at = OffsetDateTime::now_utc();
    let start = Instant::now();
    let response = match req.send() {
        Ok(response) => response,
        Err(e) => {
            let message = error_chain(&e);
            tracing::debug!(case = %case.id, error = %message, "request failed");
            return ExecutionResult::errored(
                index,
                Arc::clone(case),
                Some(request),
                message,
                started_at,
                start.elapsed().as_secs_f64(),
            );
        }
    };

    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());

    let body = match response.text() {
        Ok(body) => body,
        Err(e) => {
            let message = format!("failed to read response body: {}", error_chain(&e));
            tracing::debug!(case = %case.id, status, error = %message, "body read failed");
            return ExecutionResult::errored(
                index,
                Arc::clone(case),
                Some(request),
                message,
                started_at,
                start.elapsed().as_secs_f64(),
            );
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    let result = ExecutionResult::judged(
        index,
        Arc::clone(case),
        request,
        status,
        headers,
        &body,
        started_at,
        elapsed,
    );
    tracing::debug!(
        case = %case.id,
        status,
        outcome = %result.outcome,
        elapsed,
        "case executed"
    );
    result
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

/// Lowercased header names; repeated headers are joined with `", "`.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// Error message with its source chain, `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP client error: {0}")]
    Client(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_clamps() {
        assert_eq!(worker_count(5, 100), 5);
        assert_eq!(worker_count(5, 2), 2);
        assert_eq!(worker_count(0, 10), 1);
        assert_eq!(worker_count(0, 0), 1);
    }

    #[test]
    fn from_config_copies_settings() {
        let config = Config {
            concurrency: 8,
            timeout_secs: Some(1.5),
            headers: HashMap::from([("X-Source".to_string(), "ci".to_string())]),
            ..Config::default()
        };

        let engine = ExecutionEngine::from_config(&config).unwrap();
        assert_eq!(engine.concurrency, 8);
        assert_eq!(engine.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(engine.default_headers.get("X-Source").map(String::as_str), Some("ci"));
    }

    #[test]
    fn from_config_rejects_oversized_timeout() {
        let config = Config {
            timeout_secs: Some(1e20),
            ..Config::default()
        };
        let err = ExecutionEngine::from_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn new_has_no_timeout() {
        let engine = ExecutionEngine::new();
        assert_eq!(engine.concurrency, DEFAULT_CONCURRENCY);
        assert!(engine.timeout.is_none());
    }

    #[test]
    fn empty_run_returns_no_results() {
        let results = ExecutionEngine::new()
            .execute(Vec::new(), &Credentials::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn invalid_default_header_is_skipped() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "v".to_string());
        let engine = ExecutionEngine::new().with_default_headers(headers);
        assert!(engine.build_client().is_ok());
    }

    #[test]
    fn methods_map_to_reqwest() {
        assert_eq!(to_reqwest_method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(HttpMethod::Patch), reqwest::Method::PATCH);
    }

    #[test]
    fn repeated_headers_joined() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.append("Set-Cookie", "a=1".parse().unwrap());
        headers.append("Set-Cookie", "b=2".parse().unwrap());
        headers.insert("Content-Type", "text/plain".parse().unwrap());

        let collected = collect_headers(&headers);
        assert_eq!(collected["set-cookie"], "a=1, b=2");
        assert_eq!(collected["content-type"], "text/plain");
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
