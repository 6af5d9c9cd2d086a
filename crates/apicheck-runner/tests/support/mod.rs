//! Local HTTP stub for engine tests.
//!
//! The engine uses a blocking client, so the stub runs on its own thread with
//! its own tokio runtime and the tests themselves stay synchronous.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

pub const API_KEY: &str = "secret";
pub const TOKEN: &str = "good-token";

pub struct StubServer {
    base_url: String,
    in_flight: Arc<InFlight>,
}

impl StubServer {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Highest number of `/gauge` requests handled at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Start the stub on an ephemeral port. The listener is bound before this
/// returns, so requests sent immediately afterwards queue until accepted.
pub fn spawn_stub() -> StubServer {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    listener
        .set_nonblocking(true)
        .expect("non-blocking stub listener");
    let base_url = format!("http://{}", listener.local_addr().expect("stub address"));
    let in_flight = Arc::new(InFlight::default());
    let app = router(Arc::clone(&in_flight));

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("stub runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("adopt listener");
            let _ = axum::serve(listener, app).await;
        });
    });

    StubServer {
        base_url,
        in_flight,
    }
}

/// URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind spare listener");
    let addr = listener.local_addr().expect("spare address");
    drop(listener);
    format!("http://{addr}")
}

fn router(in_flight: Arc<InFlight>) -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/secure", get(secure))
        .route("/slow/{ms}", get(slow))
        .route("/big", get(big))
        .route("/echo", get(echo))
        .route("/users/{id}", get(show_user).put(update_user))
        .route("/gauge", get(gauge))
        .with_state(in_flight)
}

async fn list_items() -> &'static str {
    "[]"
}

/// 401 without the right key, then 400 without `page`, else 201.
async fn create_item(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> StatusCode {
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if key != Some(API_KEY) {
        return StatusCode::UNAUTHORIZED;
    }
    if !query.contains_key("page") {
        return StatusCode::BAD_REQUEST;
    }
    StatusCode::CREATED
}

async fn secure(headers: HeaderMap) -> StatusCode {
    let expected = format!("Bearer {TOKEN}");
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth == Some(expected.as_str()) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn slow(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    ms.to_string()
}

async fn big() -> String {
    "é".repeat(1500)
}

/// `"<x-source header>|<q query>"`
async fn echo(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> String {
    let source = headers
        .get("x-source")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let q = query.get("q").map_or("", String::as_str);
    format!("{source}|{q}")
}

async fn show_user(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({"id": id, "name": format!("user-{id}"), "token": format!("t-{id}")}))
}

/// Echoes the path id and the received body.
async fn update_user(Path(id): Path<u64>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"id": id, "body": body}))
}

/// Holds each request for 100ms while tracking how many overlap.
async fn gauge(State(in_flight): State<Arc<InFlight>>) -> String {
    let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
    in_flight.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    in_flight.current.fetch_sub(1, Ordering::SeqCst);
    now.to_string()
}
