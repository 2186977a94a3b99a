use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use stepline_core::model::trace::{ROOT_PARENT_ID, RawTrace, decode_search};
use tokio::task::JoinHandle;

pub const SEC: u64 = 1_000_000_000;
pub const STEP_PARENT_ID: &str = "b7ad6b7169203331";

pub fn tempo_span(name: &str, parent: &str, status: &str, start: u64, duration: u64) -> Value {
    json!({
        "name": name,
        "startTimeUnixNano": start.to_string(),
        "durationNanos": duration.to_string(),
        "attributes": [
            {"key": "span:parentID", "value": {"stringValue": parent}},
            {"key": "status", "value": {"stringValue": status}}
        ]
    })
}

pub fn tempo_trace(trace_id: &str, start: u64, duration_ms: u64, spans: Vec<Value>) -> Value {
    json!({
        "traceID": trace_id,
        "rootServiceName": "stepline:pipeline:nightly",
        "startTimeUnixNano": start.to_string(),
        "durationMs": duration_ms,
        "spanSet": {"spans": spans, "matched": 0}
    })
}

/// Two builds of a pipeline: a passing one where `deploy` starts at 1000s
/// and a failing one where it starts at 500s.
pub fn sample_search_body() -> Value {
    json!({
        "traces": [
            tempo_trace("4bf92f3577b34da6a3ce929d0e0e4736", 900 * SEC, 120_000, vec![
                tempo_span("nightly", ROOT_PARENT_ID, "ok", 900 * SEC, 120 * SEC),
                tempo_span("checkout", STEP_PARENT_ID, "ok", 900 * SEC, 1_500_000_000),
                tempo_span("deploy", STEP_PARENT_ID, "ok", 1000 * SEC, 20 * SEC),
            ]),
            tempo_trace("a3ce929d0e0e47364bf92f3577b34da6", 400 * SEC, 60_000, vec![
                tempo_span("nightly", ROOT_PARENT_ID, "error", 400 * SEC, 60 * SEC),
                tempo_span("deploy", STEP_PARENT_ID, "error", 500 * SEC, 5 * SEC),
                tempo_span("lint", STEP_PARENT_ID, "ok", 700 * SEC, 250_000_000),
            ]),
        ],
        "metrics": {"inspectedTraces": 2}
    })
}

pub fn sample_traces() -> Vec<RawTrace> {
    decode_search(sample_search_body())
        .ok()
        .flatten()
        .map(|decoded| decoded.traces)
        .unwrap_or_default()
}

pub fn sample_pipelines_body() -> Value {
    json!({
        "nightly": {"name": "nightly", "schedule": "0 2 * * *"},
        "deploy-prod": {"name": "deploy-prod"},
        "deploy-stage": {"name": "deploy-stage"}
    })
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone)]
struct BackendState {
    search: Reply,
    pipelines: Reply,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

/// In-process stand-in for the Tempo search API and the pipelines endpoint.
pub struct FakeBackend {
    pub addr: SocketAddr,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    task: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start(search: Reply, pipelines: Reply) -> anyhow::Result<Self> {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let state = BackendState {
            search,
            pipelines,
            queries: Arc::clone(&queries),
        };
        let app = Router::new()
            .route("/api/search", get(search_handler))
            .route("/pipelines", get(pipelines_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            queries,
            task,
        })
    }

    pub fn traces_endpoint(&self) -> String {
        format!("http://{}/api/search", self.addr)
    }

    pub fn pipelines_endpoint(&self) -> String {
        format!("http://{}/pipelines", self.addr)
    }

    /// Query strings received by the search endpoint, in arrival order.
    pub fn recorded_queries(&self) -> Vec<HashMap<String, String>> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An address nothing listens on.
pub fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/api/search")
}

async fn search_handler(
    State(state): State<BackendState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Ok(mut queries) = state.queries.lock() {
        queries.push(params);
    }
    reply(&state.search)
}

async fn pipelines_handler(State(state): State<BackendState>) -> Response {
    reply(&state.pipelines)
}

fn reply(r: &Reply) -> Response {
    let status = StatusCode::from_u16(r.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        r.body.clone(),
    )
        .into_response()
}
