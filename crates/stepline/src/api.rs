use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use stepline_core::config::Config;
use stepline_core::links::BuildLinks;
use stepline_core::model::build::PipelineInfo;
use stepline_fetch::{PipelineDirectory, TraceClient};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

#[derive(Clone)]
pub struct ApiState {
    pub cfg: Arc<Config>,
    pub traces: TraceClient,
    pub pipelines: PipelineDirectory,
}

impl ApiState {
    pub fn new(cfg: Config) -> Self {
        Self {
            traces: TraceClient::new(&cfg),
            pipelines: PipelineDirectory::new(&cfg),
            cfg: Arc::new(cfg),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/v1/pipelines", get(list_pipelines))
        .route("/v1/pipelines/{name}", get(pipeline_info))
        .route("/v1/links/{trace_id}", get(build_links))
        .route("/v1/config", get(config))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn list_pipelines(State(state): State<ApiState>) -> Response {
    match state.pipelines.list().await {
        Ok(catalog) => Json(catalog).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "pipeline listing failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn pipeline_info(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Json<PipelineInfo> {
    Json(state.traces.pipeline_info(&name).await)
}

async fn build_links(
    State(state): State<ApiState>,
    Path(trace_id): Path<String>,
) -> Json<BuildLinks> {
    Json(BuildLinks::for_trace(&state.cfg, &trace_id))
}

async fn config(State(state): State<ApiState>) -> Json<Config> {
    Json(state.cfg.as_ref().clone())
}
