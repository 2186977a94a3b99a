use std::future::Future;

use chrono::Utc;
use reqwest::Client;
use stepline_core::config::Config;
use stepline_core::model::build::PipelineInfo;
use stepline_core::model::trace::{RawTrace, decode_search};
use stepline_core::query::{QueryLimits, TraceQuery};
use stepline_core::{SkippedSpan, aggregate};
use tracing::{debug, warn};

use crate::http::send_json;

/// Anything that can return the raw traces of a pipeline. A failed lookup
/// yields an empty list.
pub trait TraceSource: Send + Sync + 'static {
    fn fetch_traces(&self, pipeline: &str) -> impl Future<Output = Vec<RawTrace>> + Send;
}

#[derive(Debug, Clone)]
pub struct TraceClient {
    http: Client,
    endpoint: String,
    service_prefix: String,
    limits: QueryLimits,
}

impl TraceClient {
    pub fn new(cfg: &Config) -> Self {
        Self::with_client(Client::new(), cfg)
    }

    pub fn with_client(http: Client, cfg: &Config) -> Self {
        Self {
            http,
            endpoint: cfg.traces_query_endpoint.clone(),
            service_prefix: cfg.service_prefix.clone(),
            limits: QueryLimits::from(cfg),
        }
    }

    /// Issues the single windowed search for `pipeline`. Every failure mode
    /// degrades to an empty list.
    pub async fn search(&self, pipeline: &str) -> Vec<RawTrace> {
        let query =
            match TraceQuery::for_pipeline(&self.service_prefix, pipeline, &self.limits, Utc::now())
            {
                Ok(q) => q,
                Err(err) => {
                    warn!(pipeline = %pipeline, error = %err, "trace query not issued");
                    return Vec::new();
                }
            };

        let response = send_json(self.http.get(&self.endpoint).query(&query)).await;
        if !response.is_ok() {
            warn!(
                pipeline = %pipeline,
                code = response.code,
                detail = %response.diagnostic(),
                "trace search failed; showing no builds"
            );
            return Vec::new();
        }

        let Some(body) = response.body else {
            debug!(pipeline = %pipeline, "trace search returned no body");
            return Vec::new();
        };

        match decode_search(body) {
            Ok(Some(decoded)) => {
                for reason in &decoded.rejected {
                    warn!(pipeline = %pipeline, reason = %reason, "trace skipped during decode");
                }
                debug!(
                    pipeline = %pipeline,
                    count = decoded.traces.len(),
                    rejected = decoded.rejected.len(),
                    "trace search complete"
                );
                decoded.traces
            }
            Ok(None) => {
                debug!(pipeline = %pipeline, "trace search body has no traces field");
                Vec::new()
            }
            Err(err) => {
                warn!(pipeline = %pipeline, error = %err, "trace search body not understood");
                Vec::new()
            }
        }
    }

    /// Fetches and aggregates in one pass.
    pub async fn pipeline_info(&self, pipeline: &str) -> PipelineInfo {
        let traces = self.search(pipeline).await;
        let agg = aggregate(pipeline, &traces);
        log_skipped(pipeline, &agg.skipped);
        agg.info
    }
}

impl TraceSource for TraceClient {
    async fn fetch_traces(&self, pipeline: &str) -> Vec<RawTrace> {
        self.search(pipeline).await
    }
}

pub(crate) fn log_skipped(pipeline: &str, skipped: &[SkippedSpan]) {
    for span in skipped {
        warn!(
            pipeline = %pipeline,
            trace_id = %span.trace_id,
            span = %span.span_name,
            reason = %span.reason,
            "span skipped during aggregation"
        );
    }
}
