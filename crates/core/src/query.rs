use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, SteplineError};
use crate::time::window_bounds;

/// Query parameters of one Tempo search for a pipeline's traces. Field names
/// are the wire parameter names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceQuery {
    pub q: String,
    pub spss: usize,
    pub limit: usize,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLimits {
    pub lookback: Duration,
    pub trace_limit: usize,
    pub spans_per_span_set: usize,
}

impl From<&Config> for QueryLimits {
    fn from(cfg: &Config) -> Self {
        Self {
            lookback: cfg.lookback,
            trace_limit: cfg.trace_limit,
            spans_per_span_set: cfg.spans_per_span_set,
        }
    }
}

impl TraceQuery {
    pub fn for_pipeline(
        service_prefix: &str,
        pipeline: &str,
        limits: &QueryLimits,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if pipeline.trim().is_empty() {
            return Err(SteplineError::InvalidArgument(
                "pipeline name cannot be empty".to_string(),
            ));
        }

        let service = service_name(service_prefix, pipeline);
        let (start, end) = window_bounds(now, limits.lookback)?;
        Ok(Self {
            q: format!(
                "{{rootServiceName=\"{}\"}}|select(span:status,span:name,span:parentID)",
                escape_traceql(&service)
            ),
            spss: limits.spans_per_span_set,
            limit: limits.trace_limit,
            start,
            end,
        })
    }
}

/// Root service name under which a pipeline's runs report their traces.
pub fn service_name(prefix: &str, pipeline: &str) -> String {
    format!("{prefix}:pipeline:{pipeline}")
}

fn escape_traceql(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn limits() -> QueryLimits {
        QueryLimits {
            lookback: Duration::from_secs(3600 * 72),
            trace_limit: 100,
            spans_per_span_set: 100,
        }
    }

    #[test]
    fn builds_pipeline_query() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let query = TraceQuery::for_pipeline("stepline", "nightly", &limits(), now).unwrap();

        assert_eq!(
            query.q,
            "{rootServiceName=\"stepline:pipeline:nightly\"}|select(span:status,span:name,span:parentID)"
        );
        assert_eq!(query.spss, 100);
        assert_eq!(query.limit, 100);
        assert_eq!(query.end, now.timestamp());
        assert_eq!(query.start, now.timestamp() - 259_200);
    }

    #[test]
    fn escapes_quotes_in_service_name() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let query = TraceQuery::for_pipeline("ci", "a\"b\\c", &limits(), now).unwrap();
        assert!(query.q.starts_with("{rootServiceName=\"ci:pipeline:a\\\"b\\\\c\"}"));
    }

    #[test]
    fn rejects_empty_pipeline() {
        assert!(TraceQuery::for_pipeline("ci", " ", &limits(), Utc::now()).is_err());
    }

    #[test]
    fn limits_follow_config() {
        let cfg = Config {
            trace_limit: 5,
            ..Config::default()
        };
        let limits = QueryLimits::from(&cfg);
        assert_eq!(limits.trace_limit, 5);
        assert_eq!(limits.spans_per_span_set, 100);
        assert_eq!(limits.lookback, cfg.lookback);
    }

    #[test]
    fn service_name_format() {
        assert_eq!(service_name("ci", "deploy"), "ci:pipeline:deploy");
    }
}
