use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SteplineError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub pipelines_endpoint: String,
    pub traces_query_endpoint: String,
    pub logs_query_endpoint: String,
    /// Deep-link template for a build's logs; `{TRACEID}` is substituted.
    pub logs_analyze_url: String,
    /// Deep-link template for a build's trace; `{TRACEID}` is substituted.
    pub trace_analyze_url: String,
    pub service_prefix: String,
    #[serde(with = "humantime_serde_compat")]
    pub lookback: Duration,
    pub trace_limit: usize,
    pub spans_per_span_set: usize,
    pub http_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipelines_endpoint: "http://localhost:8080/pipelines".to_string(),
            traces_query_endpoint: "http://localhost:3200/api/search".to_string(),
            logs_query_endpoint: "http://127.0.0.1:3100/loki/api/v1/query".to_string(),
            logs_analyze_url: String::new(),
            trace_analyze_url: String::new(),
            service_prefix: "stepline".to_string(),
            lookback: Duration::from_secs(60 * 60 * 72),
            trace_limit: 100,
            spans_per_span_set: 100,
            http_addr: "127.0.0.1:1780".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

mod humantime_serde_compat {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    pipelines_endpoint: Option<String>,
    traces_query_endpoint: Option<String>,
    logs_query_endpoint: Option<String>,
    logs_analyze_url: Option<String>,
    trace_analyze_url: Option<String>,
    service_prefix: Option<String>,
    lookback: Option<String>,
    trace_limit: Option<usize>,
    spans_per_span_set: Option<usize>,
    http_addr: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("STEPLINE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("stepline/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SteplineError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SteplineError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        pipelines_endpoint: env::var("STEPLINE_PIPELINES_ENDPOINT").ok(),
        traces_query_endpoint: env::var("STEPLINE_TRACES_QUERY_ENDPOINT").ok(),
        logs_query_endpoint: env::var("STEPLINE_LOGS_QUERY_ENDPOINT").ok(),
        logs_analyze_url: env::var("STEPLINE_LOGS_ANALYZE_URL").ok(),
        trace_analyze_url: env::var("STEPLINE_TRACE_ANALYZE_URL").ok(),
        service_prefix: env::var("STEPLINE_SERVICE_PREFIX").ok(),
        lookback: env::var("STEPLINE_LOOKBACK").ok(),
        trace_limit: parse_env_usize("STEPLINE_TRACE_LIMIT")?,
        spans_per_span_set: parse_env_usize("STEPLINE_SPANS_PER_SET")?,
        http_addr: env::var("STEPLINE_HTTP_ADDR").ok(),
    })
}

fn parse_env_usize(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|e| SteplineError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.pipelines_endpoint {
        cfg.pipelines_endpoint = v;
    }
    if let Some(v) = overrides.traces_query_endpoint {
        cfg.traces_query_endpoint = v;
    }
    if let Some(v) = overrides.logs_query_endpoint {
        cfg.logs_query_endpoint = v;
    }
    if let Some(v) = overrides.logs_analyze_url {
        cfg.logs_analyze_url = v;
    }
    if let Some(v) = overrides.trace_analyze_url {
        cfg.trace_analyze_url = v;
    }
    if let Some(v) = overrides.service_prefix {
        if v.trim().is_empty() {
            return Err(SteplineError::Config(format!(
                "service_prefix in {source} cannot be empty"
            )));
        }
        cfg.service_prefix = v;
    }
    if let Some(v) = overrides.lookback {
        cfg.lookback = humantime::parse_duration(&v).map_err(|e| {
            SteplineError::Config(format!("bad lookback in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.trace_limit {
        if v == 0 {
            return Err(SteplineError::Config(format!(
                "trace_limit in {source} must be positive"
            )));
        }
        cfg.trace_limit = v;
    }
    if let Some(v) = overrides.spans_per_span_set {
        if v == 0 {
            return Err(SteplineError::Config(format!(
                "spans_per_span_set in {source} must be positive"
            )));
        }
        cfg.spans_per_span_set = v;
    }
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_expected_endpoints() {
        let cfg = Config::default();
        assert_eq!(cfg.pipelines_endpoint, "http://localhost:8080/pipelines");
        assert_eq!(cfg.traces_query_endpoint, "http://localhost:3200/api/search");
        assert_eq!(cfg.http_addr, "127.0.0.1:1780");
        assert!(cfg.trace_analyze_url.is_empty());
    }

    #[test]
    fn default_window_is_three_days() {
        let cfg = Config::default();
        assert_eq!(cfg.lookback, Duration::from_secs(259_200));
        assert_eq!(cfg.trace_limit, 100);
        assert_eq!(cfg.spans_per_span_set, 100);
    }

    #[test]
    fn apply_overrides_updates_query_fields() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            traces_query_endpoint: Some("http://tempo:3200/api/search".to_string()),
            service_prefix: Some("ci".to_string()),
            lookback: Some("6h".to_string()),
            trace_limit: Some(20),
            trace_analyze_url: Some("http://grafana/explore?q={TRACEID}".to_string()),
            ..ConfigOverrides::default()
        };

        apply_overrides(&mut cfg, file, "config file").unwrap();

        assert_eq!(cfg.traces_query_endpoint, "http://tempo:3200/api/search");
        assert_eq!(cfg.service_prefix, "ci");
        assert_eq!(cfg.lookback, Duration::from_secs(6 * 3600));
        assert_eq!(cfg.trace_limit, 20);
        assert_eq!(cfg.spans_per_span_set, 100);
        assert_eq!(cfg.trace_analyze_url, "http://grafana/explore?q={TRACEID}");
    }

    #[test]
    fn apply_overrides_rejects_bad_values() {
        let mut cfg = Config::default();
        let bad_lookback = ConfigOverrides {
            lookback: Some("three days".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_lookback, "environment").is_err());

        let zero_limit = ConfigOverrides {
            trace_limit: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, zero_limit, "environment").is_err());

        let empty_prefix = ConfigOverrides {
            service_prefix: Some("  ".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, empty_prefix, "environment").is_err());
    }

    #[test]
    fn loads_overrides_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "pipelines_endpoint = \"http://orchestrator:8080/pipelines\"\nlookback = \"24h\"\n",
        )
        .unwrap();

        let overrides = load_file_overrides(&path).unwrap().unwrap();
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides, "config file").unwrap();

        assert_eq!(cfg.pipelines_endpoint, "http://orchestrator:8080/pipelines");
        assert_eq!(cfg.lookback, Duration::from_secs(86_400));
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load_file_overrides(&path).unwrap().is_none());
    }

    #[test]
    fn config_serializes_lookback_as_humantime() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(value["lookback"], "3days");
    }
}
