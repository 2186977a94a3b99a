use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const TRACE_ID_PLACEHOLDER: &str = "{TRACEID}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl BuildLinks {
    pub fn for_trace(cfg: &Config, trace_id: &str) -> Self {
        Self {
            logs: expand(&cfg.logs_analyze_url, trace_id),
            trace: expand(&cfg.trace_analyze_url, trace_id),
        }
    }
}

/// Substitutes the trace id into a deep-link template. Empty templates have
/// no link.
pub fn expand(template: &str, trace_id: &str) -> Option<String> {
    if template.is_empty() {
        return None;
    }
    Some(template.replace(TRACE_ID_PLACEHOLDER, trace_id))
}
