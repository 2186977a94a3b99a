use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Ok,
    Error,
}

impl Status {
    /// Maps a backend status string; anything unrecognised (including `unset`)
    /// is `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" => Self::Ok,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub time_started: f64,
    pub duration_seconds: f64,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub name: String,
    pub trace_id: String,
    pub time_started: i64,
    pub duration_seconds: f64,
    pub status: Status,
    pub steps: BTreeMap<String, Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInfo {
    pub spec: Pipeline,
    pub builds: Vec<Build>,
    pub all_step_names: Vec<String>,
}

impl PipelineInfo {
    pub fn empty(name: &str) -> Self {
        Self {
            spec: Pipeline::named(name),
            builds: Vec::new(),
            all_step_names: Vec::new(),
        }
    }
}
