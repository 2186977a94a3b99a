//! Wire shapes of a Tempo search response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{self, SteplineError};

/// Parent id carried by the top-level span of a trace.
pub const ROOT_PARENT_ID: &str = "0000000000000000";
pub const PARENT_ID_KEY: &str = "span:parentID";
pub const STATUS_KEY: &str = "status";

/// A search body decoded trace by trace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedSearch {
    pub traces: Vec<RawTrace>,
    /// One message per trace that failed to decode, in backend order.
    pub rejected: Vec<String>,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    traces: Option<Vec<Value>>,
}

/// Decodes a search body. `Ok(None)` means the body carries no `traces`.
/// A trace that does not decode is rejected on its own; its neighbours are
/// kept.
pub fn decode_search(body: Value) -> error::Result<Option<DecodedSearch>> {
    let envelope: SearchEnvelope = serde_json::from_value(body)
        .map_err(|e| SteplineError::Parse(format!("invalid search body: {e}")))?;
    let Some(items) = envelope.traces else {
        return Ok(None);
    };

    let mut decoded = DecodedSearch::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawTrace>(item) {
            Ok(trace) => decoded.traces.push(trace),
            Err(e) => decoded.rejected.push(format!("trace #{index}: {e}")),
        }
    }
    Ok(Some(decoded))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTrace {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_service_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_set: Option<SpanSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub span_sets: Vec<SpanSet>,
}

impl RawTrace {
    /// Spans in backend order. Older Tempo versions return a single `spanSet`,
    /// newer ones a `spanSets` list; the former wins when both are present.
    pub fn spans(&self) -> Vec<&RawSpan> {
        match &self.span_set {
            Some(set) => set.spans.iter().collect(),
            None => self.span_sets.iter().flat_map(|s| s.spans.iter()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SpanSet {
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSpan {
    #[serde(rename = "spanID", default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration_nanos: u64,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl RawSpan {
    /// Looks up a string attribute by key. The first matching key wins.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_ref())
            .and_then(|v| v.string_value.as_deref())
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.attr(PARENT_ID_KEY)
    }

    pub fn status(&self) -> Option<&str> {
        self.attr(STATUS_KEY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Attribute {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<AttributeValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

/// Tempo renders 64-bit integers as JSON strings; accept both encodings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Float(f64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Int(v) => Ok(v),
        Repr::Float(v) if v.is_finite() && v >= 0.0 => Ok(v as u64),
        Repr::Float(v) => Err(serde::de::Error::custom(format!(
            "expected non-negative number, got {v}"
        ))),
        Repr::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid integer {s:?}: {e}"))),
    }
}
