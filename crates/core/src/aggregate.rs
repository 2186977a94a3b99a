//! Reshapes raw traces of one pipeline into builds, steps and a step catalog.
//!
//! Each trace becomes a [`Build`]. The span whose parent is the all-zero
//! sentinel is the build's root and only contributes the build status; every
//! other span is a step keyed by its name. Step names are collected across
//! all builds and ordered by the earliest start time seen for each name.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::build::{Build, PipelineInfo, Status, Step};
use crate::model::pipeline::Pipeline;
use crate::model::trace::{ROOT_PARENT_ID, RawSpan, RawTrace};
use crate::time::{millis_to_secs, nanos_to_centisecs, nanos_to_rounded_secs, nanos_to_secs};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingParentId,
    MissingStatus,
    DuplicateRoot,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MissingParentId => "missing span:parentID attribute",
            Self::MissingStatus => "missing status attribute",
            Self::DuplicateRoot => "duplicate root span",
        };
        f.write_str(label)
    }
}

/// A span left out of the aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSpan {
    pub trace_id: String,
    pub span_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub info: PipelineInfo,
    pub skipped: Vec<SkippedSpan>,
}

/// Aggregates `traces` for `pipeline`. The pipeline name only labels the
/// result; it is not checked against the traces.
///
/// Policies for irregular input:
/// - a span without `span:parentID`, or a step without `status`, is skipped;
/// - the first root span of a trace sets the build status, later ones are
///   skipped;
/// - when a build has several steps with the same name the last one wins;
/// - step names with equal earliest start are ordered by name.
pub fn aggregate(pipeline: &str, traces: &[RawTrace]) -> Aggregation {
    let mut builds = Vec::with_capacity(traces.len());
    let mut earliest: HashMap<&str, u64> = HashMap::new();
    let mut skipped = Vec::new();

    for trace in traces {
        let mut build = Build {
            name: trace.trace_id.clone(),
            trace_id: trace.trace_id.clone(),
            time_started: nanos_to_rounded_secs(trace.start_time_unix_nano),
            duration_seconds: millis_to_secs(trace.duration_ms),
            status: Status::Unknown,
            steps: BTreeMap::new(),
        };
        let mut root_seen = false;

        for span in trace.spans() {
            let mut skip = |reason| {
                skipped.push(SkippedSpan {
                    trace_id: trace.trace_id.clone(),
                    span_name: span.name.clone(),
                    reason,
                });
            };

            let Some(parent_id) = span.parent_id() else {
                skip(SkipReason::MissingParentId);
                continue;
            };

            if parent_id == ROOT_PARENT_ID {
                if root_seen {
                    skip(SkipReason::DuplicateRoot);
                    continue;
                }
                root_seen = true;
                match span.status() {
                    Some(status) => build.status = Status::from_wire(status),
                    None => skip(SkipReason::MissingStatus),
                }
                continue;
            }

            let Some(status) = span.status() else {
                skip(SkipReason::MissingStatus);
                continue;
            };

            record_earliest(&mut earliest, span);
            build.steps.insert(
                span.name.clone(),
                Step {
                    time_started: nanos_to_secs(span.start_time_unix_nano),
                    duration_seconds: nanos_to_centisecs(span.duration_nanos),
                    status: Status::from_wire(status),
                },
            );
        }

        builds.push(build);
    }

    Aggregation {
        info: PipelineInfo {
            spec: Pipeline::named(pipeline),
            builds,
            all_step_names: order_step_names(earliest),
        },
        skipped,
    }
}

fn record_earliest<'a>(earliest: &mut HashMap<&'a str, u64>, span: &'a RawSpan) {
    earliest
        .entry(span.name.as_str())
        .and_modify(|ts| *ts = (*ts).min(span.start_time_unix_nano))
        .or_insert(span.start_time_unix_nano);
}

fn order_step_names(earliest: HashMap<&str, u64>) -> Vec<String> {
    let mut names: Vec<(u64, &str)> = earliest.into_iter().map(|(n, ts)| (ts, n)).collect();
    names.sort_unstable();
    names.into_iter().map(|(_, n)| n.to_string()).collect()
}
