use std::fmt::Write;

use chrono::{DateTime, SecondsFormat};
use owo_colors::OwoColorize;
use stepline_core::config::Config;
use stepline_core::links::BuildLinks;
use stepline_core::model::build::{Build, PipelineInfo, Status};
use stepline_core::model::pipeline::PipelineCatalog;

pub fn render_pipeline_human(info: &PipelineInfo, cfg: &Config, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "PIPELINE {} builds={} steps={}",
        info.spec.name,
        info.builds.len(),
        info.all_step_names.len()
    );

    let width = info
        .all_step_names
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(0);

    for build in &info.builds {
        render_build(&mut out, build, &info.all_step_names, width, cfg, color);
    }

    let _ = writeln!(out, "-- {} builds --", info.builds.len());
    out
}

fn render_build(
    out: &mut String,
    build: &Build,
    step_names: &[String],
    width: usize,
    cfg: &Config,
    color: bool,
) {
    let _ = writeln!(
        out,
        "build={} status={} started={} duration={:.2}s",
        build.trace_id,
        status_label(build.status, color),
        format_epoch(build.time_started),
        build.duration_seconds
    );

    for name in step_names {
        match build.steps.get(name) {
            Some(step) => {
                let _ = writeln!(
                    out,
                    "  {name:<width$} {} {:.2}s",
                    status_label(step.status, color),
                    step.duration_seconds
                );
            }
            None => {
                let _ = writeln!(out, "  {name:<width$} -");
            }
        }
    }

    let links = BuildLinks::for_trace(cfg, &build.trace_id);
    if let Some(trace) = links.trace {
        let _ = writeln!(out, "  trace_url={trace}");
    }
    if let Some(logs) = links.logs {
        let _ = writeln!(out, "  logs_url={logs}");
    }
}

pub fn render_pipelines_human(catalog: &PipelineCatalog) -> String {
    let mut out = String::new();
    for pipeline in catalog.values() {
        let _ = writeln!(out, "{}", pipeline.name);
    }
    let _ = writeln!(out, "-- {} pipelines --", catalog.len());
    out
}

pub fn render_config_human(cfg: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "pipelines_endpoint={}", cfg.pipelines_endpoint);
    let _ = writeln!(out, "traces_query_endpoint={}", cfg.traces_query_endpoint);
    let _ = writeln!(out, "logs_query_endpoint={}", cfg.logs_query_endpoint);
    let _ = writeln!(out, "logs_analyze_url={}", cfg.logs_analyze_url);
    let _ = writeln!(out, "trace_analyze_url={}", cfg.trace_analyze_url);
    let _ = writeln!(out, "service_prefix={}", cfg.service_prefix);
    let _ = writeln!(out, "lookback={}", humantime::format_duration(cfg.lookback));
    let _ = writeln!(out, "trace_limit={}", cfg.trace_limit);
    let _ = writeln!(out, "spans_per_span_set={}", cfg.spans_per_span_set);
    let _ = writeln!(out, "http_addr={}", cfg.http_addr);
    out
}

fn status_label(status: Status, color: bool) -> String {
    let label = format!("{:<7}", status.as_str());
    if !color {
        return label;
    }
    match status {
        Status::Ok => label.green().to_string(),
        Status::Error => label.red().to_string(),
        Status::Unknown => label.bright_black().to_string(),
    }
}

fn format_epoch(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}
