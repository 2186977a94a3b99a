use stepline_core::config::Config;
use stepline_core::model::build::{PipelineInfo, Status};
use stepline_fetch::{PipelineDirectory, TraceClient};
use testkit::{FakeBackend, Reply, closed_endpoint, sample_pipelines_body, sample_search_body};

fn config_for(backend: &FakeBackend) -> Config {
    Config {
        traces_query_endpoint: backend.traces_endpoint(),
        pipelines_endpoint: backend.pipelines_endpoint(),
        service_prefix: "stepline".to_string(),
        ..Config::default()
    }
}

#[tokio::test]
async fn aggregates_successful_search() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(200, sample_search_body()),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;
    let client = TraceClient::new(&config_for(&backend));

    let info = client.pipeline_info("nightly").await;

    assert_eq!(info.spec.name, "nightly");
    assert_eq!(info.all_step_names, vec!["deploy", "lint", "checkout"]);
    assert_eq!(info.builds.len(), 2);

    let first = &info.builds[0];
    assert_eq!(first.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
    assert_eq!(first.status, Status::Ok);
    assert_eq!(first.time_started, 900);
    assert_eq!(first.duration_seconds, 120.0);
    assert_eq!(first.steps["checkout"].duration_seconds, 1.5);

    let second = &info.builds[1];
    assert_eq!(second.status, Status::Error);
    assert_eq!(second.steps["deploy"].time_started, 500.0);
    assert_eq!(second.steps["lint"].duration_seconds, 0.25);
    Ok(())
}

#[tokio::test]
async fn sends_one_windowed_query() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(200, serde_json::json!({"traces": []})),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;
    let cfg = Config {
        trace_limit: 25,
        spans_per_span_set: 40,
        ..config_for(&backend)
    };

    let info = TraceClient::new(&cfg).pipeline_info("deploy-prod").await;
    assert_eq!(info, PipelineInfo::empty("deploy-prod"));

    let queries = backend.recorded_queries();
    assert_eq!(queries.len(), 1);
    let q = &queries[0];
    assert_eq!(
        q["q"],
        "{rootServiceName=\"stepline:pipeline:deploy-prod\"}|select(span:status,span:name,span:parentID)"
    );
    assert_eq!(q["spss"], "40");
    assert_eq!(q["limit"], "25");

    let start: i64 = q["start"].parse()?;
    let end: i64 = q["end"].parse()?;
    assert_eq!(end - start, 72 * 3600);
    Ok(())
}

#[tokio::test]
async fn server_error_degrades_to_empty_info() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(500, serde_json::json!({"error": "boom"})),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;

    let info = TraceClient::new(&config_for(&backend))
        .pipeline_info("nightly")
        .await;

    assert_eq!(info, PipelineInfo::empty("nightly"));
    Ok(())
}

#[tokio::test]
async fn undecodable_body_degrades_to_empty_info() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::raw(200, "<html>not json</html>"),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;

    let info = TraceClient::new(&config_for(&backend))
        .pipeline_info("nightly")
        .await;

    assert!(info.builds.is_empty());
    assert!(info.all_step_names.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_trace_does_not_hide_its_neighbours() -> anyhow::Result<()> {
    let mut body = sample_search_body();
    let traces = body["traces"].as_array_mut().expect("fixture traces");
    traces.insert(1, serde_json::json!({"spanSet": {"spans": []}}));
    traces[0]["spanSet"]["spans"][1]["attributes"][1]["value"] = serde_json::Value::Null;

    let backend = FakeBackend::start(
        Reply::json(200, body),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;

    let info = TraceClient::new(&config_for(&backend))
        .pipeline_info("nightly")
        .await;

    assert_eq!(info.builds.len(), 2);
    assert_eq!(info.builds[0].trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
    assert!(!info.builds[0].steps.contains_key("checkout"));
    assert!(info.builds[0].steps.contains_key("deploy"));
    assert_eq!(info.builds[1].trace_id, "a3ce929d0e0e47364bf92f3577b34da6");
    assert_eq!(info.all_step_names, vec!["deploy", "lint"]);
    Ok(())
}

#[tokio::test]
async fn body_without_traces_degrades_to_empty_info() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(200, serde_json::json!({"metrics": {}})),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;

    let info = TraceClient::new(&config_for(&backend))
        .pipeline_info("nightly")
        .await;

    assert_eq!(info, PipelineInfo::empty("nightly"));
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_degrades_to_empty_info() {
    let cfg = Config {
        traces_query_endpoint: closed_endpoint(),
        ..Config::default()
    };

    let info = TraceClient::new(&cfg).pipeline_info("nightly").await;

    assert_eq!(info, PipelineInfo::empty("nightly"));
}

#[tokio::test]
async fn lists_pipelines() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(200, sample_search_body()),
        Reply::json(200, sample_pipelines_body()),
    )
    .await?;

    let catalog = PipelineDirectory::new(&config_for(&backend)).list().await?;

    assert_eq!(
        catalog.keys().collect::<Vec<_>>(),
        vec!["deploy-prod", "deploy-stage", "nightly"]
    );
    assert_eq!(
        catalog["nightly"].extra.get("schedule"),
        Some(&serde_json::json!("0 2 * * *"))
    );
    Ok(())
}

#[tokio::test]
async fn pipeline_listing_failure_is_an_error() -> anyhow::Result<()> {
    let backend = FakeBackend::start(
        Reply::json(200, sample_search_body()),
        Reply::json(503, serde_json::json!({"error": "down"})),
    )
    .await?;

    let err = PipelineDirectory::new(&config_for(&backend))
        .list()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("503"));
    Ok(())
}
