mod api;
mod output;
mod telemetry;

use std::io::IsTerminal;
use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stepline_core::config::Config;
use stepline_core::filter::NameFilter;
use stepline_core::time::parse_duration_str;
use stepline_fetch::{Dashboard, Delivery, PipelineDirectory, Selection, Snapshot, TraceClient};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{ApiState, router};
use crate::output::{render_config_human, render_pipeline_human, render_pipelines_human};
use crate::telemetry::{init_cli_tracing, init_serve_tracing};

#[derive(Parser, Debug)]
#[command(name = "stepline")]
#[command(about = "Build and step timeline of pipelines traced into Tempo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    traces_endpoint: Option<String>,

    #[arg(long, global = true)]
    pipelines_endpoint: Option<String>,

    #[arg(long, global = true)]
    service_prefix: Option<String>,

    #[arg(long, global = true, help = "Search window, e.g. 72h")]
    lookback: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List configured pipelines")]
    Pipelines {
        #[arg(long, help = "Glob over pipeline names, e.g. 'deploy-*'")]
        filter: Option<String>,
    },
    #[command(about = "Show recent builds and steps of one pipeline")]
    Builds { pipeline: String },
    #[command(about = "Select pipelines by name from stdin, one per line")]
    Browse,
    #[command(about = "Serve pipeline data over HTTP")]
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },
    #[command(about = "Print the effective configuration")]
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Pipelines { filter } => {
            init_cli_tracing();
            let filter = filter.map(|f| NameFilter::parse(&f)).transpose()?;
            let mut catalog = PipelineDirectory::new(&cfg)
                .list()
                .await
                .context("list pipelines")?;
            if let Some(filter) = filter {
                filter.retain(&mut catalog);
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print!("{}", render_pipelines_human(&catalog));
            }
            Ok(())
        }
        Commands::Builds { pipeline } => {
            init_cli_tracing();
            let info = TraceClient::new(&cfg).pipeline_info(&pipeline).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!(
                    "{}",
                    render_pipeline_human(&info, &cfg, std::io::stdout().is_terminal())
                );
            }
            Ok(())
        }
        Commands::Browse => {
            init_cli_tracing();
            run_browse(cfg, cli.json).await
        }
        Commands::Serve { addr } => run_serve(cfg, addr).await,
        Commands::Config => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                print!("{}", render_config_human(&cfg));
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("load config")?;
    apply_cli_overrides(&mut cfg, cli)?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(v) = &cli.traces_endpoint {
        cfg.traces_query_endpoint = v.clone();
    }
    if let Some(v) = &cli.pipelines_endpoint {
        cfg.pipelines_endpoint = v.clone();
    }
    if let Some(v) = &cli.service_prefix {
        if v.trim().is_empty() {
            anyhow::bail!("--service-prefix cannot be empty");
        }
        cfg.service_prefix = v.clone();
    }
    if let Some(v) = &cli.lookback {
        cfg.lookback = parse_duration_str(v)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotLine<'a> {
    request_id: u64,
    pipeline: &'a str,
    info: &'a stepline_core::model::build::PipelineInfo,
}

async fn run_browse(cfg: Config, json: bool) -> anyhow::Result<()> {
    let dashboard = Dashboard::new(TraceClient::new(&cfg));
    let mut view = dashboard.subscribe();
    let color = std::io::stdout().is_terminal();

    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let snapshot = view.borrow_and_update().clone();
            if let Some(snapshot) = snapshot {
                print_snapshot(&snapshot, &cfg, json, color);
            }
        }
    });

    let mut pending = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        pending.push(dashboard.select(name));
    }

    let settled = settle_selections(pending).await;
    drop(dashboard);

    printer.await.context("browse printer task")?;
    settled.map(|_| ())
}

/// Waits for the newest selection and aborts the older ones, which can no
/// longer be shown.
async fn settle_selections(mut pending: Vec<Selection>) -> anyhow::Result<Option<Delivery>> {
    let Some(last) = pending.pop() else {
        return Ok(None);
    };
    for selection in pending {
        selection.task.abort();
    }
    let delivery = last.task.await.context("browse selection task")?;
    Ok(Some(delivery))
}

fn print_snapshot(snapshot: &Snapshot, cfg: &Config, json: bool, color: bool) {
    if json {
        let line = SnapshotLine {
            request_id: snapshot.request_id,
            pipeline: &snapshot.pipeline,
            info: &snapshot.info,
        };
        match serde_json::to_string(&line) {
            Ok(s) => println!("{s}"),
            Err(err) => tracing::warn!(error = %err, "failed to encode snapshot"),
        }
        return;
    }

    println!(
        "== {} (request {}) ==",
        snapshot.pipeline, snapshot.request_id
    );
    print!("{}", render_pipeline_human(&snapshot.info, cfg, color));
}

async fn run_serve(mut cfg: Config, addr: Option<String>) -> anyhow::Result<()> {
    let telemetry = init_serve_tracing();
    if let Some(v) = addr {
        cfg.http_addr = v;
    }
    let addr: SocketAddr = cfg
        .http_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.http_addr))?;

    eprintln!("stepline serve");
    eprintln!("  http: {addr}");
    eprintln!("  traces: {}", cfg.traces_query_endpoint);
    eprintln!("  pipelines: {}", cfg.pipelines_endpoint);
    eprintln!("  span export: {}", telemetry.exports_spans());

    let app = router(ApiState::new(cfg));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind HTTP listener {addr}"))?;

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received ctrl-c, shutting down");
        })
        .await;

    telemetry.shutdown();
    result.context("HTTP server failed")
}
