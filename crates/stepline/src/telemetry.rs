use std::io::IsTerminal;

use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

pub fn init_cli_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .try_init();
}

/// Owns the span exporter installed by [`init_serve_tracing`]; call
/// [`ServeTelemetry::shutdown`] once the server has stopped so queued spans
/// are flushed.
#[must_use]
pub struct ServeTelemetry {
    exporter: Option<SdkTracerProvider>,
}

impl ServeTelemetry {
    pub fn exports_spans(&self) -> bool {
        self.exporter.is_some()
    }

    pub fn shutdown(self) {
        let Some(provider) = self.exporter else {
            return;
        };
        if let Err(err) = provider.shutdown() {
            eprintln!("stepline: span exporter shutdown failed: {err}");
        }
    }
}

/// Tracing for `serve`: stderr at `info` unless `RUST_LOG` says otherwise,
/// plus span export when the OTLP endpoint variable is set.
pub fn init_serve_tracing() -> ServeTelemetry {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .compact();

    let (otlp, exporter) = match otlp_exporter() {
        Some((layer, provider)) => (Some(layer), Some(provider)),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(otlp)
        .try_init();

    ServeTelemetry { exporter }
}

fn otlp_exporter<S>() -> Option<(OpenTelemetryLayer<S, Tracer>, SdkTracerProvider)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::env::var_os(OTLP_ENDPOINT_VAR)?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .map_err(|err| eprintln!("stepline: span export disabled: {err}"))
        .ok()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();
    let layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("stepline"));
    Some((layer, provider))
}

