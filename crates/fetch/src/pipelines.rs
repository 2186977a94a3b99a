use reqwest::Client;
use stepline_core::config::Config;
use stepline_core::error::{Result, SteplineError};
use stepline_core::model::pipeline::{PipelineCatalog, parse_catalog};

use crate::http::{RawResponse, send_json};

/// Client for the endpoint that lists configured pipelines.
#[derive(Debug, Clone)]
pub struct PipelineDirectory {
    http: Client,
    endpoint: String,
}

impl PipelineDirectory {
    pub fn new(cfg: &Config) -> Self {
        Self::with_client(Client::new(), cfg)
    }

    pub fn with_client(http: Client, cfg: &Config) -> Self {
        Self {
            http,
            endpoint: cfg.pipelines_endpoint.clone(),
        }
    }

    pub async fn list(&self) -> Result<PipelineCatalog> {
        let response = send_json(self.http.get(&self.endpoint)).await;
        match response {
            RawResponse {
                code: 200,
                body: Some(body),
            } => {
                let catalog = parse_catalog(body)?;
                tracing::debug!(count = catalog.len(), "pipelines listed");
                Ok(catalog)
            }
            RawResponse { code: 200, .. } => Err(SteplineError::Fetch(format!(
                "pipelines endpoint {} returned an empty body",
                self.endpoint
            ))),
            other if other.code == RawResponse::TRANSPORT_FAILURE => {
                Err(SteplineError::Fetch(format!(
                    "pipelines endpoint {} unreachable: {}",
                    self.endpoint,
                    other.diagnostic()
                )))
            }
            other => Err(SteplineError::Fetch(format!(
                "pipelines endpoint {} returned status {}",
                self.endpoint, other.code
            ))),
        }
    }
}
