use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SteplineError};

/// A pipeline as listed by the pipelines endpoint. Fields other than `name`
/// are opaque and passed through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Pipeline {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Pipeline {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

pub type PipelineCatalog = BTreeMap<String, Pipeline>;

/// Decodes a `{ "<name>": { "name": .. } }` listing. Entries without a name
/// take their key.
pub fn parse_catalog(body: serde_json::Value) -> Result<PipelineCatalog> {
    let mut catalog: PipelineCatalog = serde_json::from_value(body)
        .map_err(|e| SteplineError::Parse(format!("invalid pipelines listing: {e}")))?;
    for (key, pipeline) in catalog.iter_mut() {
        if pipeline.name.is_empty() {
            pipeline.name = key.clone();
        }
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_and_fills_names() {
        let body = serde_json::json!({
            "nightly": {"name": "nightly", "repo": "git@example.com:app.git"},
            "deploy": {}
        });
        let catalog = parse_catalog(body).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["deploy"].name, "deploy");
        assert_eq!(
            catalog["nightly"].extra.get("repo"),
            Some(&serde_json::json!("git@example.com:app.git"))
        );
    }

    #[test]
    fn rejects_non_object_listing() {
        assert!(parse_catalog(serde_json::json!(["nightly"])).is_err());
    }
}
