use glob::Pattern;

use crate::error::{Result, SteplineError};
use crate::model::pipeline::PipelineCatalog;

/// Glob over pipeline names, e.g. `deploy-*`.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: Pattern,
}

impl NameFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SteplineError::Parse("empty name filter".to_string()));
        }
        let pattern = Pattern::new(trimmed)
            .map_err(|e| SteplineError::Parse(format!("invalid name filter {input}: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    pub fn retain(&self, catalog: &mut PipelineCatalog) {
        catalog.retain(|name, _| self.matches(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pipeline::Pipeline;

    #[test]
    fn name_filter_parse_and_match() {
        let f = NameFilter::parse("deploy-*").unwrap();
        assert!(f.matches("deploy-prod"));
        assert!(!f.matches("nightly"));
        assert!(NameFilter::parse("  ").is_err());
        assert!(NameFilter::parse("[").is_err());
    }

    #[test]
    fn retain_drops_non_matching() {
        let mut catalog = PipelineCatalog::new();
        for name in ["deploy-prod", "deploy-stage", "nightly"] {
            catalog.insert(name.to_string(), Pipeline::named(name));
        }
        NameFilter::parse("deploy-*").unwrap().retain(&mut catalog);
        assert_eq!(
            catalog.keys().collect::<Vec<_>>(),
            vec!["deploy-prod", "deploy-stage"]
        );
    }
}
