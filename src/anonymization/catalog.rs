//! Pattern catalog
//!
//! A catalog bundles everything the detection stages read at startup: the
//! ordered rule list, entity priorities, blacklists, context profiles and
//! trimming settings. The default catalog is embedded in the binary.

use crate::anonymization::detector::context::ContextDefinition;
use crate::anonymization::detector::patterns::{validate_rule_definition, RuleDefinition};
use crate::anonymization::filter::BlacklistDefinition;
use crate::anonymization::trimmer::TrimmingDefinition;
use crate::domain::{Result, VeilError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_CATALOG: &str = include_str!("../../patterns/default_catalog.toml");

/// Static detection data loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Catalog {
    /// Rules in evaluation order (`[[rule]]` tables)
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDefinition>,

    /// Entity type priorities
    #[serde(default)]
    pub priorities: HashMap<String, i32>,

    /// Blacklists keyed by entity type, `"*"` for all types
    #[serde(default)]
    pub blacklists: HashMap<String, BlacklistDefinition>,

    /// Context profiles keyed by entity type
    #[serde(default)]
    pub context: HashMap<String, ContextDefinition>,

    /// Boundary trimming settings
    #[serde(default)]
    pub trimming: Option<TrimmingDefinition>,
}

impl Catalog {
    /// The catalog shipped with the crate
    pub fn default_catalog() -> Result<Self> {
        Self::from_toml(DEFAULT_CATALOG)
    }

    /// Parse a catalog from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        Ok(catalog)
    }

    /// Load a catalog from a file
    ///
    /// # Errors
    ///
    /// An unreadable or malformed file is a configuration error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VeilError::Configuration(format!(
                "Failed to read catalog {}: {e}",
                path.display()
            ))
        })?;
        let catalog = Self::from_toml(&content)?;

        tracing::debug!(
            path = %path.display(),
            rules = catalog.rules.len(),
            "Loaded pattern catalog"
        );
        Ok(catalog)
    }

    /// Append a rule after the existing ones
    ///
    /// # Errors
    ///
    /// Rejects a definition that fails validation or reuses a rule name.
    pub fn add_rule(&mut self, definition: RuleDefinition) -> Result<()> {
        validate_rule_definition(&definition)?;
        if self.rules.iter().any(|r| r.name == definition.name) {
            return Err(VeilError::Configuration(format!(
                "Duplicate rule name '{}'",
                definition.name
            )));
        }
        self.rules.push(definition);
        Ok(())
    }

    /// Entity types produced by the catalog's rules, in first-seen order
    pub fn entity_types(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            let entity_type = rule.entity_type.trim().to_uppercase();
            if !seen.contains(&entity_type) {
                seen.push(entity_type);
            }
        }
        seen
    }
}
