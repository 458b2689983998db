//! Service configuration
//!
//! Loaded once at process start and never reloaded in place. A missing or
//! unparsable file is fatal: running without the flag rules would silently
//! treat every record as non-overridden.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SdsError};
use crate::restrict::DEFAULT_RESTRICTED_FIELDS;

/// Settings for the sensitive data service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdsConfig {
    /// Override rules checked before taxon lookup, in order
    ///
    /// Accepts a list or a comma-separated string.
    #[serde(default, deserialize_with = "string_or_list")]
    pub flag_rules: Vec<String>,

    /// Fields kept on records restricted by a flag rule
    #[serde(default = "default_restricted_fields")]
    pub restricted_fields: Vec<String>,

    /// Message templates keyed by rule or category
    #[serde(default)]
    pub messages: HashMap<String, String>,

    /// Sensitive species list (JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_list: Option<PathBuf>,

    /// Allow a service with no flag rules at all
    #[serde(default)]
    pub allow_empty_flag_rules: bool,
}

fn default_restricted_fields() -> Vec<String> {
    DEFAULT_RESTRICTED_FIELDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SdsConfig {
    fn default() -> Self {
        Self {
            flag_rules: Vec::new(),
            restricted_fields: default_restricted_fields(),
            messages: HashMap::new(),
            species_list: None,
            allow_empty_flag_rules: false,
        }
    }
}

impl SdsConfig {
    /// Default configuration with the given flag rules
    pub fn with_flag_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flag_rules: rules.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.insert(key.into(), template.into());
        self
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SdsError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            flag_rules = ?config.flag_rules,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SdsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline must not run with
    pub fn validate(&self) -> Result<()> {
        if self.flag_rules.is_empty() && !self.allow_empty_flag_rules {
            return Err(SdsError::Config(
                "No flag rules configured (set allow_empty_flag_rules to run without)".to_string(),
            ));
        }
        if let Some(rule) = self.flag_rules.iter().find(|r| r.trim().is_empty()) {
            return Err(SdsError::Config(format!("Blank flag rule '{}'", rule)));
        }
        Ok(())
    }
}

/// Split a comma-separated rule list, dropping blanks
pub fn parse_flag_rules(rules: &str) -> Vec<String> {
    rules
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => parse_flag_rules(&s),
        StringOrList::List(list) => list,
    })
}
