//! Message catalog for restriction and report text
//!
//! Templates use positional `{0}`, `{1}` placeholders plus `{key}` for the
//! message key itself. Localization and richer templating belong to the
//! deployment; `TemplateCatalog` covers the configured table.

use std::collections::HashMap;

/// Used when no template is configured for a key
pub const FALLBACK_TEMPLATE: &str = "Record of {0} has been restricted under rule {key}";

/// Source of message text keyed by rule or category
pub trait MessageCatalog: Send + Sync {
    /// Render the message for `key` with positional `args`
    fn text(&self, key: &str, args: &[&str]) -> String;
}

/// Render a template by replacing `{key}` and `{0}..{n}` placeholders
///
/// Single left-to-right pass: substituted text is never rescanned, and
/// unknown placeholders are kept verbatim.
pub fn render(template: &str, key: &str, args: &[&str]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            result.push_str(&rest[open..]);
            return result;
        };
        let token = &after[..close];
        if token.contains('{') {
            result.push('{');
            rest = after;
            continue;
        }
        let value = if token == "key" {
            Some(key)
        } else {
            token.parse::<usize>().ok().and_then(|i| args.get(i).copied())
        };
        match value {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);
    result
}

/// Table-backed catalog
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, String>,
}

impl TemplateCatalog {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn with_template(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }
}

impl MessageCatalog for TemplateCatalog {
    fn text(&self, key: &str, args: &[&str]) -> String {
        let template = match self.templates.get(key) {
            Some(t) => t.as_str(),
            None => {
                tracing::debug!(key = %key, "No message template configured, using fallback");
                FALLBACK_TEMPLATE
            }
        };
        render(template, key, args)
    }
}
