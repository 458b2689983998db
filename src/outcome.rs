//! Validation outcome and report
//!
//! A `ValidationOutcome` is built once per evaluated record and handed
//! to the caller untouched. Message order inside a report is part of the
//! contract: callers index messages by type and position.

use crate::types::SensitivityInstance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a report message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Info,
    Warning,
    Alert,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Alert => write!(f, "ALERT"),
        }
    }
}

/// A human-readable message emitted while evaluating a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_type: MessageType,

    /// Rule or category the message was produced for
    pub category: String,

    pub text: String,
}

impl Message {
    pub fn new(
        message_type: MessageType,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            category: category.into(),
            text: text.into(),
        }
    }
}

/// Summary of why a record was restricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub category: String,

    /// Single human-readable summary
    pub assertion: String,

    /// Messages in emission order
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ValidationReport {
    pub fn new(category: impl Into<String>, assertion: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            assertion: assertion.into(),
            messages: Vec::new(),
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Messages of one type, in emission order
    pub fn messages_by_type(&self, message_type: MessageType) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.message_type == message_type)
            .collect()
    }
}

/// Result of evaluating one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    /// Whether the evaluation itself succeeded (not a sensitivity verdict)
    pub valid: bool,

    pub sensitive: bool,

    pub loadable: bool,

    /// Loadable into a restricted-visibility view only
    pub controlled_access: bool,

    /// Sensitivity instances that applied to the record
    #[serde(default)]
    pub instances: Vec<SensitivityInstance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,

    /// Record facts after suppression/generalisation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self {
            valid: true,
            sensitive: false,
            loadable: false,
            controlled_access: false,
            instances: Vec::new(),
            report: None,
            result: None,
        }
    }
}

impl ValidationOutcome {
    /// A fresh, valid outcome with nothing decided yet
    pub fn new() -> Self {
        Self::default()
    }

    /// A valid outcome carrying `report`
    pub fn with_report(report: ValidationReport) -> Self {
        Self {
            report: Some(report),
            ..Self::default()
        }
    }

    /// Record is not sensitive and loads verbatim
    pub fn pass_through() -> Self {
        Self {
            loadable: true,
            ..Self::default()
        }
    }

    pub fn loadable(mut self, loadable: bool) -> Self {
        self.loadable = loadable;
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    pub fn controlled_access(mut self, controlled_access: bool) -> Self {
        self.controlled_access = controlled_access;
        self
    }

    pub fn with_instances(mut self, instances: Vec<SensitivityInstance>) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_result(mut self, result: serde_json::Map<String, serde_json::Value>) -> Self {
        self.result = Some(result);
        self
    }

    /// Category of the report, if any
    pub fn category(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.category.as_str())
    }
}
