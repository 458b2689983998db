//! Error types for a3s-sds

use thiserror::Error;

/// Errors that can occur while building the index or evaluating records
#[derive(Debug, Error)]
pub enum SdsError {
    /// Configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sensitive species list could not be loaded
    #[error("Taxon source error: {0}")]
    Source(String),

    /// Name resolver rejected a query (malformed name, backend hiccup)
    ///
    /// Treated as "no match" by the index, never fatal.
    #[error("Name resolver error for '{name}': {reason}")]
    Resolver {
        name: String,
        reason: String,
    },

    /// Name resolver is unusable as a whole (index missing, connection gone)
    #[error("Name resolver unavailable: {0}")]
    ResolverUnavailable(String),

    /// Index build aborted
    #[error("Failed to build sensitive taxon index: {0}")]
    IndexBuild(String),

    /// No evaluator registered for any category carried by the taxon
    #[error("No category evaluator registered for taxon '{taxon}' (categories: {categories})")]
    NoEvaluator {
        taxon: String,
        categories: String,
    },

    /// Category evaluator failed for a single record
    #[error("Evaluation failed in category '{category}': {reason}")]
    Evaluation {
        category: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse failure
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdsError {
    /// Whether the error must abort an index build rather than degrade
    pub fn is_fatal_for_build(&self) -> bool {
        matches!(self, Self::ResolverUnavailable(_))
    }
}

/// Result type alias for SDS operations
pub type Result<T> = std::result::Result<T, SdsError>;
