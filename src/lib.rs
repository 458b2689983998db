//! # a3s-sds
//!
//! Sensitive taxon index and record sensitivity decisions for biodiversity
//! data pipelines.
//!
//! ## Overview
//!
//! `a3s-sds` decides whether an occurrence record must be withheld or
//! redacted before publication because it concerns a taxon with
//! conservation, biosecurity or privacy sensitivity. It resolves raw names
//! and identifiers against an index of sensitive taxa (with synonyms
//! consolidated onto their accepted names), applies process-wide flag
//! rules, and dispatches sensitive records to category evaluators.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_sds::{
//!     EvaluatorRegistry, FactMap, MemoryNameResolver, RankType, SdsConfig,
//!     SensitiveDataService, SensitiveTaxon, SensitiveTaxonIndex,
//! };
//!
//! # async fn example() -> a3s_sds::Result<()> {
//! let resolver = Arc::new(
//!     MemoryNameResolver::new().with_accepted("Crex crex", "C1", RankType::Species),
//! );
//! let entries = vec![SensitiveTaxon::new("Crex crex", RankType::Species)];
//! let (index, _diagnostics) = SensitiveTaxonIndex::build(entries, resolver).await?;
//!
//! let service = SensitiveDataService::new(
//!     SdsConfig::with_flag_rules(["pest_flag"]),
//!     index,
//!     EvaluatorRegistry::new(),
//! )?;
//!
//! let outcome = service
//!     .evaluate(&FactMap::new(), Some("Macropus rufus"), None, false)
//!     .await?;
//! assert!(outcome.loadable && !outcome.sensitive);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **NameResolver** trait: boundary to the taxonomic name-matching oracle
//! - **SensitiveTaxonIndex**: build-once, read-many index over the species list
//! - **CategoryEvaluator** trait: per-category rules, selected through `EvaluatorRegistry`
//! - **SensitiveDataService**: flag rules → taxon lookup → evaluator dispatch
//! - **ValidationOutcome**: structured, auditable result per record

pub mod config;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod messages;
pub mod outcome;
pub mod resolver;
pub mod restrict;
pub mod service;
pub mod source;
pub mod types;

// Re-export core types
pub use config::SdsConfig;
pub use error::{Result, SdsError};
pub use evaluator::{CategoryEvaluator, EvaluatorRegistry};
pub use index::{BuildDiagnostics, BuildIssue, SensitiveTaxonIndex};
pub use messages::{MessageCatalog, TemplateCatalog};
pub use outcome::{Message, MessageType, ValidationOutcome, ValidationReport};
pub use resolver::{MatchType, NameMatch, NameResolver};
pub use service::{EvaluationRequest, SensitiveDataService};
pub use source::{JsonFileTaxonSource, MemoryTaxonSource, TaxonSource};
pub use types::{
    CategoryKind, FactMap, InstanceStatus, RankType, SensitiveTaxon, SensitivityCategory,
    SensitivityInstance, SensitivityZone,
};

// Re-export the in-memory resolver for convenience
pub use resolver::memory::MemoryNameResolver;
