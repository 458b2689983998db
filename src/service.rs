//! Sensitive data service: the per-record decision pipeline
//!
//! Each evaluation runs three stages and stops at the first terminal one:
//!
//! 1. **Override**: the first configured flag rule present in the facts
//!    restricts the record outright.
//! 2. **Resolve**: find the sensitive taxon by identifier, then by name.
//! 3. **Dispatch**: hand the record to the evaluator for the taxon's
//!    categories and return its outcome unchanged.
//!
//! Records matching no rule and no taxon pass through untouched.

use crate::config::SdsConfig;
use crate::error::{Result, SdsError};
use crate::evaluator::EvaluatorRegistry;
use crate::index::{BuildDiagnostics, SensitiveTaxonIndex};
use crate::messages::{MessageCatalog, TemplateCatalog};
use crate::outcome::{Message, MessageType, ValidationOutcome, ValidationReport};
use crate::resolver::NameResolver;
use crate::restrict::{has_value, restrict_to_allowed};
use crate::source::JsonFileTaxonSource;
use crate::types::{FactMap, SensitiveTaxon};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One record to evaluate
#[derive(Debug, Clone, Default)]
pub struct EvaluationRequest {
    pub facts: FactMap,

    /// Raw scientific name; used only if the identifier finds nothing
    pub scientific_name: Option<String>,

    /// Matched taxon identifier, saves a name lookup
    pub taxon_id: Option<String>,

    /// Caller already attached sampled geographic values to the facts
    pub samples_provided: bool,
}

impl EvaluationRequest {
    pub fn new(facts: FactMap) -> Self {
        Self {
            facts,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.scientific_name = Some(name.into());
        self
    }

    pub fn with_taxon_id(mut self, taxon_id: impl Into<String>) -> Self {
        self.taxon_id = Some(taxon_id.into());
        self
    }

    pub fn with_samples_provided(mut self, samples_provided: bool) -> Self {
        self.samples_provided = samples_provided;
        self
    }
}

/// Decision pipeline over a shared, swappable taxon index
///
/// Configuration and evaluators are fixed for the service's lifetime. The
/// index may be replaced atomically; an evaluation in flight keeps the
/// snapshot it started with.
pub struct SensitiveDataService {
    index: RwLock<Arc<SensitiveTaxonIndex>>,
    registry: EvaluatorRegistry,
    config: SdsConfig,
    catalog: Arc<dyn MessageCatalog>,
}

impl SensitiveDataService {
    /// Create a service, refusing configurations without flag rules
    pub fn new(
        config: SdsConfig,
        index: SensitiveTaxonIndex,
        registry: EvaluatorRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(TemplateCatalog::new(config.messages.clone()));

        tracing::info!(
            taxa = index.len(),
            flag_rules = ?config.flag_rules,
            evaluators = ?registry.kinds(),
            "Sensitive data service ready"
        );

        Ok(Self {
            index: RwLock::new(Arc::new(index)),
            registry,
            config,
            catalog,
        })
    }

    /// Build the index from the configured species list and create a service
    pub async fn from_config(
        config: SdsConfig,
        resolver: Arc<dyn NameResolver>,
        registry: EvaluatorRegistry,
    ) -> Result<(Self, BuildDiagnostics)> {
        config.validate()?;
        let path = config.species_list.clone().ok_or_else(|| {
            SdsError::Config("species_list is not configured".to_string())
        })?;
        let source = JsonFileTaxonSource::new(path);
        let (index, diagnostics) =
            SensitiveTaxonIndex::build_from_source(&source, resolver).await?;
        let service = Self::new(config, index, registry)?;
        Ok((service, diagnostics))
    }

    /// Replace the message catalog built from the configured templates
    pub fn with_catalog(mut self, catalog: impl MessageCatalog + 'static) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn config(&self) -> &SdsConfig {
        &self.config
    }

    /// Current index snapshot
    pub async fn index(&self) -> Arc<SensitiveTaxonIndex> {
        self.index.read().await.clone()
    }

    /// Swap in a freshly built index, returning the previous one
    pub async fn replace_index(&self, index: SensitiveTaxonIndex) -> Arc<SensitiveTaxonIndex> {
        let taxa = index.len();
        let previous = {
            let mut current = self.index.write().await;
            std::mem::replace(&mut *current, Arc::new(index))
        };
        tracing::info!(
            previous = previous.len(),
            taxa,
            "Sensitive taxon index replaced"
        );
        previous
    }

    /// Evaluate one record
    ///
    /// Errors come only from the category evaluator (or a taxon with no
    /// evaluator for its categories); they are fatal for this record only.
    pub async fn evaluate(
        &self,
        facts: &FactMap,
        scientific_name: Option<&str>,
        taxon_id: Option<&str>,
        samples_provided: bool,
    ) -> Result<ValidationOutcome> {
        if let Some(rule) = self
            .config
            .flag_rules
            .iter()
            .find(|rule| has_value(facts, rule))
        {
            tracing::debug!(rule = %rule, name = ?scientific_name, "Record restricted by flag rule");
            return Ok(self.restrict_record(facts, rule, scientific_name));
        }

        let index = self.index().await;
        let Some(taxon) = lookup(&index, scientific_name, taxon_id).await else {
            tracing::trace!(name = ?scientific_name, taxon_id = ?taxon_id, "Taxon not sensitive");
            return Ok(ValidationOutcome::pass_through());
        };

        let evaluator = self.registry.select(taxon)?;
        tracing::debug!(
            taxon = %taxon.name,
            evaluator = %evaluator.name(),
            "Dispatching sensitive record"
        );
        evaluator.validate(taxon, facts, samples_provided).await
    }

    /// Evaluate a request
    pub async fn evaluate_request(&self, request: &EvaluationRequest) -> Result<ValidationOutcome> {
        self.evaluate(
            &request.facts,
            request.scientific_name.as_deref(),
            request.taxon_id.as_deref(),
            request.samples_provided,
        )
        .await
    }

    /// Evaluate independent records concurrently
    ///
    /// Results are in request order; one record failing does not affect
    /// the others.
    pub async fn evaluate_batch(
        &self,
        requests: &[EvaluationRequest],
    ) -> Vec<Result<ValidationOutcome>> {
        join_all(requests.iter().map(|r| self.evaluate_request(r))).await
    }

    /// The sensitive taxon for a name/identifier pair, if any
    pub async fn find_sensitive_taxon(
        &self,
        scientific_name: Option<&str>,
        taxon_id: Option<&str>,
    ) -> Option<SensitiveTaxon> {
        let index = self.index().await;
        lookup(&index, scientific_name, taxon_id).await.cloned()
    }

    pub async fn is_taxon_sensitive(
        &self,
        scientific_name: Option<&str>,
        taxon_id: Option<&str>,
    ) -> bool {
        let index = self.index().await;
        lookup(&index, scientific_name, taxon_id).await.is_some()
    }

    fn restrict_record(
        &self,
        facts: &FactMap,
        rule: &str,
        scientific_name: Option<&str>,
    ) -> ValidationOutcome {
        let text = self.catalog.text(rule, &[scientific_name.unwrap_or_default()]);
        let report = ValidationReport::new(rule, text.clone())
            .with_message(Message::new(MessageType::Info, rule, text));

        ValidationOutcome::with_report(report)
            .loadable(true)
            .with_result(restrict_to_allowed(facts, &self.config.restricted_fields))
    }
}

/// Identifier first, then name; synonyms are answered with their accepted entry
async fn lookup<'a>(
    index: &'a SensitiveTaxonIndex,
    scientific_name: Option<&str>,
    taxon_id: Option<&str>,
) -> Option<&'a SensitiveTaxon> {
    let mut taxon = None;
    if let Some(id) = taxon_id.filter(|id| !id.trim().is_empty()) {
        taxon = index.find_by_identifier(id);
    }
    if taxon.is_none() {
        if let Some(name) = scientific_name.filter(|n| !n.trim().is_empty()) {
            taxon = index.find_by_name(name).await;
        }
    }
    taxon.map(|t| index.canonical(t))
}

impl std::fmt::Debug for SensitiveDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensitiveDataService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
