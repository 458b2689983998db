//! Category evaluators and their registry
//!
//! Zone intersection, eradication windows and message wording live in
//! `CategoryEvaluator` implementations supplied by the deployment. The
//! registry maps each `CategoryKind` to at most one evaluator and selects
//! one for a taxon by kind precedence.

use crate::error::{Result, SdsError};
use crate::outcome::ValidationOutcome;
use crate::types::{CategoryKind, FactMap, SensitiveTaxon};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Evaluates a record of a sensitive taxon against one category of rules
#[async_trait]
pub trait CategoryEvaluator: Send + Sync {
    /// Produce the outcome for a record of `taxon`
    ///
    /// `samples_provided` tells the evaluator the caller already attached
    /// sampled/derived geographic values to `facts`.
    async fn validate(
        &self,
        taxon: &SensitiveTaxon,
        facts: &FactMap,
        samples_provided: bool,
    ) -> Result<ValidationOutcome>;

    /// Evaluator name for logs
    fn name(&self) -> &str;
}

/// Closed mapping from category kind to evaluator
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<CategoryKind, Arc<dyn CategoryEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the evaluator for `kind`, replacing any previous one
    pub fn register(&mut self, kind: CategoryKind, evaluator: Arc<dyn CategoryEvaluator>) {
        tracing::debug!(kind = %kind, evaluator = %evaluator.name(), "Category evaluator registered");
        self.evaluators.insert(kind, evaluator);
    }

    pub fn with(mut self, kind: CategoryKind, evaluator: impl CategoryEvaluator + 'static) -> Self {
        self.register(kind, Arc::new(evaluator));
        self
    }

    pub fn get(&self, kind: CategoryKind) -> Option<Arc<dyn CategoryEvaluator>> {
        self.evaluators.get(&kind).cloned()
    }

    /// Kinds with a registered evaluator, in precedence order
    pub fn kinds(&self) -> Vec<CategoryKind> {
        self.evaluators.keys().copied().collect()
    }

    /// Pick the evaluator for the highest-precedence kind the taxon carries
    pub fn select(&self, taxon: &SensitiveTaxon) -> Result<Arc<dyn CategoryEvaluator>> {
        let kinds = taxon.category_kinds();
        for kind in &kinds {
            if let Some(evaluator) = self.evaluators.get(kind) {
                return Ok(evaluator.clone());
            }
        }

        let categories = if kinds.is_empty() {
            "none".to_string()
        } else {
            kinds
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Err(SdsError::NoEvaluator {
            taxon: taxon.name.clone(),
            categories,
        })
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: BTreeMap<_, _> = self
            .evaluators
            .iter()
            .map(|(k, e)| (*k, e.name().to_string()))
            .collect();
        f.debug_struct("EvaluatorRegistry")
            .field("evaluators", &names)
            .finish()
    }
}
