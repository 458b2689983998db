//! In-memory name resolver for development and testing
//!
//! Answers from a fixed table of names and identifiers. Names match
//! case-insensitively; family and rank hints are ignored.

use super::{NameMatch, NameResolver};
use crate::error::{Result, SdsError};
use crate::types::RankType;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Table-backed `NameResolver`
#[derive(Debug, Default)]
pub struct MemoryNameResolver {
    /// lowercase name → match
    by_name: HashMap<String, NameMatch>,

    /// identifier → match
    by_identifier: HashMap<String, NameMatch>,

    /// lowercase names that make the resolver return a query error
    failing: HashSet<String>,

    /// Whether every call reports the backend as unavailable
    unavailable: bool,

    lookups: AtomicUsize,
}

impl MemoryNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted name
    pub fn with_accepted(
        mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
        rank: RankType,
    ) -> Self {
        let m = NameMatch::accepted(identifier, name).with_rank(rank);
        self.insert(m);
        self
    }

    /// Register a synonym of an already (or later) registered accepted name
    pub fn with_synonym(
        mut self,
        name: impl Into<String>,
        identifier: impl Into<String>,
        accepted_identifier: impl Into<String>,
    ) -> Self {
        let m = NameMatch::synonym(identifier, name, accepted_identifier);
        self.insert(m);
        self
    }

    /// Register an arbitrary match, e.g. one with a low-confidence match type
    pub fn with_match(mut self, m: NameMatch) -> Self {
        self.insert(m);
        self
    }

    /// Register a name alias resolving to an existing match under another name
    pub fn with_alias(mut self, alias: &str, m: NameMatch) -> Self {
        self.by_name.insert(alias.to_lowercase(), m);
        self
    }

    /// Make lookups of `name` fail with a query error
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_lowercase());
        self
    }

    /// Make every lookup fail as if the matching index were gone
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Total number of lookups served
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn insert(&mut self, m: NameMatch) {
        self.by_name
            .insert(m.scientific_name.to_lowercase(), m.clone());
        self.by_identifier.insert(m.identifier.clone(), m);
    }

    fn check_available(&self) -> Result<()> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.unavailable {
            return Err(SdsError::ResolverUnavailable(
                "memory resolver marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NameResolver for MemoryNameResolver {
    async fn lookup_name(
        &self,
        name: &str,
        _family: Option<&str>,
        _rank: Option<RankType>,
    ) -> Result<Option<NameMatch>> {
        self.check_available()?;
        let key = name.trim().to_lowercase();
        if self.failing.contains(&key) {
            return Err(SdsError::Resolver {
                name: name.to_string(),
                reason: "query rejected".to_string(),
            });
        }
        Ok(self.by_name.get(&key).cloned())
    }

    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<NameMatch>> {
        self.check_available()?;
        Ok(self.by_identifier.get(identifier).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
