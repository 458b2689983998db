//! Name resolver trait, the boundary to the taxonomic name-matching oracle
//!
//! The fuzzy, phonetic and vernacular matching machinery lives behind
//! `NameResolver`. The index only consumes its answers and decides which of
//! them are trustworthy enough for a sensitivity decision.

use crate::error::Result;
use crate::types::RankType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod memory;

/// How the oracle arrived at a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    Exact,
    Canonical,
    Phrase,
    /// Matched on the supplied identifier
    TaxonId,
    /// Fell back to a higher taxon
    Recursive,
    /// Phonetic match
    Soundex,
    /// Matched a common name
    Vernacular,
}

impl MatchType {
    /// Low-confidence match types are discarded: a weak match must never
    /// drive a sensitivity decision.
    pub fn is_inaccurate(&self) -> bool {
        matches!(self, Self::Recursive | Self::Soundex | Self::Vernacular)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Canonical => write!(f, "canonical"),
            Self::Phrase => write!(f, "phrase"),
            Self::TaxonId => write!(f, "taxonId"),
            Self::Recursive => write!(f, "recursive"),
            Self::Soundex => write!(f, "soundex"),
            Self::Vernacular => write!(f, "vernacular"),
        }
    }
}

/// A match returned by the name resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMatch {
    /// Identifier of the matched name (the synonym's own id for synonyms)
    pub identifier: String,

    /// Scientific name of the matched taxon
    pub scientific_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<RankType>,

    #[serde(default)]
    pub is_synonym: bool,

    /// Identifier of the accepted taxon when `is_synonym` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_identifier: Option<String>,

    pub match_type: MatchType,

    /// Flags raised by the name search (homonym, affix, misapplied, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl NameMatch {
    /// An exact match on an accepted name
    pub fn accepted(identifier: impl Into<String>, scientific_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            scientific_name: scientific_name.into(),
            rank: None,
            is_synonym: false,
            accepted_identifier: None,
            match_type: MatchType::Exact,
            issues: Vec::new(),
        }
    }

    /// An exact match on a synonym pointing at `accepted_identifier`
    pub fn synonym(
        identifier: impl Into<String>,
        scientific_name: impl Into<String>,
        accepted_identifier: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            scientific_name: scientific_name.into(),
            rank: None,
            is_synonym: true,
            accepted_identifier: Some(accepted_identifier.into()),
            match_type: MatchType::Exact,
            issues: Vec::new(),
        }
    }

    pub fn with_rank(mut self, rank: RankType) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    /// Attach a name-search flag
    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }
}

/// Core trait for taxonomic name-matching backends
///
/// Implementations return `Ok(None)` when nothing is found. `Err` is
/// reserved for malformed queries or backend failures; the index treats
/// `SdsError::Resolver` as "unmatched" and only aborts a build on
/// `SdsError::ResolverUnavailable`.
///
/// The index calls the resolver from a single task while building, but
/// `find_by_name` may call it concurrently from many tasks afterwards.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Match a scientific name, optionally narrowed by family and rank
    async fn lookup_name(
        &self,
        name: &str,
        family: Option<&str>,
        rank: Option<RankType>,
    ) -> Result<Option<NameMatch>>;

    /// Look up a taxon by its stable identifier
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<NameMatch>>;

    /// Resolver name (e.g., "memory", "ala-namematching")
    fn name(&self) -> &str;

    /// Follow a synonym match to its accepted taxon
    ///
    /// Non-synonym matches are returned unchanged. Default implementation
    /// looks up `accepted_identifier` by identifier.
    async fn accepted_form(&self, matched: NameMatch) -> Result<Option<NameMatch>> {
        if !matched.is_synonym {
            return Ok(Some(matched));
        }
        let Some(accepted_id) = matched.accepted_identifier.as_deref() else {
            tracing::error!(
                name = %matched.scientific_name,
                identifier = %matched.identifier,
                "Synonym match carries no accepted identifier"
            );
            return Ok(None);
        };
        let accepted = self.lookup_by_identifier(accepted_id).await?;
        if accepted.is_none() {
            tracing::error!(
                name = %matched.scientific_name,
                identifier = %matched.identifier,
                accepted = %accepted_id,
                "Could not find accepted name for synonym"
            );
        }
        Ok(accepted)
    }
}
