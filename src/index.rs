//! Sensitive taxon index: resolve, consolidate and search the species list
//!
//! The index is built in two phases. During staging every raw entry is
//! matched against the `NameResolver`, synonyms are pointed at their
//! accepted taxon and missing accepted taxa are synthesized. The staged
//! entries are then sorted by `(case-insensitive name, rank)`, synonym
//! instances are merged into their accepted entry, and the result is frozen
//! into an arena that is never mutated again.
//!
//! Build problems never abort the build unless the resolver reports itself
//! unavailable: they are logged and collected in `BuildDiagnostics`.

use crate::error::{Result, SdsError};
use crate::resolver::{MatchType, NameMatch, NameResolver};
use crate::source::TaxonSource;
use crate::types::{compare_names, RankType, SensitiveTaxon};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A non-fatal problem found while building the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildIssue {
    /// Resolver found nothing for the name
    Unmatched { name: String },

    /// Resolver only produced a low-confidence match, which was discarded
    InaccurateMatch { name: String, match_type: MatchType },

    /// Resolver rejected the query
    ResolverError { name: String, reason: String },

    /// Synonym whose accepted taxon the resolver cannot find
    MissingAcceptedTaxon {
        name: String,
        accepted_identifier: String,
    },

    /// Synonym whose accepted entry is absent from the frozen list
    AcceptedNotInList { name: String, accepted_name: String },
}

impl BuildIssue {
    /// Errors point at broken taxonomy; warnings at names needing follow-up
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Unmatched { .. })
    }

    /// Name of the list entry the issue is about
    pub fn name(&self) -> &str {
        match self {
            Self::Unmatched { name }
            | Self::InaccurateMatch { name, .. }
            | Self::ResolverError { name, .. }
            | Self::MissingAcceptedTaxon { name, .. }
            | Self::AcceptedNotInList { name, .. } => name,
        }
    }
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmatched { name } => {
                write!(f, "Sensitive species '{}' not found in name matching index", name)
            }
            Self::InaccurateMatch { name, match_type } => {
                write!(f, "Inaccurate match type {} for '{}'", match_type, name)
            }
            Self::ResolverError { name, reason } => {
                write!(f, "Error searching for '{}': {}", name, reason)
            }
            Self::MissingAcceptedTaxon {
                name,
                accepted_identifier,
            } => write!(
                f,
                "Could not find accepted name for synonym '{}' ({})",
                name, accepted_identifier
            ),
            Self::AcceptedNotInList {
                name,
                accepted_name,
            } => write!(
                f,
                "Accepted taxon '{}' of '{}' not found in taxon list",
                accepted_name, name
            ),
        }
    }
}

/// Everything the build had to degrade on, plus a few counters
#[derive(Debug, Clone, Default)]
pub struct BuildDiagnostics {
    pub issues: Vec<BuildIssue>,

    /// Entries the resolver matched with acceptable confidence
    pub resolved: usize,

    /// Entries recognised as synonyms of another taxon
    pub synonyms: usize,

    /// Accepted taxa added because the list did not contain them
    pub synthesized: usize,
}

impl BuildDiagnostics {
    fn record(&mut self, issue: BuildIssue) {
        if issue.is_error() {
            tracing::error!(name = %issue.name(), "{}", issue);
        } else {
            tracing::warn!(name = %issue.name(), "{}", issue);
        }
        self.issues.push(issue);
    }

    /// Names the resolver could not match at all
    pub fn unmatched(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|i| matches!(i, BuildIssue::Unmatched { .. }))
            .map(|i| i.name())
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len() - self.error_count()
    }
}

enum Resolution {
    Matched(NameMatch),
    Inaccurate(MatchType),
    Unmatched,
}

async fn resolve(
    resolver: &dyn NameResolver,
    name: &str,
    family: Option<&str>,
    rank: Option<RankType>,
) -> Result<Resolution> {
    match resolver.lookup_name(name, family, rank).await? {
        Some(m) if m.match_type.is_inaccurate() => Ok(Resolution::Inaccurate(m.match_type)),
        Some(m) => {
            if !m.issues.is_empty() {
                tracing::warn!(name = %name, issues = ?m.issues, "Name search contains flags");
            }
            Ok(Resolution::Matched(m))
        }
        None => Ok(Resolution::Unmatched),
    }
}

/// Position of the best entry named `name` (case-insensitive)
///
/// Entries with equal normalized names are contiguous under the index
/// order. Among them an accepted entry at the rank implied by the name wins,
/// then any accepted entry, then the first one.
fn exact_position(taxa: &[SensitiveTaxon], name: &str) -> Option<usize> {
    let start = taxa.partition_point(|t| compare_names(&t.name, name) == Ordering::Less);
    let len = taxa[start..]
        .iter()
        .take_while(|t| compare_names(&t.name, name) == Ordering::Equal)
        .count();
    if len == 0 {
        return None;
    }

    let range = start..start + len;
    let probe = RankType::for_name(name);
    range
        .clone()
        .find(|&k| taxa[k].rank == probe && !taxa[k].is_synonym())
        .or_else(|| range.clone().find(|&k| !taxa[k].is_synonym()))
        .or(Some(start))
}

/// Whether an accepted entry for `accepted` is already staged
///
/// Runs after every listed entry is resolved, so a listed accepted entry is
/// found by identifier wherever it sits in the list.
fn has_local_entry(staging: &[SensitiveTaxon], accepted: &NameMatch) -> bool {
    staging.iter().any(|t| {
        !t.is_synonym()
            && (t.resolved_identifier() == Some(accepted.identifier.as_str())
                || compare_names(&t.name, &accepted.scientific_name) == Ordering::Equal)
    })
}

/// Read-only index over the sensitive species list
///
/// Safe to share between tasks once built; all lookups take `&self`.
pub struct SensitiveTaxonIndex {
    /// Entries sorted by (case-insensitive name, rank)
    taxa: Vec<SensitiveTaxon>,

    /// identifier → slot
    by_identifier: HashMap<String, usize>,

    /// accepted name → slot (accepted entries with an identifier only)
    by_accepted_name: HashMap<String, usize>,

    resolver: Arc<dyn NameResolver>,
}

impl SensitiveTaxonIndex {
    /// An index with no entries
    pub fn empty(resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            taxa: Vec::new(),
            by_identifier: HashMap::new(),
            by_accepted_name: HashMap::new(),
            resolver,
        }
    }

    /// Load the list from `source` and build the index from it
    pub async fn build_from_source(
        source: &dyn TaxonSource,
        resolver: Arc<dyn NameResolver>,
    ) -> Result<(Self, BuildDiagnostics)> {
        let entries = source.load()?;
        Self::build(entries, resolver).await
    }

    /// Resolve, consolidate and freeze `entries`
    ///
    /// Fails only if the resolver reports itself unavailable.
    pub async fn build(
        entries: Vec<SensitiveTaxon>,
        resolver: Arc<dyn NameResolver>,
    ) -> Result<(Self, BuildDiagnostics)> {
        let mut diagnostics = BuildDiagnostics::default();
        let mut staging = entries;
        let mut pending: Vec<NameMatch> = Vec::new();
        // identifier → scientific name as the resolver spells it
        let mut resolved_names: HashMap<String, String> = HashMap::new();

        tracing::info!(
            entries = staging.len(),
            resolver = %resolver.name(),
            "Building sensitive taxon index"
        );

        for i in 0..staging.len() {
            let matched = {
                let st = &staging[i];
                match resolve(resolver.as_ref(), &st.name, st.family.as_deref(), Some(st.rank))
                    .await
                {
                    Ok(Resolution::Matched(m)) => m,
                    Ok(Resolution::Inaccurate(match_type)) => {
                        diagnostics.record(BuildIssue::InaccurateMatch {
                            name: st.name.clone(),
                            match_type,
                        });
                        continue;
                    }
                    Ok(Resolution::Unmatched) => {
                        diagnostics.record(BuildIssue::Unmatched {
                            name: st.name.clone(),
                        });
                        continue;
                    }
                    Err(e) => {
                        recover(e, &st.name, &mut diagnostics)?;
                        continue;
                    }
                }
            };
            diagnostics.resolved += 1;

            if !matched.is_synonym {
                tracing::debug!(
                    name = %staging[i].name,
                    identifier = %matched.identifier,
                    "Sensitive species resolved"
                );
                resolved_names
                    .entry(matched.identifier.clone())
                    .or_insert_with(|| matched.scientific_name.clone());
                staging[i].identifier = Some(matched.identifier);
                continue;
            }

            let accepted = match resolver.accepted_form(matched.clone()).await {
                Ok(Some(accepted)) => accepted,
                Ok(None) => {
                    diagnostics.record(BuildIssue::MissingAcceptedTaxon {
                        name: staging[i].name.clone(),
                        accepted_identifier: matched.accepted_identifier.clone().unwrap_or_default(),
                    });
                    staging[i].identifier = Some(matched.identifier);
                    continue;
                }
                Err(e) => {
                    recover(e, &staging[i].name, &mut diagnostics)?;
                    staging[i].identifier = Some(matched.identifier);
                    continue;
                }
            };

            // Synonyms always carry the accepted identifier
            staging[i].identifier = Some(accepted.identifier.clone());
            resolved_names
                .entry(accepted.identifier.clone())
                .or_insert_with(|| accepted.scientific_name.clone());

            // A naked-name synonym shares its accepted taxon's name: the
            // entry already is the accepted taxon.
            if compare_names(&accepted.scientific_name, &staging[i].name) == Ordering::Equal {
                tracing::debug!(
                    name = %staging[i].name,
                    identifier = %accepted.identifier,
                    "Synonym shares accepted name, treating as accepted"
                );
                continue;
            }

            staging[i].accepted_name = Some(accepted.scientific_name.clone());
            diagnostics.synonyms += 1;
            tracing::info!(
                name = %staging[i].name,
                accepted = %accepted.scientific_name,
                identifier = %accepted.identifier,
                "Sensitive species is not accepted name"
            );

            pending.push(accepted);
        }

        for accepted in pending {
            if has_local_entry(&staging, &accepted) {
                continue;
            }
            let rank = RankType::for_name(&accepted.scientific_name);
            tracing::info!(
                accepted = %accepted.scientific_name,
                identifier = %accepted.identifier,
                "Accepted name added to sensitive taxon list"
            );
            staging.push(
                SensitiveTaxon::new(accepted.scientific_name, rank)
                    .with_identifier(accepted.identifier),
            );
            diagnostics.synthesized += 1;
        }

        staging.sort_by(|a, b| a.order(b));

        // Accepted entries own their identifiers
        let mut by_identifier: HashMap<String, usize> = HashMap::new();
        for (i, taxon) in staging.iter().enumerate() {
            if let (false, Some(id)) = (taxon.is_synonym(), taxon.resolved_identifier()) {
                by_identifier.insert(id.to_string(), i);
            }
        }

        for i in 0..staging.len() {
            let Some(accepted_name) = staging[i].accepted_name.clone() else {
                continue;
            };
            let canonical = staging[i]
                .resolved_identifier()
                .and_then(|id| by_identifier.get(id).copied())
                .or_else(|| {
                    exact_position(&staging, &accepted_name).filter(|&j| !staging[j].is_synonym())
                });

            match canonical {
                Some(j) if j != i => {
                    if staging[j].resolved_identifier().is_none() {
                        // Listed accepted entry the resolver did not match itself
                        if let Some(id) = staging[i].resolved_identifier().map(str::to_string) {
                            tracing::debug!(
                                name = %staging[j].name,
                                identifier = %id,
                                "Accepted entry takes identifier from its synonym"
                            );
                            staging[j].identifier = Some(id.clone());
                            by_identifier.insert(id, j);
                        }
                    }
                    let instances = staging[i].instances.clone();
                    for si in instances {
                        staging[j].add_instance(si);
                    }
                    staging[i].accepted_entry = Some(j);
                }
                _ => diagnostics.record(BuildIssue::AcceptedNotInList {
                    name: staging[i].name.clone(),
                    accepted_name,
                }),
            }
        }

        // Synonyms keep identifiers no accepted entry claimed
        for (i, taxon) in staging.iter().enumerate() {
            if let (true, Some(id)) = (taxon.is_synonym(), taxon.resolved_identifier()) {
                by_identifier.entry(id.to_string()).or_insert(i);
            }
        }

        let mut by_accepted_name: HashMap<String, usize> = HashMap::new();
        for (i, taxon) in staging.iter().enumerate() {
            if !taxon.is_synonym() && taxon.resolved_identifier().is_some() {
                by_accepted_name.insert(taxon.name.clone(), i);
                tracing::trace!(name = %taxon.name, "Added to accepted name map");
            }
        }
        // Listed names may differ from the resolver's spelling (e.g. authorship)
        for (i, taxon) in staging.iter().enumerate() {
            if taxon.is_synonym() {
                continue;
            }
            if let Some(resolved) = taxon.resolved_identifier().and_then(|id| resolved_names.get(id)) {
                by_accepted_name.entry(resolved.clone()).or_insert(i);
            }
        }

        tracing::info!(
            taxa = staging.len(),
            resolved = diagnostics.resolved,
            synonyms = diagnostics.synonyms,
            synthesized = diagnostics.synthesized,
            warnings = diagnostics.warning_count(),
            errors = diagnostics.error_count(),
            "Sensitive taxon index built"
        );

        let index = Self {
            taxa: staging,
            by_identifier,
            by_accepted_name,
            resolver,
        };
        Ok((index, diagnostics))
    }

    /// Look up an entry by stable taxon identifier
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&SensitiveTaxon> {
        self.by_identifier.get(identifier).map(|&i| &self.taxa[i])
    }

    /// Look up an accepted entry by accepted name
    ///
    /// Returns `None` for synonyms and unknown names.
    pub fn find_by_accepted_name(&self, accepted_name: &str) -> Option<&SensitiveTaxon> {
        self.by_accepted_name
            .get(accepted_name)
            .map(|&i| &self.taxa[i])
    }

    /// Binary search for an entry whose name equals `name` ignoring case
    ///
    /// The query is compared as given; surrounding whitespace is not ignored.
    pub fn find_by_exact_match(&self, name: &str) -> Option<&SensitiveTaxon> {
        if name.trim().is_empty() {
            return None;
        }
        exact_position(&self.taxa, name).map(|i| &self.taxa[i])
    }

    /// Find the entry for a raw name, following synonymy through the resolver
    ///
    /// Resolver failures degrade to an exact-match search on the raw name.
    pub async fn find_by_name(&self, name: &str) -> Option<&SensitiveTaxon> {
        let accepted = self.accepted_name_for(name).await;
        let key = accepted.as_deref().unwrap_or(name);
        match self.find_by_accepted_name(key) {
            Some(taxon) => Some(taxon),
            None => self.find_by_exact_match(name),
        }
    }

    /// The accepted entry a synonym entry was merged into, or the entry itself
    pub fn canonical<'a>(&'a self, taxon: &'a SensitiveTaxon) -> &'a SensitiveTaxon {
        taxon
            .accepted_entry
            .and_then(|j| self.taxa.get(j))
            .unwrap_or(taxon)
    }

    /// Entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &SensitiveTaxon> {
        self.taxa.iter()
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    /// Name of the resolver the index was built with
    pub fn resolver_name(&self) -> &str {
        self.resolver.name()
    }

    async fn accepted_name_for(&self, name: &str) -> Option<String> {
        let matched = match resolve(self.resolver.as_ref(), name, None, None).await {
            Ok(Resolution::Matched(m)) => m,
            Ok(Resolution::Inaccurate(match_type)) => {
                tracing::debug!(name = %name, match_type = %match_type, "Ignoring inaccurate match");
                return None;
            }
            Ok(Resolution::Unmatched) => return None,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Name lookup failed, falling back to exact match");
                return None;
            }
        };

        match self.resolver.accepted_form(matched).await {
            Ok(accepted) => accepted.map(|a| a.scientific_name),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Accepted name lookup failed, falling back to exact match");
                None
            }
        }
    }
}

/// Degrade a resolver error during build, or abort if it is fatal
fn recover(e: SdsError, name: &str, diagnostics: &mut BuildDiagnostics) -> Result<()> {
    if e.is_fatal_for_build() {
        return Err(SdsError::IndexBuild(format!(
            "resolver failed while matching '{}': {}",
            name, e
        )));
    }
    diagnostics.record(BuildIssue::ResolverError {
        name: name.to_string(),
        reason: e.to_string(),
    });
    Ok(())
}

impl fmt::Debug for SensitiveTaxonIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensitiveTaxonIndex")
            .field("taxa", &self.taxa.len())
            .field("identifiers", &self.by_identifier.len())
            .field("accepted_names", &self.by_accepted_name.len())
            .field("resolver", &self.resolver.name())
            .finish()
    }
}
