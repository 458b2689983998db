//! Fact-map redaction
//!
//! Restricted records keep only their classification and attribution
//! fields. Location, dates and collector details are dropped.

use crate::types::FactMap;
use serde_json::{Map, Value};

/// Classification/attribution fields retained on restricted records
pub const DEFAULT_RESTRICTED_FIELDS: &[&str] = &[
    "scientificName",
    "vernacularName",
    "taxonConceptID",
    "taxonRank",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "specificEpithet",
    "infraspecificEpithet",
    "dataResourceUid",
    "dataProviderUid",
    "institutionCode",
    "collectionCode",
    "basisOfRecord",
    "license",
    "rightsHolder",
];

/// Copy of `facts` holding only keys in `allowed`
pub fn restrict_to_allowed<S: AsRef<str>>(facts: &FactMap, allowed: &[S]) -> Map<String, Value> {
    facts
        .iter()
        .filter(|(key, _)| allowed.iter().any(|a| a.as_ref() == key.as_str()))
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

/// Whether a fact is present with a non-blank value
pub fn has_value(facts: &FactMap, key: &str) -> bool {
    facts.get(key).map_or(false, |v| !v.trim().is_empty())
}
