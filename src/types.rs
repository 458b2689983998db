//! Core sensitive-taxon types for the a3s-sds system
//!
//! All serializable types use camelCase JSON for compatibility with the
//! published sensitive species lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Raw record facts keyed by Darwin Core term
///
/// Ordered so that outcomes built from the same facts compare equal.
pub type FactMap = BTreeMap<String, String>;

/// Well-known fact keys
pub mod facts {
    pub const SCIENTIFIC_NAME: &str = "scientificName";
    pub const TAXON_CONCEPT_ID: &str = "taxonConceptID";
    pub const DECIMAL_LATITUDE: &str = "decimalLatitude";
    pub const DECIMAL_LONGITUDE: &str = "decimalLongitude";
    pub const EVENT_DATE: &str = "eventDate";
    pub const STATE_PROVINCE: &str = "stateProvince";
    pub const COUNTRY: &str = "country";
    pub const DATA_RESOURCE_UID: &str = "dataResourceUid";
}

/// Taxonomic rank
///
/// Declaration order is the rank order used as the tie-breaker when two
/// entries share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankType {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Subspecies,
    Variety,
    Form,
    Unranked,
}

impl RankType {
    /// Rank implied by the shape of a bare name: a binomial or longer is
    /// treated as species level, a single word as genus level.
    pub fn for_name(name: &str) -> Self {
        if name.trim().contains(' ') {
            Self::Species
        } else {
            Self::Genus
        }
    }
}

impl fmt::Display for RankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kingdom => "kingdom",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Order => "order",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Species => "species",
            Self::Subspecies => "subspecies",
            Self::Variety => "variety",
            Self::Form => "form",
            Self::Unranked => "unranked",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RankType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kingdom" => Ok(Self::Kingdom),
            "phylum" => Ok(Self::Phylum),
            "class" => Ok(Self::Class),
            "order" => Ok(Self::Order),
            "family" => Ok(Self::Family),
            "genus" => Ok(Self::Genus),
            "species" => Ok(Self::Species),
            "subspecies" | "ssp" | "subsp" => Ok(Self::Subspecies),
            "variety" | "var" => Ok(Self::Variety),
            "form" | "forma" => Ok(Self::Form),
            "unranked" => Ok(Self::Unranked),
            other => Err(format!("Unknown rank '{}'", other)),
        }
    }
}

/// Kind of sensitivity rule a category belongs to
///
/// Declaration order is dispatch precedence: when a taxon carries
/// instances of several kinds, the first kind with a registered evaluator
/// wins. Biosecurity kinds come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryKind {
    PlantPest,
    AnimalPest,
    Personal,
    Conservation,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlantPest => write!(f, "plantPest"),
            Self::AnimalPest => write!(f, "animalPest"),
            Self::Personal => write!(f, "personal"),
            Self::Conservation => write!(f, "conservation"),
        }
    }
}

/// A sensitivity category (e.g. "EN", "PBC7") and the kind of rule it implies
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityCategory {
    /// Category code as published by the authority
    pub value: String,
    pub kind: CategoryKind,
}

impl SensitivityCategory {
    /// Create a category from its published code
    pub fn new(value: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

/// Geographic zone a sensitivity instance applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityZone {
    /// Zone code (e.g. "NSW", "PFFPQA1995")
    pub id: String,

    /// Display name
    pub name: String,
}

/// Whether the instance describes a live concern or a past one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    /// Sensitivity applies now
    #[default]
    Current,
    /// Pest believed eradicated after a campaign
    Eradicated,
    /// No longer in force, kept for the record
    Historical,
}

/// One applicability record for a sensitive taxon
///
/// Compared by value; merges across synonym/accepted pairs skip equal
/// instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityInstance {
    pub category: SensitivityCategory,

    /// Authority that declared the sensitivity
    pub authority: String,

    /// Zone the instance is limited to; `None` means everywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<SensitivityZone>,

    /// First day the instance applies (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,

    /// Last day the instance applies (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,

    #[serde(default)]
    pub status: InstanceStatus,

    /// Why the authority listed the taxon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl SensitivityInstance {
    /// Create a current, unbounded instance for `category`
    pub fn new(category: SensitivityCategory, authority: impl Into<String>) -> Self {
        Self {
            category,
            authority: authority.into(),
            zone: None,
            from_date: None,
            to_date: None,
            status: InstanceStatus::Current,
            reason: None,
            remarks: None,
        }
    }

    /// Limit the instance to a zone
    pub fn with_zone(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.zone = Some(SensitivityZone {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// Set the date window; either end may be open
    pub fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether `date` falls inside the instance's (open-ended) date window
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date.map_or(true, |from| date >= from)
            && self.to_date.map_or(true, |to| date <= to)
    }
}

/// An entry from the authoritative sensitive species list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveTaxon {
    /// Scientific name as supplied by the list
    pub name: String,

    pub rank: RankType,

    /// Family, passed to the resolver to narrow homonyms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// Vernacular name for reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,

    /// Stable taxon identifier, assigned once the name is resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Accepted name when this entry's name is a synonym
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_name: Option<String>,

    /// Slot of the accepted entry inside the index that owns this entry
    #[serde(skip)]
    pub accepted_entry: Option<usize>,

    /// Applicability records; on an accepted entry, includes its synonyms'
    #[serde(default)]
    pub instances: Vec<SensitivityInstance>,
}

impl SensitiveTaxon {
    /// Create an unresolved entry with no instances
    pub fn new(name: impl Into<String>, rank: RankType) -> Self {
        Self {
            name: name.into(),
            rank,
            family: None,
            common_name: None,
            identifier: None,
            accepted_name: None,
            accepted_entry: None,
            instances: Vec::new(),
        }
    }

    /// Set the family
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Set the common name
    pub fn with_common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    /// Set the taxon identifier (normally assigned by the index build)
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Append an instance
    pub fn with_instance(mut self, instance: SensitivityInstance) -> Self {
        self.instances.push(instance);
        self
    }

    /// The identifier, if present and not blank
    pub fn resolved_identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    /// Whether the entry was resolved as a synonym of another name
    pub fn is_synonym(&self) -> bool {
        self.accepted_name.is_some()
    }

    /// Append an instance unless an equal one is already present
    ///
    /// Returns true if the instance was added.
    pub fn add_instance(&mut self, instance: SensitivityInstance) -> bool {
        if self.instances.contains(&instance) {
            return false;
        }
        self.instances.push(instance);
        true
    }

    /// Distinct category kinds, in dispatch precedence order
    pub fn category_kinds(&self) -> BTreeSet<CategoryKind> {
        self.instances.iter().map(|si| si.category.kind).collect()
    }

    /// Total order used to sort and search the index
    pub fn order(&self, other: &Self) -> Ordering {
        taxon_order(&self.name, self.rank, &other.name, other.rank)
    }
}

/// Case-insensitive name comparison without allocating
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Total order over (normalized name, rank)
pub fn taxon_order(a_name: &str, a_rank: RankType, b_name: &str, b_rank: RankType) -> Ordering {
    compare_names(a_name, b_name).then(a_rank.cmp(&b_rank))
}
