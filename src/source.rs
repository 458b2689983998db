//! Sensitive species list sources
//!
//! The index is built from a bulk load of raw `SensitiveTaxon` entries,
//! consulted once at startup. `TaxonSource` abstracts where that list
//! lives.

use crate::error::{Result, SdsError};
use crate::types::SensitiveTaxon;
use std::path::{Path, PathBuf};

/// Trait for loading the raw sensitive species list
pub trait TaxonSource: Send + Sync {
    /// Load all entries in list order
    fn load(&self) -> Result<Vec<SensitiveTaxon>>;
}

/// JSON file-based taxon source
///
/// Expects a JSON array of `SensitiveTaxon` objects.
pub struct JsonFileTaxonSource {
    path: PathBuf,
}

impl JsonFileTaxonSource {
    /// Create a source reading the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaxonSource for JsonFileTaxonSource {
    fn load(&self) -> Result<Vec<SensitiveTaxon>> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            SdsError::Source(format!(
                "Failed to read species list {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let taxa: Vec<SensitiveTaxon> = serde_json::from_str(&json).map_err(|e| {
            SdsError::Source(format!(
                "Failed to parse species list {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %self.path.display(),
            count = taxa.len(),
            "Sensitive species list loaded"
        );
        Ok(taxa)
    }
}

/// In-memory taxon source for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryTaxonSource {
    taxa: Vec<SensitiveTaxon>,
}

impl MemoryTaxonSource {
    pub fn new(taxa: Vec<SensitiveTaxon>) -> Self {
        Self { taxa }
    }
}

impl TaxonSource for MemoryTaxonSource {
    fn load(&self) -> Result<Vec<SensitiveTaxon>> {
        Ok(self.taxa.clone())
    }
}
