//! Instrument Catalog
//!
//! The set of instruments and per-instrument categories subscribed at
//! startup. The catalog is loaded once from a JSON file and is immutable for
//! the lifetime of the process; every buffer key and every subscription
//! argument is derived from it.
//!
//! # File Format
//!
//! ```json
//! {
//!     "BTCUSDT": ["publicTrade", "orderbook.50"],
//!     "ETHUSDT": ["publicTrade"]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// =============================================================================
// Stream Key
// =============================================================================

/// Partition key identifying one buffered stream: an instrument plus one of
/// its subscribed categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    /// Instrument symbol, e.g. `BTCUSDT`.
    pub instrument: String,
    /// Message category, e.g. `publicTrade` or `orderbook.50`.
    pub category: String,
}

impl StreamKey {
    /// Create a new stream key.
    #[must_use]
    pub fn new(instrument: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            category: category.into(),
        }
    }

    /// The wire topic for this key, `{category}.{instrument}`.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("{}.{}", self.category, self.instrument)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.instrument)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Error loading the instrument catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read instruments file: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog file is not valid JSON of the expected shape.
    #[error("failed to parse instruments file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The catalog contains no (instrument, category) pairs.
    #[error("instruments file defines no subscriptions")]
    Empty,
}

/// Immutable mapping from instrument symbol to its subscribed categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentCatalog {
    instruments: BTreeMap<String, Vec<String>>,
}

impl InstrumentCatalog {
    /// Build a catalog from instrument/category pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Empty`] if no instrument has any category.
    pub fn new(instruments: BTreeMap<String, Vec<String>>) -> Result<Self, CatalogError> {
        let catalog = Self { instruments };
        if catalog.keys().next().is_none() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// defines no subscriptions.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let instruments: BTreeMap<String, Vec<String>> = serde_json::from_str(&contents)?;
        Self::new(instruments)
    }

    /// Whether `instrument` is configured with `category` subscribed.
    #[must_use]
    pub fn contains(&self, instrument: &str, category: &str) -> bool {
        self.instruments
            .get(instrument)
            .is_some_and(|categories| categories.iter().any(|c| c == category))
    }

    /// Number of configured instruments.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }

    /// Iterate over every (instrument, category) pair as a [`StreamKey`].
    pub fn keys(&self) -> impl Iterator<Item = StreamKey> + '_ {
        self.instruments.iter().flat_map(|(instrument, categories)| {
            categories
                .iter()
                .map(move |category| StreamKey::new(instrument.clone(), category.clone()))
        })
    }

    /// The full subscription argument list, one `{category}.{instrument}`
    /// topic per configured pair.
    #[must_use]
    pub fn subscription_args(&self) -> Vec<String> {
        self.keys().map(|key| key.topic()).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
