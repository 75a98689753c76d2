use thiserror::Error;

/// Rejected job options. Raised before any network activity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),
    #[error("Invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("max retries must be at least 1")]
    InvalidRetries,
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

/// Failures reported by the catalog store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The store cannot be reached at all; the save stage stops.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// A single statement failed; only the current record is affected.
    #[error("catalog query failed: {0}")]
    Query(String),
}

/// Why a candidate did not become a catalog row.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("Skipping tool: missing name or website URL ({0})")]
    MissingFields(String),
    #[error("Duplicate tool ({0})")]
    Duplicate(String),
    #[error("Update existing tool not implemented yet ({0})")]
    UpdateNotImplemented(String),
    #[error("Could not find a unique slug for \"{name}\" after {attempts} attempts")]
    SlugExhausted { name: String, attempts: u32 },
    #[error("Failed to save tool \"{name}\": {reason}")]
    InsertFailed { name: String, reason: String },
    #[error("Error processing tool \"{name}\": {reason}")]
    Lookup { name: String, reason: String },
}

impl SkipReason {
    /// Silent skips count towards `skipped` without adding an error message.
    pub fn is_silent(&self) -> bool {
        matches!(self, SkipReason::Duplicate(_))
    }
}
