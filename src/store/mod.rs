pub mod sqlite;

pub use sqlite::{JobRow, SqliteCatalog, DEFAULT_DB_PATH};

use crate::enrich::PersistableTool;
use crate::error::CatalogError;
use crate::job::RunResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    /// Case-insensitive equality.
    Exact,
    /// Either name contains the other, case-insensitively.
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The slug was taken between the existence check and the insert.
    Conflict,
}

/// The catalog as seen by the ingestion pipeline: lookups and inserts only.
pub trait Catalog {
    /// True when a tool with this name (any case) or this exact website URL exists.
    fn tool_exists(&self, name: &str, website_url: &str) -> Result<bool, CatalogError>;

    fn find_category(&self, name: &str, how: CategoryMatch) -> Result<Option<Category>, CatalogError>;

    fn slug_exists(&self, slug: &str) -> Result<bool, CatalogError>;

    fn insert_tool(&self, tool: &PersistableTool) -> Result<InsertOutcome, CatalogError>;
}

/// Best-effort sink for job run summaries.
pub trait JobHistory {
    fn record_job(&self, result: &RunResult) -> anyhow::Result<()>;
}
